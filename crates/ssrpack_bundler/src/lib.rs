//! Build-time half of ssrpack.
//!
//! [`bundle`] drives a [`Bundler`] over the hydration entrypoints of a route
//! set, then post-processes the emitted files: chunk dependencies are
//! recovered by [`resolve_js_dependencies`], duplicate re-exports are repaired
//! by [`fix_duplicate_exports_in_directory`], the output is optionally
//! pre-compressed, and finally a [`ssrpack_core::Manifest`] is written.
pub use bundle::*;
pub use bundler::*;
pub use dependencies::*;
pub use error::*;
pub use esbuild::EsbuildBundler;
pub use exports::*;

mod bundle;
mod bundler;
mod dependencies;
mod error;
mod esbuild;
mod exports;
