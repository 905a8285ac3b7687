//! Serve-time half of ssrpack.
//!
//! [`generate_ssr_bundle_handlers`] reads the manifest written by the bundle
//! step and produces one handler per server-rendered route, plus the static
//! handlers from [`serve_static`] for the client assets.
pub use error::*;
pub use negotiate::*;
pub use ssr::*;
pub use static_files::*;

mod error;
mod negotiate;
mod ssr;
mod static_files;
