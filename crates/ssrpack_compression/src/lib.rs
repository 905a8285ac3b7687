//! Pre-compression of build output.
//!
//! Every compressible file under a directory gets up to three siblings
//! (`.gz`, `.zst`, `.br`) which the static server negotiates between at
//! request time. A sibling is only kept when it is strictly smaller than the
//! original.
pub use compress::*;
pub use encoders::encode;

mod compress;
mod encoders;
