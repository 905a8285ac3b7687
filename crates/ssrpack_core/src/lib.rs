pub mod hash;
pub mod manifest;
pub mod types;
pub mod url;

pub use manifest::*;
