pub use self::artifact::*;
pub use self::encoding::*;
pub use self::page_assets::*;
pub use self::render::*;
pub use self::route::*;

mod artifact;
mod encoding;
mod page_assets;
mod render;
mod route;
