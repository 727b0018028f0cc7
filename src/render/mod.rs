// knotsynth/src/render/mod.rs

mod camera;
mod errors;
mod layout;
mod raster;
mod traits;

pub use camera::PinholeCamera;
pub use errors::RenderError;
pub use layout::Layout;
pub use raster::{NullRenderer, RasterRenderer, for_engine};
pub use traits::{OutputIndex, Projector, Renderer};
