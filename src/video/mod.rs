// knotsynth/src/video/mod.rs

mod encoder;
mod errors;

pub use encoder::{Ffmpeg, VideoEncoder, assemble};
pub use errors::VideoError;
