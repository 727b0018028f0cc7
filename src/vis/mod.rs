// knotsynth/src/vis/mod.rs

mod errors;
mod overlay;

pub use errors::VisError;
pub use overlay::{annotate_dir, hue_sweep, overlay};
