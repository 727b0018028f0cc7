pub mod annotate;
pub mod choreo;
pub mod config;
pub mod control;
pub mod dataset;
pub mod detect;
pub mod env;
pub mod observe;
pub mod render;
pub mod video;
pub mod vis;

#[cfg(feature = "python")]
mod python;
