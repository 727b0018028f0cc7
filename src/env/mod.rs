// knotsynth/src/env/mod.rs
mod chain;
mod errors;
mod traits;
mod types;

pub use chain::{ChainRope, ChainSettings};
pub use errors::EnvError;
pub use traits::{RopeActuator, RopeEnv};
pub use types::{Frame, Keyframe, Pose, Segment, Track};
