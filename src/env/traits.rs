use nalgebra::Point3;

use crate::env::errors::EnvError;
use crate::env::types::{Frame, Keyframe, Segment, Track};

/// Per-segment access to the rope living in the physics/rig host.
///
/// The core never talks to the host directly; everything it needs to
/// read or script goes through this trait.
pub trait RopeActuator {
    fn num_segments(&self) -> usize;

    /// Current simulated pose and control mode of segment `index`.
    fn segment(&self, index: usize) -> Result<Segment, EnvError>;

    fn set_kinematic(&mut self, index: usize, kinematic: bool) -> Result<(), EnvError>;

    fn record_keyframe(&mut self, index: usize, keyframe: Keyframe) -> Result<(), EnvError>;

    fn track(&self, index: usize) -> Result<&Track, EnvError>;

    /// World-space surface vertices of the segment's mesh.
    fn surface_vertices(&self, index: usize) -> Result<Vec<Point3<f64>>, EnvError>;

    fn positions(&self) -> Result<Vec<Point3<f64>>, EnvError> {
        (0..self.num_segments())
            .map(|i| self.segment(i).map(|s| s.pose.position))
            .collect()
    }
}

/// A steppable scene holding one rope.
pub trait RopeEnv: RopeActuator {
    /// Evaluate keyframes at `frame` and advance physics up to it.
    fn step_to(&mut self, frame: Frame) -> Result<(), EnvError>;

    /// Drop every recorded keyframe, rewind the clock to frame 0 and put
    /// the rope back in its rest layout with only the ends scripted.
    fn reset(&mut self) -> Result<(), EnvError>;

    fn close(&mut self) -> Result<(), EnvError>;

    fn current_frame(&self) -> Frame;
}
