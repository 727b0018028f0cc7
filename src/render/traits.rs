use nalgebra::Point3;

use crate::env::RopeActuator;
use crate::render::errors::RenderError;

/// Dense index of a rendered frame across the whole run.
pub type OutputIndex = u64;

pub trait Projector {
    /// Output image size in pixels, `(width, height)`.
    fn resolution(&self) -> (u32, u32);

    /// Normalised camera view coordinates: `x`, `y` in `[0, 1]` across the
    /// frame (origin bottom-left), `z` the distance in front of the camera.
    fn world_to_camera_view(&self, point: &Point3<f64>) -> Point3<f64>;
}

pub trait Renderer: Projector {
    /// Produce the images for `index` from the rope as it is now.
    fn render(&mut self, rope: &dyn RopeActuator, index: OutputIndex) -> Result<(), RenderError>;
}
