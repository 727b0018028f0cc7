use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::render::traits::Projector;

/// Fixed overhead camera looking straight down `-z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinholeCamera {
    pub location: Point3<f64>,
    /// Focal length in mm.
    pub lens: f64,
    /// Sensor size in mm, fitted to the larger image dimension.
    pub sensor: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for PinholeCamera {
    fn default() -> Self {
        Self {
            location: Point3::new(2.0, 0.0, 28.0),
            lens: 50.0,
            sensor: 36.0,
            width: 640,
            height: 480,
        }
    }
}

impl PinholeCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Half extents of the view frame at unit distance.
    fn half_frame(&self) -> (f64, f64) {
        let half = self.sensor / (2.0 * self.lens);
        let (w, h) = (self.width.max(1) as f64, self.height.max(1) as f64);
        if w >= h {
            (half, half * h / w)
        } else {
            (half * w / h, half)
        }
    }

    /// Pixels per world unit at `depth` in front of the camera.
    pub fn pixel_scale(&self, depth: f64) -> f64 {
        let (half_w, _) = self.half_frame();
        self.width as f64 / (2.0 * half_w * depth.max(f64::EPSILON))
    }

    pub fn depth_of(&self, point: &Point3<f64>) -> f64 {
        self.location.z - point.z
    }
}

impl Projector for PinholeCamera {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn world_to_camera_view(&self, point: &Point3<f64>) -> Point3<f64> {
        let local: Vector3<f64> = point - self.location;
        let depth = -local.z;
        if depth <= 0.0 {
            return Point3::new(0.5, 0.5, depth);
        }
        let (half_w, half_h) = self.half_frame();
        Point3::new(
            local.x / depth / (2.0 * half_w) + 0.5,
            local.y / depth / (2.0 * half_h) + 0.5,
            depth,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn point_below_camera_lands_mid_frame() {
        let cam = PinholeCamera::default();
        let v = cam.world_to_camera_view(&Point3::new(2.0, 0.0, -5.0));
        assert_relative_eq!(v.x, 0.5);
        assert_relative_eq!(v.y, 0.5);
        assert_relative_eq!(v.z, 33.0);
    }

    #[test]
    fn frame_edge_matches_field_of_view() {
        let cam = PinholeCamera::default();
        // Half width at depth 28 is 28 * 18 / 50.
        let edge = 2.0 + 28.0 * 18.0 / 50.0;
        let v = cam.world_to_camera_view(&Point3::new(edge, 0.0, 0.0));
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-12);

        let top = 28.0 * 18.0 / 50.0 * 480.0 / 640.0;
        let v = cam.world_to_camera_view(&Point3::new(2.0, top, 0.0));
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn portrait_frames_fit_the_height() {
        let cam = PinholeCamera::new(480, 640);
        let top = 2.0 * 28.0 * 18.0 / 50.0 / 2.0;
        let v = cam.world_to_camera_view(&Point3::new(2.0, top, 0.0));
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
    }
}
