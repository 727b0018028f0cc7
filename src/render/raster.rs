//! Software preview renderer.
//!
//! Each segment is splatted as a shaded sphere of the segment radius into
//! a depth-tested buffer. The depth pass is the inverted, normalised depth
//! and the mask is that pass thresholded at zero.

use std::path::PathBuf;

use image::{
    GrayImage, ImageBuffer, ImageFormat, Luma, Pixel, PixelWithColorType, Rgb, RgbImage,
};
use nalgebra::Point3;
use tracing::{debug, trace};

use crate::env::RopeActuator;
use crate::render::camera::PinholeCamera;
use crate::render::errors::RenderError;
use crate::render::layout::Layout;
use crate::render::traits::{OutputIndex, Projector, Renderer};

const ROPE: [u8; 3] = [214, 182, 128];
const TABLE: [u8; 3] = [46, 52, 58];
const AMBIENT: f64 = 0.35;

pub struct RasterRenderer {
    camera: PinholeCamera,
    layout: Layout,
    radius: f64,
    /// Depth of the empty table, the far plane of every frame.
    background: f64,
}

impl RasterRenderer {
    /// Recreates the image directories under `layout` empty.
    pub fn create(
        layout: Layout,
        camera: PinholeCamera,
        radius: f64,
        table_z: f64,
    ) -> Result<Self, RenderError> {
        for dir in [layout.images(), layout.depth(), layout.masks()] {
            Layout::recreate(&dir)?;
        }
        let background = camera.depth_of(&Point3::new(0.0, 0.0, table_z));
        debug!(root = %layout.root().display(), "raster renderer ready");
        Ok(Self {
            camera,
            layout,
            radius,
            background,
        })
    }

    fn rasterize(&self, rope: &dyn RopeActuator) -> Result<Frame, RenderError> {
        let (w, h) = self.camera.resolution();
        let mut frame = Frame {
            width: w,
            height: h,
            depth: vec![self.background; (w as usize) * (h as usize)],
            rgb: RgbImage::from_pixel(w, h, Rgb(TABLE)),
        };

        for position in rope.positions()? {
            let view = self.camera.world_to_camera_view(&position);
            if view.z <= 0.0 {
                continue;
            }
            let cx = view.x * w as f64;
            let cy = h as f64 - view.y * h as f64;
            let r = self.radius * self.camera.pixel_scale(view.z);
            frame.splat(cx, cy, r, view.z, self.radius);
        }
        Ok(frame)
    }
}

struct Frame {
    width: u32,
    height: u32,
    depth: Vec<f64>,
    rgb: RgbImage,
}

impl Frame {
    fn splat(&mut self, cx: f64, cy: f64, r: f64, center_depth: f64, world_radius: f64) {
        if r <= 0.0 {
            return;
        }
        let x0 = (cx - r).floor().max(0.0) as u32;
        let y0 = (cy - r).floor().max(0.0) as u32;
        let x1 = ((cx + r).ceil() as i64).clamp(0, self.width as i64) as u32;
        let y1 = ((cy + r).ceil() as i64).clamp(0, self.height as i64) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                let rho = (dx * dx + dy * dy) / (r * r);
                if rho > 1.0 {
                    continue;
                }
                let nz = (1.0 - rho).sqrt();
                let z = center_depth - world_radius * nz;
                let slot = (y * self.width + x) as usize;
                if z >= self.depth[slot] {
                    continue;
                }
                self.depth[slot] = z;
                let shade = AMBIENT + (1.0 - AMBIENT) * nz;
                let [r8, g8, b8] = ROPE.map(|c| (c as f64 * shade).round() as u8);
                self.rgb.put_pixel(x, y, Rgb([r8, g8, b8]));
            }
        }
    }

    /// Inverted depth normalised over the frame: nearest is white.
    fn depth_pass(&self) -> GrayImage {
        let (near, far) = self
            .depth
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| {
                (lo.min(d), hi.max(d))
            });
        let span = far - near;
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let d = self.depth[(y * self.width + x) as usize];
            let v = if span > 0.0 { (far - d) / span } else { 0.0 };
            Luma([(v * 255.0).round() as u8])
        })
    }
}

fn mask_pass(depth: &GrayImage) -> GrayImage {
    GrayImage::from_fn(depth.width(), depth.height(), |x, y| {
        let Luma([v]) = *depth.get_pixel(x, y);
        Luma([if v > 0 { 255 } else { 0 }])
    })
}

fn save<P>(image: &ImageBuffer<P, Vec<u8>>, path: PathBuf) -> Result<(), RenderError>
where
    P: Pixel<Subpixel = u8> + PixelWithColorType,
{
    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|source| RenderError::Write { path, source })
}

impl Projector for RasterRenderer {
    fn resolution(&self) -> (u32, u32) {
        self.camera.resolution()
    }

    fn world_to_camera_view(&self, point: &Point3<f64>) -> Point3<f64> {
        self.camera.world_to_camera_view(point)
    }
}

impl Renderer for RasterRenderer {
    fn render(&mut self, rope: &dyn RopeActuator, index: OutputIndex) -> Result<(), RenderError> {
        let frame = self.rasterize(rope)?;
        let depth = frame.depth_pass();
        let mask = mask_pass(&depth);

        save(&depth, self.layout.depth_image(index))?;
        save(&mask, self.layout.mask_image(index))?;
        save(&frame.rgb, self.layout.rgb_image(index))?;
        trace!(output_index = index, "rendered");
        Ok(())
    }
}

/// Projection only; nothing is written.
#[derive(Debug, Clone, Default)]
pub struct NullRenderer {
    camera: PinholeCamera,
    rendered: u64,
}

impl NullRenderer {
    pub fn new(camera: PinholeCamera) -> Self {
        Self {
            camera,
            rendered: 0,
        }
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl Projector for NullRenderer {
    fn resolution(&self) -> (u32, u32) {
        self.camera.resolution()
    }

    fn world_to_camera_view(&self, point: &Point3<f64>) -> Point3<f64> {
        self.camera.world_to_camera_view(point)
    }
}

impl Renderer for NullRenderer {
    fn render(&mut self, _rope: &dyn RopeActuator, index: OutputIndex) -> Result<(), RenderError> {
        self.rendered += 1;
        trace!(output_index = index, "dry render");
        Ok(())
    }
}

/// Pick a renderer for the configured engine name. Host engine names
/// (`BLENDER_EEVEE`, `CYCLES`, ...) fall back to the raster preview.
pub fn for_engine(
    engine: &str,
    layout: Layout,
    camera: PinholeCamera,
    radius: f64,
    table_z: f64,
) -> Result<Box<dyn Renderer>, RenderError> {
    match engine.to_ascii_lowercase().as_str() {
        "null" | "none" => Ok(Box::new(NullRenderer::new(camera))),
        "raster" => Ok(Box::new(RasterRenderer::create(layout, camera, radius, table_z)?)),
        other => {
            debug!(engine = other, "host engine name, using raster preview");
            Ok(Box::new(RasterRenderer::create(layout, camera, radius, table_z)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RopeParams;
    use crate::env::{ChainRope, ChainSettings};

    fn rope() -> ChainRope {
        let params = RopeParams {
            num_segments: 20,
            ..RopeParams::default()
        };
        ChainRope::new(&params, ChainSettings::default())
    }

    #[test]
    fn writes_three_images_per_index() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        let camera = PinholeCamera::new(64, 48);
        let mut renderer = RasterRenderer::create(layout.clone(), camera, 0.4, -5.0).unwrap();

        renderer.render(&rope(), 3).unwrap();

        for path in [
            layout.rgb_image(3),
            layout.depth_image(3),
            layout.mask_image(3),
        ] {
            assert!(path.is_file(), "{} missing", path.display());
        }
        let rgb = image::open(layout.rgb_image(3)).unwrap();
        assert_eq!((rgb.width(), rgb.height()), (64, 48));
    }

    #[test]
    fn mask_covers_the_rope_only() {
        let tmp = tempfile::tempdir().unwrap();
        let camera = PinholeCamera::new(64, 48);
        let renderer =
            RasterRenderer::create(Layout::new(tmp.path()), camera, 0.4, -5.0).unwrap();

        let frame = renderer.rasterize(&rope()).unwrap();
        let mask = mask_pass(&frame.depth_pass());

        // The rope lies along y = 0, the image's middle row.
        let center = camera.world_to_camera_view(&Point3::new(0.0, 0.0, 0.0));
        let (cx, cy) = ((center.x * 64.0) as u32, (48.0 - center.y * 48.0) as u32);
        assert_eq!(mask.get_pixel(cx, cy).0, [255]);
        assert_eq!(mask.get_pixel(cx, 0).0, [0]);
        assert_eq!(mask.get_pixel(cx, 47).0, [0]);
    }

    #[test]
    fn null_renderer_only_counts() {
        let mut renderer = NullRenderer::default();
        renderer.render(&rope(), 0).unwrap();
        renderer.render(&rope(), 1).unwrap();
        assert_eq!(renderer.rendered(), 2);
    }

    #[test]
    fn engine_names_select_a_renderer() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        let camera = PinholeCamera::default();
        assert!(for_engine("null", layout.clone(), camera, 0.4, -5.0).is_ok());
        assert!(!layout.images().exists());
        assert!(for_engine("BLENDER_EEVEE", layout.clone(), camera, 0.4, -5.0).is_ok());
        assert!(layout.images().is_dir());
    }
}
