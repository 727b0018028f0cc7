//! Keypoint overlays for eyeballing `knots_info.json` against the renders.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use tracing::{info, warn};

use crate::annotate::AnnotationExporter;
use crate::render::Layout;
use crate::vis::errors::VisError;

/// Full-saturation colour for position `i` of `len`.
pub fn hue_sweep(i: usize, len: usize) -> Rgb<u8> {
    let h6 = if len == 0 {
        0.0
    } else {
        6.0 * i as f64 / len as f64
    };
    let sector = h6.floor();
    let f = h6 - sector;
    let (r, g, b) = match sector as u32 % 6 {
        0 => (1.0, f, 0.0),
        1 => (1.0 - f, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, 1.0 - f, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, 1.0 - f),
    };
    let to_u8 = |c: f64| (255.0 * c) as u8;
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

/// Draw every pixel as a radius-1 dot, coloured by its list position.
pub fn overlay(image: &mut RgbImage, pixels: &[[i64; 2]]) {
    for (i, [u, v]) in pixels.iter().enumerate() {
        let (Ok(x), Ok(y)) = (i32::try_from(*u), i32::try_from(*v)) else {
            continue;
        };
        draw_filled_circle_mut(image, (x, y), 1, hue_sweep(i, pixels.len()));
    }
}

/// Overlay every entry of `images/knots_info.json` onto its RGB frame and
/// write `out/%06d_annotated.png`. `out` is recreated empty. Returns the
/// number of images written; entries without a frame on disk are skipped.
pub fn annotate_dir(images: &Path, out: &Path) -> Result<usize, VisError> {
    let map = AnnotationExporter::read_json(images.join("knots_info.json"))?;
    Layout::recreate(out)?;

    let mut written = 0;
    for (index, pixels) in &map {
        let source = images.join(Layout::rgb_name(*index));
        if !source.is_file() {
            warn!(output_index = index, path = %source.display(), "frame missing, skipped");
            continue;
        }
        let mut image = image::open(&source)
            .map_err(|e| VisError::Read {
                path: source.clone(),
                source: e,
            })?
            .to_rgb8();
        overlay(&mut image, pixels);

        let target = out.join(Layout::annotated_name(*index));
        image
            .save_with_format(&target, ImageFormat::Png)
            .map_err(|e| VisError::Write {
                path: target.clone(),
                source: e,
            })?;
        written += 1;
    }
    info!(written, entries = map.len(), "annotated frames");
    Ok(written)
}
