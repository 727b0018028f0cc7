//! Pixel-space keypoints for every rendered frame.
//!
//! For each rendered output index the exporter projects a strided subset of
//! the selected segments' surface vertices and keeps the pixels. The whole
//! map is written once, at the end of a run, as `knots_info.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotate::errors::AnnotateError;
use crate::detect::CrossingEvent;
use crate::env::RopeActuator;
use crate::render::{OutputIndex, Projector};

pub type AnnotationMap = BTreeMap<OutputIndex, Vec<[i64; 2]>>;

/// Which segments an annotation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationScope {
    /// Segments within `radius` of the crossing's pull and hold segments.
    Knot {
        #[serde(default = "default_radius")]
        radius: usize,
    },
    /// The first and last `count` segments.
    Ends {
        #[serde(default = "default_count")]
        count: usize,
    },
    Full,
}

fn default_radius() -> usize {
    1
}

fn default_count() -> usize {
    4
}

impl Default for AnnotationScope {
    fn default() -> Self {
        AnnotationScope::Knot {
            radius: default_radius(),
        }
    }
}

impl AnnotationScope {
    /// Selected segment indices, in annotation order. Without a crossing a
    /// knot scope covers the whole rope.
    pub fn segments(&self, num_segments: usize, crossing: Option<&CrossingEvent>) -> Vec<usize> {
        let around = |center: usize, radius: usize| {
            let hi = (center + radius).min(num_segments.saturating_sub(1));
            center.saturating_sub(radius)..=hi
        };
        match (self, crossing) {
            (AnnotationScope::Knot { radius }, Some(c)) => around(c.pull_index, *radius)
                .chain(around(c.hold_index, *radius))
                .filter(|i| *i < num_segments)
                .collect(),
            (AnnotationScope::Ends { count }, _) => {
                let count = (*count).min(num_segments);
                let tail = (num_segments - count).max(count);
                (0..count).chain(tail..num_segments).collect()
            }
            (AnnotationScope::Knot { .. }, None) | (AnnotationScope::Full, _) => {
                (0..num_segments).collect()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationExporter {
    scope: AnnotationScope,
    num_annotations: usize,
    map: AnnotationMap,
}

impl AnnotationExporter {
    pub fn new(scope: AnnotationScope, num_annotations: usize) -> Self {
        Self {
            scope,
            num_annotations: num_annotations.max(1),
            map: AnnotationMap::new(),
        }
    }

    pub fn scope(&self) -> AnnotationScope {
        self.scope
    }

    pub fn map(&self) -> &AnnotationMap {
        &self.map
    }

    pub fn get(&self, index: OutputIndex) -> Option<&[[i64; 2]]> {
        self.map.get(&index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Record the pixels for `index`, replacing any earlier entry. Returns
    /// the number of pixels recorded.
    pub fn annotate<P>(
        &mut self,
        rope: &dyn RopeActuator,
        projector: &P,
        index: OutputIndex,
        crossing: Option<&CrossingEvent>,
    ) -> Result<usize, AnnotateError>
    where
        P: Projector + ?Sized,
    {
        let (w, h) = projector.resolution();
        let (w, h) = (w as f64, h as f64);
        let segments = self.scope.segments(rope.num_segments(), crossing);

        let mut pixels = Vec::new();
        for &i in &segments {
            let verts = rope.surface_vertices(i)?;
            let stride = (segments.len() * verts.len() / self.num_annotations).max(1);
            pixels.extend(verts.iter().step_by(stride).map(|v| {
                let view = projector.world_to_camera_view(v);
                [(view.x * w).round() as i64, (h - view.y * h).round() as i64]
            }));
        }

        let count = pixels.len();
        debug!(output_index = index, segments = segments.len(), pixels = count, "annotated");
        self.map.insert(index, pixels);
        Ok(count)
    }

    /// `{"<index>": [[x, y], ...]}`, pretty-printed, keys in numeric order.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), AnnotateError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| AnnotateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.map).map_err(|source| AnnotateError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| AnnotateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), frames = self.map.len(), "annotations written");
        Ok(())
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<AnnotationMap, AnnotateError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| AnnotateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| AnnotateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
