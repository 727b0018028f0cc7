// knotsynth/src/annotate/mod.rs

mod errors;
mod exporter;

pub use errors::AnnotateError;
pub use exporter::{AnnotationExporter, AnnotationMap, AnnotationScope};
