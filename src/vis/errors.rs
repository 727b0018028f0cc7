use std::path::PathBuf;

use thiserror::Error;

use crate::annotate::AnnotateError;
use crate::render::RenderError;

#[derive(Error, Debug)]
pub enum VisError {
    #[error("cannot read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot write image {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Annotations(#[from] AnnotateError),

    #[error(transparent)]
    OutputDir(#[from] RenderError),
}
