use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::env::EnvError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("cannot prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Env(#[from] EnvError),
}
