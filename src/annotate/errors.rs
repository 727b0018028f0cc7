use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::env::EnvError;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed annotation file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Env(#[from] EnvError),
}
