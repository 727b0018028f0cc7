use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::annotate::AnnotateError;
use crate::control::ControlError;
use crate::env::{EnvError, Frame};
use crate::render::RenderError;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("rope has {actual} segments but the configuration expects {expected}")]
    SegmentCountMismatch { expected: usize, actual: usize },

    #[error("knot selection has no kinds to choose from")]
    NoKnotKinds,

    #[error("episode accounted for {accounted} frames but ended at frame {end}")]
    LedgerMismatch { accounted: Frame, end: Frame },

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Annotate(#[from] AnnotateError),
}
