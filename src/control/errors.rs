use thiserror::Error;

use crate::env::{EnvError, Frame};

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("frame {frame} is past the cache horizon {horizon}")]
    HorizonExceeded { frame: Frame, horizon: Frame },

    #[error("frame {frame} is before the current frame {current}")]
    FrameInPast { frame: Frame, current: Frame },

    #[error(transparent)]
    Env(#[from] EnvError),
}
