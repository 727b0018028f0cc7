use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("no segment {index} on a rope of {num_segments} segments")]
    MissingSegment { index: usize, num_segments: usize },

    #[error("expected {expected} segment positions, got {got}")]
    PositionCount { expected: usize, got: usize },

    #[error("cannot step back from frame {current} to frame {requested}")]
    FrameRewind { current: u32, requested: u32 },
}
