use serde::{Deserialize, Serialize};

use crate::dataset::errors::DatasetError;
use crate::env::Frame;
use crate::render::OutputIndex;

/// Maps simulation frames to dense output indices across episodes.
///
/// Every simulated frame of an episode is either skipped (never a render
/// candidate) or admitted. Admitted frames are numbered consecutively over
/// the whole run; every `step`-th of them is rendered. `offset` counts the
/// skipped frames, so `output_index = (frame - offset) / step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderLedger {
    step: u32,
    offset: i64,
    /// Frames of the current episode accounted so far.
    accounted: Frame,
}

impl RenderLedger {
    pub fn new(step: u32) -> Self {
        Self {
            step: step.max(1),
            offset: 0,
            accounted: 0,
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn accounted(&self) -> Frame {
        self.accounted
    }

    pub fn skip(&mut self) {
        self.skip_span(1);
    }

    pub fn skip_span(&mut self, frames: Frame) {
        self.offset += i64::from(frames);
        self.accounted += frames;
    }

    /// Account `frame` as a render candidate; `Some` when it lands on the
    /// render stride.
    pub fn admit(&mut self, frame: Frame) -> Option<OutputIndex> {
        self.accounted += 1;
        self.output_index(frame)
    }

    pub fn output_index(&self, frame: Frame) -> Option<OutputIndex> {
        output_index(frame, self.offset, self.step)
    }

    /// Frame numbers restart at 0 next episode; fold this episode's `end`
    /// into the offset so admitted frames keep counting up.
    pub fn close_episode(&mut self, end: Frame) -> Result<(), DatasetError> {
        if self.accounted != end {
            return Err(DatasetError::LedgerMismatch {
                accounted: self.accounted,
                end,
            });
        }
        self.offset -= i64::from(end);
        self.accounted = 0;
        Ok(())
    }
}

/// `(frame - offset) / step` when that is a whole, non-negative index.
pub fn output_index(frame: Frame, offset: i64, step: u32) -> Option<OutputIndex> {
    let shifted = i64::from(frame) - offset;
    let step = i64::from(step.max(1));
    if shifted >= 0 && shifted % step == 0 {
        u64::try_from(shifted / step).ok()
    } else {
        None
    }
}
