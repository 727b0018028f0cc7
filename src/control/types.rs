use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::control::errors::ControlError;
use crate::env::Frame;

/// The explicit simulation clock: last stepped frame and the cache horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationContext {
    frame: Frame,
    horizon: Frame,
}

impl SimulationContext {
    pub fn new(horizon: Frame) -> Self {
        Self { frame: 0, horizon }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn horizon(&self) -> Frame {
        self.horizon
    }

    pub fn check(&self, frame: Frame) -> Result<(), ControlError> {
        if frame > self.horizon {
            return Err(ControlError::HorizonExceeded {
                frame,
                horizon: self.horizon,
            });
        }
        Ok(())
    }

    /// `frame` can be keyed: not behind the clock, not past the horizon.
    pub fn check_schedulable(&self, frame: Frame) -> Result<(), ControlError> {
        if frame < self.frame {
            return Err(ControlError::FrameInPast {
                frame,
                current: self.frame,
            });
        }
        self.check(frame)
    }

    /// Move the clock forward to `frame`.
    pub fn advance_to(&mut self, frame: Frame) -> Result<(), ControlError> {
        self.check_schedulable(frame)?;
        self.frame = frame;
        Ok(())
    }

    /// Episodes restart their frame numbering at 0.
    pub fn rewind(&mut self) {
        self.frame = 0;
    }
}

/// One issued displacement command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub segment: usize,
    /// Clock frame the command was issued at.
    pub issued_at: Frame,
    /// Frame by which the displacement is reached.
    pub frame: Frame,
    pub displacement: Vector3<f64>,
    pub animate: bool,
}

/// Ordered log of every action issued during the current episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionLog {
    actions: Vec<Action>,
}

impl ActionLog {
    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn for_segment(&self, segment: usize) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(move |a| a.segment == segment)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}
