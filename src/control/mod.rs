// knotsynth/src/control/mod.rs

mod errors;
mod scheduler;
mod types;

pub use errors::ControlError;
pub use scheduler::ActionScheduler;
pub use types::{Action, ActionLog, SimulationContext};
