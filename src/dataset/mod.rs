// knotsynth/src/dataset/mod.rs

mod errors;
mod generator;
mod ledger;
mod session;

pub use errors::DatasetError;
pub use generator::{DatasetSummary, EpisodeRecord, Generator, StepRecord};
pub use ledger::{RenderLedger, output_index};
pub use session::Session;
