mod errors;
mod types;

pub use errors::ConfigError;
pub use types::{GenerationConfig, RenderPhases, RopeParams};
