// knotsynth/src/choreo/mod.rs

mod choreographer;
mod knots;
mod traits;
mod types;

pub use choreographer::Choreographer;
pub use knots::{Choreography, End, KnotKind, Step, choreography};
pub use traits::Stage;
pub use types::{
    ChoreoParams, KnotSelection, LoosenParams, LoosenRecord, Phase, RenderPolicy, Span,
    StraightenParams,
};
