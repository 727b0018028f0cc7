use nalgebra::{Point3, Vector3};
use rand_chacha::ChaCha8Rng;

use crate::choreo::types::Span;
use crate::detect::CrossingEvent;
use crate::env::Frame;

/// What a choreography needs from the running episode: the scheduler, the
/// simulation clock, crossing detection and frame stepping.
pub trait Stage {
    type Error;

    /// Last stepped frame.
    fn clock(&self) -> Frame;

    fn num_segments(&self) -> usize;

    fn position(&self, segment: usize) -> Result<Point3<f64>, Self::Error>;

    fn take_action(
        &mut self,
        segment: usize,
        frame: Frame,
        displacement: Vector3<f64>,
        animate: bool,
    ) -> Result<(), Self::Error>;

    fn toggle(&mut self, segment: usize, frame: Frame, kinematic: bool) -> Result<(), Self::Error>;

    fn crossing(&self) -> Result<CrossingEvent, Self::Error>;

    /// Step every frame of `span`, rendering the ones it admits.
    fn run(&mut self, span: Span) -> Result<(), Self::Error>;

    fn rng(&mut self) -> &mut ChaCha8Rng;
}
