use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::annotate::{AnnotationExporter, AnnotationScope};
use crate::choreo::{Phase, Span, Stage};
use crate::config::{GenerationConfig, RenderPhases};
use crate::control::{ActionScheduler, SimulationContext};
use crate::dataset::errors::DatasetError;
use crate::dataset::ledger::RenderLedger;
use crate::detect::{CrossingEvent, KnotDetector};
use crate::env::{Frame, RopeEnv};
use crate::render::{OutputIndex, Renderer};

/// Everything one run mutates while stepping: the scene, the renderer,
/// the scheduler and clock, the render ledger and the annotations.
pub struct Session<E: RopeEnv> {
    env: E,
    renderer: Box<dyn Renderer>,
    scheduler: ActionScheduler,
    ctx: SimulationContext,
    ledger: RenderLedger,
    exporter: AnnotationExporter,
    detector: KnotDetector,
    rng: ChaCha8Rng,
    phases: RenderPhases,
    frames_simulated: u64,
    rendered: Vec<OutputIndex>,
}

impl<E: RopeEnv> Session<E> {
    pub fn new(env: E, renderer: Box<dyn Renderer>, config: &GenerationConfig) -> Self {
        Self {
            env,
            renderer,
            scheduler: ActionScheduler::new(),
            ctx: SimulationContext::new(config.horizon),
            ledger: RenderLedger::new(config.render_step),
            exporter: AnnotationExporter::new(config.scope, config.num_annotations),
            detector: KnotDetector::new(config.detector),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            phases: config.render,
            frames_simulated: 0,
            rendered: Vec::new(),
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn scheduler(&self) -> &ActionScheduler {
        &self.scheduler
    }

    pub fn ledger(&self) -> &RenderLedger {
        &self.ledger
    }

    pub fn exporter(&self) -> &AnnotationExporter {
        &self.exporter
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn frames_simulated(&self) -> u64 {
        self.frames_simulated
    }

    /// Output indices in the order they were rendered.
    pub fn rendered(&self) -> &[OutputIndex] {
        &self.rendered
    }

    /// Close the ledger for an episode ending at `end`, drop its keyframes
    /// and actions, and rewind the clock.
    pub fn finish_episode(&mut self, end: Frame) -> Result<(), DatasetError> {
        self.ledger.close_episode(end)?;
        self.env.reset()?;
        self.scheduler.clear();
        self.ctx.rewind();
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), DatasetError> {
        self.env.close()?;
        Ok(())
    }

    fn phase_enabled(&self, phase: Phase) -> bool {
        match phase {
            Phase::Tie => self.phases.tie,
            Phase::Straighten => self.phases.straighten,
            Phase::Loosen => self.phases.loosen,
        }
    }

    fn render(&mut self, index: OutputIndex) -> Result<(), DatasetError> {
        self.renderer.render(&self.env, index)?;
        let crossing = match self.exporter.scope() {
            AnnotationScope::Knot { .. } => Some(self.detector.find_crossing(&self.env.positions()?)),
            _ => None,
        };
        self.exporter
            .annotate(&self.env, self.renderer.as_ref(), index, crossing.as_ref())?;
        self.rendered.push(index);
        Ok(())
    }
}

impl<E: RopeEnv> Stage for Session<E> {
    type Error = DatasetError;

    fn clock(&self) -> Frame {
        self.ctx.frame()
    }

    fn num_segments(&self) -> usize {
        self.env.num_segments()
    }

    fn position(&self, segment: usize) -> Result<Point3<f64>, DatasetError> {
        Ok(self.env.segment(segment)?.pose.position)
    }

    fn take_action(
        &mut self,
        segment: usize,
        frame: Frame,
        displacement: Vector3<f64>,
        animate: bool,
    ) -> Result<(), DatasetError> {
        self.scheduler
            .take_action(&mut self.env, &self.ctx, segment, frame, displacement, animate)?;
        Ok(())
    }

    fn toggle(&mut self, segment: usize, frame: Frame, kinematic: bool) -> Result<(), DatasetError> {
        self.ctx.check_schedulable(frame)?;
        self.scheduler.toggle(&mut self.env, frame, segment, kinematic)?;
        Ok(())
    }

    fn crossing(&self) -> Result<CrossingEvent, DatasetError> {
        Ok(self.detector.find_crossing(&self.env.positions()?))
    }

    fn run(&mut self, span: Span) -> Result<(), DatasetError> {
        let enabled = self.phase_enabled(span.phase);
        if !enabled {
            self.ledger.skip_span(span.frames.end.saturating_sub(span.frames.start));
        }
        trace!(phase = ?span.phase, start = span.frames.start, end = span.frames.end, enabled, "span");

        for frame in span.frames {
            self.ctx.advance_to(frame)?;
            self.env.step_to(frame)?;
            self.frames_simulated += 1;
            if !enabled {
                continue;
            }
            if span.policy.admits(frame) {
                if let Some(index) = self.ledger.admit(frame) {
                    self.render(index)?;
                }
            } else {
                self.ledger.skip();
            }
        }
        Ok(())
    }

    fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RopeParams;
    use crate::control::ControlError;
    use crate::env::{ChainRope, ChainSettings};
    use crate::render::{NullRenderer, PinholeCamera};

    fn session() -> Session<ChainRope> {
        let params = RopeParams {
            num_segments: 10,
            ..RopeParams::default()
        };
        let settings = ChainSettings {
            solver_iterations: 2,
            ..ChainSettings::default()
        };
        Session::new(
            ChainRope::new(&params, settings),
            Box::new(NullRenderer::new(PinholeCamera::new(64, 48))),
            &GenerationConfig::default(),
        )
    }

    #[test]
    fn toggles_cannot_key_the_past() {
        let mut session = session();
        session.run(Span::new(0..20, Phase::Tie)).unwrap();
        assert_eq!(session.clock(), 19);

        let err = session.toggle(0, 10, false).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Control(ControlError::FrameInPast {
                frame: 10,
                current: 19
            })
        ));
        assert!(session.toggle(0, 19, false).is_ok());
        assert!(session.toggle(9, 30, false).is_ok());
    }

    #[test]
    fn disabled_phase_is_accounted_without_rendering() {
        let mut session = session();
        session.run(Span::new(0..20, Phase::Tie)).unwrap();

        assert_eq!(session.ledger().accounted(), 20);
        assert_eq!(session.ledger().offset(), 20);
        assert_eq!(session.frames_simulated(), 20);
        assert!(session.rendered().is_empty());
    }
}
