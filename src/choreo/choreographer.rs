use nalgebra::Vector3;
use rand::Rng;
use tracing::{debug, info};

use crate::choreo::knots::{KnotKind, Step, choreography};
use crate::choreo::traits::Stage;
use crate::choreo::types::{ChoreoParams, LoosenRecord, Phase, RenderPolicy, Span};
use crate::env::Frame;

/// Loosens run after a `Cornell2` pretzel, before the knot counts as tied.
const CORNELL2_LOOSENS: usize = 2;

/// Turns knot kinds and the straighten/loosen recipes into scheduled
/// actions and stepped frames.
#[derive(Debug, Clone, Default)]
pub struct Choreographer {
    params: ChoreoParams,
}

impl Choreographer {
    pub fn new(params: ChoreoParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ChoreoParams {
        &self.params
    }

    /// Tie `kind` starting from frame 0. Returns the frame the knot is
    /// considered settled at.
    pub fn tie<S: Stage>(&self, stage: &mut S, kind: KnotKind) -> Result<Frame, S::Error> {
        let n = stage.num_segments();
        let last = n.saturating_sub(1);

        // Ends scripted, interior free, nothing moves.
        for i in 0..n {
            stage.take_action(i, 1, Vector3::zeros(), i == 0 || i == last)?;
        }

        let table = choreography(kind);
        for step in table.steps {
            match *step {
                Step::Move { end, frame, by } => {
                    stage.take_action(end.index(n), frame, Vector3::from(by), true)?;
                }
                Step::Toggle {
                    end,
                    frame,
                    kinematic,
                } => stage.toggle(end.index(n), frame, kinematic)?,
            }
        }
        stage.run(Span::new(0..table.settle, Phase::Tie))?;

        let mut end = table.settle;
        if kind == KnotKind::Cornell2 {
            for _ in 0..CORNELL2_LOOSENS {
                let (next, _) = self.loosen_in(stage, end, Phase::Tie)?;
                end = next;
            }
        }
        info!(knot = %kind, end, "knot tied");
        Ok(end)
    }

    /// Pull both ends apart along `x` so the knot lies flat and readable.
    pub fn straighten<S: Stage>(&self, stage: &mut S, start: Frame) -> Result<Frame, S::Error> {
        let p = &self.params.straighten;
        let n = stage.num_segments();
        let (first, last) = (0, n.saturating_sub(1));
        let mid = start + p.pull_frames;
        let end = start + p.total_frames;

        let at = stage.position(last)?;
        let dy = stage.rng().gen_range(-p.jitter..=p.jitter);
        stage.take_action(last, mid, Vector3::new(p.last_end_x - at.x, dy, 0.0), true)?;
        stage.run(Span::new(start..mid, Phase::Straighten))?;

        let at = stage.position(first)?;
        let dy = stage.rng().gen_range(-p.jitter..=p.jitter);
        stage.take_action(first, end, Vector3::new(p.first_end_x - at.x, dy, 0.0), true)?;
        stage.toggle(first, end, false)?;
        stage.toggle(last, end, false)?;
        stage.run(Span::new(mid..end, Phase::Straighten))?;

        debug!(start, end, "straightened");
        Ok(end)
    }

    /// One detector-guided loosening action starting at `start`.
    pub fn loosen<S: Stage>(
        &self,
        stage: &mut S,
        start: Frame,
    ) -> Result<(Frame, LoosenRecord), S::Error> {
        self.loosen_in(stage, start, Phase::Loosen)
    }

    fn loosen_in<S: Stage>(
        &self,
        stage: &mut S,
        start: Frame,
        phase: Phase,
    ) -> Result<(Frame, LoosenRecord), S::Error> {
        let p = &self.params.loosen;
        let crossing = stage.crossing()?;

        let noise = {
            let rng = stage.rng();
            Vector3::new(
                rng.gen_range(-p.noise..=p.noise),
                rng.gen_range(-p.noise..=p.noise),
                rng.gen_range(-p.noise..=p.noise),
            )
        };
        let applied = (crossing.suggested_vector + noise)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::z)
            * p.magnitude;

        let grasp_end = start + p.grasp_frames;
        let pull_end = start + p.pull_frames;
        let end = pull_end + p.settle_frames;

        stage.take_action(crossing.hold_index, pull_end, Vector3::zeros(), true)?;
        stage.run(
            Span::new(start..grasp_end, phase)
                .policy(RenderPolicy::Near {
                    anchors: [start, grasp_end],
                    radius: p.grasp_window,
                }),
        )?;

        stage.take_action(crossing.pull_index, pull_end, applied, true)?;
        stage.toggle(crossing.pull_index, pull_end, false)?;
        stage.toggle(crossing.hold_index, pull_end, false)?;
        stage.run(
            Span::new(grasp_end..end, phase)
                .policy(RenderPolicy::Near {
                    anchors: [grasp_end, end],
                    radius: p.pull_window,
                }),
        )?;

        info!(
            pull = crossing.pull_index,
            hold = crossing.hold_index,
            fallback = crossing.is_fallback(),
            start,
            end,
            "loosened"
        );
        Ok((
            end,
            LoosenRecord {
                start_frame: start,
                end_frame: end,
                crossing,
                applied_vector: applied,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{CrossingSource, DetectorParams, KnotDetector};
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Action {
            segment: usize,
            issued_at: Frame,
            frame: Frame,
            displacement: Vector3<f64>,
            animate: bool,
        },
        Toggle {
            segment: usize,
            frame: Frame,
            kinematic: bool,
        },
    }

    /// Records calls instead of simulating; positions stay where they start.
    struct Recorder {
        clock: Frame,
        positions: Vec<Point3<f64>>,
        calls: Vec<Call>,
        spans: Vec<Span>,
        rng: ChaCha8Rng,
        detector: KnotDetector,
    }

    impl Recorder {
        fn new(n: usize) -> Self {
            Self {
                clock: 0,
                positions: (0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect(),
                calls: Vec::new(),
                spans: Vec::new(),
                rng: ChaCha8Rng::seed_from_u64(3),
                detector: KnotDetector::new(DetectorParams::default()),
            }
        }

        fn stepped(&self) -> Vec<Frame> {
            self.spans.iter().flat_map(|s| s.frames.clone()).collect()
        }
    }

    impl Stage for Recorder {
        type Error = std::convert::Infallible;

        fn clock(&self) -> Frame {
            self.clock
        }

        fn num_segments(&self) -> usize {
            self.positions.len()
        }

        fn position(&self, segment: usize) -> Result<Point3<f64>, Self::Error> {
            Ok(self.positions[segment])
        }

        fn take_action(
            &mut self,
            segment: usize,
            frame: Frame,
            displacement: Vector3<f64>,
            animate: bool,
        ) -> Result<(), Self::Error> {
            self.calls.push(Call::Action {
                segment,
                issued_at: self.clock,
                frame,
                displacement,
                animate,
            });
            Ok(())
        }

        fn toggle(
            &mut self,
            segment: usize,
            frame: Frame,
            kinematic: bool,
        ) -> Result<(), Self::Error> {
            self.calls.push(Call::Toggle {
                segment,
                frame,
                kinematic,
            });
            Ok(())
        }

        fn crossing(&self) -> Result<crate::detect::CrossingEvent, Self::Error> {
            Ok(self.detector.find_crossing(&self.positions))
        }

        fn run(&mut self, span: Span) -> Result<(), Self::Error> {
            if let Some(last) = span.frames.clone().last() {
                self.clock = last;
            }
            self.spans.push(span);
            Ok(())
        }

        fn rng(&mut self) -> &mut ChaCha8Rng {
            &mut self.rng
        }
    }

    #[test]
    fn tie_scripts_ends_and_frees_interior() {
        let mut stage = Recorder::new(50);
        let end = Choreographer::default()
            .tie(&mut stage, KnotKind::Pretzel)
            .unwrap();

        assert_eq!(end, 350);
        let preamble: Vec<_> = stage.calls[..50].to_vec();
        for (i, call) in preamble.iter().enumerate() {
            match call {
                Call::Action {
                    segment,
                    frame,
                    displacement,
                    animate,
                    ..
                } => {
                    assert_eq!(*segment, i);
                    assert_eq!(*frame, 1);
                    assert_eq!(*displacement, Vector3::zeros());
                    assert_eq!(*animate, i == 0 || i == 49);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(stage.stepped(), (0..350).collect::<Vec<_>>());
        assert!(stage.spans.iter().all(|s| s.phase == Phase::Tie));
    }

    #[test]
    fn tie_issues_every_step_before_stepping() {
        let mut stage = Recorder::new(50);
        Choreographer::default()
            .tie(&mut stage, KnotKind::FigureEight)
            .unwrap();
        assert!(stage.calls.iter().all(|c| match c {
            Call::Action { issued_at, .. } => *issued_at == 0,
            Call::Toggle { .. } => true,
        }));
        assert_eq!(stage.calls.len(), 50 + 13);
    }

    #[test]
    fn cornell2_chains_two_loosens_into_the_tie() {
        let mut stage = Recorder::new(50);
        let end = Choreographer::default()
            .tie(&mut stage, KnotKind::Cornell2)
            .unwrap();
        assert_eq!(end, 350 + 2 * 130);
        assert!(stage.spans.iter().all(|s| s.phase == Phase::Tie));
        assert_eq!(stage.stepped(), (0..end).collect::<Vec<_>>());
    }

    #[test]
    fn straighten_targets_fixed_x_and_releases() {
        let mut stage = Recorder::new(50);
        stage.clock = 349;
        let end = Choreographer::default().straighten(&mut stage, 350).unwrap();

        assert_eq!(end, 425);
        match &stage.calls[0] {
            Call::Action {
                segment,
                issued_at,
                frame,
                displacement,
                ..
            } => {
                assert_eq!((*segment, *issued_at, *frame), (49, 349, 375));
                assert_relative_eq!(displacement.x, -6.0 - 49.0);
                assert!(displacement.y.abs() <= 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &stage.calls[1] {
            Call::Action {
                segment,
                issued_at,
                frame,
                displacement,
                ..
            } => {
                assert_eq!((*segment, *issued_at, *frame), (0, 374, 425));
                assert_relative_eq!(displacement.x, 9.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            &stage.calls[2..],
            &[
                Call::Toggle {
                    segment: 0,
                    frame: 425,
                    kinematic: false
                },
                Call::Toggle {
                    segment: 49,
                    frame: 425,
                    kinematic: false
                },
            ]
        );
        assert_eq!(stage.stepped(), (350..425).collect::<Vec<_>>());
    }

    #[test]
    fn loosen_on_flat_rope_uses_fallback_pair() {
        let mut stage = Recorder::new(50);
        stage.clock = 424;
        let (end, record) = Choreographer::default().loosen(&mut stage, 425).unwrap();

        assert_eq!(end, 555);
        assert_eq!(record.crossing.source, CrossingSource::Fallback);
        assert_relative_eq!(record.applied_vector.norm(), 2.0, epsilon = 1e-12);

        assert_eq!(
            stage.calls[0],
            Call::Action {
                segment: 25,
                issued_at: 424,
                frame: 525,
                displacement: Vector3::zeros(),
                animate: true,
            }
        );
        match &stage.calls[1] {
            Call::Action {
                segment,
                issued_at,
                frame,
                ..
            } => assert_eq!((*segment, *issued_at, *frame), (16, 434, 525)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(stage.spans[0].frames, 425..435);
        assert_eq!(stage.spans[1].frames, 435..555);
        assert!(!stage.spans[1].policy.admits(500));
    }

    #[test]
    fn loosen_vector_follows_the_seed() {
        let run = || {
            let mut stage = Recorder::new(50);
            stage.clock = 99;
            Choreographer::default()
                .loosen(&mut stage, 100)
                .unwrap()
                .1
                .applied_vector
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn zero_perturbed_vector_becomes_a_lift() {
        let params = ChoreoParams {
            loosen: crate::choreo::LoosenParams {
                noise: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut stage = Recorder::new(50);
        let (_, record) = Choreographer::new(params).loosen(&mut stage, 1).unwrap();
        assert_eq!(record.applied_vector, Vector3::new(0.0, 0.0, 2.0));
    }
}
