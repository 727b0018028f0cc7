use std::ops::Range;

use nalgebra::Vector3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::choreo::knots::KnotKind;
use crate::detect::CrossingEvent;
use crate::env::Frame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum KnotSelection {
    /// Episode `i` ties `kinds[i % len]`.
    Alternate { kinds: Vec<KnotKind> },
    /// Each episode draws uniformly from `kinds`.
    Random { kinds: Vec<KnotKind> },
}

impl Default for KnotSelection {
    fn default() -> Self {
        KnotSelection::Alternate {
            kinds: vec![KnotKind::Pretzel, KnotKind::FigureEight],
        }
    }
}

impl KnotSelection {
    pub fn kinds(&self) -> &[KnotKind] {
        match self {
            KnotSelection::Alternate { kinds } | KnotSelection::Random { kinds } => kinds,
        }
    }

    /// `None` only when no kinds are configured.
    pub fn pick(&self, episode: usize, rng: &mut ChaCha8Rng) -> Option<KnotKind> {
        let kinds = self.kinds();
        if kinds.is_empty() {
            return None;
        }
        match self {
            KnotSelection::Alternate { .. } => Some(kinds[episode % kinds.len()]),
            KnotSelection::Random { .. } => Some(kinds[rng.gen_range(0..kinds.len())]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StraightenParams {
    /// Frames until the last end reaches its target.
    pub pull_frames: Frame,
    pub total_frames: Frame,
    pub first_end_x: f64,
    pub last_end_x: f64,
    /// Half-width of the uniform `y` jitter on both targets.
    pub jitter: f64,
}

impl Default for StraightenParams {
    fn default() -> Self {
        Self {
            pull_frames: 25,
            total_frames: 75,
            first_end_x: 9.0,
            last_end_x: -6.0,
            jitter: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoosenParams {
    pub grasp_frames: Frame,
    /// Frames from the start until the pull completes.
    pub pull_frames: Frame,
    pub settle_frames: Frame,
    /// Half-width of the uniform per-axis perturbation.
    pub noise: f64,
    pub magnitude: f64,
    pub grasp_window: Frame,
    pub pull_window: Frame,
}

impl Default for LoosenParams {
    fn default() -> Self {
        Self {
            grasp_frames: 10,
            pull_frames: 100,
            settle_frames: 30,
            noise: 0.5,
            magnitude: 2.0,
            grasp_window: 5,
            pull_window: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoreoParams {
    pub straighten: StraightenParams,
    pub loosen: LoosenParams,
}

/// Episode phase a span of frames belongs to. Each phase is rendered or not
/// as a whole; the policy then picks frames inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Tie,
    Straighten,
    Loosen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPolicy {
    All,
    /// Frames strictly closer than `radius` to either anchor.
    Near { anchors: [Frame; 2], radius: Frame },
}

impl RenderPolicy {
    pub fn admits(&self, frame: Frame) -> bool {
        match self {
            RenderPolicy::All => true,
            RenderPolicy::Near { anchors, radius } => {
                anchors.iter().any(|a| frame.abs_diff(*a) < *radius)
            }
        }
    }
}

/// A contiguous run of frames to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub frames: Range<Frame>,
    pub phase: Phase,
    pub policy: RenderPolicy,
}

impl Span {
    pub fn new(frames: Range<Frame>, phase: Phase) -> Self {
        Self {
            frames,
            phase,
            policy: RenderPolicy::All,
        }
    }

    pub fn policy(mut self, policy: RenderPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoosenRecord {
    pub start_frame: Frame,
    pub end_frame: Frame,
    pub crossing: CrossingEvent,
    pub applied_vector: Vector3<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn alternate_cycles_in_order() {
        let selection = KnotSelection::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let picks: Vec<_> = (0..4)
            .map(|i| selection.pick(i, &mut rng).unwrap())
            .collect();
        assert_eq!(
            picks,
            vec![
                KnotKind::Pretzel,
                KnotKind::FigureEight,
                KnotKind::Pretzel,
                KnotKind::FigureEight
            ]
        );
    }

    #[test]
    fn random_selection_is_seeded() {
        let selection = KnotSelection::Random {
            kinds: KnotKind::ALL.to_vec(),
        };
        let draw = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..16)
                .map(|i| selection.pick(i, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
    }

    #[test]
    fn empty_selection_picks_nothing() {
        let selection = KnotSelection::Random { kinds: vec![] };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(selection.pick(0, &mut rng), None);
    }

    #[test]
    fn selection_reads_tagged_json() {
        let selection: KnotSelection =
            serde_json::from_str(r#"{"mode": "random", "kinds": ["stevedore", "cornell2"]}"#)
                .unwrap();
        assert_eq!(
            selection.kinds(),
            &[KnotKind::Stevedore, KnotKind::Cornell2]
        );
    }

    #[test]
    fn near_policy_is_strict() {
        let policy = RenderPolicy::Near {
            anchors: [100, 110],
            radius: 5,
        };
        let admitted: Vec<Frame> = (95..116).filter(|f| policy.admits(*f)).collect();
        let expected: Vec<Frame> = (96..105).chain(106..115).collect();
        assert_eq!(admitted, expected);

        let pull = RenderPolicy::Near {
            anchors: [110, 230],
            radius: 2,
        };
        let admitted: Vec<Frame> = (110..230).filter(|f| pull.admits(*f)).collect();
        assert_eq!(admitted, vec![110, 111, 229]);
    }
}
