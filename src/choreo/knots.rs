//! Hand-tuned tying sequences.
//!
//! Every table is issued in order at the start of an episode, then the
//! scene is stepped until `settle`. Displacements accumulate per end in
//! table order, not frame order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::env::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnotKind {
    Pretzel,
    FigureEight,
    Stevedore,
    DoublePretzel,
    Cornell1,
    /// Pretzel followed by two unannotated loosens.
    Cornell2,
}

impl KnotKind {
    pub const ALL: [KnotKind; 6] = [
        KnotKind::Pretzel,
        KnotKind::FigureEight,
        KnotKind::Stevedore,
        KnotKind::DoublePretzel,
        KnotKind::Cornell1,
        KnotKind::Cornell2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KnotKind::Pretzel => "pretzel",
            KnotKind::FigureEight => "figure_eight",
            KnotKind::Stevedore => "stevedore",
            KnotKind::DoublePretzel => "double_pretzel",
            KnotKind::Cornell1 => "cornell1",
            KnotKind::Cornell2 => "cornell2",
        }
    }
}

impl fmt::Display for KnotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which rope end a step acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum End {
    First,
    Last,
}

impl End {
    pub fn index(&self, num_segments: usize) -> usize {
        match self {
            End::First => 0,
            End::Last => num_segments.saturating_sub(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Move { end: End, frame: Frame, by: [f64; 3] },
    Toggle { end: End, frame: Frame, kinematic: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct Choreography {
    pub steps: &'static [Step],
    /// Stepping stops here; also the frame the tie reports as its end.
    pub settle: Frame,
}

use End::{First, Last};

const fn mv(end: End, frame: Frame, by: [f64; 3]) -> Step {
    Step::Move { end, frame, by }
}

const fn release(end: End, frame: Frame) -> Step {
    Step::Toggle {
        end,
        frame,
        kinematic: false,
    }
}

const fn grab(end: End, frame: Frame) -> Step {
    Step::Toggle {
        end,
        frame,
        kinematic: true,
    }
}

const PRETZEL: &[Step] = &[
    // wrap the first end around the last
    mv(Last, 80, [10.0, 0.0, 0.0]),
    mv(First, 80, [-15.0, 5.0, 0.0]),
    mv(First, 120, [-1.0, -7.0, 0.0]),
    mv(First, 150, [3.0, 0.0, -4.0]),
    mv(First, 170, [0.0, 2.5, 0.0]),
    // thread down through the loop
    mv(First, 180, [0.0, 0.0, -2.0]),
    // tighten
    mv(First, 200, [5.0, 0.0, 2.0]),
    mv(Last, 200, [0.0, 0.0, 0.0]),
    mv(First, 230, [8.0, 0.0, 5.0]),
    mv(Last, 230, [-6.0, 0.0, 0.0]),
    mv(First, 260, [-1.0, 0.0, -1.0]),
    mv(Last, 260, [1.0, 0.0, -1.0]),
    release(First, 280),
    release(Last, 280),
];

const FIGURE_EIGHT: &[Step] = &[
    mv(Last, 80, [10.0, 0.0, 2.0]),
    mv(First, 80, [-15.0, 2.0, 2.0]),
    mv(Last, 130, [1.0, 3.0, 0.0]),
    mv(Last, 180, [-4.0, 0.0, 0.0]),
    mv(Last, 200, [0.0, -2.0, 0.0]),
    mv(Last, 250, [4.5, -0.25, -6.0]),
    mv(Last, 300, [0.0, 0.0, -2.0]),
    mv(Last, 350, [9.0, 0.0, 8.0]),
    mv(Last, 400, [-16.0, 0.0, 0.0]),
    mv(First, 350, [0.0, 0.0, 0.0]),
    mv(First, 400, [14.0, -2.0, -2.0]),
    release(First, 450),
    release(Last, 450),
];

const STEVEDORE: &[Step] = &[
    mv(Last, 80, [10.0, 0.0, 2.0]),
    mv(First, 80, [-15.0, 2.0, 2.0]),
    mv(Last, 100, [1.0, 3.0, 0.0]),
    mv(Last, 130, [-4.0, 0.0, 0.0]),
    mv(Last, 150, [0.0, -2.0, 0.0]),
    // second wrap
    mv(Last, 170, [3.0, 0.0, 0.0]),
    mv(Last, 190, [0.0, 2.0, 0.0]),
    mv(Last, 210, [-2.0, 0.0, 0.0]),
    mv(Last, 230, [0.0, -2.0, 0.0]),
    mv(Last, 300, [3.5, -0.25, -6.0]),
    mv(Last, 310, [0.0, 0.0, -3.0]),
    mv(Last, 350, [9.0, 0.0, 8.0]),
    mv(First, 350, [0.0, 0.0, 0.0]),
    mv(Last, 400, [-12.0, 0.0, -3.0]),
    mv(First, 400, [12.0, -2.0, -5.0]),
    release(First, 430),
    release(Last, 430),
];

const DOUBLE_PRETZEL: &[Step] = &[
    mv(Last, 80, [5.0, 0.0, -1.0]),
    mv(First, 80, [-20.0, 2.0, 2.0]),
    mv(Last, 100, [2.0, 2.0, 0.0]),
    mv(First, 100, [0.0, 0.0, 0.0]),
    mv(First, 150, [6.0, -1.0, 0.0]),
    mv(Last, 150, [0.0, 0.0, 0.0]),
    mv(Last, 200, [2.0, -1.5, -3.0]),
    mv(Last, 220, [0.0, 0.0, -3.0]),
    mv(Last, 240, [-6.0, 0.0, 0.0]),
    mv(First, 240, [0.0, 0.0, 0.0]),
    mv(Last, 300, [-3.0, 0.0, 5.0]),
    mv(First, 300, [4.0, 0.0, 0.0]),
    mv(First, 320, [0.0, 0.0, 0.0]),
    mv(First, 360, [-11.0, 3.0, -5.0]),
    mv(First, 380, [-1.0, -3.0, 0.0]),
    mv(First, 410, [1.0, 1.0, -2.0]),
    mv(First, 430, [-2.0, 6.0, 2.0]),
    mv(First, 460, [0.0, 0.0, 0.0]),
    mv(First, 490, [0.0, -5.0, 3.0]),
    mv(Last, 490, [0.0, 0.0, 0.0]),
    mv(Last, 520, [11.0, 0.0, -2.0]),
    mv(First, 520, [18.0, -3.0, -2.0]),
    release(First, 540),
    release(Last, 540),
];

const CORNELL1: &[Step] = &[
    // center loop
    mv(Last, 80, [10.0, 1.0, 5.0]),
    mv(Last, 120, [3.0, 2.0, -3.0]),
    mv(Last, 160, [0.0, -3.0, -2.0]),
    mv(Last, 200, [0.0, -2.0, -4.0]),
    release(Last, 200),
    grab(Last, 200),
    mv(Last, 240, [0.0, -1.0, 2.0]),
    mv(Last, 280, [-4.0, 3.0, -2.0]),
    // other end across
    mv(First, 80, [-10.0, 1.0, 5.0]),
    mv(First, 120, [-5.0, 0.0, 0.0]),
    mv(First, 160, [0.0, -2.0, -4.0]),
    release(First, 160),
    grab(First, 160),
    mv(Last, 320, [0.0, -1.0, 0.0]),
    mv(First, 360, [6.0, 0.0, -5.0]),
    release(First, 360),
    release(Last, 360),
];

/// The table a kind starts from. `Cornell2` reuses the pretzel.
pub fn choreography(kind: KnotKind) -> Choreography {
    match kind {
        KnotKind::Pretzel | KnotKind::Cornell2 => Choreography {
            steps: PRETZEL,
            settle: 350,
        },
        KnotKind::FigureEight => Choreography {
            steps: FIGURE_EIGHT,
            settle: 500,
        },
        KnotKind::Stevedore => Choreography {
            steps: STEVEDORE,
            settle: 470,
        },
        KnotKind::DoublePretzel => Choreography {
            steps: DOUBLE_PRETZEL,
            settle: 560,
        },
        KnotKind::Cornell1 => Choreography {
            steps: CORNELL1,
            settle: 370,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_releases_both_ends_before_settling() {
        for kind in KnotKind::ALL {
            let c = choreography(kind);
            for end in [First, Last] {
                let last_toggle = c
                    .steps
                    .iter()
                    .filter_map(|s| match s {
                        Step::Toggle {
                            end: e,
                            frame,
                            kinematic,
                        } if *e == end => Some((*frame, *kinematic)),
                        _ => None,
                    })
                    .last();
                let (frame, kinematic) = last_toggle.expect("end is released");
                assert!(!kinematic, "{kind}: {end:?} left scripted");
                assert!(frame < c.settle, "{kind}: released at {frame}");
            }
        }
    }

    #[test]
    fn moves_land_before_settle() {
        for kind in KnotKind::ALL {
            let c = choreography(kind);
            for step in c.steps {
                if let Step::Move { frame, .. } = step {
                    assert!(*frame < c.settle, "{kind} moves at {frame}");
                }
            }
        }
    }

    #[test]
    fn kinds_round_trip_through_names() {
        let json = serde_json::to_string(&KnotKind::FigureEight).unwrap();
        assert_eq!(json, "\"figure_eight\"");
        assert_eq!(KnotKind::FigureEight.to_string(), "figure_eight");
    }
}
