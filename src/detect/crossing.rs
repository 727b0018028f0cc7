//! Over/under crossing inference from segment positions.
//!
//! Segments are projected onto the table plane (`xy`, depth is `z`). A
//! segment whose nearest projected neighbour is far away along the rope
//! but clearly above it is lying under a crossing.

use std::collections::HashMap;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;


#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Minimum depth separation between probe and neighbour.
    pub depth_thresh: f64,
    /// Minimum index separation along the rope.
    pub idx_thresh: usize,
    /// How far past the probe, along the rope, to pull.
    pub pull_offset: usize,
    /// Depth component of the suggested pull.
    pub lift: f64,
    pub fallback_pull: usize,
    pub fallback_hold: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            depth_thresh: 0.4,
            idx_thresh: 3,
            pull_offset: 3,
            lift: 2.0,
            fallback_pull: 16,
            fallback_hold: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossingSource {
    Detected { probe: usize, neighbor: usize },
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub pull_index: usize,
    pub hold_index: usize,
    pub suggested_vector: Vector3<f64>,
    pub source: CrossingSource,
}

impl CrossingEvent {
    pub fn is_fallback(&self) -> bool {
        self.source == CrossingSource::Fallback
    }
}

#[derive(Debug, Clone, Default)]
pub struct KnotDetector {
    params: DetectorParams,
}

impl KnotDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// First crossing in index order, or the fallback pair when none
    /// qualifies. Never fails.
    pub fn find_crossing(&self, positions: &[Point3<f64>]) -> CrossingEvent {
        let n = positions.len();
        if n < 2 {
            return self.fallback(n);
        }

        let index = PlanarIndex::new(positions);
        for (i, p) in positions.iter().enumerate() {
            let Some(j) = index.nearest_other(i) else {
                continue;
            };
            let depth_diff = positions[j].z - p.z;
            let idx_diff = i.abs_diff(j);
            if depth_diff > self.params.depth_thresh && idx_diff > self.params.idx_thresh {
                let pull_index = (i + self.params.pull_offset).min(n - 1);
                let toward = positions[pull_index] - p;
                let event = CrossingEvent {
                    pull_index,
                    hold_index: j,
                    suggested_vector: Vector3::new(toward.x, toward.y, self.params.lift),
                    source: CrossingSource::Detected {
                        probe: i,
                        neighbor: j,
                    },
                };
                debug!(probe = i, pull = pull_index, hold = j, depth_diff, "crossing found");
                return event;
            }
        }

        debug!(segments = n, "no crossing, using fallback");
        self.fallback(n)
    }

    fn fallback(&self, n: usize) -> CrossingEvent {
        let last = n.saturating_sub(1);
        CrossingEvent {
            pull_index: self.params.fallback_pull.min(last),
            hold_index: self.params.fallback_hold.min(last),
            suggested_vector: Vector3::zeros(),
            source: CrossingSource::Fallback,
        }
    }
}

/// Projection of the k-d tree axes, 35 degrees off `xy`.
const SKEW: (f64, f64) = (0.819_152_044_288_991_8, 0.573_576_436_351_046);

/// Nearest-neighbour lookup over the segments' table-plane projections.
///
/// Coincident projections share one site. Sites are keyed in the tree on
/// skewed axes so a straight or axis-aligned rope never stacks more than
/// one site on a split plane; distances are measured on the unskewed
/// projection.
struct PlanarIndex {
    sites: Vec<[f64; 2]>,
    /// Segments at each site, ascending.
    members: Vec<Vec<usize>>,
    site_of: Vec<usize>,
    tree: ImmutableKdTree<f64, 2>,
}

impl PlanarIndex {
    fn new(positions: &[Point3<f64>]) -> Self {
        let mut sites = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        let mut site_of = Vec::with_capacity(positions.len());
        let mut seen = HashMap::new();
        for (i, p) in positions.iter().enumerate() {
            // `+ 0.0` folds -0.0 into 0.0 before keying on the bits.
            let (x, y) = (p.x + 0.0, p.y + 0.0);
            let site = *seen.entry((x.to_bits(), y.to_bits())).or_insert_with(|| {
                sites.push([x, y]);
                members.push(Vec::new());
                sites.len() - 1
            });
            members[site].push(i);
            site_of.push(site);
        }
        let skewed: Vec<[f64; 2]> = sites.iter().map(skew).collect();
        Self {
            tree: ImmutableKdTree::new_from_slice(&skewed),
            sites,
            members,
            site_of,
        }
    }

    /// Nearest segment to `probe` other than itself; among segments tied at
    /// that distance the smallest index wins.
    fn nearest_other(&self, probe: usize) -> Option<usize> {
        let site = self.site_of[probe];
        if let Some(&j) = self.members[site].iter().find(|&&j| j != probe) {
            return Some(j);
        }

        let query = skew(&self.sites[site]);
        // Sites are distinct, so two results are the probe's own site and a
        // nearest other one.
        let approx = self
            .tree
            .nearest_n::<SquaredEuclidean>(&query, 2)
            .into_iter()
            .filter(|nn| nn.item as usize != site)
            .map(|nn| nn.distance)
            .fold(f64::INFINITY, f64::min);
        if !approx.is_finite() {
            return None;
        }

        // `within_unsorted` excludes its radius; widen past skew rounding.
        let radius = approx * (1.0 + 1.0e-9) + f64::MIN_POSITIVE;
        let origin = self.sites[site];
        let near: Vec<(f64, usize)> = self
            .tree
            .within_unsorted::<SquaredEuclidean>(&query, radius)
            .into_iter()
            .map(|nn| nn.item as usize)
            .filter(|&s| s != site)
            .map(|s| (squared_distance(&origin, &self.sites[s]), s))
            .collect();
        let best = near.iter().map(|&(d, _)| d).fold(f64::INFINITY, f64::min);
        near.into_iter()
            .filter(|&(d, _)| d <= best)
            .map(|(_, s)| self.members[s][0])
            .min()
    }
}

fn skew(p: &[f64; 2]) -> [f64; 2] {
    let (c, s) = SKEW;
    [c * p[0] - s * p[1], s * p[0] + c * p[1]]
}

fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let (dx, dy) = (a[0] - b[0], a[1] - b[1]);
    dx * dx + dy * dy
}
