//! Headless capsule-chain rope.
//!
//! A position-based stand-in for the rigid-body host: one particle per
//! segment, distance constraints between neighbours, non-adjacent
//! self-collision and a passive table. Good enough to drive the pipeline
//! end to end and to preview choreographies; not a material model.

use std::f64::consts::TAU;

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RopeParams;
use crate::env::errors::EnvError;
use crate::env::traits::{RopeActuator, RopeEnv};
use crate::env::types::{Frame, Keyframe, Pose, Segment, Track};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub fps: u32,
    pub steps_per_second: u32,
    pub solver_iterations: u32,
    pub gravity: f64,
    pub table_z: f64,
    pub self_collision: bool,
    /// Capsule mesh resolution: vertices around and rings along the axis.
    pub ring_sides: usize,
    pub ring_rows: usize,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            fps: 24,
            steps_per_second: 120,
            solver_iterations: 20,
            gravity: 9.81,
            table_z: -5.0,
            self_collision: true,
            ring_sides: 12,
            ring_rows: 8,
        }
    }
}

#[derive(Debug, Clone)]
struct Body {
    position: Point3<f64>,
    previous: Point3<f64>,
    orientation: UnitQuaternion<f64>,
    kinematic: bool,
}

pub struct ChainRope {
    radius: f64,
    inv_mass: f64,
    friction: f64,
    linear_damping: f64,
    table_half: f64,
    settings: ChainSettings,
    bodies: Vec<Body>,
    rest: Vec<Body>,
    tracks: Vec<Track>,
    frame: Frame,
}

impl ChainRope {
    /// Lays the rope out straight along -x, first segment at
    /// `x = radius * N`, with only the two ends kinematic.
    pub fn new(params: &RopeParams, settings: ChainSettings) -> Self {
        let n = params.num_segments;
        let r = params.segment_radius;
        let bodies: Vec<Body> = (0..n)
            .map(|i| {
                let position = Point3::new(r * n as f64 - 2.0 * r * i as f64, 0.0, 0.0);
                Body {
                    position,
                    previous: position,
                    orientation: UnitQuaternion::identity(),
                    kinematic: i == 0 || i + 1 == n,
                }
            })
            .collect();

        Self {
            radius: r,
            inv_mass: 1.0 / params.segment_mass,
            friction: params.segment_friction.clamp(0.0, 1.0),
            linear_damping: params.linear_damping.clamp(0.0, 1.0),
            table_half: params.table_size / 2.0,
            settings,
            rest: bodies.clone(),
            bodies,
            tracks: vec![Track::new(); n],
            frame: 0,
        }
    }

    /// Overwrite every segment position, zeroing velocities. The new layout
    /// is also what `reset` returns to.
    pub fn place(&mut self, positions: &[Point3<f64>]) -> Result<(), EnvError> {
        if positions.len() != self.bodies.len() {
            return Err(EnvError::PositionCount {
                expected: self.bodies.len(),
                got: positions.len(),
            });
        }
        for (body, p) in self.bodies.iter_mut().zip(positions) {
            body.position = *p;
            body.previous = *p;
        }
        self.update_orientations();
        self.rest = self.bodies.clone();
        Ok(())
    }

    fn check(&self, index: usize) -> Result<(), EnvError> {
        if index < self.bodies.len() {
            Ok(())
        } else {
            Err(EnvError::MissingSegment {
                index,
                num_segments: self.bodies.len(),
            })
        }
    }

    fn substeps(&self) -> u32 {
        (self.settings.steps_per_second / self.settings.fps.max(1)).max(1)
    }

    fn weight(&self, i: usize) -> f64 {
        if self.bodies[i].kinematic {
            0.0
        } else {
            self.inv_mass
        }
    }

    fn advance_frame(&mut self, frame: Frame) {
        for (body, track) in self.bodies.iter_mut().zip(&self.tracks) {
            if let Some(kinematic) = track.mode_at(frame) {
                if body.kinematic && !kinematic {
                    body.previous = body.position;
                }
                body.kinematic = kinematic;
            }
        }

        let start: Vec<Point3<f64>> = self.bodies.iter().map(|b| b.position).collect();
        let target: Vec<Option<Pose>> = self
            .bodies
            .iter()
            .zip(&self.tracks)
            .map(|(b, t)| if b.kinematic { t.pose_at(frame) } else { None })
            .collect();

        let substeps = self.substeps();
        let dt = 1.0 / f64::from(self.settings.steps_per_second);
        let keep = (1.0 - self.linear_damping).powf(dt);

        for s in 1..=substeps {
            let alpha = f64::from(s) / f64::from(substeps);
            for (i, body) in self.bodies.iter_mut().enumerate() {
                if body.kinematic {
                    if let Some(pose) = &target[i] {
                        body.position = start[i] + (pose.position - start[i]) * alpha;
                    }
                    body.previous = body.position;
                } else {
                    let mut velocity = (body.position - body.previous) / dt * keep;
                    velocity.z -= self.settings.gravity * dt;
                    body.previous = body.position;
                    body.position += velocity * dt;
                }
            }
            for _ in 0..self.settings.solver_iterations {
                self.solve_links();
                if self.settings.self_collision {
                    self.solve_self_collision();
                }
                self.solve_table();
            }
        }

        self.update_orientations();
        for (body, pose) in self.bodies.iter_mut().zip(&target) {
            if let Some(pose) = pose {
                body.orientation = pose.orientation;
            }
        }
    }

    fn solve_links(&mut self) {
        let rest = 2.0 * self.radius;
        for i in 0..self.bodies.len().saturating_sub(1) {
            let (w1, w2) = (self.weight(i), self.weight(i + 1));
            if w1 + w2 == 0.0 {
                continue;
            }
            let delta = self.bodies[i + 1].position - self.bodies[i].position;
            let len = delta.norm();
            if len < 1.0e-12 {
                continue;
            }
            let correction = delta * ((len - rest) / len);
            self.bodies[i].position += correction * (w1 / (w1 + w2));
            self.bodies[i + 1].position -= correction * (w2 / (w1 + w2));
        }
    }

    fn solve_self_collision(&mut self) {
        let min_dist = 2.0 * self.radius;
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 2)..n {
                let (w1, w2) = (self.weight(i), self.weight(j));
                if w1 + w2 == 0.0 {
                    continue;
                }
                let delta = self.bodies[j].position - self.bodies[i].position;
                let len = delta.norm();
                if len >= min_dist || len < 1.0e-12 {
                    continue;
                }
                let push = delta * ((min_dist - len) / len);
                self.bodies[i].position -= push * (w1 / (w1 + w2));
                self.bodies[j].position += push * (w2 / (w1 + w2));
            }
        }
    }

    fn solve_table(&mut self) {
        let floor = self.settings.table_z + self.radius;
        for body in self.bodies.iter_mut().filter(|b| !b.kinematic) {
            let over_table = body.position.x.abs() <= self.table_half
                && body.position.y.abs() <= self.table_half;
            if over_table && body.position.z < floor {
                body.position.z = floor;
                let slide = Vector3::new(
                    body.position.x - body.previous.x,
                    body.position.y - body.previous.y,
                    0.0,
                );
                body.position -= slide * self.friction;
            }
        }
    }

    fn update_orientations(&mut self) {
        let n = self.bodies.len();
        if n < 2 {
            return;
        }
        for i in 0..n {
            let ahead = self.bodies[i.saturating_sub(1)].position;
            let behind = self.bodies[(i + 1).min(n - 1)].position;
            if let Some(q) = UnitQuaternion::rotation_between(&Vector3::x(), &(ahead - behind)) {
                self.bodies[i].orientation = q;
            }
        }
    }
}

impl RopeActuator for ChainRope {
    fn num_segments(&self) -> usize {
        self.bodies.len()
    }

    fn segment(&self, index: usize) -> Result<Segment, EnvError> {
        self.check(index)?;
        let body = &self.bodies[index];
        Ok(Segment {
            index,
            pose: Pose::new(body.position, body.orientation),
            kinematic: body.kinematic,
        })
    }

    fn set_kinematic(&mut self, index: usize, kinematic: bool) -> Result<(), EnvError> {
        self.check(index)?;
        let body = &mut self.bodies[index];
        if body.kinematic && !kinematic {
            body.previous = body.position;
        }
        body.kinematic = kinematic;
        Ok(())
    }

    fn record_keyframe(&mut self, index: usize, keyframe: Keyframe) -> Result<(), EnvError> {
        self.check(index)?;
        self.tracks[index].insert(keyframe);
        Ok(())
    }

    fn track(&self, index: usize) -> Result<&Track, EnvError> {
        self.check(index)?;
        Ok(&self.tracks[index])
    }

    fn surface_vertices(&self, index: usize) -> Result<Vec<Point3<f64>>, EnvError> {
        self.check(index)?;
        let body = &self.bodies[index];
        let r = self.radius;
        let rows = self.settings.ring_rows.max(2);
        let sides = self.settings.ring_sides.max(3);
        let mut verts = Vec::with_capacity(rows * sides);
        for row in 0..rows {
            let u = -r + 2.0 * r * row as f64 / (rows - 1) as f64;
            for side in 0..sides {
                let theta = TAU * side as f64 / sides as f64;
                let local = Vector3::new(u, r * theta.cos(), r * theta.sin());
                verts.push(body.position + body.orientation * local);
            }
        }
        Ok(verts)
    }
}

impl RopeEnv for ChainRope {
    fn step_to(&mut self, frame: Frame) -> Result<(), EnvError> {
        if frame < self.frame {
            return Err(EnvError::FrameRewind {
                current: self.frame,
                requested: frame,
            });
        }
        while self.frame < frame {
            self.frame += 1;
            self.advance_frame(self.frame);
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), EnvError> {
        debug!(frame = self.frame, "clearing rope tracks");
        for track in &mut self.tracks {
            track.clear();
        }
        self.bodies = self.rest.clone();
        self.frame = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EnvError> {
        Ok(())
    }

    fn current_frame(&self) -> Frame {
        self.frame
    }
}
