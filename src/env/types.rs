use nalgebra::{Point3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Simulation frame number. Restarts at 0 every episode.
pub type Frame = u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn at(position: Point3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    fn interpolate(&self, other: &Pose, t: f64) -> Pose {
        let position = self.position + (other.position - self.position) * t;
        let orientation = self
            .orientation
            .try_slerp(&other.orientation, t, 1.0e-9)
            .unwrap_or(other.orientation);
        Pose::new(position, orientation)
    }
}

/// Snapshot of one rope element as the host currently sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub pose: Pose,
    /// true = scripted by keyframes, false = simulated.
    pub kinematic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Keyframe {
    Pose { frame: Frame, pose: Pose },
    Mode { frame: Frame, kinematic: bool },
}

impl Keyframe {
    pub fn frame(&self) -> Frame {
        match self {
            Keyframe::Pose { frame, .. } | Keyframe::Mode { frame, .. } => *frame,
        }
    }

    fn same_channel(&self, other: &Keyframe) -> bool {
        matches!(
            (self, other),
            (Keyframe::Pose { .. }, Keyframe::Pose { .. })
                | (Keyframe::Mode { .. }, Keyframe::Mode { .. })
        )
    }
}

/// Keyframes recorded for a single segment, kept sorted by frame.
///
/// Inserting a keyframe on a channel that is already keyed at that frame
/// replaces the old key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    keys: Vec<Keyframe>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Keyframe) {
        if let Some(existing) = self
            .keys
            .iter_mut()
            .find(|k| k.frame() == key.frame() && k.same_channel(&key))
        {
            *existing = key;
            return;
        }
        let at = self.keys.partition_point(|k| k.frame() <= key.frame());
        self.keys.insert(at, key);
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn pose_keys(&self) -> impl Iterator<Item = (Frame, &Pose)> {
        self.keys.iter().filter_map(|k| match k {
            Keyframe::Pose { frame, pose } => Some((*frame, pose)),
            Keyframe::Mode { .. } => None,
        })
    }

    pub fn pose_keys_at(&self, frame: Frame) -> usize {
        self.pose_keys().filter(|(f, _)| *f == frame).count()
    }

    /// Linear interpolation between pose keys, holding the first and last
    /// key outside the keyed range.
    pub fn pose_at(&self, frame: Frame) -> Option<Pose> {
        let mut before: Option<(Frame, &Pose)> = None;
        for (f, pose) in self.pose_keys() {
            if f == frame {
                return Some(*pose);
            }
            if f > frame {
                return Some(match before {
                    Some((f0, p0)) => {
                        let t = f64::from(frame - f0) / f64::from(f - f0);
                        p0.interpolate(pose, t)
                    }
                    None => *pose,
                });
            }
            before = Some((f, pose));
        }
        before.map(|(_, p)| *p)
    }

    /// Step interpolation: the last mode key at or before `frame`.
    pub fn mode_at(&self, frame: Frame) -> Option<bool> {
        self.keys
            .iter()
            .rev()
            .filter(|k| k.frame() <= frame)
            .find_map(|k| match k {
                Keyframe::Mode { kinematic, .. } => Some(*kinematic),
                Keyframe::Pose { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn key(frame: Frame, x: f64) -> Keyframe {
        Keyframe::Pose {
            frame,
            pose: Pose::at(Point3::new(x, 0.0, 0.0)),
        }
    }

    #[test]
    fn pose_interpolates_and_holds_ends() {
        let mut track = Track::new();
        track.insert(key(10, 0.0));
        track.insert(key(20, 10.0));

        assert_relative_eq!(track.pose_at(0).unwrap().position.x, 0.0);
        assert_relative_eq!(track.pose_at(15).unwrap().position.x, 5.0);
        assert_relative_eq!(track.pose_at(99).unwrap().position.x, 10.0);
    }

    #[test]
    fn same_frame_same_channel_replaces() {
        let mut track = Track::new();
        track.insert(key(5, 1.0));
        track.insert(Keyframe::Mode {
            frame: 5,
            kinematic: true,
        });
        track.insert(key(5, 2.0));

        assert_eq!(track.keys().len(), 2);
        assert_eq!(track.pose_keys_at(5), 1);
        assert_relative_eq!(track.pose_at(5).unwrap().position.x, 2.0);
    }

    #[test]
    fn mode_is_stepwise() {
        let mut track = Track::new();
        assert_eq!(track.mode_at(3), None);
        track.insert(Keyframe::Mode {
            frame: 1,
            kinematic: true,
        });
        track.insert(Keyframe::Mode {
            frame: 280,
            kinematic: false,
        });
        assert_eq!(track.mode_at(0), None);
        assert_eq!(track.mode_at(279), Some(true));
        assert_eq!(track.mode_at(280), Some(false));
    }
}
