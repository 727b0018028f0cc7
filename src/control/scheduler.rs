use std::collections::HashMap;

use nalgebra::Vector3;
use tracing::trace;

use crate::control::errors::ControlError;
use crate::control::types::{Action, ActionLog, SimulationContext};
use crate::env::{Frame, Keyframe, Pose, RopeActuator};

/// Issues timed displacements against rope segments and keeps the
/// kinematic/dynamic hand-over free of jumps.
///
/// The scripted pose of a segment behaves like an object property on the
/// host: actions issued at the same clock frame accumulate, and once the
/// clock moves the pose is re-read from the segment's keyframe track.
#[derive(Debug, Default)]
pub struct ActionScheduler {
    log: ActionLog,
    scripted: HashMap<usize, (Frame, Pose)>,
}

impl ActionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    pub fn take_action<A>(
        &mut self,
        rope: &mut A,
        ctx: &SimulationContext,
        segment: usize,
        frame: Frame,
        displacement: Vector3<f64>,
        animate: bool,
    ) -> Result<(), ControlError>
    where
        A: RopeActuator + ?Sized,
    {
        let now = ctx.frame();
        ctx.check_schedulable(frame)?;

        let state = rope.segment(segment)?;
        let mut pose = self.scripted_pose(rope, now, segment)?;
        if animate != state.kinematic {
            // Mode change: the scripted pose restarts from the simulated one.
            pose = state.pose;
            rope.record_keyframe(segment, Keyframe::Pose { frame: now, pose })?;
        }
        self.toggle(rope, now, segment, animate)?;

        pose.position += displacement;
        rope.record_keyframe(segment, Keyframe::Pose { frame, pose })?;
        self.scripted.insert(segment, (now, pose));

        trace!(segment, now, frame, animate, "action keyed");
        self.log.push(Action {
            segment,
            issued_at: now,
            frame,
            displacement,
            animate,
        });
        Ok(())
    }

    /// Set the control mode of `segment` and key it at `frame`.
    pub fn toggle<A>(
        &mut self,
        rope: &mut A,
        frame: Frame,
        segment: usize,
        kinematic: bool,
    ) -> Result<(), ControlError>
    where
        A: RopeActuator + ?Sized,
    {
        rope.set_kinematic(segment, kinematic)?;
        rope.record_keyframe(segment, Keyframe::Mode { frame, kinematic })?;
        Ok(())
    }

    /// Forget the episode: action log and scripted poses.
    pub fn clear(&mut self) {
        self.log.clear();
        self.scripted.clear();
    }

    fn scripted_pose<A>(&self, rope: &A, now: Frame, segment: usize) -> Result<Pose, ControlError>
    where
        A: RopeActuator + ?Sized,
    {
        if let Some((at, pose)) = self.scripted.get(&segment) {
            if *at == now {
                return Ok(*pose);
            }
        }
        match rope.track(segment)?.pose_at(now) {
            Some(pose) => Ok(pose),
            None => Ok(rope.segment(segment)?.pose),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RopeParams;
    use crate::env::{ChainRope, ChainSettings, EnvError};
    use approx::assert_relative_eq;

    fn rope() -> ChainRope {
        let params = RopeParams {
            num_segments: 8,
            ..RopeParams::default()
        };
        ChainRope::new(&params, ChainSettings::default())
    }

    fn at(frame: Frame) -> SimulationContext {
        let mut ctx = SimulationContext::new(1_000);
        ctx.advance_to(frame).unwrap();
        ctx
    }

    #[test]
    fn picking_up_a_dynamic_segment_keys_its_pose_first() {
        let mut rope = rope();
        let mut scheduler = ActionScheduler::new();
        let before = rope.segment(3).unwrap().pose.position;

        scheduler
            .take_action(&mut rope, &at(10), 3, 40, Vector3::new(1.0, 0.0, 0.0), true)
            .unwrap();

        let track = rope.track(3).unwrap();
        assert_eq!(track.pose_keys_at(10), 1);
        assert_eq!(track.mode_at(10), Some(true));
        assert_relative_eq!(track.pose_at(10).unwrap().position, before);
        assert_relative_eq!(track.pose_at(40).unwrap().position.x, before.x + 1.0);
        assert!(rope.segment(3).unwrap().kinematic);
    }

    #[test]
    fn unchanged_mode_adds_no_capture_key() {
        let mut rope = rope();
        let mut scheduler = ActionScheduler::new();

        scheduler
            .take_action(&mut rope, &at(10), 0, 40, Vector3::new(0.0, 1.0, 0.0), true)
            .unwrap();

        let track = rope.track(0).unwrap();
        assert_eq!(track.pose_keys_at(10), 0);
        assert_eq!(track.pose_keys_at(40), 1);
    }

    #[test]
    fn second_action_with_same_mode_keeps_single_capture() {
        let mut rope = rope();
        let mut scheduler = ActionScheduler::new();
        let ctx = at(10);

        scheduler
            .take_action(&mut rope, &ctx, 4, 30, Vector3::zeros(), true)
            .unwrap();
        scheduler
            .take_action(&mut rope, &ctx, 4, 50, Vector3::new(0.0, 0.0, 2.0), true)
            .unwrap();

        let track = rope.track(4).unwrap();
        assert_eq!(track.pose_keys_at(10), 1);
        assert_eq!(scheduler.log().for_segment(4).count(), 2);
    }

    #[test]
    fn displacements_accumulate_within_one_clock_frame() {
        let mut rope = rope();
        let mut scheduler = ActionScheduler::new();
        let ctx = at(0);
        let start = rope.segment(7).unwrap().pose.position;

        scheduler
            .take_action(&mut rope, &ctx, 7, 80, Vector3::new(10.0, 0.0, 0.0), true)
            .unwrap();
        scheduler
            .take_action(&mut rope, &ctx, 7, 120, Vector3::new(0.0, -7.0, 0.0), true)
            .unwrap();

        let track = rope.track(7).unwrap();
        let p80 = track.pose_at(80).unwrap().position;
        let p120 = track.pose_at(120).unwrap().position;
        assert_relative_eq!(p80.x, start.x + 10.0);
        assert_relative_eq!(p120.x, start.x + 10.0);
        assert_relative_eq!(p120.y, start.y - 7.0);
    }

    #[test]
    fn scripted_pose_follows_track_once_clock_moves() {
        let mut rope = rope();
        let mut scheduler = ActionScheduler::new();
        let start = rope.segment(0).unwrap().pose.position;

        scheduler
            .take_action(&mut rope, &at(0), 0, 0, Vector3::zeros(), true)
            .unwrap();
        scheduler
            .take_action(&mut rope, &at(0), 0, 20, Vector3::new(4.0, 0.0, 0.0), true)
            .unwrap();
        scheduler
            .take_action(&mut rope, &at(10), 0, 30, Vector3::new(0.0, 1.0, 0.0), true)
            .unwrap();

        let target = rope.track(0).unwrap().pose_at(30).unwrap().position;
        assert_relative_eq!(target.x, start.x + 2.0);
        assert_relative_eq!(target.y, start.y + 1.0);
    }

    #[test]
    fn release_is_keyed_at_requested_frame() {
        let mut rope = rope();
        let mut scheduler = ActionScheduler::new();

        scheduler.toggle(&mut rope, 280, 0, false).unwrap();

        let track = rope.track(0).unwrap();
        assert_eq!(track.mode_at(279), None);
        assert_eq!(track.mode_at(280), Some(false));
    }

    #[test]
    fn past_frames_and_unknown_segments_are_rejected() {
        let mut rope = rope();
        let mut scheduler = ActionScheduler::new();

        let err = scheduler
            .take_action(&mut rope, &at(50), 0, 40, Vector3::zeros(), true)
            .unwrap_err();
        assert!(matches!(err, ControlError::FrameInPast { frame: 40, current: 50 }));

        let err = scheduler
            .take_action(&mut rope, &at(0), 8, 40, Vector3::zeros(), true)
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Env(EnvError::MissingSegment { index: 8, .. })
        ));
        assert!(scheduler.log().is_empty());
    }
}
