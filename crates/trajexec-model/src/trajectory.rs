//! Robot trajectories materialized from trajectory messages

use crate::error::{ModelError, Result};
use crate::model::{ActuatorGroup, RobotModel};
use crate::state::RobotState;
use std::sync::Arc;
use std::time::Duration;
use trajexec_core::TrajectoryMsg;

/// Latest accepted `time_from_start`, in seconds (one year).
pub const MAX_TIME_FROM_START: f64 = 365.0 * 24.0 * 3600.0;

#[derive(Clone, Debug)]
pub struct Waypoint {
    pub state: RobotState,
    /// Seconds since the previous waypoint (or since start for the first).
    pub duration_from_previous: f64,
}

/// A sequence of full robot states, bound to a model and optionally an actuator group.
#[derive(Clone, Debug)]
pub struct RobotTrajectory {
    model: Arc<RobotModel>,
    group: Option<String>,
    waypoints: Vec<Waypoint>,
}

impl RobotTrajectory {
    pub fn new(model: Arc<RobotModel>, group: Option<&ActuatorGroup>) -> Self {
        Self {
            model,
            group: group.map(|g| g.name().to_string()),
            waypoints: Vec::new(),
        }
    }

    /// Build a trajectory from a message, starting from `reference`.
    pub fn from_msg(
        model: Arc<RobotModel>,
        group: Option<&ActuatorGroup>,
        reference: &RobotState,
        msg: &TrajectoryMsg,
    ) -> Result<Self> {
        let mut trajectory = Self::new(model, group);
        trajectory.set_from_msg(reference, msg)?;
        Ok(trajectory)
    }

    /// Replace the waypoints with the points of `msg`.
    ///
    /// Every waypoint starts from the previous one (the first from `reference`)
    /// and overrides the joints the message names. When one component trajectory
    /// is shorter than the other, its last point keeps holding.
    pub fn set_from_msg(&mut self, reference: &RobotState, msg: &TrajectoryMsg) -> Result<()> {
        let jt = &msg.joint_trajectory;
        let mdt = &msg.multi_dof_joint_trajectory;

        let mut waypoints = Vec::with_capacity(msg.point_count());
        let mut state = reference.clone();
        let mut previous_time = 0.0;

        for i in 0..msg.point_count() {
            let mut time = None;

            if let Some(point) = jt.points.get(i) {
                if point.positions.len() != jt.joint_names.len() {
                    return Err(ModelError::malformed_trajectory(format!(
                        "point {} has {} positions for {} joints",
                        i,
                        point.positions.len(),
                        jt.joint_names.len()
                    )));
                }
                for (name, &value) in jt.joint_names.iter().zip(&point.positions) {
                    state.set_position(name, value).map_err(into_malformed)?;
                }
                time = Some(point.time_from_start);
            }

            if let Some(point) = mdt.points.get(i) {
                if point.transforms.len() != mdt.joint_names.len() {
                    return Err(ModelError::malformed_trajectory(format!(
                        "multi-DOF point {} has {} transforms for {} joints",
                        i,
                        point.transforms.len(),
                        mdt.joint_names.len()
                    )));
                }
                for (name, transform) in mdt.joint_names.iter().zip(&point.transforms) {
                    state.set_transform(name, *transform).map_err(into_malformed)?;
                }
                time = Some(time.map_or(point.time_from_start, |t: f64| t.max(point.time_from_start)));
            }

            let time = time.unwrap_or(previous_time);
            if !time.is_finite() || time < previous_time {
                return Err(ModelError::malformed_trajectory(format!(
                    "point {} has time_from_start {} before previous point at {}",
                    i, time, previous_time
                )));
            }
            if time > MAX_TIME_FROM_START {
                return Err(ModelError::malformed_trajectory(format!(
                    "point {} has time_from_start {} beyond the {}s limit",
                    i, time, MAX_TIME_FROM_START
                )));
            }

            waypoints.push(Waypoint {
                state: state.clone(),
                duration_from_previous: time - previous_time,
            });
            previous_time = time;
        }

        self.waypoints = waypoints;
        Ok(())
    }

    pub fn model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn duration(&self) -> Duration {
        let secs: f64 = self.waypoints.iter().map(|w| w.duration_from_previous).sum();
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn last_state(&self) -> Option<&RobotState> {
        self.waypoints.last().map(|w| &w.state)
    }
}

fn into_malformed(err: ModelError) -> ModelError {
    match err {
        ModelError::MalformedTrajectory(_) => err,
        other => ModelError::MalformedTrajectory(other.to_string()),
    }
}
