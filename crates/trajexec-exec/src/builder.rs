//! Plan builder: solution in, executable plan out, all or nothing

use crate::effect::{segment_label, CompletionEffect, FeedbackSink};
use crate::plan::{ExecutablePlan, ExecutableSegment};
use crate::scene::SceneMonitor;
use std::sync::Arc;
use tracing::{debug, error};
use trajexec_core::{Error, Result, Solution};
use trajexec_model::{RobotModel, RobotState, RobotTrajectory};

pub struct PlanBuilder {
    model: Arc<RobotModel>,
    scene: Arc<dyn SceneMonitor>,
    feedback: Arc<dyn FeedbackSink>,
}

impl PlanBuilder {
    pub fn new(scene: Arc<dyn SceneMonitor>, feedback: Arc<dyn FeedbackSink>) -> Self {
        Self {
            model: scene.robot_model(),
            scene,
            feedback,
        }
    }

    /// Build one executable segment per sub-trajectory.
    ///
    /// `state` seeds the first trajectory. A segment's scene diff that carries a
    /// robot state advances it for the segments after it. Any failure discards
    /// the whole plan.
    pub fn build(&self, solution: &Solution, mut state: RobotState) -> Result<ExecutablePlan> {
        let total = solution.sub_trajectory.len();
        let mut segments = Vec::with_capacity(total);

        for (i, sub_traj) in solution.sub_trajectory.iter().enumerate() {
            let label = segment_label(i, total);

            let joint_names = sub_traj.trajectory.joint_names();
            let group = if joint_names.is_empty() {
                None
            } else {
                match self.model.find_actuator_group(&joint_names) {
                    Some(group) => {
                        debug!("Using actuator group '{}' for {}", group.name(), label);
                        Some(group)
                    }
                    None => {
                        let err = Error::unresolvable_group(&label, &joint_names);
                        error!("{}", err);
                        return Err(err);
                    }
                }
            };

            let trajectory =
                RobotTrajectory::from_msg(self.model.clone(), group, &state, &sub_traj.trajectory)
                    .map_err(|e| {
                        let err = Error::malformed_trajectory(&label, e);
                        error!("{}", err);
                        err
                    })?;

            let effect = CompletionEffect::new(
                i,
                total,
                sub_traj.scene_diff.clone(),
                self.feedback.clone(),
                self.scene.clone(),
            );

            segments.push(ExecutableSegment {
                label: label.clone(),
                trajectory,
                controllers: sub_traj.execution_info.controller_names.clone(),
                effect,
            });

            let robot_state = &sub_traj.scene_diff.robot_state;
            if !robot_state.is_empty() {
                state.apply_msg(robot_state).map_err(|e| {
                    let err = Error::malformed_scene_state(&label, e);
                    error!("{}", err);
                    err
                })?;
            }
        }

        Ok(ExecutablePlan::new(segments))
    }
}
