//! Simulated controllers
//!
//! Stand-in for real trajectory controllers: waits for the (scaled) trajectory
//! duration, then moves the joints of the trajectory's group to its final waypoint.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use trajexec_exec::{DispatchError, SceneMonitor, TrajectoryDispatcher};
use trajexec_model::RobotTrajectory;

pub struct SimulatedDispatcher {
    scene: Arc<dyn SceneMonitor>,
    time_scale: f64,
    failing_controllers: BTreeSet<String>,
    dispatched: AtomicUsize,
}

impl SimulatedDispatcher {
    pub fn new(scene: Arc<dyn SceneMonitor>) -> Self {
        Self {
            scene,
            time_scale: 1.0,
            failing_controllers: BTreeSet::new(),
            dispatched: AtomicUsize::new(0),
        }
    }

    /// Scale applied to trajectory durations. Negative or non-finite scales run without sleeping.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = if time_scale.is_finite() && time_scale > 0.0 {
            time_scale
        } else {
            0.0
        };
        self
    }

    pub fn with_failing_controllers<I, S>(mut self, controllers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_controllers
            .extend(controllers.into_iter().map(Into::into));
        self
    }

    /// Simulated wall time for a trajectory, saturating instead of overflowing.
    fn scaled(&self, duration: Duration) -> Duration {
        Duration::try_from_secs_f64(duration.as_secs_f64() * self.time_scale).unwrap_or(Duration::MAX)
    }

    /// Number of trajectories handed to the simulated controllers so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TrajectoryDispatcher for SimulatedDispatcher {
    async fn dispatch(
        &self,
        trajectory: &RobotTrajectory,
        controllers: &[String],
    ) -> Result<(), DispatchError> {
        self.dispatched.fetch_add(1, Ordering::SeqCst);

        if let Some(controller) = controllers
            .iter()
            .find(|c| self.failing_controllers.contains(c.as_str()))
        {
            warn!("Simulated controller '{}' failed", controller);
            return Err(DispatchError::control_failed(format!(
                "controller '{}' reported failure",
                controller
            )));
        }

        let duration = self.scaled(trajectory.duration());
        debug!(
            group = trajectory.group_name().unwrap_or("-"),
            waypoints = trajectory.waypoint_count(),
            "simulating trajectory for {:?}",
            duration
        );
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        if let Some(last) = trajectory.last_state() {
            let moved: Vec<String> = match trajectory.group_name().and_then(|g| trajectory.model().group(g)) {
                Some(group) => group.joint_names().to_vec(),
                None => last.positions().keys().cloned().collect(),
            };
            let mut current = self.scene.current_state().await;
            current.merge_joints(last, &moved);
            self.scene.update_current_state(current).await;
        }
        Ok(())
    }
}
