//! Execution engine contract and a sequential engine over a trajectory dispatcher

use crate::plan::ExecutablePlan;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use trajexec_core::ErrorCode;
use trajexec_model::RobotTrajectory;

/// Aggregate status of one plan execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReport {
    pub code: ErrorCode,
    pub message: String,
    /// Segments that finished, effect included.
    pub completed_segments: usize,
}

impl ExecutionReport {
    pub fn success(completed_segments: usize) -> Self {
        Self {
            code: ErrorCode::Success,
            message: String::new(),
            completed_segments,
        }
    }

    pub fn preempted(completed_segments: usize) -> Self {
        Self {
            code: ErrorCode::Preempted,
            message: "execution stopped on request".into(),
            completed_segments,
        }
    }

    pub fn failed(code: ErrorCode, message: impl Into<String>, completed_segments: usize) -> Self {
        Self {
            code,
            message: message.into(),
            completed_segments,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// Runs a plan segment by segment.
///
/// Implementations execute segments in order, run each segment's completion
/// effect right after that segment succeeded, stop at the first failure, and
/// report one aggregate status.
#[async_trait::async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, plan: ExecutablePlan) -> ExecutionReport;

    /// Ask a running execution to stop as soon as possible. Safe to call from any task.
    fn stop(&self);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct DispatchError {
    pub code: ErrorCode,
    pub message: String,
}

impl DispatchError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn control_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ControlFailed, message)
    }
}

/// Sends a trajectory to the controllers and waits until it finished.
#[async_trait::async_trait]
pub trait TrajectoryDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        trajectory: &RobotTrajectory,
        controllers: &[String],
    ) -> Result<(), DispatchError>;
}

/// Engine that runs one segment at a time and races each dispatch against `stop()`.
pub struct SequentialEngine {
    dispatcher: Arc<dyn TrajectoryDispatcher>,
    stop: Mutex<CancellationToken>,
}

impl SequentialEngine {
    pub fn new(dispatcher: Arc<dyn TrajectoryDispatcher>) -> Self {
        Self {
            dispatcher,
            stop: Mutex::new(CancellationToken::new()),
        }
    }

    /// Fresh stop token for a new execution.
    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        match self.stop.lock() {
            Ok(mut guard) => *guard = token.clone(),
            Err(poisoned) => *poisoned.into_inner() = token.clone(),
        }
        token
    }
}

#[async_trait::async_trait]
impl ExecutionEngine for SequentialEngine {
    async fn execute(&self, plan: ExecutablePlan) -> ExecutionReport {
        let stop = self.arm();
        let total = plan.len();
        let mut completed = 0;

        for segment in plan {
            if stop.is_cancelled() {
                info!("Execution stopped after {}/{} segments", completed, total);
                return ExecutionReport::preempted(completed);
            }

            if !segment.trajectory.is_empty() {
                debug!(
                    segment = %segment.label,
                    group = segment.trajectory.group_name().unwrap_or("-"),
                    waypoints = segment.trajectory.waypoint_count(),
                    "dispatching trajectory"
                );
                let result = tokio::select! {
                    biased;
                    _ = stop.cancelled() => {
                        info!("Execution stopped during segment {}", segment.label);
                        return ExecutionReport::preempted(completed);
                    }
                    result = self.dispatcher.dispatch(&segment.trajectory, &segment.controllers) => result,
                };
                if let Err(e) = result {
                    warn!("Segment {} failed: {}", segment.label, e);
                    return ExecutionReport::failed(
                        e.code,
                        format!("sub-trajectory {} failed: {}", segment.label, e.message),
                        completed,
                    );
                }
            }

            if let Err(e) = segment.effect.apply().await {
                error!("Execution of path-completion side-effect failed: {}", e);
                return ExecutionReport::failed(ErrorCode::Failure, e.to_string(), completed);
            }
            completed += 1;

            // a stop that arrived while the effect ran still wins, even after the last segment
            if stop.is_cancelled() {
                info!("Execution stopped after {}/{} segments", completed, total);
                return ExecutionReport::preempted(completed);
            }
        }

        ExecutionReport::success(completed)
    }

    fn stop(&self) {
        match self.stop.lock() {
            Ok(guard) => guard.cancel(),
            Err(poisoned) => poisoned.into_inner().cancel(),
        }
    }
}
