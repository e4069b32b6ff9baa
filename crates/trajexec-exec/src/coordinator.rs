//! Execution coordinator: one goal at a time, Idle → Executing → terminal.
//!
//! The coordinator snapshots the current state, builds the plan, hands it to
//! the engine and maps the engine's aggregate status onto exactly one terminal
//! outcome. Preemption comes in from another task through [`ExecutionCoordinator::preempt`],
//! which never waits on the executing path.

use crate::builder::PlanBuilder;
use crate::effect::FeedbackSink;
use crate::engine::ExecutionEngine;
use crate::scene::SceneMonitor;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use trajexec_core::{Error, ErrorCode, ExecuteSolutionGoal, GoalOutcome, GoalStatus};

pub const EXECUTION_DISABLED_TEXT: &str =
    "Cannot execute solution: execution disabled (allow_trajectory_execution is false)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Executing,
    Succeeded,
    Preempted,
    Aborted,
}

impl CoordinatorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Preempted | Self::Aborted)
    }
}

impl From<GoalStatus> for CoordinatorState {
    fn from(status: GoalStatus) -> Self {
        match status {
            GoalStatus::Succeeded => Self::Succeeded,
            GoalStatus::Preempted => Self::Preempted,
            GoalStatus::Aborted => Self::Aborted,
        }
    }
}

pub struct ExecutionCoordinator {
    scene: Arc<dyn SceneMonitor>,
    /// `None` when the host forbids trajectory execution.
    engine: Option<Arc<dyn ExecutionEngine>>,
    state: watch::Sender<CoordinatorState>,
    active: Mutex<Option<CancellationToken>>,
}

impl ExecutionCoordinator {
    pub fn new(scene: Arc<dyn SceneMonitor>, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self::with_engine(scene, Some(engine))
    }

    /// A coordinator that aborts every goal because execution is disabled.
    pub fn without_execution(scene: Arc<dyn SceneMonitor>) -> Self {
        Self::with_engine(scene, None)
    }

    pub fn with_engine(scene: Arc<dyn SceneMonitor>, engine: Option<Arc<dyn ExecutionEngine>>) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        Self {
            scene,
            engine,
            state,
            active: Mutex::new(None),
        }
    }

    pub fn execution_enabled(&self) -> bool {
        self.engine.is_some()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Run one goal to its terminal outcome.
    ///
    /// Feedback for each finished segment goes to `feedback`, always before this returns.
    pub async fn execute_goal(
        &self,
        goal: &ExecuteSolutionGoal,
        feedback: Arc<dyn FeedbackSink>,
    ) -> GoalOutcome {
        let cancel = CancellationToken::new();
        self.set_active(Some(cancel.clone()));
        self.state.send_replace(CoordinatorState::Idle);

        let outcome = self.run(goal, feedback, &cancel).await;

        self.set_active(None);
        self.state.send_replace(outcome.status.into());
        info!(status = %outcome.status, code = %outcome.code(), "{}", outcome.text);
        outcome
    }

    async fn run(
        &self,
        goal: &ExecuteSolutionGoal,
        feedback: Arc<dyn FeedbackSink>,
        cancel: &CancellationToken,
    ) -> GoalOutcome {
        let Some(engine) = &self.engine else {
            warn!("{}", EXECUTION_DISABLED_TEXT);
            return GoalOutcome::aborted(Error::ExecutionDisabled.error_code(), EXECUTION_DISABLED_TEXT);
        };

        let builder = PlanBuilder::new(self.scene.clone(), feedback);
        let start_state = self.scene.current_state().await;
        let plan = match builder.build(&goal.solution, start_state) {
            Ok(plan) => plan,
            Err(e) => {
                error!("Rejecting solution: {}", e);
                return GoalOutcome::aborted(
                    ErrorCode::InvalidMotionPlan,
                    format!("{}: {}", ErrorCode::InvalidMotionPlan, e),
                );
            }
        };

        if cancel.is_cancelled() {
            return GoalOutcome::from_code(ErrorCode::Preempted);
        }

        self.state.send_replace(CoordinatorState::Executing);
        info!("Executing solution ({} sub-trajectories)", plan.len());

        let execution = engine.execute(plan);
        tokio::pin!(execution);
        let report = tokio::select! {
            biased;
            report = &mut execution => report,
            _ = cancel.cancelled() => {
                engine.stop();
                execution.await
            }
        };

        if report.message.is_empty() {
            GoalOutcome::from_code(report.code)
        } else {
            GoalOutcome::with_text(report.code, format!("{}: {}", report.code, report.message))
        }
    }

    /// Request the active goal to stop. No-op when idle.
    pub fn preempt(&self) {
        let active = match self.active.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(cancel) = active {
            info!("Preemption requested");
            cancel.cancel();
            if let Some(engine) = &self.engine {
                engine.stop();
            }
        }
    }

    fn set_active(&self, token: Option<CancellationToken>) {
        match self.active.lock() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}
