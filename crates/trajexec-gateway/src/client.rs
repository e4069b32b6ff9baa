//! Client side of the action interface

use crate::error::{GatewayError, Result};
use crate::server::Shared;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use trajexec_core::{ExecuteSolutionFeedback, ExecuteSolutionGoal, GoalOutcome};
use uuid::Uuid;

/// Cheap handle for submitting goals to an [`ActionServer`](crate::ActionServer).
#[derive(Clone)]
pub struct ActionClient {
    shared: Arc<Shared>,
}

impl ActionClient {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Submit a goal. Fails with [`GatewayError::Busy`] while another goal is active.
    pub fn send_goal(&self, goal: ExecuteSolutionGoal) -> Result<GoalHandle> {
        self.shared.submit(goal)
    }

    pub fn is_server_ready(&self) -> bool {
        self.shared.is_running()
    }
}

/// One accepted goal: its feedback stream, its cancel switch and its outcome.
pub struct GoalHandle {
    id: Uuid,
    cancel: CancellationToken,
    feedback: mpsc::UnboundedReceiver<ExecuteSolutionFeedback>,
    result: oneshot::Receiver<GoalOutcome>,
}

impl GoalHandle {
    pub(crate) fn new(
        id: Uuid,
        cancel: CancellationToken,
        feedback: mpsc::UnboundedReceiver<ExecuteSolutionFeedback>,
        result: oneshot::Receiver<GoalOutcome>,
    ) -> Self {
        Self {
            id,
            cancel,
            feedback,
            result,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request preemption. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this goal when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next feedback message, or `None` once the goal is done and all feedback was read.
    pub async fn next_feedback(&mut self) -> Option<ExecuteSolutionFeedback> {
        self.feedback.recv().await
    }

    /// Wait for the terminal outcome. Unread feedback is discarded.
    pub async fn wait(self) -> Result<GoalOutcome> {
        let id = self.id;
        self.result.await.map_err(|_| GatewayError::GoalDropped(id))
    }
}

impl std::fmt::Debug for GoalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalHandle")
            .field("id", &self.id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
