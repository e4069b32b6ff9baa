//! Action server: accepts one goal at a time and runs it on a worker task

use crate::client::{ActionClient, GoalHandle};
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trajexec_core::{ErrorCode, ExecuteSolutionFeedback, ExecuteSolutionGoal, GoalOutcome};
use trajexec_exec::{ExecutionCoordinator, FeedbackSink};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Action name, used in logs.
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "execute_task_solution".into(),
        }
    }
}

pub(crate) struct GoalRequest {
    id: Uuid,
    goal: ExecuteSolutionGoal,
    cancel: CancellationToken,
    feedback: mpsc::UnboundedSender<ExecuteSolutionFeedback>,
    result: oneshot::Sender<GoalOutcome>,
}

/// State shared between the server, its clients and the goal worker.
pub(crate) struct Shared {
    config: ServerConfig,
    /// `None` while the server is not running.
    queue: Mutex<Option<mpsc::Sender<GoalRequest>>>,
    active: Mutex<Option<(Uuid, CancellationToken)>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    pub(crate) fn is_running(&self) -> bool {
        lock(&self.queue).is_some()
    }

    pub(crate) fn submit(&self, goal: ExecuteSolutionGoal) -> Result<GoalHandle> {
        let queue = lock(&self.queue).clone().ok_or(GatewayError::NotRunning)?;

        let mut active = lock(&self.active);
        if let Some((active_id, _)) = active.as_ref() {
            warn!("Rejecting goal: goal {} is still active", active_id);
            return Err(GatewayError::Busy { active: *active_id });
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        // one message per completed segment at most, so the buffer is bounded by the solution
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        queue
            .try_send(GoalRequest {
                id,
                goal,
                cancel: cancel.clone(),
                feedback: feedback_tx,
                result: result_tx,
            })
            .map_err(|_| GatewayError::NotRunning)?;
        *active = Some((id, cancel.clone()));

        info!("Goal {} accepted by '{}'", id, self.config.name);
        Ok(GoalHandle::new(id, cancel, feedback_rx, result_rx))
    }

    fn finish(&self, id: Uuid) {
        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|(active_id, _)| *active_id == id) {
            *active = None;
        }
    }
}

/// Forwards coordinator feedback to one goal's client.
pub(crate) struct GoalFeedback {
    goal: Uuid,
    tx: mpsc::UnboundedSender<ExecuteSolutionFeedback>,
    finished: Arc<AtomicBool>,
}

impl FeedbackSink for GoalFeedback {
    fn publish(&self, feedback: ExecuteSolutionFeedback) {
        if self.finished.load(Ordering::SeqCst) {
            warn!("Dropping feedback {} for goal {}: goal already finished", feedback, self.goal);
            return;
        }
        if self.tx.send(feedback).is_err() {
            debug!("Nobody listens to feedback of goal {}", self.goal);
        }
    }
}

pub struct ActionServer {
    coordinator: Arc<ExecutionCoordinator>,
    shared: Arc<Shared>,
    shutdown: Mutex<CancellationToken>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ActionServer {
    pub fn new(coordinator: Arc<ExecutionCoordinator>, config: ServerConfig) -> Self {
        Self {
            coordinator,
            shared: Arc::new(Shared {
                config,
                queue: Mutex::new(None),
                active: Mutex::new(None),
            }),
            shutdown: Mutex::new(CancellationToken::new()),
            worker: Mutex::new(None),
        }
    }

    /// Start the goal worker. Must be called from within a tokio runtime.
    pub fn initialize(&self) -> Result<()> {
        let mut queue = lock(&self.shared.queue);
        if queue.is_some() {
            return Err(GatewayError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        *lock(&self.shutdown) = shutdown.clone();
        let handle = tokio::spawn(run_worker(
            self.coordinator.clone(),
            self.shared.clone(),
            rx,
            shutdown,
        ));
        *lock(&self.worker) = Some(handle);
        *queue = Some(tx);

        info!(
            "Action server '{}' ready (execution {})",
            self.shared.config.name,
            if self.coordinator.execution_enabled() { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Stop accepting goals, preempt the active one, and wait for the worker to exit.
    pub async fn shutdown(&self) {
        if lock(&self.shared.queue).take().is_none() {
            return;
        }
        lock(&self.shutdown).cancel();
        if let Some((id, cancel)) = lock(&self.shared.active).take() {
            info!("Preempting goal {} for shutdown", id);
            cancel.cancel();
        }

        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Goal worker ended abnormally: {}", e);
            }
        }
        info!("Action server '{}' stopped", self.shared.config.name);
    }

    pub fn client(&self) -> ActionClient {
        ActionClient::new(self.shared.clone())
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn active_goal(&self) -> Option<Uuid> {
        lock(&self.shared.active).as_ref().map(|(id, _)| *id)
    }

    pub fn coordinator(&self) -> &Arc<ExecutionCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }
}

impl Drop for ActionServer {
    fn drop(&mut self) {
        lock(&self.shutdown).cancel();
    }
}

async fn run_worker(
    coordinator: Arc<ExecutionCoordinator>,
    shared: Arc<Shared>,
    mut queue: mpsc::Receiver<GoalRequest>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            request = queue.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };
        run_goal(&coordinator, &shared, request).await;
    }

    // goals accepted but never started still get their single terminal result
    queue.close();
    while let Ok(request) = queue.try_recv() {
        info!("Goal {} preempted before it started", request.id);
        shared.finish(request.id);
        if request.result.send(GoalOutcome::from_code(ErrorCode::Preempted)).is_err() {
            debug!("Result of goal {} has no receiver", request.id);
        }
    }
    debug!("Goal worker of '{}' exited", shared.config.name);
}

async fn run_goal(coordinator: &ExecutionCoordinator, shared: &Shared, request: GoalRequest) {
    let GoalRequest {
        id,
        goal,
        cancel,
        feedback,
        result,
    } = request;

    let finished = Arc::new(AtomicBool::new(false));
    let sink: Arc<dyn FeedbackSink> = Arc::new(GoalFeedback {
        goal: id,
        tx: feedback,
        finished: finished.clone(),
    });

    let execution = coordinator.execute_goal(&goal, sink);
    tokio::pin!(execution);
    let outcome = tokio::select! {
        biased;
        outcome = &mut execution => outcome,
        _ = cancel.cancelled() => {
            coordinator.preempt();
            execution.await
        }
    };

    finished.store(true, Ordering::SeqCst);
    shared.finish(id);
    debug!("Goal {} finished: {}", id, outcome.status);
    if result.send(outcome).is_err() {
        debug!("Result of goal {} has no receiver", id);
    }
}
