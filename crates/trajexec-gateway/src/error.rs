//! Gateway errors

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("action server is not running")]
    NotRunning,

    #[error("action server is already running")]
    AlreadyRunning,

    #[error("goal rejected: goal {active} is still active")]
    Busy { active: Uuid },

    #[error("goal {0} was dropped before it reached a terminal state")]
    GoalDropped(Uuid),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
