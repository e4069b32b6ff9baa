//! Error types for Trajexec

use crate::protocol::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("trajectory execution is disabled")]
    ExecutionDisabled,

    #[error("could not find an actuator group that actuates {{{joints}}} (sub-trajectory {segment})")]
    UnresolvableActuatorGroup { segment: String, joints: String },

    #[error("invalid intermediate robot state in scene diff of sub-trajectory {segment}: {reason}")]
    MalformedSceneState { segment: String, reason: String },

    #[error("invalid trajectory in sub-trajectory {segment}: {reason}")]
    MalformedTrajectory { segment: String, reason: String },

    #[error("execution failed: {code} - {message}")]
    EngineFailure { code: ErrorCode, message: String },

    #[error("execution preempted")]
    Preempted,

    #[error("applying the scene diff of sub-trajectory {segment} failed: {reason}")]
    EffectSubmissionFailure { segment: String, reason: String },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn unresolvable_group(segment: impl Into<String>, joints: &[String]) -> Self {
        Self::UnresolvableActuatorGroup {
            segment: segment.into(),
            joints: joints.join(", "),
        }
    }

    pub fn malformed_scene_state(segment: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedSceneState {
            segment: segment.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed_trajectory(segment: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedTrajectory {
            segment: segment.into(),
            reason: reason.to_string(),
        }
    }

    pub fn effect_failure(segment: impl Into<String>, reason: impl ToString) -> Self {
        Self::EffectSubmissionFailure {
            segment: segment.into(),
            reason: reason.to_string(),
        }
    }

    /// Result code reported to the goal's caller for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ExecutionDisabled => ErrorCode::ControlFailed,
            Self::UnresolvableActuatorGroup { .. }
            | Self::MalformedSceneState { .. }
            | Self::MalformedTrajectory { .. } => ErrorCode::InvalidMotionPlan,
            Self::EngineFailure { code, .. } => *code,
            Self::Preempted => ErrorCode::Preempted,
            Self::EffectSubmissionFailure { .. } | Self::IoError(_) | Self::JsonError(_) => {
                ErrorCode::Failure
            }
        }
    }

    /// True for errors raised while turning a solution into a plan.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvableActuatorGroup { .. }
                | Self::MalformedSceneState { .. }
                | Self::MalformedTrajectory { .. }
        )
    }
}
