//! Goal protocol: goals in, feedback and exactly one terminal outcome out

use crate::error::{Error, Result};
use crate::types::Solution;
use serde::{Deserialize, Serialize};

/// Result codes shared by the coordinator and the execution engine.
///
/// Numeric values follow the conventional motion-planning error codes so results
/// can be compared with other tools that speak the same vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ErrorCode {
    Success,
    Failure,
    PlanningFailed,
    InvalidMotionPlan,
    MotionPlanInvalidatedByEnvironmentChange,
    ControlFailed,
    TimedOut,
    Preempted,
    Other(i32),
}

impl ErrorCode {
    pub fn value(self) -> i32 {
        match self {
            Self::Success => 1,
            Self::Failure => 99999,
            Self::PlanningFailed => -1,
            Self::InvalidMotionPlan => -2,
            Self::MotionPlanInvalidatedByEnvironmentChange => -3,
            Self::ControlFailed => -4,
            Self::TimedOut => -6,
            Self::Preempted => -7,
            Self::Other(v) => v,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::PlanningFailed => "PLANNING_FAILED",
            Self::InvalidMotionPlan => "INVALID_MOTION_PLAN",
            Self::MotionPlanInvalidatedByEnvironmentChange => {
                "MOTION_PLAN_INVALIDATED_BY_ENVIRONMENT_CHANGE"
            }
            Self::ControlFailed => "CONTROL_FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::Preempted => "PREEMPTED",
            Self::Other(_) => "UNKNOWN",
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(v: i32) -> Self {
        match v {
            1 => Self::Success,
            99999 => Self::Failure,
            -1 => Self::PlanningFailed,
            -2 => Self::InvalidMotionPlan,
            -3 => Self::MotionPlanInvalidatedByEnvironmentChange,
            -4 => Self::ControlFailed,
            -6 => Self::TimedOut,
            -7 => Self::Preempted,
            other => Self::Other(other),
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.value()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(v) => write!(f, "UNKNOWN({})", v),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// A request to execute a precomputed solution.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecuteSolutionGoal {
    pub solution: Solution,
}

impl ExecuteSolutionGoal {
    pub fn new(solution: Solution) -> Self {
        Self { solution }
    }
}

/// Emitted once per sub-trajectory that finished successfully.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteSolutionFeedback {
    /// 0-based index of the finished sub-trajectory.
    pub sub_id: usize,
    /// Total number of sub-trajectories in the solution.
    pub sub_no: usize,
}

impl std::fmt::Display for ExecuteSolutionFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.sub_id + 1, self.sub_no)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteSolutionResult {
    pub error_code: ErrorCode,
}

/// Terminal status of a goal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Succeeded,
    Preempted,
    Aborted,
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Preempted => write!(f, "preempted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// The one terminal report of a goal: status, result code and human-readable text.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalOutcome {
    pub status: GoalStatus,
    pub result: ExecuteSolutionResult,
    pub text: String,
}

impl GoalOutcome {
    /// Map a result code to its terminal status; the text defaults to the code's name.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_text(code, code.to_string())
    }

    pub fn with_text(code: ErrorCode, text: impl Into<String>) -> Self {
        let status = match code {
            ErrorCode::Success => GoalStatus::Succeeded,
            ErrorCode::Preempted => GoalStatus::Preempted,
            _ => GoalStatus::Aborted,
        };
        Self {
            status,
            result: ExecuteSolutionResult { error_code: code },
            text: text.into(),
        }
    }

    /// An abort that carries `code`, whatever the code says.
    pub fn aborted(code: ErrorCode, text: impl Into<String>) -> Self {
        Self {
            status: GoalStatus::Aborted,
            result: ExecuteSolutionResult { error_code: code },
            text: text.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.result.error_code
    }

    /// `Ok` for a succeeded goal, the matching [`Error`] otherwise.
    pub fn into_result(self) -> Result<GoalOutcome> {
        match self.status {
            GoalStatus::Succeeded => Ok(self),
            GoalStatus::Preempted => Err(Error::Preempted),
            GoalStatus::Aborted => Err(Error::EngineFailure {
                code: self.code(),
                message: self.text,
            }),
        }
    }
}
