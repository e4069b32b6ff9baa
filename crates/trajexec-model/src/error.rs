//! Errors raised while loading a model or advancing a robot state

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("duplicate joint: {0}")]
    DuplicateJoint(String),

    #[error("duplicate group: {0}")]
    DuplicateGroup(String),

    #[error("group {group} references unknown joint {joint}")]
    UnknownGroupJoint { group: String, joint: String },

    #[error("joint {joint} mimics unknown joint {target}")]
    UnknownMimicTarget { joint: String, target: String },

    #[error("unknown joint: {0}")]
    UnknownJoint(String),

    #[error("unknown link: {0}")]
    UnknownLink(String),

    #[error("malformed state: {0}")]
    MalformedState(String),

    #[error("malformed trajectory: {0}")]
    MalformedTrajectory(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl ModelError {
    pub fn malformed_state(reason: impl Into<String>) -> Self {
        Self::MalformedState(reason.into())
    }

    pub fn malformed_trajectory(reason: impl Into<String>) -> Self {
        Self::MalformedTrajectory(reason.into())
    }
}
