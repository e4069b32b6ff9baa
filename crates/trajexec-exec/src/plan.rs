//! Executable plan: owned segments, consumed strictly in order

use crate::effect::CompletionEffect;
use trajexec_model::RobotTrajectory;

#[derive(Debug)]
pub struct ExecutableSegment {
    /// Position in the plan, "i/N".
    pub label: String,
    pub trajectory: RobotTrajectory,
    pub controllers: Vec<String>,
    pub effect: CompletionEffect,
}

#[derive(Debug, Default)]
pub struct ExecutablePlan {
    segments: Vec<ExecutableSegment>,
}

impl ExecutablePlan {
    pub fn new(segments: Vec<ExecutableSegment>) -> Self {
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[ExecutableSegment] {
        &self.segments
    }

    /// Total motion time over all segments.
    pub fn duration(&self) -> std::time::Duration {
        self.segments
            .iter()
            .fold(std::time::Duration::ZERO, |total, s| total.saturating_add(s.trajectory.duration()))
    }
}

impl IntoIterator for ExecutablePlan {
    type Item = ExecutableSegment;
    type IntoIter = std::vec::IntoIter<ExecutableSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}
