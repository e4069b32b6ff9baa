//! Per-segment completion effect: feedback, then the segment's scene diff

use crate::scene::SceneMonitor;
use std::sync::Arc;
use tracing::debug;
use trajexec_core::{Error, ExecuteSolutionFeedback, Result, SceneDiff};

/// Receives one feedback message per successfully finished segment.
pub trait FeedbackSink: Send + Sync {
    fn publish(&self, feedback: ExecuteSolutionFeedback);
}

impl<F> FeedbackSink for F
where
    F: Fn(ExecuteSolutionFeedback) + Send + Sync,
{
    fn publish(&self, feedback: ExecuteSolutionFeedback) {
        self(feedback)
    }
}

/// Deferred action run once, right after its segment finished successfully.
///
/// Owns a copy of the segment's scene diff, so it does not borrow from the goal.
pub struct CompletionEffect {
    index: usize,
    total: usize,
    label: String,
    scene_diff: SceneDiff,
    feedback: Arc<dyn FeedbackSink>,
    scene: Arc<dyn SceneMonitor>,
}

impl CompletionEffect {
    pub fn new(
        index: usize,
        total: usize,
        scene_diff: SceneDiff,
        feedback: Arc<dyn FeedbackSink>,
        scene: Arc<dyn SceneMonitor>,
    ) -> Self {
        Self {
            index,
            total,
            label: segment_label(index, total),
            scene_diff,
            feedback,
            scene,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn scene_diff(&self) -> &SceneDiff {
        &self.scene_diff
    }

    /// Publish feedback, then submit the scene diff without any joint state.
    ///
    /// A diff that is empty once joint state is stripped succeeds without a submission.
    pub async fn apply(mut self) -> Result<()> {
        self.feedback.publish(ExecuteSolutionFeedback {
            sub_id: self.index,
            sub_no: self.total,
        });

        // joint state only advances through executed trajectories
        self.scene_diff.strip_joint_state();

        if self.scene_diff.is_empty() {
            return Ok(());
        }
        debug!("apply effect of {}", self.label);
        self.scene
            .apply_scene_diff(&self.scene_diff)
            .await
            .map_err(|e| Error::effect_failure(&self.label, e))
    }
}

impl std::fmt::Debug for CompletionEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionEffect")
            .field("label", &self.label)
            .field("scene_diff", &self.scene_diff)
            .finish_non_exhaustive()
    }
}

/// Human-readable position of a segment, "i/N" with a 1-based `i`.
pub fn segment_label(index: usize, total: usize) -> String {
    format!("{}/{}", index + 1, total)
}
