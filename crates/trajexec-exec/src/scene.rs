//! Scene monitor contract and an in-memory implementation
//!
//! The coordinator only needs two things from the scene: a snapshot of the
//! current robot state (taken under a short read lock) and a way to submit
//! scene diffs. Locking and consistency are the monitor's business.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use trajexec_core::{CollisionObject, ObjectOperation, SceneDiff};
use trajexec_model::{ModelError, RobotModel, RobotState};

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("invalid robot state: {0}")]
    InvalidRobotState(#[from] ModelError),

    #[error("collision object has no id")]
    MissingObjectId,

    #[error("unknown collision object: {0}")]
    UnknownObject(String),
}

#[async_trait::async_trait]
pub trait SceneMonitor: Send + Sync {
    fn robot_model(&self) -> Arc<RobotModel>;

    /// Snapshot of the current robot state.
    async fn current_state(&self) -> RobotState;

    /// Apply a scene diff. Fails without changing anything.
    async fn apply_scene_diff(&self, diff: &SceneDiff) -> Result<(), SceneError>;

    /// Replace the current robot state, e.g. after a trajectory was executed.
    async fn update_current_state(&self, state: RobotState);
}

/// Everything the in-memory monitor tracks.
#[derive(Clone, Debug)]
pub struct PlanningScene {
    pub name: String,
    pub robot_state: RobotState,
    pub objects: BTreeMap<String, CollisionObject>,
    /// Pairs stored with the lexicographically smaller name first.
    pub allowed_collisions: BTreeSet<(String, String)>,
    /// Number of diffs applied so far.
    pub revision: u64,
}

impl PlanningScene {
    pub fn new(model: Arc<RobotModel>) -> Self {
        Self {
            name: String::new(),
            robot_state: RobotState::new(model),
            objects: BTreeMap::new(),
            allowed_collisions: BTreeSet::new(),
            revision: 0,
        }
    }

    pub fn is_collision_allowed(&self, a: &str, b: &str) -> bool {
        self.allowed_collisions.contains(&ordered_pair(a, b))
    }

    fn apply(&mut self, diff: &SceneDiff) -> Result<(), SceneError> {
        if !diff.is_diff {
            self.objects.clear();
            self.allowed_collisions.clear();
        }
        if !diff.name.is_empty() {
            self.name = diff.name.clone();
        }

        if !diff.robot_state.is_empty() {
            self.robot_state.apply_msg(&diff.robot_state)?;
        }
        // attached bodies leave the world
        let attached: Vec<String> = self
            .robot_state
            .attached_bodies()
            .map(|b| b.object.id.clone())
            .collect();
        for id in attached {
            self.objects.remove(&id);
        }

        for object in &diff.world.collision_objects {
            if object.id.is_empty() {
                return Err(SceneError::MissingObjectId);
            }
            match object.operation {
                ObjectOperation::Add => {
                    self.objects.insert(object.id.clone(), object.clone());
                }
                ObjectOperation::Remove => {
                    if self.objects.remove(&object.id).is_none() {
                        return Err(SceneError::UnknownObject(object.id.clone()));
                    }
                }
                ObjectOperation::Move => {
                    let existing = self
                        .objects
                        .get_mut(&object.id)
                        .ok_or_else(|| SceneError::UnknownObject(object.id.clone()))?;
                    existing.pose = object.pose;
                }
            }
        }

        for entry in &diff.allowed_collisions {
            let pair = ordered_pair(&entry.first, &entry.second);
            if entry.allowed {
                self.allowed_collisions.insert(pair);
            } else {
                self.allowed_collisions.remove(&pair);
            }
        }

        self.revision += 1;
        Ok(())
    }
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

pub struct InMemorySceneMonitor {
    model: Arc<RobotModel>,
    scene: RwLock<PlanningScene>,
}

impl InMemorySceneMonitor {
    pub fn new(model: Arc<RobotModel>) -> Self {
        Self {
            scene: RwLock::new(PlanningScene::new(model.clone())),
            model,
        }
    }

    /// Start from a given robot state instead of the model defaults.
    pub fn with_state(state: RobotState) -> Self {
        let model = state.model().clone();
        let mut scene = PlanningScene::new(model.clone());
        scene.robot_state = state;
        Self {
            model,
            scene: RwLock::new(scene),
        }
    }

    /// Copy of the whole scene.
    pub async fn snapshot(&self) -> PlanningScene {
        self.scene.read().await.clone()
    }
}

#[async_trait::async_trait]
impl SceneMonitor for InMemorySceneMonitor {
    fn robot_model(&self) -> Arc<RobotModel> {
        self.model.clone()
    }

    async fn current_state(&self) -> RobotState {
        self.scene.read().await.robot_state.clone()
    }

    async fn apply_scene_diff(&self, diff: &SceneDiff) -> Result<(), SceneError> {
        let mut guard = self.scene.write().await;
        let mut next = guard.clone();
        next.apply(diff)?;
        *guard = next;
        tracing::debug!(revision = guard.revision, "scene diff applied");
        Ok(())
    }

    async fn update_current_state(&self, state: RobotState) {
        self.scene.write().await.robot_state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajexec_core::{AttachedBody, RobotStateMsg};
    use trajexec_model::{JointModel, RobotDescription};

    fn monitor() -> InMemorySceneMonitor {
        let model = RobotModel::from_description(
            RobotDescription::new("r")
                .link("hand")
                .joint(JointModel::revolute("a")),
        )
        .unwrap();
        InMemorySceneMonitor::new(Arc::new(model))
    }

    #[tokio::test]
    async fn add_move_remove_objects() {
        let monitor = monitor();
        let add = SceneDiff::partial().with_object(CollisionObject::new("box", "world"));
        monitor.apply_scene_diff(&add).await.unwrap();
        assert!(monitor.snapshot().await.objects.contains_key("box"));

        let mut moved = CollisionObject::new("box", "world").with_operation(ObjectOperation::Move);
        moved.pose.translation = [0.5, 0.0, 0.0];
        monitor
            .apply_scene_diff(&SceneDiff::partial().with_object(moved))
            .await
            .unwrap();
        assert_eq!(monitor.snapshot().await.objects["box"].pose.translation[0], 0.5);

        let remove = SceneDiff::partial()
            .with_object(CollisionObject::new("box", "world").with_operation(ObjectOperation::Remove));
        monitor.apply_scene_diff(&remove).await.unwrap();
        let scene = monitor.snapshot().await;
        assert!(scene.objects.is_empty());
        assert_eq!(scene.revision, 3);
    }

    #[tokio::test]
    async fn removing_unknown_object_fails_atomically() {
        let monitor = monitor();
        let diff = SceneDiff::partial()
            .allow_collision("hand", "table")
            .with_object(CollisionObject::new("ghost", "world").with_operation(ObjectOperation::Remove));
        let err = monitor.apply_scene_diff(&diff).await.unwrap_err();
        assert!(matches!(err, SceneError::UnknownObject(id) if id == "ghost"));
        let scene = monitor.snapshot().await;
        assert!(!scene.is_collision_allowed("hand", "table"));
        assert_eq!(scene.revision, 0);
    }

    #[tokio::test]
    async fn attaching_moves_object_out_of_world() {
        let monitor = monitor();
        monitor
            .apply_scene_diff(&SceneDiff::partial().with_object(CollisionObject::new("cup", "world")))
            .await
            .unwrap();
        let attach = SceneDiff::partial().with_robot_state(
            RobotStateMsg {
                is_diff: true,
                ..Default::default()
            }
            .attach(AttachedBody::new("hand", CollisionObject::new("cup", "hand"))),
        );
        monitor.apply_scene_diff(&attach).await.unwrap();
        let scene = monitor.snapshot().await;
        assert!(scene.objects.is_empty());
        assert!(scene.robot_state.attached_body("cup").is_some());
    }

    #[tokio::test]
    async fn allowed_collisions_are_symmetric() {
        let monitor = monitor();
        monitor
            .apply_scene_diff(&SceneDiff::partial().allow_collision("table", "hand"))
            .await
            .unwrap();
        assert!(monitor.snapshot().await.is_collision_allowed("hand", "table"));
    }
}
