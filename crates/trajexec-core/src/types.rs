//! Message types for a computed solution and the scene changes it carries

use serde::{Deserialize, Serialize};

/// An ordered sequence of sub-trajectories. Order is execution order.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Solution {
    pub task_id: String,
    pub sub_trajectory: Vec<SubTrajectory>,
}

impl Solution {
    pub fn new(sub_trajectory: Vec<SubTrajectory>) -> Self {
        Self {
            task_id: String::new(),
            sub_trajectory,
        }
    }

    pub fn len(&self) -> usize {
        self.sub_trajectory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_trajectory.is_empty()
    }

    /// Parse a solution from its JSON form.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Bookkeeping attached to a sub-trajectory by the planner.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolutionInfo {
    pub id: u32,
    pub cost: f64,
    pub comment: String,
}

/// Controllers a sub-trajectory should be executed with.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionInfo {
    pub controller_names: Vec<String>,
}

/// One step of a solution: a trajectory plus the scene change that holds once it finished.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubTrajectory {
    pub info: SolutionInfo,
    pub execution_info: ExecutionInfo,
    pub trajectory: TrajectoryMsg,
    pub scene_diff: SceneDiff,
}

impl SubTrajectory {
    pub fn new(trajectory: TrajectoryMsg) -> Self {
        Self {
            trajectory,
            ..Default::default()
        }
    }

    /// A step that moves nothing and only changes the scene.
    pub fn scene_change(diff: SceneDiff) -> Self {
        Self {
            scene_diff: diff,
            ..Default::default()
        }
    }

    pub fn with_controllers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execution_info.controller_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scene_diff(mut self, diff: SceneDiff) -> Self {
        self.scene_diff = diff;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.info.comment = comment.into();
        self
    }
}

/// Trajectory over single-DOF and multi-DOF joints.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrajectoryMsg {
    pub joint_trajectory: JointTrajectory,
    pub multi_dof_joint_trajectory: MultiDofJointTrajectory,
}

impl TrajectoryMsg {
    pub fn single_dof(joint_trajectory: JointTrajectory) -> Self {
        Self {
            joint_trajectory,
            multi_dof_joint_trajectory: MultiDofJointTrajectory::default(),
        }
    }

    /// Every joint name the trajectory references, single-DOF joints first.
    pub fn joint_names(&self) -> Vec<String> {
        let mut names = self.joint_trajectory.joint_names.clone();
        names.extend(self.multi_dof_joint_trajectory.joint_names.iter().cloned());
        names
    }

    /// Number of waypoints, the longer of the two component trajectories.
    pub fn point_count(&self) -> usize {
        self.joint_trajectory
            .points
            .len()
            .max(self.multi_dof_joint_trajectory.points.len())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JointTrajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<JointTrajectoryPoint>,
}

impl JointTrajectory {
    pub fn new<I, S>(joint_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            joint_names: joint_names.into_iter().map(Into::into).collect(),
            points: Vec::new(),
        }
    }

    /// Append a waypoint reached `time_from_start` seconds after the trajectory starts.
    pub fn point(mut self, positions: Vec<f64>, time_from_start: f64) -> Self {
        self.points.push(JointTrajectoryPoint {
            positions,
            velocities: Vec::new(),
            time_from_start,
        });
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JointTrajectoryPoint {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    /// Seconds since trajectory start.
    pub time_from_start: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MultiDofJointTrajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<MultiDofJointTrajectoryPoint>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MultiDofJointTrajectoryPoint {
    pub transforms: Vec<Transform>,
    pub time_from_start: f64,
}

/// Rigid transform: translation plus unit quaternion `[x, y, z, w]`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Transform {
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: [x, y, z],
            ..Self::IDENTITY
        }
    }

    pub fn is_finite(&self) -> bool {
        self.translation.iter().chain(self.rotation.iter()).all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JointState {
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

impl JointState {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.position.is_empty()
            && self.velocity.is_empty()
            && self.effort.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MultiDofJointState {
    pub joint_names: Vec<String>,
    pub transforms: Vec<Transform>,
}

impl MultiDofJointState {
    pub fn is_empty(&self) -> bool {
        self.joint_names.is_empty() && self.transforms.is_empty()
    }
}

/// What to do with a collision object.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectOperation {
    #[default]
    Add,
    Remove,
    Move,
}

/// Collision geometry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Box { size: [f64; 3] },
    Sphere { radius: f64 },
    Cylinder { height: f64, radius: f64 },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollisionObject {
    pub id: String,
    pub frame_id: String,
    pub pose: Transform,
    pub shapes: Vec<Shape>,
    pub operation: ObjectOperation,
}

impl CollisionObject {
    pub fn new(id: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frame_id: frame_id.into(),
            ..Default::default()
        }
    }

    pub fn with_operation(mut self, operation: ObjectOperation) -> Self {
        self.operation = operation;
        self
    }
}

/// A collision object rigidly attached to a robot link.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttachedBody {
    pub link_name: String,
    pub object: CollisionObject,
    pub touch_links: Vec<String>,
}

impl AttachedBody {
    pub fn new(link_name: impl Into<String>, object: CollisionObject) -> Self {
        Self {
            link_name: link_name.into(),
            object,
            touch_links: Vec::new(),
        }
    }
}

/// Robot state as carried by messages. `is_diff` marks a partial update.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RobotStateMsg {
    pub joint_state: JointState,
    pub multi_dof_joint_state: MultiDofJointState,
    pub attached_collision_objects: Vec<AttachedBody>,
    pub is_diff: bool,
}

impl RobotStateMsg {
    /// True when the message carries no values at all. `is_diff` is not considered.
    pub fn is_empty(&self) -> bool {
        self.joint_state.is_empty()
            && self.multi_dof_joint_state.is_empty()
            && self.attached_collision_objects.is_empty()
    }

    pub fn with_joint_positions<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (name, position) in values {
            self.joint_state.name.push(name.into());
            self.joint_state.position.push(position);
        }
        self
    }

    pub fn attach(mut self, body: AttachedBody) -> Self {
        self.attached_collision_objects.push(body);
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldDiff {
    pub collision_objects: Vec<CollisionObject>,
}

impl WorldDiff {
    pub fn is_empty(&self) -> bool {
        self.collision_objects.is_empty()
    }
}

/// Allowed-collision entry between two bodies.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AllowedCollision {
    pub first: String,
    pub second: String,
    pub allowed: bool,
}

/// Scene changes to apply once a sub-trajectory finished.
///
/// Joint state must never be set through a diff: it only advances by executing
/// trajectories. [`SceneDiff::strip_joint_state`] enforces that before a diff is applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneDiff {
    pub name: String,
    pub robot_state: RobotStateMsg,
    pub world: WorldDiff,
    pub allowed_collisions: Vec<AllowedCollision>,
    pub is_diff: bool,
}

impl SceneDiff {
    /// An empty partial diff.
    pub fn partial() -> Self {
        Self {
            is_diff: true,
            ..Default::default()
        }
    }

    /// True when applying the diff would change nothing. `is_diff` is not considered.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.robot_state.is_empty()
            && self.world.is_empty()
            && self.allowed_collisions.is_empty()
    }

    /// Drop joint and multi-DOF joint values and turn the robot state into a partial update.
    pub fn strip_joint_state(&mut self) {
        self.robot_state.joint_state = JointState::default();
        self.robot_state.multi_dof_joint_state = MultiDofJointState::default();
        self.robot_state.is_diff = true;
    }

    pub fn with_robot_state(mut self, robot_state: RobotStateMsg) -> Self {
        self.robot_state = robot_state;
        self
    }

    pub fn with_object(mut self, object: CollisionObject) -> Self {
        self.world.collision_objects.push(object);
        self
    }

    pub fn allow_collision(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.allowed_collisions.push(AllowedCollision {
            first: first.into(),
            second: second.into(),
            allowed: true,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_names_single_dof_first() {
        let traj = TrajectoryMsg {
            joint_trajectory: JointTrajectory::new(["a", "b"]),
            multi_dof_joint_trajectory: MultiDofJointTrajectory {
                joint_names: vec!["base".into()],
                points: vec![],
            },
        };
        assert_eq!(traj.joint_names(), vec!["a", "b", "base"]);
    }

    #[test]
    fn strip_leaves_only_joint_values_out() {
        let mut diff = SceneDiff::partial().with_robot_state(
            RobotStateMsg::default()
                .with_joint_positions([("a", 1.0)])
                .attach(AttachedBody::new("hand", CollisionObject::new("cup", "hand"))),
        );
        diff.strip_joint_state();
        assert!(diff.robot_state.joint_state.is_empty());
        assert!(diff.robot_state.is_diff);
        assert_eq!(diff.robot_state.attached_collision_objects.len(), 1);
        assert!(!diff.is_empty());
    }

    #[test]
    fn diff_with_only_joint_state_is_empty_after_strip() {
        let mut diff =
            SceneDiff::default().with_robot_state(RobotStateMsg::default().with_joint_positions([("a", 0.3)]));
        assert!(!diff.is_empty());
        diff.strip_joint_state();
        assert!(diff.is_empty());
    }

    #[test]
    fn emptiness_ignores_is_diff_flag() {
        assert!(SceneDiff::partial().is_empty());
        assert!(SceneDiff::default().is_empty());
    }
}
