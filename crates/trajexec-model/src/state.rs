//! Working robot state: joint positions, multi-DOF transforms, attached bodies

use crate::error::{ModelError, Result};
use crate::model::RobotModel;
use std::collections::BTreeMap;
use std::sync::Arc;
use trajexec_core::{AttachedBody, ObjectOperation, RobotStateMsg, Transform};

#[derive(Clone, Debug)]
pub struct RobotState {
    model: Arc<RobotModel>,
    positions: BTreeMap<String, f64>,
    transforms: BTreeMap<String, Transform>,
    attached: BTreeMap<String, AttachedBody>,
}

impl RobotState {
    /// Default state: every position 0.0, every multi-DOF joint at identity.
    pub fn new(model: Arc<RobotModel>) -> Self {
        let mut positions = BTreeMap::new();
        let mut transforms = BTreeMap::new();
        for joint in model.joints() {
            if joint.is_multi_dof() {
                transforms.insert(joint.name.clone(), Transform::IDENTITY);
            } else if joint.has_position() {
                positions.insert(joint.name.clone(), 0.0);
            }
        }
        let mut state = Self {
            model,
            positions,
            transforms,
            attached: BTreeMap::new(),
        };
        state.update_mimic_joints();
        state
    }

    pub fn model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    pub fn position(&self, joint: &str) -> Option<f64> {
        self.positions.get(joint).copied()
    }

    pub fn transform(&self, joint: &str) -> Option<&Transform> {
        self.transforms.get(joint)
    }

    pub fn positions(&self) -> &BTreeMap<String, f64> {
        &self.positions
    }

    pub fn attached_body(&self, id: &str) -> Option<&AttachedBody> {
        self.attached.get(id)
    }

    pub fn attached_bodies(&self) -> impl Iterator<Item = &AttachedBody> {
        self.attached.values()
    }

    /// Set a single-DOF joint and every joint that mimics it.
    pub fn set_position(&mut self, joint: &str, value: f64) -> Result<()> {
        let model = self
            .model
            .joint(joint)
            .ok_or_else(|| ModelError::UnknownJoint(joint.to_string()))?;
        if !model.has_position() {
            return Err(ModelError::malformed_state(format!(
                "joint {} has no single position value",
                joint
            )));
        }
        if !value.is_finite() {
            return Err(ModelError::malformed_state(format!(
                "non-finite position {} for joint {}",
                value, joint
            )));
        }
        self.positions.insert(joint.to_string(), value);
        self.update_mimic_joints();
        Ok(())
    }

    pub fn set_transform(&mut self, joint: &str, transform: Transform) -> Result<()> {
        let model = self
            .model
            .joint(joint)
            .ok_or_else(|| ModelError::UnknownJoint(joint.to_string()))?;
        if !model.is_multi_dof() {
            return Err(ModelError::malformed_state(format!(
                "joint {} is not a multi-DOF joint",
                joint
            )));
        }
        if !transform.is_finite() {
            return Err(ModelError::malformed_state(format!(
                "non-finite transform for joint {}",
                joint
            )));
        }
        self.transforms.insert(joint.to_string(), transform);
        Ok(())
    }

    pub fn attach(&mut self, body: AttachedBody) -> Result<()> {
        if !self.model.has_link(&body.link_name) {
            return Err(ModelError::UnknownLink(body.link_name));
        }
        self.attached.insert(body.object.id.clone(), body);
        Ok(())
    }

    pub fn detach(&mut self, id: &str) -> Option<AttachedBody> {
        self.attached.remove(id)
    }

    /// Advance the state by a robot-state message.
    ///
    /// All-or-nothing: on error the state is left untouched. A full (non-diff)
    /// message replaces the set of attached bodies; a partial one only adds or
    /// removes the bodies it names.
    pub fn apply_msg(&mut self, msg: &RobotStateMsg) -> Result<()> {
        let mut next = self.clone();

        let js = &msg.joint_state;
        if js.name.len() != js.position.len() {
            return Err(ModelError::malformed_state(format!(
                "joint_state has {} names but {} positions",
                js.name.len(),
                js.position.len()
            )));
        }
        for (name, &value) in js.name.iter().zip(&js.position) {
            next.set_position(name, value).map_err(into_malformed)?;
        }

        let mdof = &msg.multi_dof_joint_state;
        if mdof.joint_names.len() != mdof.transforms.len() {
            return Err(ModelError::malformed_state(format!(
                "multi_dof_joint_state has {} names but {} transforms",
                mdof.joint_names.len(),
                mdof.transforms.len()
            )));
        }
        for (name, transform) in mdof.joint_names.iter().zip(&mdof.transforms) {
            next.set_transform(name, *transform).map_err(into_malformed)?;
        }

        if !msg.is_diff {
            next.attached.clear();
        }
        for body in &msg.attached_collision_objects {
            match body.object.operation {
                ObjectOperation::Remove => {
                    next.detach(&body.object.id);
                }
                ObjectOperation::Add | ObjectOperation::Move => {
                    next.attach(body.clone()).map_err(into_malformed)?;
                }
            }
        }

        *self = next;
        Ok(())
    }

    /// Take the values of `joints` from `other` and keep everything else.
    pub fn merge_joints<S: AsRef<str>>(&mut self, other: &RobotState, joints: &[S]) {
        for joint in joints {
            let joint = joint.as_ref();
            if let Some(&value) = other.positions.get(joint) {
                self.positions.insert(joint.to_string(), value);
            }
            if let Some(transform) = other.transforms.get(joint) {
                self.transforms.insert(joint.to_string(), *transform);
            }
        }
        self.update_mimic_joints();
    }

    fn update_mimic_joints(&mut self) {
        for joint in self.model.joints() {
            let Some(mimic) = &joint.mimic else { continue };
            if !joint.has_position() {
                continue;
            }
            if let Some(&target) = self.positions.get(&mimic.joint) {
                self.positions
                    .insert(joint.name.clone(), mimic.multiplier * target + mimic.offset);
            }
        }
    }
}

fn into_malformed(err: ModelError) -> ModelError {
    match err {
        ModelError::MalformedState(_) => err,
        other => ModelError::MalformedState(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JointModel, JointType, RobotDescription};
    use trajexec_core::CollisionObject;

    fn model() -> Arc<RobotModel> {
        Arc::new(
            RobotModel::from_description(
                RobotDescription::new("r")
                    .link("base")
                    .link("hand")
                    .joint(JointModel::new("base_joint", JointType::Floating))
                    .joint(JointModel::revolute("j1"))
                    .joint(JointModel::revolute("finger"))
                    .joint(JointModel::revolute("finger_mirror").mimicking("finger"))
                    .joint(JointModel::fixed("flange")),
            )
            .unwrap(),
        )
    }

    #[test]
    fn defaults() {
        let state = RobotState::new(model());
        assert_eq!(state.position("j1"), Some(0.0));
        assert_eq!(state.position("flange"), None);
        assert_eq!(state.transform("base_joint"), Some(&Transform::IDENTITY));
    }

    #[test]
    fn mimic_follows_target() {
        let mut state = RobotState::new(model());
        state.set_position("finger", 0.4).unwrap();
        assert_eq!(state.position("finger_mirror"), Some(0.4));
    }

    #[test]
    fn apply_msg_sets_positions_and_attaches() {
        let mut state = RobotState::new(model());
        let msg = RobotStateMsg::default()
            .with_joint_positions([("j1", 1.25)])
            .attach(AttachedBody::new("hand", CollisionObject::new("cup", "hand")));
        state.apply_msg(&msg).unwrap();
        assert_eq!(state.position("j1"), Some(1.25));
        assert!(state.attached_body("cup").is_some());
    }

    #[test]
    fn apply_msg_is_atomic() {
        let mut state = RobotState::new(model());
        let msg = RobotStateMsg::default().with_joint_positions([("j1", 1.0), ("nope", 2.0)]);
        let err = state.apply_msg(&msg).unwrap_err();
        assert!(matches!(err, ModelError::MalformedState(_)));
        assert_eq!(state.position("j1"), Some(0.0));
    }

    #[test]
    fn apply_msg_rejects_length_mismatch() {
        let mut state = RobotState::new(model());
        let mut msg = RobotStateMsg::default();
        msg.joint_state.name = vec!["j1".into()];
        assert!(state.apply_msg(&msg).is_err());
    }

    #[test]
    fn apply_msg_rejects_unknown_link() {
        let mut state = RobotState::new(model());
        let msg = RobotStateMsg::default()
            .attach(AttachedBody::new("elbow", CollisionObject::new("cup", "elbow")));
        assert!(state.apply_msg(&msg).is_err());
    }

    #[test]
    fn partial_msg_keeps_other_attachments() {
        let mut state = RobotState::new(model());
        state
            .attach(AttachedBody::new("hand", CollisionObject::new("cup", "hand")))
            .unwrap();

        let partial = RobotStateMsg {
            is_diff: true,
            ..RobotStateMsg::default()
        }
        .attach(AttachedBody::new("base", CollisionObject::new("tray", "base")));
        state.apply_msg(&partial).unwrap();
        assert_eq!(state.attached_bodies().count(), 2);

        let full = RobotStateMsg::default()
            .attach(AttachedBody::new("base", CollisionObject::new("tray", "base")));
        state.apply_msg(&full).unwrap();
        assert_eq!(state.attached_bodies().count(), 1);
        assert!(state.attached_body("cup").is_none());
    }

    #[test]
    fn remove_operation_detaches() {
        let mut state = RobotState::new(model());
        state
            .attach(AttachedBody::new("hand", CollisionObject::new("cup", "hand")))
            .unwrap();
        let msg = RobotStateMsg {
            is_diff: true,
            ..RobotStateMsg::default()
        }
        .attach(AttachedBody::new(
            "hand",
            CollisionObject::new("cup", "hand").with_operation(ObjectOperation::Remove),
        ));
        state.apply_msg(&msg).unwrap();
        assert!(state.attached_body("cup").is_none());
    }

    #[test]
    fn merge_takes_only_named_joints() {
        let mut current = RobotState::new(model());
        current.set_position("j1", 0.3).unwrap();
        let mut moved = RobotState::new(model());
        moved.set_position("j1", 1.0).unwrap();
        moved.set_position("finger", 0.4).unwrap();

        current.merge_joints(&moved, &["finger"]);
        assert_eq!(current.position("j1"), Some(0.3));
        assert_eq!(current.position("finger"), Some(0.4));
        assert_eq!(current.position("finger_mirror"), Some(0.4));
    }
}
