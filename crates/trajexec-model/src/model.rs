//! Kinematic model: joints with their flags, and actuator groups in registration order.
//!
//! The model is loaded once (from a YAML description or built in code) and shared
//! read-only behind an `Arc`. Group resolution for a trajectory lives here too:
//! a trajectory's joint set is executed through the first registered group that
//! covers it, where uncovered group members are tolerated only when they are not
//! independently actuated.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointType {
    Revolute,
    Continuous,
    Prismatic,
    Planar,
    Floating,
    Fixed,
}

impl JointType {
    pub fn is_multi_dof(self) -> bool {
        matches!(self, Self::Planar | Self::Floating)
    }
}

/// Mimic relationship: `position = multiplier * target + offset`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mimic {
    pub joint: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointModel {
    pub name: String,
    #[serde(rename = "type")]
    pub joint_type: JointType,
    #[serde(default)]
    pub passive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimic: Option<Mimic>,
}

impl JointModel {
    pub fn new(name: impl Into<String>, joint_type: JointType) -> Self {
        Self {
            name: name.into(),
            joint_type,
            passive: false,
            mimic: None,
        }
    }

    pub fn revolute(name: impl Into<String>) -> Self {
        Self::new(name, JointType::Revolute)
    }

    pub fn fixed(name: impl Into<String>) -> Self {
        Self::new(name, JointType::Fixed)
    }

    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    pub fn mimicking(mut self, target: impl Into<String>) -> Self {
        self.mimic = Some(Mimic {
            joint: target.into(),
            multiplier: 1.0,
            offset: 0.0,
        });
        self
    }

    pub fn is_multi_dof(&self) -> bool {
        self.joint_type.is_multi_dof()
    }

    pub fn is_fixed(&self) -> bool {
        self.joint_type == JointType::Fixed
    }

    /// False for passive, fixed and mimic joints: nothing commands them directly.
    pub fn is_actuated(&self) -> bool {
        !(self.passive || self.is_fixed() || self.mimic.is_some())
    }

    /// Single-DOF joints that carry a position value.
    pub(crate) fn has_position(&self) -> bool {
        !self.is_fixed() && !self.is_multi_dof()
    }
}

/// Named set of joints that can be executed together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActuatorGroup {
    name: String,
    joints: Vec<String>,
}

impl ActuatorGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joints
    }

    pub fn contains(&self, joint: &str) -> bool {
        self.joints.iter().any(|j| j == joint)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub name: String,
    pub joints: Vec<String>,
}

/// Serializable robot description, the input to [`RobotModel::from_description`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotDescription {
    pub name: String,
    pub links: Vec<String>,
    pub joints: Vec<JointModel>,
    pub groups: Vec<GroupDescription>,
}

impl RobotDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn link(mut self, name: impl Into<String>) -> Self {
        self.links.push(name.into());
        self
    }

    pub fn joint(mut self, joint: JointModel) -> Self {
        self.joints.push(joint);
        self
    }

    pub fn group<I, S>(mut self, name: impl Into<String>, joints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.push(GroupDescription {
            name: name.into(),
            joints: joints.into_iter().map(Into::into).collect(),
        });
        self
    }
}

#[derive(Debug)]
pub struct RobotModel {
    name: String,
    links: HashSet<String>,
    joints: Vec<JointModel>,
    joint_index: HashMap<String, usize>,
    groups: Vec<ActuatorGroup>,
}

impl RobotModel {
    /// Validate a description and build the model from it.
    pub fn from_description(desc: RobotDescription) -> Result<Self> {
        let mut joint_index = HashMap::with_capacity(desc.joints.len());
        for (i, joint) in desc.joints.iter().enumerate() {
            if joint_index.insert(joint.name.clone(), i).is_some() {
                return Err(ModelError::DuplicateJoint(joint.name.clone()));
            }
        }

        for joint in &desc.joints {
            if let Some(mimic) = &joint.mimic {
                if !joint_index.contains_key(&mimic.joint) {
                    return Err(ModelError::UnknownMimicTarget {
                        joint: joint.name.clone(),
                        target: mimic.joint.clone(),
                    });
                }
            }
        }

        let mut seen_groups = HashSet::new();
        let mut groups = Vec::with_capacity(desc.groups.len());
        for group in desc.groups {
            if !seen_groups.insert(group.name.clone()) {
                return Err(ModelError::DuplicateGroup(group.name));
            }
            if let Some(joint) = group.joints.iter().find(|j| !joint_index.contains_key(*j)) {
                return Err(ModelError::UnknownGroupJoint {
                    group: group.name.clone(),
                    joint: joint.clone(),
                });
            }
            groups.push(ActuatorGroup {
                name: group.name,
                joints: group.joints,
            });
        }

        Ok(Self {
            name: desc.name,
            links: desc.links.into_iter().collect(),
            joints: desc.joints,
            joint_index,
            groups,
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let desc: RobotDescription = serde_yaml::from_str(yaml)?;
        Self::from_description(desc)
    }

    /// Load a robot description from a YAML file.
    pub fn load_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_yaml_str(&content)?;
        tracing::info!(
            "Loaded robot model '{}' from {} ({} joints, {} groups)",
            model.name,
            path.display(),
            model.joints.len(),
            model.groups.len()
        );
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joint(&self, name: &str) -> Option<&JointModel> {
        self.joint_index.get(name).map(|&i| &self.joints[i])
    }

    pub fn joints(&self) -> &[JointModel] {
        &self.joints
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.links.contains(name)
    }

    /// Groups in registration order.
    pub fn groups(&self) -> &[ActuatorGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&ActuatorGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Find the group that executes exactly `joints`.
    ///
    /// A group matches when it contains every requested joint and each of its other
    /// joints is passive, fixed or a mimic joint. The first match in registration
    /// order wins, even when a smaller group would also match.
    pub fn find_actuator_group<S: AsRef<str>>(&self, joints: &[S]) -> Option<&ActuatorGroup> {
        let required: BTreeSet<&str> = joints.iter().map(AsRef::as_ref).collect();

        self.groups.iter().find(|group| {
            let members: BTreeSet<&str> = group.joints.iter().map(String::as_str).collect();
            if !required.is_subset(&members) {
                return false;
            }
            members
                .difference(&required)
                .all(|extra| self.joint(extra).is_some_and(|j| !j.is_actuated()))
        })
    }
}
