//! Trajexec Model - kinematic model, actuator groups, robot state, and trajectories

pub mod error;
pub mod model;
pub mod state;
pub mod trajectory;

pub use error::{ModelError, Result};
pub use model::{ActuatorGroup, GroupDescription, JointModel, JointType, Mimic, RobotDescription, RobotModel};
pub use state::RobotState;
pub use trajectory::{RobotTrajectory, Waypoint, MAX_TIME_FROM_START};
