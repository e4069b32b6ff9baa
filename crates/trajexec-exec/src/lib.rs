//! Trajexec Exec - turns a solution into an executable plan and drives it to a terminal outcome

pub mod builder;
pub mod coordinator;
pub mod effect;
pub mod engine;
pub mod plan;
pub mod scene;

pub use builder::PlanBuilder;
pub use coordinator::{CoordinatorState, ExecutionCoordinator, EXECUTION_DISABLED_TEXT};
pub use effect::{CompletionEffect, FeedbackSink};
pub use engine::{DispatchError, ExecutionEngine, ExecutionReport, SequentialEngine, TrajectoryDispatcher};
pub use plan::{ExecutablePlan, ExecutableSegment};
pub use scene::{InMemorySceneMonitor, PlanningScene, SceneError, SceneMonitor};
