//! Trajexec - executes precomputed motion-plan solutions segment by segment

pub mod config;
pub mod runtime;
pub mod sim;

pub use config::{ExecutionConfig, LoggingConfig, SimulationConfig, TrajexecConfig};
pub use runtime::Runtime;
pub use sim::SimulatedDispatcher;
