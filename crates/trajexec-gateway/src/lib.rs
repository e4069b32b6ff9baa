//! Trajexec Gateway - goal-based action interface in front of the execution coordinator

pub mod client;
pub mod error;
pub mod server;

pub use client::{ActionClient, GoalHandle};
pub use error::{GatewayError, Result};
pub use server::{ActionServer, ServerConfig};
