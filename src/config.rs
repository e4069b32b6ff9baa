//! Trajexec configuration: `[execution]`, `[simulation]`, `[server]` and `[logging]`
//! sections of one TOML file. Command-line flags override the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use trajexec_gateway::ServerConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrajexecConfig {
    pub execution: ExecutionConfig,
    pub simulation: SimulationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// When false every goal is aborted before a plan is built.
    pub allow_trajectory_execution: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Factor applied to trajectory durations. 0 runs without sleeping.
    pub time_scale: f64,
    /// Controllers that report failure when asked to run a trajectory.
    pub failing_controllers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ============================================================
// Defaults
// ============================================================

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            allow_trajectory_execution: true,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            failing_controllers: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "trajexec=info".into(),
            json: false,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl TrajexecConfig {
    /// Read `path`. A missing or unparsable file yields the defaults, which allow execution.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                info!(path = %path.display(), "no trajexec config ({}), trajectory execution enabled", e);
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    execution = config.execution.allow_trajectory_execution,
                    time_scale = config.simulation.time_scale,
                    "trajexec config loaded"
                );
                config
            }
            Err(e) => {
                warn!(path = %path.display(), "ignoring invalid trajexec config: {}", e);
                Self::default()
            }
        }
    }

    /// Render as TOML, e.g. for `trajexec default-config`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
