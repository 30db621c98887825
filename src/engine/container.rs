//! Container state as reported by the engine, and the attach preconditions
//! derived from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// Running.
    Running,
    /// Frozen by the engine.
    Paused,
    /// Exited or stopped.
    Stopped,
    /// Failed in a way the engine cannot recover from.
    Dead,
}

impl ContainerState {
    /// Return the lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine reports about a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container identifier.
    pub id: String,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// Whether the container was created with a terminal.
    #[serde(default)]
    pub tty: bool,
    /// Whether the container keeps stdin open for attached clients.
    #[serde(default)]
    pub open_stdin: bool,
    /// Exit code of the last run, once the container has stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
}

fn invalid_state(info: &ContainerInfo, reason: &str) -> EngineError {
    EngineError::InvalidState {
        container_id: info.id.clone(),
        state: info.state.to_string(),
        reason: String::from(reason),
    }
}

/// Check that `info` describes a container that can be started and
/// attached to in one step.
///
/// # Errors
///
/// Returns [`EngineError::InvalidState`] for running, paused, and dead
/// containers.
pub fn check_startable(info: &ContainerInfo) -> Result<(), EngineError> {
    match info.state {
        ContainerState::Created | ContainerState::Stopped => Ok(()),
        ContainerState::Running => Err(invalid_state(
            info,
            "it is already running; use `attach` instead",
        )),
        ContainerState::Paused => Err(invalid_state(
            info,
            "unpause the container before starting it",
        )),
        ContainerState::Dead => Err(invalid_state(info, "dead containers cannot be started")),
    }
}

/// Check that `info` describes a container that can be attached to.
///
/// # Errors
///
/// Returns [`EngineError::InvalidState`] unless the container is running.
pub fn check_attachable(info: &ContainerInfo) -> Result<(), EngineError> {
    match info.state {
        ContainerState::Running => Ok(()),
        ContainerState::Paused => Err(invalid_state(
            info,
            "unpause the container before attaching",
        )),
        ContainerState::Created | ContainerState::Stopped => Err(invalid_state(
            info,
            "only running containers can be attached; use `start --attach`",
        )),
        ContainerState::Dead => Err(invalid_state(info, "dead containers cannot be attached")),
    }
}
