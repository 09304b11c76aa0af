//! Error types for netaction
//!
//! Two layers: [`CapabilityError`] is what the host network stack reports,
//! [`ActionError`] is what a single action invocation reports to its caller.

use std::io;
use thiserror::Error;

/// Failures reported by a [`NetworkCapability`](crate::capability::NetworkCapability)
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// Address is already assigned
    #[error("address already assigned: {0}")]
    AddressConflict(String),
    /// Route already exists
    #[error("route already exists: {0}")]
    RouteConflict(String),
    /// Interface not found
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),
    /// Prefix rejected by the OS
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
    /// Route destination rejected by the OS
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    /// Insufficient privileges
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Command execution failed
    #[error("{}", command_failed_message(.cmd, .code, .stderr))]
    CommandFailed {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// OS output could not be understood
    #[error("parse error: {0}")]
    Parse(String),
    /// Not supported on this host
    #[error("not supported: {0}")]
    NotSupported(String),
}

fn command_failed_message(cmd: &str, code: &Option<i32>, stderr: &str) -> String {
    match code {
        Some(code) => format!("command '{}' failed with code {}: {}", cmd, code, stderr.trim()),
        None => format!("command '{}' failed: {}", cmd, stderr.trim()),
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(error: serde_json::Error) -> Self {
        CapabilityError::Parse(error.to_string())
    }
}

/// Failures of a single action invocation
#[derive(Error, Debug)]
pub enum ActionError {
    /// Argument payload is not a JSON object
    #[error("malformed argument payload: {0}")]
    PayloadParse(String),
    /// Action name not in the registry
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    /// Required argument absent
    #[error("missing required argument '{0}'")]
    MissingArgument(String),
    /// Argument present but of the wrong type or shape
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    /// Adapter record carries neither an admin status nor an enabled flag
    #[error("adapter '{0}' reports no administrative status")]
    AdapterStatusUnavailable(String),
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
    /// Host network stack failure
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

impl ActionError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ActionError::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable taxonomy name of this error
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::PayloadParse(_) => "PayloadParseError",
            ActionError::UnknownAction(_) => "UnknownAction",
            ActionError::MissingArgument(_) => "MissingArgument",
            ActionError::InvalidArgument { .. } => "InvalidArgument",
            ActionError::AdapterStatusUnavailable(_) => "AdapterStatusUnavailable",
            ActionError::Config(_) => "ConfigError",
            ActionError::Capability(_) => "CapabilityError",
        }
    }
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;
pub type NetResult<T> = Result<T, ActionError>;
