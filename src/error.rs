/// Centralized error types for codenav using thiserror
///
/// The taxonomy matters to the aggregation engine: transport failures make a
/// tier abstain, unresolvable identifiers are dropped silently, missing
/// backend capabilities degrade to slower paths, and only contract
/// violations propagate to the caller.
use thiserror::Error;

/// Main error type for the navigation system
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Unresolvable {kind}: {name}")]
    Unresolvable { kind: IdentifierKind, name: String },

    #[error("Backend does not expose capability: {0}")]
    CapabilityAbsent(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

/// What kind of identifier failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Repository,
    Package,
    Revision,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierKind::Repository => write!(f, "repository"),
            IdentifierKind::Package => write!(f, "package"),
            IdentifierKind::Revision => write!(f, "revision"),
        }
    }
}

/// Errors related to configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Invalid config value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Whether an error should make a tier abstain rather than fail the request
///
/// Transport failures and unresolvable identifiers are never fatal to a
/// navigation request; the engine falls through to the next tier as if the
/// failing tier had yielded nothing.
pub fn is_abstention(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<NavError>(),
        Some(NavError::Transport(_))
            | Some(NavError::Unresolvable { .. })
            | Some(NavError::CapabilityAbsent(_))
    )
}
