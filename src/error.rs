use std::time::Duration;

use thiserror::Error;

/// Structural problems with an action payload.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("malformed action: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failures reported by a platform automation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("`{selector}` not visible after {timeout:?}")]
    Timeout { selector: String, timeout: Duration },

    #[error("browser: {0}")]
    Cdp(String),

    #[error("blocking browser call panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl BackendError {
    pub fn cdp(err: impl std::fmt::Display) -> Self {
        Self::Cdp(err.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Hard failures from executing a single action.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{tool}: target `{selector}` never became visible")]
    TargetTimeout { tool: String, selector: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0} executor is not implemented")]
    NotImplemented(&'static str),
}

/// A run that ended because one of its steps failed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("step {step} failed ({tool} on {target}): {source}")]
    StepFailed {
        step: usize,
        tool: String,
        target: String,
        #[source]
        source: ExecError,
    },
}

/// Top-level errors surfaced to the caller of the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
