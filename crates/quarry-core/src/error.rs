use std::sync::Arc;

use thiserror::Error;

/// Shared form of a user factory's error, so one failure can be handed to
/// every waiter of the same computation.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Error)]
pub enum QuarryError {
    // Registration errors
    #[error("duplicate add of factory {0}")]
    DuplicateFactory(String),

    #[error("duplicate add of dependency on {parent} to {child}")]
    DuplicateDependency { parent: String, child: String },

    #[error("depending {parent} on {child} creates a cycle")]
    CycleDetected { parent: String, child: String },

    // Resolution errors
    #[error("factory {0} does not exist")]
    FactoryNotFound(String),

    #[error("factory {name}, depended upon by {parent}, does not exist")]
    DependencyNotFound { name: String, parent: String },

    /// Failure returned by a user factory, displayed verbatim.
    #[error("{0}")]
    Execution(#[source] SharedError),

    #[error("factory {0} panicked")]
    Panicked(String),

    #[error("resolution cancelled")]
    Cancelled,

    #[error("resolution deadline exceeded")]
    DeadlineExceeded,

    // Value access errors
    #[error("value {name} has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("dependency {0} was not resolved")]
    MissingDependency(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),
}

impl QuarryError {
    /// Wrap an arbitrary error raised inside a factory.
    pub fn execution(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Execution(Arc::from(err.into()))
    }

    /// True for errors caused by cancellation or an expired deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FactoryNotFound(_) | Self::DependencyNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, QuarryError>;
