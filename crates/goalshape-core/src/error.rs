//! Error types for goal evaluation

use thiserror::Error;

/// Core error type for goal setup and evaluation
#[derive(Error, Debug)]
pub enum GoalError {
    /// A predicate was invoked with an unsupported number of arguments
    #[error("Arity error: {predicate} accepts {expected} argument(s), got {actual}")]
    Arity {
        /// Predicate name
        predicate: String,
        /// Human readable description of the accepted arity
        expected: String,
        /// Number of arguments supplied
        actual: usize,
    },

    /// An argument had the wrong kind (object vs number, articulated vs plain)
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// An instance name did not follow the `<type>_<index>` convention
    #[error("Malformed object name: {0}")]
    MalformedName(String),

    /// Object or site not present in the registry
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// Predicate name not present in the predicate table
    #[error("Unknown predicate: {0}")]
    UnknownPredicate(String),

    /// No definition recorded for an object type
    #[error("Unknown object definition: {0}")]
    UnknownDefinition(String),

    /// The simulator has no entity with this name
    #[error("Simulator has no {kind} named {name}")]
    MissingEntity {
        /// Entity kind (body, site, joint, geom)
        kind: &'static str,
        /// Entity name
        name: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GoalError {
    /// Shorthand for a missing simulator entity
    pub fn missing(kind: &'static str, name: impl Into<String>) -> Self {
        Self::MissingEntity {
            kind,
            name: name.into(),
        }
    }

    /// Whether this error signals a misconfigured task rather than a runtime gap
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Arity { .. }
                | Self::TypeMismatch(_)
                | Self::MalformedName(_)
                | Self::UnknownObject(_)
                | Self::UnknownPredicate(_)
                | Self::UnknownDefinition(_)
        )
    }
}

/// Result type alias for goal operations
pub type Result<T> = std::result::Result<T, GoalError>;
