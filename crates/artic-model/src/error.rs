//! Error types for the articulatory model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// The kind of named entity a failed lookup was searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A posture category.
    Category,
    /// A vocal-tract parameter.
    Parameter,
    /// A posture metadata symbol.
    Symbol,
    /// A posture.
    Posture,
    /// A named equation.
    Equation,
    /// A transition profile.
    Transition,
    /// A special transition profile.
    SpecialTransition,
}

impl EntityKind {
    /// Returns the entity kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Parameter => "parameter",
            EntityKind::Symbol => "symbol",
            EntityKind::Posture => "posture",
            EntityKind::Equation => "equation",
            EntityKind::Transition => "transition",
            EntityKind::SpecialTransition => "special transition",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by the model, its expression evaluators, and the
/// configuration loader.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Malformed configuration file.
    #[error("config error in {path}: {message}")]
    Config {
        /// File the error was found in.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// Formula expression parse error.
    #[error("formula parse error at position {position} of [{text}]: {message}")]
    FormulaParse {
        /// Byte position of the offending token.
        position: usize,
        /// The full expression text.
        text: String,
        /// Description of the problem.
        message: String,
    },

    /// Boolean expression parse error.
    #[error("boolean expression parse error at position {position} of [{text}]: {message}")]
    BooleanParse {
        /// Byte position of the offending token.
        position: usize,
        /// The full expression text.
        text: String,
        /// Description of the problem.
        message: String,
    },

    /// A named entity does not exist in the model.
    #[error("{kind} not found: {name}")]
    Lookup {
        /// What was being looked up.
        kind: EntityKind,
        /// The name that failed to resolve.
        name: String,
    },

    /// An index is out of range for the model.
    #[error("invalid {kind} index: {index}")]
    InvalidIndex {
        /// What the index refers to.
        kind: EntityKind,
        /// The out-of-range index.
        index: usize,
    },

    /// The model failed validation.
    #[error("invalid model: rule {rule_number}: {message}")]
    InvalidModel {
        /// 1-based rule number.
        rule_number: usize,
        /// Description of the problem.
        message: String,
    },

    /// I/O error while loading or saving configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error while writing the model file.
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),
}

impl ModelError {
    /// Creates a configuration error.
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a lookup error.
    pub fn lookup(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::Lookup {
            kind,
            name: name.into(),
        }
    }

    /// Creates an invalid-model error for the given 1-based rule number.
    pub fn invalid_model(rule_number: usize, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            rule_number,
            message: message.into(),
        }
    }
}
