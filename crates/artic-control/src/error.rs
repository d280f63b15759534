//! Error types for the synthesis controller.

use thiserror::Error;

/// Result type for controller operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while turning a phonetic string into parameter
/// frames.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Error from the articulatory model or its configuration.
    #[error(transparent)]
    Model(#[from] artic_model::ModelError),

    /// Malformed phonetic string.
    #[error("phonetic string error at index {index}: {message}")]
    PhoneticString {
        /// Byte index in the input string.
        index: usize,
        /// Description of the problem.
        message: String,
    },

    /// Malformed pho1 input.
    #[error("pho1 input error at line {line}: {message}")]
    Pho1 {
        /// 1-based input line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// No rule matched a posture window.
    #[error("no matching rule for posture window starting at posture {posture_index}")]
    NoMatchingRule {
        /// Index of the first posture of the window.
        posture_index: usize,
    },

    /// A transition profile is inconsistent with the rule applying it.
    #[error("inconsistent transition in rule {rule_number}: {message}")]
    InconsistentTransition {
        /// 1-based rule number.
        rule_number: usize,
        /// Description of the problem.
        message: String,
    },

    /// I/O error while reading configuration or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Creates a phonetic-string error.
    pub fn phonetic(index: usize, message: impl Into<String>) -> Self {
        Self::PhoneticString {
            index,
            message: message.into(),
        }
    }

    /// Creates a pho1 input error.
    pub fn pho1(line: usize, message: impl Into<String>) -> Self {
        Self::Pho1 {
            line,
            message: message.into(),
        }
    }
}
