use std::fmt;

/// Result type for carpilot operations
pub type Result<T> = std::result::Result<T, PilotError>;

/// Main error type for the training engine
#[derive(Debug, Clone, PartialEq)]
pub enum PilotError {
    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Replay buffer holds fewer transitions than requested
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// Invalid action
    InvalidAction {
        action: usize,
        num_actions: usize,
    },

    /// Numerical computation errors
    NumericalError(String),

    /// IO errors (file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),
}

impl fmt::Display for PilotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PilotError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            PilotError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            PilotError::InsufficientData { requested, available } => {
                write!(
                    f,
                    "Insufficient data: requested {} transitions, buffer holds {}",
                    requested, available
                )
            }
            PilotError::InvalidAction { action, num_actions } => {
                write!(f, "Invalid action {}: must be less than {}", action, num_actions)
            }
            PilotError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            PilotError::IoError(msg) => write!(f, "IO error: {}", msg),
            PilotError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for PilotError {}

impl From<std::io::Error> for PilotError {
    fn from(err: std::io::Error) -> Self {
        PilotError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for PilotError {
    fn from(err: bincode::Error) -> Self {
        PilotError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for PilotError {
    fn from(err: serde_json::Error) -> Self {
        PilotError::SerializationError(err.to_string())
    }
}

impl PilotError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        PilotError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        PilotError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
