use std::fmt;

/// Result type for fcnet operations
pub type Result<T> = std::result::Result<T, NetError>;

/// Main error type for the fcnet library
#[derive(Debug, Clone, PartialEq)]
pub enum NetError {
    /// Input or parameter shapes that do not line up
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid constructor or configuration value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Class label outside `[0, num_classes)`
    InvalidLabel {
        label: usize,
        num_classes: usize,
    },

    /// Parameter name that is malformed or not present in the store
    UnknownParameter(String),

    /// IO errors (file operations)
    Io(String),

    /// Serialization/deserialization errors
    Serialization(String),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            NetError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            NetError::InvalidLabel { label, num_classes } => {
                write!(f, "Invalid label {}: must be less than {}", label, num_classes)
            }
            NetError::UnknownParameter(name) => write!(f, "Unknown parameter '{}'", name),
            NetError::Io(msg) => write!(f, "IO error: {}", msg),
            NetError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for NetError {}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        NetError::Io(err.to_string())
    }
}

impl From<bincode::Error> for NetError {
    fn from(err: bincode::Error) -> Self {
        NetError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        NetError::Serialization(err.to_string())
    }
}

// Helper functions for common error patterns
impl NetError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        NetError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        NetError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
