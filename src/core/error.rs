use thiserror::Error;

/// Core error types for portgate
#[derive(Debug, Error)]
pub enum Error {
    /// Text is not a valid dotted-quad IPv4 address (or address range)
    #[error("Invalid address: {input:?}")]
    InvalidAddress { input: String },

    /// Port is non-numeric, out of 0-65535, or an inverted range
    #[error("Invalid port: {input:?}")]
    InvalidPort { input: String },

    #[error("Unrecognized direction: {0:?} (expected inbound or outbound)")]
    UnrecognizedDirection(String),

    #[error("Unrecognized protocol: {0:?} (expected tcp or udp)")]
    UnrecognizedProtocol(String),

    /// Line does not have the expected field layout
    #[error("Malformed line: {reason}")]
    MalformedLine { reason: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_address(input: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
        }
    }

    pub(crate) fn invalid_port(input: impl Into<String>) -> Self {
        Self::InvalidPort {
            input: input.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedLine {
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag, used in JSON diagnostics
    pub const fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAddress { .. } => "invalid_address",
            Error::InvalidPort { .. } => "invalid_port",
            Error::UnrecognizedDirection(_) => "unrecognized_direction",
            Error::UnrecognizedProtocol(_) => "unrecognized_protocol",
            Error::MalformedLine { .. } => "malformed_line",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
