//! Error types for the delivery pipeline

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration, surfaced synchronously at registration time
    #[error("invalid configuration for {component}: {message}")]
    Configuration { component: String, message: String },

    /// Destination registered for batch delivery without a batch implementation
    #[error("destination '{destination}' does not support batch delivery")]
    BatchUnsupported { destination: String },

    /// A destination's log/batch call failed; isolated to its worker
    #[error("destination '{destination}' write failed: {message}")]
    DestinationWrite {
        destination: String,
        message: String,
    },

    /// Worker gave up after exhausting its retry budget
    #[error("destination '{destination}' worker stopped after {attempts} failed attempts")]
    RetryExhausted {
        destination: String,
        attempts: usize,
    },

    /// Unrecoverable error; stops the worker without retrying
    #[error("fatal processing error: {0}")]
    Fatal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a batch-unsupported error
    pub fn batch_unsupported(destination: impl Into<String>) -> Self {
        Error::BatchUnsupported {
            destination: destination.into(),
        }
    }

    /// Create a destination write error
    pub fn destination_write(
        destination: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::DestinationWrite {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create a retry-exhausted error
    pub fn retry_exhausted(destination: impl Into<String>, attempts: usize) -> Self {
        Error::RetryExhausted {
            destination: destination.into(),
            attempts,
        }
    }

    /// Create a fatal error that skips the retry loop
    pub fn fatal(message: impl Into<String>) -> Self {
        Error::Fatal(message.into())
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Error::Other(message.into())
    }

    /// Whether this error stops a worker immediately instead of retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}
