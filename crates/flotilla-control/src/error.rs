//! Error types for flotilla-control.

use std::fmt;
use std::time::Duration;

/// Result type alias using [`ControlError`].
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur while orchestrating a platform deployment.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Neither local configuration nor the registry supplied a version.
    #[error("no version could be resolved for module {module}")]
    ModuleVersionUnresolved {
        /// Module name.
        module: String,
    },

    /// A registry id could not be split into name and version.
    #[error("invalid module id: {0}")]
    InvalidModuleId(String),

    /// Every port in the allocation range has been handed out.
    #[error("port range [{start}, {end}) exhausted")]
    PortRangeExhausted {
        /// First port of the range.
        start: u16,
        /// One past the last port of the range.
        end: u16,
    },

    /// A port was claimed twice within one run.
    #[error("port {port} is already reserved")]
    PortConflict {
        /// The contested port.
        port: u16,
    },

    /// A module points at a local artifact path that does not exist.
    #[error("module {module} has an invalid local path: {path}")]
    InvalidLocalPath {
        /// Module name.
        module: String,
        /// Configured path.
        path: String,
    },

    /// Container runtime failure.
    #[error("container runtime error: {0}")]
    Runtime(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An external service answered with an unexpected status.
    #[error("{service} returned {status}: {body}")]
    Api {
        /// Service that was called.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Message broker administration failure.
    #[error("broker error: {0}")]
    Broker(String),

    /// One or more modules never became ready.
    #[error("modules not ready: {}", modules.join(", "))]
    ReadinessTimeout {
        /// Names of the modules that failed their probes.
        modules: Vec<String>,
    },

    /// The capability propagation signal never reached quiescence.
    #[error("consumer group {group} not quiescent after {waited:?}")]
    SagaTimeout {
        /// Consumer group that was polled.
        group: String,
        /// Time spent polling.
        waited: Duration,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ControlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised before any container is touched.
    Configuration,
    /// Container runtime, HTTP or broker failure.
    ExternalCall,
    /// Readiness gate failed.
    ReadinessTimeout,
    /// Capability-set quiescence wait exceeded.
    SagaTimeout,
    /// Bug or broken invariant.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::ExternalCall => "external call",
            Self::ReadinessTimeout => "readiness timeout",
            Self::SagaTimeout => "saga timeout",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl ControlError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a container runtime error.
    #[must_use]
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Create a broker error.
    #[must_use]
    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::ModuleVersionUnresolved { .. }
            | Self::InvalidModuleId(_)
            | Self::PortRangeExhausted { .. }
            | Self::PortConflict { .. }
            | Self::InvalidLocalPath { .. } => ErrorKind::Configuration,
            Self::Runtime(_)
            | Self::Http(_)
            | Self::Api { .. }
            | Self::Broker(_)
            | Self::Io(_)
            | Self::Serialisation(_) => ErrorKind::ExternalCall,
            Self::ReadinessTimeout { .. } => ErrorKind::ReadinessTimeout,
            Self::SagaTimeout { .. } => ErrorKind::SagaTimeout,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialisation(err.to_string())
    }
}
