use std::{error::Error, fmt, io};

use tokio::task::JoinError;

use crate::params::DataKind;

/// The parameter server's result type.
pub type Result<T> = std::result::Result<T, ServerErr>;

/// Errors surfaced to the users of a `ParameterServer`.
#[derive(Debug)]
pub enum ServerErr {
    /// The server could not be constructed.
    Config(ConfigErr),
    /// A worker id outside of `0..workers` was used.
    InvalidWorker { worker_id: usize, workers: usize },
    /// The aggregation service is no longer running.
    Stopped,
    /// The aggregation service terminated with a failure.
    Service(ServiceErr),
}

impl fmt::Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::InvalidWorker { worker_id, workers } => {
                write!(f, "invalid worker id {worker_id}, expected one in 0..{workers}")
            }
            Self::Stopped => f.write_str("the aggregation service is not running"),
            Self::Service(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ServerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Service(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigErr> for ServerErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<ServiceErr> for ServerErr {
    fn from(value: ServiceErr) -> Self {
        Self::Service(value)
    }
}

/// Configuration failures, always detected before the aggregation service starts.
#[derive(Debug)]
pub enum ConfigErr {
    NoWorkers,
    UnknownFunction { name: String },
    InputArity { function: String, got: usize },
    MissingInput { function: String, input: &'static str },
    OutputArity { function: String, got: usize },
    OutputType { function: String, got: DataKind },
    Spec(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWorkers => f.write_str("the parameter server needs at least one worker"),
            Self::UnknownFunction { name } => write!(f, "function '{name}' is not registered"),
            Self::InputArity { function, got } => write!(
                f,
                "the '{function}' function should take two inputs (model and gradients), got {got}"
            ),
            Self::MissingInput { function, input } => {
                write!(f, "the '{function}' function is missing the '{input}' input")
            }
            Self::OutputArity { function, got } => write!(
                f,
                "the output of the '{function}' function should provide one list containing the updated model, got {got} outputs"
            ),
            Self::OutputType { function, got } => write!(
                f,
                "the output of the '{function}' function should be of type list, got {got}"
            ),
            Self::Spec(e) => write!(f, "malformed spec: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ConfigErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spec(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Spec(value)
    }
}

impl From<io::Error> for ConfigErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Failures raised by an aggregator invocation.
#[derive(Debug)]
pub enum AggregateErr {
    MissingEntry { name: String },
    LengthMismatch { name: String, got: usize, expected: usize },
    MalformedOutput { function: String, got: DataKind },
    Failed(Box<dyn Error + Send + Sync>),
}

impl AggregateErr {
    /// Wraps an arbitrary user error raised inside an aggregation function.
    pub fn failed<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self::Failed(err.into())
    }
}

impl fmt::Display for AggregateErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEntry { name } => write!(f, "the model has no entry named '{name}'"),
            Self::LengthMismatch {
                name,
                got,
                expected,
            } => write!(
                f,
                "length mismatch for entry '{name}': got {got}, expected {expected}"
            ),
            Self::MalformedOutput { function, got } => write!(
                f,
                "the '{function}' function returned a {got} instead of a list"
            ),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl Error for AggregateErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed(e) => Some(&**e),
            _ => None,
        }
    }
}

/// Fatal failures of the aggregation service, it never retries any of them.
#[derive(Debug)]
pub enum ServiceErr {
    Aggregation {
        worker_id: usize,
        source: AggregateErr,
    },
    Broadcast {
        worker_id: usize,
    },
    Panicked(String),
}

impl fmt::Display for ServiceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregation { worker_id, source } => write!(
                f,
                "aggregation service failed: error aggregating the gradients of worker_{worker_id}: {source}"
            ),
            Self::Broadcast { worker_id } => write!(
                f,
                "aggregation service failed: the model channel of worker_{worker_id} is closed"
            ),
            Self::Panicked(msg) => write!(f, "aggregation service failed: {msg}"),
        }
    }
}

impl Error for ServiceErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Aggregation { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<JoinError> for ServiceErr {
    fn from(value: JoinError) -> Self {
        Self::Panicked(value.to_string())
    }
}
