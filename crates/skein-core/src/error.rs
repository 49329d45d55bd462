use crate::dtype::DType;
use crate::shape::Shape;

/// All errors that can occur within skein.
///
/// A single error type is shared by the value layer and the state-threading
/// layer, so a failure inside a user's stateful function propagates through
/// `pure` and `jit` unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// State or randomness was accessed without an installed invocation
    /// context, or a scope segment is malformed.
    #[error("scope error: {message}")]
    Scope { message: String },

    /// A write would change the shape of an existing state entry.
    #[error("shape mismatch at {path}: expected {expected}, got {got}")]
    ShapeMismatch {
        path: String,
        expected: Shape,
        got: Shape,
    },

    /// A write would change the element type of an existing state entry.
    #[error("dtype mismatch at {path}: expected {expected}, got {got}")]
    DTypeMismatch {
        path: String,
        expected: DType,
        got: DType,
    },

    /// Element count mismatch when creating an array from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCount {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Two shapes cannot be broadcast together.
    #[error("shapes {lhs} and {rhs} are not broadcast-compatible")]
    Broadcast { lhs: Shape, rhs: Shape },

    /// Invalid configuration: unhashable static argument, bad module name,
    /// unknown static argument name.
    #[error("config error: {message}")]
    Config { message: String },

    /// Arguments do not match the declared signature of a function.
    #[error("call error in {function}: {message}")]
    Call { function: String, message: String },

    /// A state entry was read while creation of new entries is disabled.
    #[error("state entry {path} does not exist and creation is disabled")]
    MissingState { path: String },

    /// A cached compiled program created state entries that its first
    /// execution did not create.
    #[error("compiled program {function} created new state entries after its first run: {added:?}")]
    StateKeysChanged { function: String, added: Vec<String> },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Scope,
    Shape,
    Config,
    Call,
    State,
    Other,
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    pub fn scope(message: impl Into<String>) -> Self {
        Error::Scope {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn call(function: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Call {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Which family of failure this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Scope { .. } => ErrorKind::Scope,
            Error::ShapeMismatch { .. }
            | Error::DTypeMismatch { .. }
            | Error::ElementCount { .. }
            | Error::Broadcast { .. } => ErrorKind::Shape,
            Error::Config { .. } => ErrorKind::Config,
            Error::Call { .. } => ErrorKind::Call,
            Error::MissingState { .. } | Error::StateKeysChanged { .. } => ErrorKind::State,
            Error::Msg(_) => ErrorKind::Other,
        }
    }
}

/// Convenience Result type used throughout skein.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
