//! Error types for tutorchat.
//!
//! Every failure a tutoring session can observe is one of three families:
//! a fatal configuration problem, a failed generation call, or an upload
//! that could not be decoded.  All of them end the current action only; the
//! session stays usable afterwards.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for tutorchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// Required configuration is missing or invalid.  Fatal at start-up.
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// The remote generation call failed.
    Generation(GenerationError),

    /// An uploaded input could not be decoded.
    InputDecode {
        /// Which kind of input was rejected.
        kind: InputKind,
        /// Human-readable error message.
        message: String,
    },

    /// A generation call is already outstanding for this session.
    Busy {
        /// Human-readable error message.
        message: String,
    },

    /// A turn was offered where it does not belong, such as an
    /// assistant turn passed to `submit`.
    InvalidTurn {
        /// Human-readable error message.
        message: String,
    },

    /// There is no unresolved user turn to dispatch.
    NothingPending {
        /// Human-readable error message.
        message: String,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// Error during JSON or YAML serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

/// The kind of upload an [`Error::InputDecode`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// An uploaded image or an exported sketch.
    Image,
    /// A CSV upload.
    Table,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Image => write!(f, "image"),
            InputKind::Table => write!(f, "table"),
        }
    }
}

/// Classification of a failed generation call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// The credential was rejected (401).
    Authentication,
    /// The credential lacks access (403).
    Permission,
    /// Quota or rate limit exceeded (429).
    RateLimit,
    /// The provider rejected the request as malformed (400).
    BadRequest,
    /// Unknown model or endpoint (404).
    NotFound,
    /// The transport timed out.
    Timeout,
    /// The provider could not be reached.
    Connection,
    /// The provider failed internally (5xx).
    Server,
    /// The provider refused to answer the prompt.
    Blocked,
    /// The provider answered with a body that could not be understood.
    Malformed,
    /// Any other provider-side failure.
    Api,
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationErrorKind::Authentication => "authentication",
            GenerationErrorKind::Permission => "permission",
            GenerationErrorKind::RateLimit => "rate limit",
            GenerationErrorKind::BadRequest => "bad request",
            GenerationErrorKind::NotFound => "not found",
            GenerationErrorKind::Timeout => "timeout",
            GenerationErrorKind::Connection => "connection",
            GenerationErrorKind::Server => "server",
            GenerationErrorKind::Blocked => "blocked",
            GenerationErrorKind::Malformed => "malformed response",
            GenerationErrorKind::Api => "api",
        };
        write!(f, "{s}")
    }
}

/// A failed generation call, normalized from whatever the transport or the
/// provider reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationError {
    /// What went wrong.
    pub kind: GenerationErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code, when the provider answered.
    pub status_code: Option<u16>,
    /// Time to wait before retrying, in seconds, when the provider said so.
    pub retry_after: Option<u64>,
}

impl GenerationError {
    /// Creates a new generation error of the given kind.
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            retry_after: None,
        }
    }

    /// Attaches the HTTP status code.
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Attaches a retry-after hint in seconds.
    pub fn with_retry_after(mut self, retry_after: Option<u64>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Maps an HTTP status code and provider message to a generation error.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let kind = match status_code {
            400 => GenerationErrorKind::BadRequest,
            401 => GenerationErrorKind::Authentication,
            403 => GenerationErrorKind::Permission,
            404 => GenerationErrorKind::NotFound,
            408 => GenerationErrorKind::Timeout,
            429 => GenerationErrorKind::RateLimit,
            500..=599 => GenerationErrorKind::Server,
            _ => GenerationErrorKind::Api,
        };
        Self::new(kind, message).with_status_code(status_code)
    }

    /// Returns true if the same call could plausibly succeed later.
    ///
    /// Nothing in this crate retries on its own; this only helps the caller
    /// word its message.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            GenerationErrorKind::RateLimit
                | GenerationErrorKind::Timeout
                | GenerationErrorKind::Connection
                | GenerationErrorKind::Server
        )
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status_code, self.retry_after) {
            (Some(status), Some(retry_after)) => write!(
                f,
                "{} error (HTTP {status}): {} (retry after {retry_after} seconds)",
                self.kind, self.message
            ),
            (Some(status), None) => {
                write!(f, "{} error (HTTP {status}): {}", self.kind, self.message)
            }
            (None, _) => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl error::Error for GenerationError {}

impl Error {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new generation error.
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Error::Generation(GenerationError::new(kind, message))
    }

    /// Creates a new input decode error.
    pub fn input_decode(kind: InputKind, message: impl Into<String>) -> Self {
        Error::InputDecode {
            kind,
            message: message.into(),
        }
    }

    /// Creates a new busy error.
    pub fn busy(message: impl Into<String>) -> Self {
        Error::Busy {
            message: message.into(),
        }
    }

    /// Creates a new invalid-turn error.
    pub fn invalid_turn(message: impl Into<String>) -> Self {
        Error::InvalidTurn {
            message: message.into(),
        }
    }

    /// Creates a new nothing-pending error.
    pub fn nothing_pending(message: impl Into<String>) -> Self {
        Error::NothingPending {
            message: message.into(),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Returns true if this error came from a generation call.
    pub fn is_generation(&self) -> bool {
        matches!(self, Error::Generation(_))
    }

    /// Returns true if this error is an input decode error.
    pub fn is_input_decode(&self) -> bool {
        matches!(self, Error::InputDecode { .. })
    }

    /// Returns true if this error is a busy error.
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy { .. })
    }

    /// Returns true if this error rejected a turn.
    pub fn is_invalid_turn(&self) -> bool {
        matches!(self, Error::InvalidTurn { .. })
    }

    /// Returns the generation error, if this is one.
    pub fn as_generation(&self) -> Option<&GenerationError> {
        match self {
            Error::Generation(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration { message } => {
                write!(f, "Configuration error: {message}")
            }
            Error::Generation(err) => write!(f, "Generation failed: {err}"),
            Error::InputDecode { kind, message } => {
                write!(f, "Could not read {kind} input: {message}")
            }
            Error::Busy { message } => write!(f, "Busy: {message}"),
            Error::InvalidTurn { message } => write!(f, "Invalid turn: {message}"),
            Error::NothingPending { message } => write!(f, "Nothing to send: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Generation(err) => Some(err),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<GenerationError> for Error {
    fn from(err: GenerationError) -> Self {
        Error::Generation(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for tutorchat operations.
pub type Result<T> = std::result::Result<T, Error>;
