use std::fmt;
use std::time::Duration;

/// Errors that can tell whether the same request may succeed if sent again.
pub trait Retryable {
    fn can_retry(&self) -> bool;
}

/// Classification of a single attempt's failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendErrorKind {
    /// Dial or send failed.
    Transport,
    /// The connection never became healthy within the attempt budget.
    NotReady,
    /// The remote handler returned a business error.
    Application,
    /// The connection was closed by its owner while the call was pending.
    ConnectionClosed,
    /// The overall send deadline elapsed with the attempt still outstanding.
    DeadlineExceeded,
}

impl SendErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::NotReady => "not ready",
            Self::Application => "application",
            Self::ConnectionClosed => "connection closed",
            Self::DeadlineExceeded => "deadline exceeded",
        }
    }
}

impl fmt::Display for SendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one attempt against one replica.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct SendError {
    kind: SendErrorKind,
    message: String,
    retryable: bool,
}

impl SendError {
    pub fn new(kind: SendErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn transport(address: &str, cause: impl fmt::Display) -> Self {
        Self::new(
            SendErrorKind::Transport,
            format!("rpc to {address} failed: {cause}"),
            true,
        )
    }

    pub fn not_ready(address: &str) -> Self {
        Self::new(
            SendErrorKind::NotReady,
            format!("connection to {address} is not ready"),
            true,
        )
    }

    /// Business error; `retryable` is what the remote declared, if anything.
    pub fn application(message: impl Into<String>, retryable: Option<bool>) -> Self {
        Self::new(
            SendErrorKind::Application,
            message,
            retryable.unwrap_or(false),
        )
    }

    pub fn connection_closed(address: &str) -> Self {
        Self::new(
            SendErrorKind::ConnectionClosed,
            format!("rpc to {address} failed as client connection was closed"),
            false,
        )
    }

    pub fn deadline_exceeded(outstanding: usize, timeout: Duration) -> Self {
        Self::new(
            SendErrorKind::DeadlineExceeded,
            format!("{outstanding} outstanding attempt(s) gave no response within {timeout:?}"),
            true,
        )
    }

    /// Classifies a failed remote call made against `address`.
    pub fn from_call(address: &str, err: CallError) -> Self {
        match err {
            CallError::Transport(cause) => Self::transport(address, cause),
            CallError::Application { message, retryable } => {
                Self::application(format!("{address}: {message}"), retryable)
            }
        }
    }

    pub fn kind(&self) -> SendErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True for the "connection torn down mid-call" failure, which ends a
    /// send immediately instead of escalating.
    pub fn is_fatal(&self) -> bool {
        self.kind == SendErrorKind::ConnectionClosed
    }
}

impl Retryable for SendError {
    fn can_retry(&self) -> bool {
        self.retryable
    }
}

/// Error returned by an [`crate::RpcHandle`] for one remote call.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CallError {
    /// The request could not be delivered or the reply could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The remote handler ran and returned an error.
    #[error("remote error: {message}")]
    Application {
        message: String,
        /// Retryability declared by the remote, if any.
        retryable: Option<bool>,
    },
}

/// Every failure recorded during one unsuccessful send.
///
/// Retryable when at least one constituent failure is. An aggregate with no
/// constituents means nothing could be attempted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AggregateFailure {
    failures: Vec<SendError>,
}

impl AggregateFailure {
    pub fn new(failures: Vec<SendError>) -> Self {
        Self { failures }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[SendError] {
        &self.failures
    }

    pub fn last(&self) -> Option<&SendError> {
        self.failures.last()
    }

    /// Number of failures reported by replicas, leaving out the synthesized
    /// deadline entry.
    pub fn replica_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|err| err.kind() != SendErrorKind::DeadlineExceeded)
            .count()
    }
}

impl Retryable for AggregateFailure {
    fn can_retry(&self) -> bool {
        self.failures.iter().any(Retryable::can_retry)
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last() {
            Some(last) => write!(
                f,
                "sending to all {} replicas failed; last error: {}",
                self.failures.len(),
                last.message()
            ),
            None => f.write_str("no replicas were attempted"),
        }
    }
}

impl std::error::Error for AggregateFailure {}

/// Error type returned by [`crate::Dispatcher::send`].
#[derive(Clone, Debug, thiserror::Error)]
pub enum DispatchError {
    /// The replica set was empty; nothing was attempted.
    ///
    /// Not retryable: re-sending the same empty set cannot succeed, so the
    /// caller has to refresh its replica set first.
    #[error("insufficient replicas (0) to satisfy send request of 1")]
    NoCandidates,
    /// A connection was torn down while a call on it was pending.
    #[error("{0}")]
    ConnectionClosed(SendError),
    /// The overall timeout elapsed before any replica answered successfully.
    #[error(
        "send timed out after {timeout:?} with {} replica failure(s) recorded",
        .failures.replica_failures()
    )]
    DeadlineExceeded {
        timeout: Duration,
        /// Recorded failures plus one synthesized deadline failure.
        failures: AggregateFailure,
    },
    /// Every candidate failed.
    #[error("{0}")]
    Exhausted(AggregateFailure),
}

impl DispatchError {
    /// Per-attempt failures behind this error, in the order they were recorded.
    pub fn failures(&self) -> &[SendError] {
        match self {
            Self::NoCandidates => &[],
            Self::ConnectionClosed(err) => std::slice::from_ref(err),
            Self::DeadlineExceeded { failures, .. } | Self::Exhausted(failures) => {
                failures.failures()
            }
        }
    }
}

impl Retryable for DispatchError {
    fn can_retry(&self) -> bool {
        match self {
            Self::NoCandidates | Self::ConnectionClosed(_) => false,
            Self::DeadlineExceeded { .. } => true,
            Self::Exhausted(failures) => failures.can_retry(),
        }
    }
}
