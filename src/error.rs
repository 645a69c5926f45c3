//! Error types and error handling strategy for Freshet.
//!
//! Error handling follows these principles:
//!
//! - Library operations return typed errors (`Error`/`ErrorKind`).
//! - At pipeline boundaries errors travel as an opaque, cheaply clonable
//!   value ([`Failure`]) so stages of different concrete types compose.
//! - Panics raised inside a user `next` callback are captured as a
//!   [`PanicPayload`] and routed into the error channel; panics inside
//!   `error`/`complete` callbacks are discipline violations and abort.

use core::fmt;
use std::any::Any;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Attempt to create state on a stopped lifetime.
    LifetimeStopped,
    /// A starter was driven more than once for the same program.
    AlreadyStarted,
    /// User-provided error.
    User,
}

/// The main error type for Freshet operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error reports an operation on a stopped lifetime.
    #[must_use]
    pub const fn is_lifetime_stopped(&self) -> bool {
        matches!(self.kind, ErrorKind::LifetimeStopped)
    }

    /// Adds context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// A specialized Result type for Freshet operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Payload captured from a panicking user callback.
///
/// Carries the panic message when one can be extracted, so the failure stays
/// legible after crossing the error channel.
#[derive(Debug, Clone)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Captures the payload returned by `std::panic::catch_unwind`.
    #[must_use]
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic of unknown type".to_owned());
        Self { message }
    }

    /// Creates a payload from a plain message.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

impl std::error::Error for PanicPayload {}

/// Conversion from a captured panic into an error-channel value.
///
/// The typed observer flavors catch panics raised by user `next` callbacks
/// and route them through the error channel; any error type flowing through
/// a pipeline stage that hosts user callbacks must provide this conversion.
pub trait FromPanic {
    /// Builds the error-channel value for a captured panic.
    fn from_panic(payload: PanicPayload) -> Self;
}

/// The opaque, erased error value used at pipeline boundaries.
///
/// `Failure` is cheap to clone and type-erases whatever concrete error a
/// producer raised, the same role an exception pointer plays at the
/// boundaries of the original design.
#[derive(Clone)]
pub struct Failure {
    inner: Arc<dyn std::error::Error + Send + Sync>,
}

impl Failure {
    /// Wraps a concrete error.
    #[must_use]
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Builds a failure from a plain message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Error::new(ErrorKind::User).with_context(message))
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn get(&self) -> &(dyn std::error::Error + Send + Sync) {
        self.inner.as_ref()
    }
}

impl FromPanic for Failure {
    fn from_panic(payload: PanicPayload) -> Self {
        Self::new(payload)
    }
}

impl FromPanic for Error {
    fn from_panic(payload: PanicPayload) -> Self {
        Self::new(ErrorKind::User).with_source(payload)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failure({})", self.inner)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref() as _)
    }
}

impl From<Error> for Failure {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_context() {
        let err = Error::new(ErrorKind::LifetimeStopped);
        assert_eq!(err.to_string(), "LifetimeStopped");
    }

    #[test]
    fn display_with_context() {
        let err = Error::new(ErrorKind::User).with_context("pipeline rejected value");
        assert_eq!(err.to_string(), "User: pipeline rejected value");
    }

    #[test]
    fn panic_payload_extracts_str_message() {
        let payload = PanicPayload::new(Box::new("boom"));
        assert_eq!(payload.message(), "boom");

        let payload = PanicPayload::new(Box::new(String::from("dynamic boom")));
        assert_eq!(payload.message(), "dynamic boom");
    }

    #[test]
    fn failure_round_trips_display() {
        let failure = Failure::msg("late to the party");
        assert!(failure.to_string().contains("late to the party"));
    }

    #[test]
    fn failure_from_panic_keeps_message() {
        let failure = Failure::from_panic(PanicPayload::from_message("next blew up"));
        assert!(failure.to_string().contains("next blew up"));
    }
}
