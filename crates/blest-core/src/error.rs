//! Error types for the BLEST runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by a route handler and carried back in the result tuple.
///
/// This is the wire-shaped error: `message` and `statusCode` always, `code`
/// when the handler supplied a machine-readable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BlestError {
    /// Human-readable error message.
    pub message: String,
    /// HTTP-style status code, defaults to 500.
    pub status_code: u16,
    /// Optional machine-readable error code (e.g. `NOT_FOUND`).
    pub code: Option<String>,
}

impl BlestError {
    /// Creates an error with status 500 and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 500,
            code: None,
        }
    }

    /// Sets the status code. Values of 0 fall back to 500.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = if status_code > 0 { status_code } else { 500 };
        self
    }

    /// Sets the machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The error substituted for calls to unregistered routes.
    pub fn not_found() -> Self {
        Self::new("Not Found").with_status(404).with_code("NOT_FOUND")
    }
}

/// Wire representation of a handler error inside a result tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<BlestError> for ErrorObject {
    fn from(err: BlestError) -> Self {
        Self {
            message: err.message,
            status_code: err.status_code,
            code: err.code,
        }
    }
}

/// Reason a route name was rejected.
///
/// The `Display` text is the diagnostic surfaced to the registering caller and
/// to batch-shape validation; each variant names the specific rule that
/// failed rather than restating the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteNameError {
    #[error("Route is required")]
    Missing,
    #[error("Route should be at least two characters long")]
    TooShort,
    #[error("Route should start with a letter")]
    BadStart,
    #[error("Route should end with a letter or a number")]
    BadEnd,
    #[error("Route should contain only letters, numbers, dashes, underscores, and forward slashes")]
    IllegalCharacters,
    #[error("System route should be at least three characters long")]
    SystemTooShort,
    #[error("System route should start with an underscore")]
    SystemBadStart,
    #[error("System route should end with a letter or a number")]
    SystemBadEnd,
    #[error("System route should contain only letters, numbers, dashes, underscores, and forward slashes")]
    SystemIllegalCharacters,
    #[error("Sub-routes should be at least two characters long")]
    SegmentTooShort,
    #[error("Sub-routes should start with a letter")]
    SegmentBadStart,
    #[error("Sub-routes should end with a letter or a number")]
    SegmentBadEnd,
}

/// Errors raised while configuring a router.
///
/// These are startup faults: the process is expected to propagate them and
/// exit, not to recover.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The route name failed the grammar check.
    #[error("{0}")]
    InvalidRouteName(#[from] RouteNameError),

    /// The route name is already registered.
    #[error("Route already exists: {route}")]
    DuplicateRoute { route: String },

    /// A route was registered without any handlers.
    #[error("At least one handler is required")]
    NoHandlers,

    /// A controller was passed where only middleware/afterware are accepted.
    #[error("Only middleware and afterware can be registered router-wide")]
    ControllerNotAllowed,

    /// A route timeout of zero was supplied via `describe`.
    #[error("Timeout should be a positive integer")]
    InvalidTimeout,

    /// The router being merged or namespaced has no routes.
    #[error("No routes to merge")]
    NothingToMerge,

    /// A merge or namespace would overwrite an existing route.
    #[error("Cannot merge duplicate routes: {route}")]
    MergeCollision { route: String },

    /// `describe` was called for a route that does not exist.
    #[error("Route does not exist: {route}")]
    UnknownRoute { route: String },
}

/// Batch-shape error: aborts the whole batch with a single top-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BatchError {
    /// HTTP status code for the response (400 for shape errors).
    pub code: u16,
    pub message: String,
}

impl BatchError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: 400,
            message: message.into(),
        }
    }
}

/// Result type for router configuration.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
