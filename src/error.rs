//! Unified error type.
//!
//! Two families share one enum. Configuration errors surface from
//! [`App::build`](crate::App::build) and must abort startup — they are never
//! produced at request time. Request errors are always recovered at the
//! dispatcher boundary by the resolved error handler; none of them may cross
//! from one request's chain into another's.

use crate::method::Method;

/// Boxed error for handler failures and body-stream faults.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type for route compilation and request processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Configuration (startup) ─────────────────────────────────────────────
    /// A route annotation was built from an argument shape the classifier
    /// does not accept.
    #[error("invalid route argument: {0}")]
    InvalidRouteArgument(String),

    /// A binding spec named a parameter source outside the supported
    /// vocabulary.
    #[error("parameter source `{0}` is not supported")]
    UnsupportedSource(String),

    /// A binding spec named a transform tag outside the supported vocabulary.
    #[error("transform `{0}` is not supported")]
    UnsupportedTransform(String),

    /// A schema or byte limit was attached to a verb that cannot carry a body.
    #[error("cannot use a request body with {method} routes")]
    BodyNotAllowed { method: Method },

    /// Two binding specs claimed the same argument index.
    #[error("duplicate binding for parameter index {0}")]
    DuplicateBinding(usize),

    /// Two routes resolved to the same verb + path with distinct
    /// documentation fragments.
    #[error("cannot reset documentation for route {path} ({method})")]
    DuplicateDocumentation { method: Method, path: String },

    /// A compiled route path was malformed (e.g. an unnamed path parameter).
    #[error("invalid route path `{0}`")]
    InvalidPath(String),

    // ── Request time ────────────────────────────────────────────────────────
    /// The request body exceeded the configured byte limit.
    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    /// The request body could not be parsed in the declared input format.
    #[error("failed to parse request body: {0}")]
    Parse(String),

    /// The parsed body failed the configured schema.
    #[error("schema validation failed: {0}")]
    Validation(String),

    /// A parameter value could not be coerced by its transform.
    #[error("cannot transform parameter `{name}`: {reason}")]
    Transform { name: String, reason: String },

    /// The transport failed while the body was being read.
    #[error("error reading request body: {0}")]
    Body(#[source] BoxError),

    /// A middleware or handler raised an application error.
    #[error("handler error: {0}")]
    Handler(#[source] BoxError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps an application error raised inside a handler or middleware.
    pub fn handler(error: impl Into<BoxError>) -> Self {
        Self::Handler(error.into())
    }

    /// `true` for errors that can only occur while compiling routes.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::InvalidRouteArgument(_)
                | Self::UnsupportedSource(_)
                | Self::UnsupportedTransform(_)
                | Self::BodyNotAllowed { .. }
                | Self::DuplicateBinding(_)
                | Self::DuplicateDocumentation { .. }
                | Self::InvalidPath(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_are_flagged() {
        assert!(Error::UnsupportedSource("cookie".into()).is_startup());
        assert!(Error::BodyNotAllowed { method: Method::Get }.is_startup());
        assert!(!Error::PayloadTooLarge.is_startup());
        assert!(!Error::Parse("bad json".into()).is_startup());
    }
}
