//! Sentinel error taxonomy for the component runtime.
//!
//! Every fallible core operation returns one of these variants. Callers test
//! for a specific failure with the `is_*` predicates rather than matching on
//! the enum directly, so that wrapping (e.g. via `#[from]` at a crate
//! boundary) never breaks a caller's classification of the underlying cause.

use thiserror::Error;

/// Result type alias used throughout `gpud-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Sentinel error variants (§4.10).
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied input was malformed or empty where required.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No component/plugin/resource with that name is registered.
    #[error("not found: {0}")]
    NotFound(String),

    /// A component/plugin with that name is already registered.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The operation cannot proceed given the component's current
    /// capabilities or state (e.g. deregistering a non-deregisterable
    /// component).
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// The runtime cannot currently service the request (e.g. shutting
    /// down).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The requested capability is not implemented by this component.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The operation was cancelled before it completed.
    #[error("canceled: {0}")]
    Canceled(String),

    /// The operation's deadline elapsed before it completed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Any other failure that doesn't fit a more specific sentinel.
    #[error("unknown: {0}")]
    Unknown(String),
}

impl Error {
    /// Walks `self` and its `std::error::Error::source()` chain, returning
    /// `true` as soon as one link satisfies `pred`. This is what lets the
    /// `is_*` predicates below honor wrapping: a future `#[from]`/`#[source]`
    /// that nests an `Error` inside another still classifies correctly.
    fn matches_chain(&self, pred: impl Fn(&Error) -> bool) -> bool {
        use std::error::Error as _;

        let mut current: &dyn std::error::Error = self;
        loop {
            if let Some(err) = current.downcast_ref::<Error>() {
                if pred(err) {
                    return true;
                }
            }
            match current.source() {
                Some(source) => current = source,
                None => return false,
            }
        }
    }

    /// `true` if this error (or anything it wraps) is [`Error::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.matches_chain(|e| matches!(e, Error::NotFound(_)))
    }

    /// `true` if this error (or anything it wraps) is [`Error::AlreadyExists`].
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        self.matches_chain(|e| matches!(e, Error::AlreadyExists(_)))
    }

    /// `true` if this error (or anything it wraps) is [`Error::InvalidArgument`].
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        self.matches_chain(|e| matches!(e, Error::InvalidArgument(_)))
    }

    /// `true` if this error (or anything it wraps) is [`Error::FailedPrecondition`].
    #[must_use]
    pub fn is_failed_precondition(&self) -> bool {
        self.matches_chain(|e| matches!(e, Error::FailedPrecondition(_)))
    }

    /// `true` if this error (or anything it wraps) is [`Error::DeadlineExceeded`].
    #[must_use]
    pub fn is_deadline_exceeded(&self) -> bool {
        self.matches_chain(|e| matches!(e, Error::DeadlineExceeded(_)))
    }

    /// `true` if this error (or anything it wraps) is [`Error::Canceled`].
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.matches_chain(|e| matches!(e, Error::Canceled(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_their_own_variant_only() {
        let e = Error::NotFound("disk".into());
        assert!(e.is_not_found());
        assert!(!e.is_already_exists());
    }

    #[test]
    fn predicates_honor_a_wrapping_error() {
        #[derive(Debug)]
        struct Wrapper(Error);

        impl std::fmt::Display for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "wrapped: {}", self.0)
            }
        }

        impl std::error::Error for Wrapper {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let wrapped: Box<dyn std::error::Error> = Box::new(Wrapper(Error::NotFound("disk".into())));
        let inner = wrapped
            .source()
            .and_then(|e| e.downcast_ref::<Error>())
            .expect("source should downcast to Error");
        assert!(inner.is_not_found());
    }

    #[test]
    fn display_includes_the_message() {
        let e = Error::InvalidArgument("components parameter is required".into());
        assert_eq!(
            e.to_string(),
            "invalid argument: components parameter is required"
        );
    }
}
