//! Error types for Larder container operations.
//!
//! Every failure the container itself detects is a [`LarderError`] whose
//! message names the identifier involved. Errors raised by factories and
//! cleaners travel through the container untouched.

use std::fmt;

use larder_support::rendering::render_suggestions;

use crate::id::AnyId;

/// Main error type for all Larder operations.
#[derive(Debug, thiserror::Error)]
pub enum LarderError {
    /// `get`/`resolve` on an identifier that has no loader.
    #[error("Cannot create instance of {id} because no loader is registered.{}", Hint(.suggestions))]
    LoaderNotFound {
        id: AnyId,
        /// Descriptions of registered identifiers that look alike.
        suggestions: Vec<String>,
    },

    /// Resolution re-entered an identifier whose factory is still running.
    #[error("Infinite loop detected for {id}.")]
    CycleDetected { id: AnyId },

    /// Cleanup targeted an identifier whose factory is still running.
    #[error("Cannot cleanup {id} while creating an instance.")]
    CleanupDuringConstruction { id: AnyId },

    /// Synchronous `get` on an identifier registered with an async factory.
    #[error("Cannot create instance of {id} synchronously because its loader is async. Use resolve() instead.")]
    AsyncLoader { id: AnyId },

    /// A stored instance is not of the type its identifier promises.
    #[error("Instance of {id} is not a {expected}.")]
    TypeMismatch { id: AnyId, expected: &'static str },

    /// Failure raised by user code inside a factory or cleaner.
    #[error(transparent)]
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl LarderError {
    /// Wraps an arbitrary error raised by a factory or cleaner.
    ///
    /// ```
    /// use larder_container::LarderError;
    ///
    /// let err = LarderError::custom("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        LarderError::Failed(error.into())
    }

    /// The identifier the container complained about, if any.
    pub fn id(&self) -> Option<AnyId> {
        match self {
            LarderError::LoaderNotFound { id, .. }
            | LarderError::CycleDetected { id }
            | LarderError::CleanupDuringConstruction { id }
            | LarderError::AsyncLoader { id }
            | LarderError::TypeMismatch { id, .. } => Some(*id),
            LarderError::Failed(_) => None,
        }
    }
}

struct Hint<'a>(&'a [String]);

impl fmt::Display for Hint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match render_suggestions(self.0) {
            Some(hint) => write!(f, "\n  Hint: {hint}"),
            None => Ok(()),
        }
    }
}

/// Convenient Result type for Larder operations.
pub type Result<T> = std::result::Result<T, LarderError>;
