//! Unified error handling for the trip pipeline.
//!
//! Degenerate inputs are mostly handled by short-circuit results; the variants
//! here cover the conditions that must be surfaced to the caller.

use thiserror::Error;

/// Errors raised by the trip-construction pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TripError {
    /// An operation needs more points than it was given.
    #[error("{context}: got {point_count} points, need at least {minimum_required}")]
    InsufficientPoints {
        context: String,
        point_count: usize,
        minimum_required: usize,
    },

    /// Transportation-mode inference was requested without a classifier.
    #[error("transportation mode inference requires a classifier")]
    MissingClassifier,

    /// The injected classifier failed or returned an unusable answer.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// A numeric step produced a singular matrix, NaN or infinity.
    #[error("numerical instability: {context}")]
    NumericalInstability { context: String },

    /// Timestamps go backwards where strict order is required.
    #[error("timestamps are not monotonic at index {index}")]
    NonMonotonicTime { index: usize },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The canonical-trip store rejected an insert or update.
    #[error("canonical store error: {0}")]
    Store(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TripError>;

impl TripError {
    pub fn insufficient_points(
        context: impl Into<String>,
        point_count: usize,
        minimum_required: usize,
    ) -> Self {
        Self::InsufficientPoints {
            context: context.into(),
            point_count,
            minimum_required,
        }
    }

    pub fn numerical(context: impl Into<String>) -> Self {
        Self::NumericalInstability {
            context: context.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Convert `Option`s into pipeline errors.
pub trait OptionExt<T> {
    /// Map `None` to [`TripError::InsufficientPoints`].
    fn ok_or_insufficient_points(
        self,
        context: &str,
        point_count: usize,
        minimum_required: usize,
    ) -> Result<T>;

    /// Map `None` to [`TripError::NumericalInstability`].
    fn ok_or_numerical(self, context: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(
        self,
        context: &str,
        point_count: usize,
        minimum_required: usize,
    ) -> Result<T> {
        self.ok_or_else(|| TripError::insufficient_points(context, point_count, minimum_required))
    }

    fn ok_or_numerical(self, context: &str) -> Result<T> {
        self.ok_or_else(|| TripError::numerical(context))
    }
}
