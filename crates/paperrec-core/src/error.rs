use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An operation needed a fitted backend or recommender.
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// The requested mode or parameters cannot be served.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Empty query")]
    EmptyQuery,

    /// A backend failed to project a text into its space.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Query and corpus widths disagree. Always a fit/encode defect.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
