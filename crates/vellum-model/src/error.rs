//! Model error taxonomy.
//!
//! Only operations that demand exact inputs fail with `InvalidArgument`-class
//! errors; the validators clamp instead of failing. Every public entry point
//! fails with [`ModelError::Disposed`] once `dispose` has run.

use thiserror::Error;
use vellum_text::TextError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("the model has been disposed")]
    Disposed,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Text(#[from] TextError),
}
