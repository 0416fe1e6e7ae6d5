//! Top-level error type for the graph pipeline.

use thiserror::Error;

use crate::graph::verify::VerifyError;
use crate::parse::ParseError;

#[derive(Debug, Error)]
pub enum SwellError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
