use thiserror::Error;

use crate::record::RecordParseError;

pub type Result<T> = std::result::Result<T, SortError>;

/// Fatal analyzer failures.
///
/// Malformed trace content is never fatal: unknown calls, unresolvable
/// bins, and suppressed changes all degrade silently. Only the output path
/// (and reading a record stream back) can fail.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("output io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record stream error: {0}")]
    Parse(#[from] RecordParseError),
}
