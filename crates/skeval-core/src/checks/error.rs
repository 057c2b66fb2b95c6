use thiserror::Error;

/// Errors raised while constructing a check.
///
/// A check that is built but cannot do its work (missing field, unreadable
/// file) reports a failed result instead; these are construction-time only.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("unknown check type: {0}")]
    UnknownCheckType(String),
}
