//! Orchestration error taxonomy.
//!
//! Only errors that must abort a whole run surface as [`EvalError`].
//! Per-fixture failures (bad config, agent crash, copy failure) are folded
//! into a failed [`FixtureResult`](super::result::FixtureResult) instead.

use std::path::PathBuf;

use crate::agent::AgentError;
use crate::checks::CheckError;

/// Errors produced by the evaluation engine.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("cannot read fixtures directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read eval config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid eval config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot create scratch directory under {root}: {source}")]
    Scratch {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no experiments found in {0}")]
    NoExperiments(PathBuf),

    #[error("no experiments match filter: {0}")]
    NoExperimentsMatch(String),

    #[error("worker task failed: {0}")]
    TaskJoin(String),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("check error: {0}")]
    Check(#[from] CheckError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_error_names_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = EvalError::ConfigParse {
            path: PathBuf::from("fixtures/a/eval.json"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("invalid eval config"));
        assert!(msg.contains("fixtures/a/eval.json"));
    }

    #[test]
    fn test_unknown_check_type_wraps_into_eval_error() {
        let err: EvalError = CheckError::UnknownCheckType("nope".to_string()).into();
        assert!(err.to_string().contains("unknown check type: nope"));
    }

    #[test]
    fn test_no_experiments_match_display() {
        let err = EvalError::NoExperimentsMatch("baseline".to_string());
        assert_eq!(err.to_string(), "no experiments match filter: baseline");
    }
}
