//! Domain models for skeval.
//!
//! Canonical definitions for the core entities:
//! - `EvalConfig` / `PromptConfig`: the declarative `eval.json` of a fixture
//! - `ExpandedFixture`: one independently runnable fixture prompt
//! - `FixtureResult`, `SuiteResult`, `EvalRunResult`: run outcomes

pub mod error;
pub mod fixture;
pub mod result;

pub use error::{EvalError, Result};
pub use fixture::{EvalConfig, ExpandedFixture, PromptConfig, EVAL_CONFIG_FILE};
pub use result::{CheckResult, EvalRunResult, FixtureResult, SuiteResult};
