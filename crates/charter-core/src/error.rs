// error.rs: error types for the compliance core.
//
// Two separate enums: `CharterError` is raised to callers for contract
// violations (bad input, bad configuration). `RuleError` never leaves the
// evaluator; it is folded into a failed RuleOutcome.

use std::path::PathBuf;

use thiserror::Error;

use crate::principle::Principle;

/// Errors returned to the caller. These indicate misuse, never a property
/// of the evaluated content.
#[derive(Debug, Error)]
pub enum CharterError {
    /// The artifact file could not be read.
    #[error("failed to read artifact at {path}: {source}")]
    ReadArtifact {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The artifact file is binary or otherwise not UTF-8 text.
    #[error("artifact at {path} is not valid UTF-8 text")]
    NotText { path: PathBuf },

    /// A configured pattern does not compile.
    #[error("invalid pattern '{pattern}' for {principle}: {source}")]
    InvalidPattern {
        principle: Principle,
        pattern: String,
        source: regex::Error,
    },

    /// A rule was registered twice under the same principle.
    #[error("a rule for {0} is already registered")]
    DuplicateRule(Principle),
}

/// Internal failure of a single rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The Python grammar could not be loaded into the parser.
    #[error("failed to load the Python grammar: {0}")]
    Grammar(String),

    /// The parser gave up without producing a tree.
    #[error("parser produced no syntax tree")]
    NoTree,

    /// The rule panicked while checking the artifact.
    #[error("rule panicked: {0}")]
    Panicked(String),
}
