//! # charter-core
//!
//! Rule catalog, compliance evaluator and report formatter for Charter.
//!
//! An [`Artifact`] (source code, a SQL statement, a natural-language query or
//! a generated response) is run through every rule of a [`RuleCatalog`]. The
//! [`Evaluator`] aggregates the per-rule [`RuleOutcome`]s into a single
//! [`ComplianceResult`] with a rule-pass-rate score.
//!
//! ## Key invariants
//!
//! - **Rules are independent**: no rule depends on another rule's output or
//!   on execution order.
//! - **One broken rule never aborts an evaluation**: failures (including
//!   panics) are recorded as synthetic `rule_failure` violations.
//! - **Results are fresh per call**: the evaluator holds no cross-call state.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use charter_core::{Artifact, Evaluator};
//!
//! let evaluator = Evaluator::standard().unwrap();
//! let result = evaluator.evaluate(&Artifact::code("if crop == 'mango': return 'not supported'"));
//! assert!(!result.is_compliant);
//! println!("{}", charter_core::report::format_report(&result));
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod principle;
pub mod report;
pub mod result;
pub mod rules;
pub mod violation;

pub use artifact::{Artifact, ArtifactKind};
pub use config::RuleSettings;
pub use error::{CharterError, RuleError};
pub use evaluator::Evaluator;
pub use principle::Principle;
pub use result::{ComplianceResult, EvaluationMetadata, RuleOutcome};
pub use rules::{Findings, Rule, RuleCatalog};
pub use violation::{Severity, Violation};
