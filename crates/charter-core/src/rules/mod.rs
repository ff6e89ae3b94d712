// rules/mod.rs: the Rule trait and the rule catalog.
//
// Each principle is implemented by one `Rule`. Some rules scan text with
// regexes, some walk a Python syntax tree; the trait hides the difference,
// so adding a rule never requires touching the evaluator.
//
// The catalog is built once (regexes compiled up front) and then shared
// read-only behind an `Arc` by every evaluation.

mod architecture;
mod operations;
mod privacy;
mod python;
mod universality;

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;

pub use architecture::{
    ApiFirstRule, ErrorIsolationRule, ModuleIndependenceRule, PostgresqlOnlyRule,
    TransparencyRule,
};
pub use operations::{ConfigurationRule, ProductionReadyRule, TestDrivenRule};
pub use privacy::PrivacyFirstRule;
pub use universality::{CountryAwareRule, FarmerCentricRule, LlmFirstRule, MangoRule};

use crate::artifact::{Artifact, ArtifactKind};
use crate::config::RuleSettings;
use crate::error::{CharterError, RuleError};
use crate::principle::Principle;
use crate::result::RuleOutcome;
use crate::violation::Violation;

/// What a rule found in one artifact.
#[derive(Debug, Clone, Default)]
pub struct Findings {
    pub violations: Vec<Violation>,
    pub details: BTreeMap<String, String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Record an informational note on the outcome.
    pub fn note(&mut self, key: &str, value: impl Into<String>) {
        self.details.insert(key.to_string(), value.into());
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

impl From<Vec<Violation>> for Findings {
    fn from(violations: Vec<Violation>) -> Self {
        Self {
            violations,
            details: BTreeMap::new(),
        }
    }
}

/// A named, stateless compliance check.
///
/// Implementations must not panic on malformed input: an artifact a rule
/// cannot understand is reported as a `rule_failure` violation instead.
pub trait Rule: Send + Sync {
    /// The principle this rule enforces. Unique within a catalog.
    fn principle(&self) -> Principle;

    /// Whether the rule has anything to say about this kind of artifact.
    fn applies_to(&self, _kind: ArtifactKind) -> bool {
        true
    }

    /// Scan the artifact.
    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError>;

    /// Run the rule and fold the result into a [`RuleOutcome`].
    fn outcome(&self, artifact: &Artifact) -> RuleOutcome {
        let principle = self.principle();
        if !self.applies_to(artifact.kind) {
            return RuleOutcome::skipped(principle, artifact.kind);
        }
        match self.check(artifact) {
            Ok(findings) => RuleOutcome::from_findings(principle, findings, &artifact.location),
            Err(err) => RuleOutcome::failed(principle, err.to_string(), &artifact.location),
        }
    }
}

/// An ordered set of rules with unique principles.
#[derive(Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleCatalog {
    /// A catalog with no rules.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The thirteen standard rules configured by `settings`.
    pub fn standard(settings: &RuleSettings) -> Result<Self, CharterError> {
        let mut catalog = Self::empty();
        catalog.register(MangoRule::new(settings)?)?;
        catalog.register(PostgresqlOnlyRule::new(settings))?;
        catalog.register(LlmFirstRule::new()?)?;
        catalog.register(ModuleIndependenceRule::new(settings))?;
        catalog.register(PrivacyFirstRule::new(settings))?;
        catalog.register(ApiFirstRule)?;
        catalog.register(ErrorIsolationRule::new(settings))?;
        catalog.register(TransparencyRule::new(settings))?;
        catalog.register(FarmerCentricRule::new(settings)?)?;
        catalog.register(ProductionReadyRule::new()?)?;
        catalog.register(ConfigurationRule::new()?)?;
        catalog.register(TestDrivenRule)?;
        catalog.register(CountryAwareRule::new()?)?;
        Ok(catalog)
    }

    /// Add a rule. Fails if its principle is already registered.
    pub fn register<R: Rule + 'static>(&mut self, rule: R) -> Result<(), CharterError> {
        let principle = rule.principle();
        if self.contains(principle) {
            return Err(CharterError::DuplicateRule(principle));
        }
        self.rules.push(Arc::new(rule));
        Ok(())
    }

    /// A catalog sharing this catalog's rule instances for `principles` only.
    /// Unknown principles are ignored; catalog order is preserved.
    pub fn select(&self, principles: &[Principle]) -> Self {
        Self {
            rules: self
                .rules
                .iter()
                .filter(|r| principles.contains(&r.principle()))
                .cloned()
                .collect(),
        }
    }

    pub fn contains(&self, principle: Principle) -> bool {
        self.rules.iter().any(|r| r.principle() == principle)
    }

    pub fn principles(&self) -> Vec<Principle> {
        self.rules.iter().map(|r| r.principle()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.iter()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCatalog")
            .field("principles", &self.principles())
            .finish()
    }
}

// ── Helpers shared by the rule implementations ──

/// Compile a rule pattern, attributing failures to the rule.
pub(crate) fn compile(principle: Principle, pattern: &str) -> Result<Regex, CharterError> {
    Regex::new(pattern).map_err(|source| CharterError::InvalidPattern {
        principle,
        pattern: pattern.to_string(),
        source,
    })
}

/// 1-based line number of a byte offset.
pub(crate) fn line_at(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
