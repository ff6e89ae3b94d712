// result.rs: per-rule outcomes and the aggregate compliance result.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::ArtifactKind;
use crate::principle::Principle;
use crate::rules::Findings;
use crate::violation::{Severity, Violation};

/// The result of running one rule against one artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub principle: Principle,

    /// True iff the rule produced zero violations of any severity.
    pub compliant: bool,

    pub violations: Vec<Violation>,

    /// Set when the rule itself failed (internal error or panic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Informational notes (e.g. `hasTests`, `privacyStatus`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl RuleOutcome {
    /// Build an outcome from a rule's findings, stamping the artifact
    /// location onto violations that don't carry one.
    pub fn from_findings(principle: Principle, findings: Findings, location: &str) -> Self {
        let violations: Vec<Violation> = findings
            .violations
            .into_iter()
            .map(|v| {
                if v.file_location.is_some() {
                    v
                } else {
                    v.with_location(location)
                }
            })
            .collect();
        Self {
            principle,
            compliant: violations.is_empty(),
            violations,
            failure: None,
            details: findings.details,
        }
    }

    /// A rule that could not run. Carries exactly one `rule_failure`
    /// violation so the score and the report both reflect it.
    pub fn failed(principle: Principle, message: impl Into<String>, location: &str) -> Self {
        let message = message.into();
        let violation = Violation::rule_failure(
            principle,
            Severity::Warning,
            format!("{} check failed internally: {}", principle, message),
        )
        .with_location(location)
        .with_remedy("Report this to the rule maintainers; the artifact was not checked by this rule");
        Self {
            principle,
            compliant: false,
            violations: vec![violation],
            failure: Some(message),
            details: BTreeMap::new(),
        }
    }

    /// A rule that does not apply to this kind of artifact.
    pub fn skipped(principle: Principle, kind: ArtifactKind) -> Self {
        let mut details = BTreeMap::new();
        details.insert("skipped".to_string(), format!("not applicable to {}", kind));
        Self {
            principle,
            compliant: true,
            violations: Vec::new(),
            failure: None,
            details,
        }
    }
}

/// Metadata describing one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMetadata {
    pub evaluation_id: Uuid,
    pub duration_ms: f64,
    /// `file`, `code`, `sql` or `text`.
    pub target_type: String,
    pub target_location: String,
    pub content_sha256: String,
    /// Number of rules the score is computed over.
    pub rule_count: usize,
}

/// Aggregate result of evaluating one artifact against a rule catalog.
///
/// Created fresh per evaluation and never merged across calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    /// True iff no rule produced any violation.
    pub is_compliant: bool,

    /// Rule pass rate, 0–100. Not weighted by severity or count.
    pub overall_score: f64,

    /// Every violation from every rule, in catalog order.
    pub violations: Vec<Violation>,

    /// Rules that produced zero violations, in catalog order.
    pub compliant_principles: Vec<Principle>,

    pub rule_outcomes: BTreeMap<Principle, RuleOutcome>,

    pub timestamp: DateTime<Utc>,

    pub metadata: EvaluationMetadata,
}

impl ComplianceResult {
    /// Violations that block (CRITICAL or CONFIRMATION_REQUIRED).
    pub fn blocking_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocking())
    }

    pub fn has_blocking(&self) -> bool {
        self.blocking_violations().next().is_some()
    }

    /// Violations raised against one principle.
    pub fn violations_for(&self, principle: Principle) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |v| v.principle == principle)
    }

    /// Synthetic violations describing rules that could not run.
    pub fn rule_failures(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.rule_failure)
    }

    /// Violations found in the content itself.
    pub fn content_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.rule_failure)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }
}
