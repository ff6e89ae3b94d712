// evaluator.rs: runs a rule catalog over one artifact and aggregates the
// per-rule outcomes into a ComplianceResult.
//
// The evaluator owns no mutable state. Cloning it clones an `Arc` to the
// catalog, so one evaluator can serve any number of threads.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::artifact::Artifact;
use crate::config::RuleSettings;
use crate::error::{CharterError, RuleError};
use crate::principle::Principle;
use crate::result::{ComplianceResult, EvaluationMetadata, RuleOutcome};
use crate::rules::{Rule, RuleCatalog};

#[derive(Debug, Clone)]
pub struct Evaluator {
    catalog: Arc<RuleCatalog>,
}

impl Evaluator {
    pub fn new(catalog: RuleCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// An evaluator over the standard catalog with default settings.
    pub fn standard() -> Result<Self, CharterError> {
        Self::with_settings(&RuleSettings::default())
    }

    /// An evaluator over the standard catalog built from `settings`.
    pub fn with_settings(settings: &RuleSettings) -> Result<Self, CharterError> {
        Ok(Self::new(RuleCatalog::standard(settings)?))
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// An evaluator sharing this one's rule instances, restricted to
    /// `principles`.
    pub fn scoped(&self, principles: &[Principle]) -> Self {
        Self::new(self.catalog.select(principles))
    }

    /// Evaluate `artifact`, stamping the result with the current time.
    pub fn evaluate(&self, artifact: &Artifact) -> ComplianceResult {
        self.evaluate_at(artifact, Utc::now())
    }

    /// Evaluate `artifact` with an explicit timestamp.
    ///
    /// Every rule runs, even if an earlier one failed or panicked.
    pub fn evaluate_at(&self, artifact: &Artifact, timestamp: DateTime<Utc>) -> ComplianceResult {
        let started = Instant::now();
        let evaluation_id = Uuid::new_v4();

        let mut violations = Vec::new();
        let mut compliant_principles = Vec::new();
        let mut rule_outcomes = BTreeMap::new();

        for rule in self.catalog.iter() {
            let outcome = run_guarded(rule.as_ref(), artifact);
            if let Some(failure) = &outcome.failure {
                tracing::warn!(
                    evaluation = %evaluation_id,
                    principle = %outcome.principle,
                    error = %failure,
                    "rule failed; recorded as a rule failure"
                );
            } else {
                tracing::debug!(
                    evaluation = %evaluation_id,
                    principle = %outcome.principle,
                    violations = outcome.violations.len(),
                    "rule checked"
                );
            }
            if outcome.compliant {
                compliant_principles.push(outcome.principle);
            }
            violations.extend(outcome.violations.iter().cloned());
            rule_outcomes.insert(outcome.principle, outcome);
        }

        let rule_count = self.catalog.len();
        let overall_score = pass_rate(compliant_principles.len(), rule_count);
        let is_compliant = violations.is_empty();

        tracing::info!(
            evaluation = %evaluation_id,
            target = %artifact.location,
            score = overall_score,
            violations = violations.len(),
            compliant = is_compliant,
            "evaluation complete"
        );

        ComplianceResult {
            is_compliant,
            overall_score,
            violations,
            compliant_principles,
            rule_outcomes,
            timestamp,
            metadata: EvaluationMetadata {
                evaluation_id,
                duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                target_type: artifact.target_type(),
                target_location: artifact.location.clone(),
                content_sha256: artifact.content_sha256(),
                rule_count,
            },
        }
    }
}

/// `100 × compliant / total`; an empty catalog scores 100.
fn pass_rate(compliant: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    100.0 * compliant as f64 / total as f64
}

/// Run one rule, turning a panic into a failed outcome.
fn run_guarded(rule: &dyn Rule, artifact: &Artifact) -> RuleOutcome {
    match catch_unwind(AssertUnwindSafe(|| rule.outcome(artifact))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let err = RuleError::Panicked(message);
            RuleOutcome::failed(rule.principle(), err.to_string(), &artifact.location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use crate::rules::Findings;
    use crate::violation::{Severity, Violation};

    struct Panics;

    impl Rule for Panics {
        fn principle(&self) -> Principle {
            Principle::ApiFirst
        }

        fn check(&self, _artifact: &Artifact) -> Result<Findings, RuleError> {
            panic!("boom");
        }
    }

    struct Flags(Principle);

    impl Rule for Flags {
        fn principle(&self) -> Principle {
            self.0
        }

        fn check(&self, _artifact: &Artifact) -> Result<Findings, RuleError> {
            Ok(vec![Violation::new(self.0, Severity::Info, "noted")].into())
        }
    }

    struct Passes(Principle);

    impl Rule for Passes {
        fn principle(&self) -> Principle {
            self.0
        }

        fn applies_to(&self, kind: ArtifactKind) -> bool {
            kind != ArtifactKind::Sql
        }

        fn check(&self, _artifact: &Artifact) -> Result<Findings, RuleError> {
            Ok(Findings::new())
        }
    }

    #[test]
    fn empty_catalog_scores_100() {
        let result = Evaluator::new(RuleCatalog::empty()).evaluate(&Artifact::code("x = 1"));
        assert!(result.is_compliant);
        assert_eq!(result.overall_score, 100.0);
        assert_eq!(result.metadata.rule_count, 0);
    }

    #[test]
    fn score_is_rule_pass_rate() {
        let mut catalog = RuleCatalog::empty();
        catalog.register(Flags(Principle::FarmerCentric)).unwrap();
        catalog.register(Passes(Principle::TestDriven)).unwrap();
        catalog.register(Passes(Principle::ApiFirst)).unwrap();
        catalog.register(Passes(Principle::CountryAware)).unwrap();

        let result = Evaluator::new(catalog).evaluate(&Artifact::text("hello"));
        assert_eq!(result.overall_score, 75.0);
        // An INFO violation alone still makes the artifact non-compliant.
        assert!(!result.is_compliant);
        assert_eq!(
            result.compliant_principles,
            vec![Principle::TestDriven, Principle::ApiFirst, Principle::CountryAware]
        );
    }

    #[test]
    fn panicking_rule_does_not_abort_the_evaluation() {
        let mut catalog = RuleCatalog::empty();
        catalog.register(Panics).unwrap();
        catalog.register(Passes(Principle::TestDriven)).unwrap();

        let result = Evaluator::new(catalog).evaluate(&Artifact::code("x = 1"));
        assert_eq!(result.rule_outcomes.len(), 2);
        assert_eq!(result.overall_score, 50.0);

        let failed = &result.rule_outcomes[&Principle::ApiFirst];
        assert!(failed.failure.as_deref().unwrap_or("").contains("boom"));
        assert_eq!(result.rule_failures().count(), 1);
        assert_eq!(result.content_violations().count(), 0);
    }

    #[test]
    fn metadata_describes_the_target() {
        let evaluator = Evaluator::standard().unwrap();
        let artifact = Artifact::sql("SELECT 1");
        let ts = Utc::now();
        let result = evaluator.evaluate_at(&artifact, ts);
        assert_eq!(result.timestamp, ts);
        assert_eq!(result.metadata.target_type, "sql");
        assert_eq!(result.metadata.target_location, "<sql>");
        assert_eq!(result.metadata.content_sha256, artifact.content_sha256());
        assert_eq!(result.metadata.rule_count, 13);
    }

    #[test]
    fn each_evaluation_gets_a_fresh_result() {
        let evaluator = Evaluator::standard().unwrap();
        let bad = evaluator.evaluate(&Artifact::code("if crop == 'mango': return 'not supported'"));
        let good = evaluator.evaluate(&Artifact::text("Plant after the last frost."));
        assert!(!bad.is_compliant);
        assert!(good.is_compliant);
        assert_ne!(bad.metadata.evaluation_id, good.metadata.evaluation_id);
    }

    #[test]
    fn scoped_evaluator_runs_only_selected_rules() {
        let evaluator = Evaluator::standard().unwrap();
        let scoped = evaluator.scoped(&[Principle::MangoRule, Principle::PrivacyFirst]);
        let result = scoped.evaluate(&Artifact::sql("SELECT * FROM fields"));
        assert_eq!(result.metadata.rule_count, 2);
        assert_eq!(
            result.rule_outcomes.keys().copied().collect::<Vec<_>>(),
            vec![Principle::MangoRule, Principle::PrivacyFirst]
        );
    }
}
