// pipeline.rs: the three-stage request guard (INPUT, SQL, RESPONSE).
//
// Each stage combines the generic evaluator with stage-specific scans and
// returns a StageResult. Blocking is a normal outcome, never an error. The
// pipeline itself is stateless; `GuardedRequest` threads one logical request
// through the stages and enforces their order.

use std::fmt;

use charter_core::violation::truncate_chars;
use charter_core::{
    Artifact, CharterError, ComplianceResult, Evaluator, Principle, Severity, Violation,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{CharterConfig, GuardSettings};
use crate::context::PipelineContext;
use crate::error::GuardError;
use crate::sql::{SqlAnalyzer, StatementKind};

/// Position of a request in the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Input,
    Sql,
    Response,
    Done,
    Blocked,
}

impl Stage {
    /// Where a passing result at this stage goes next.
    fn successor(&self) -> Stage {
        match self {
            Stage::Input => Stage::Sql,
            Stage::Sql => Stage::Response,
            Stage::Response | Stage::Done => Stage::Done,
            Stage::Blocked => Stage::Blocked,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Input => "INPUT",
            Stage::Sql => "SQL",
            Stage::Response => "RESPONSE",
            Stage::Done => "DONE",
            Stage::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// Stage-specific signals. Fields that do not apply to a stage are unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StageFlags {
    /// SQL stage: a write is waiting for confirmation.
    pub needs_confirmation: bool,

    /// SQL stage: the classified statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_kind: Option<StatementKind>,

    /// SQL stage: the write verb, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_operation: Option<StatementKind>,

    /// SQL stage: safe, confirmed and compliant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_approved: Option<bool>,

    /// RESPONSE stage: passed with no findings at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_approved: Option<bool>,

    /// INPUT stage: `PASS` when neither the evaluator nor the query scan
    /// raised a MANGO_RULE finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mango_rule_status: Option<String>,
}

/// Verdict of one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage: Stage,

    /// False when any blocking violation was found.
    pub pass: bool,

    /// The state the request moves to.
    pub next: Stage,

    pub compliance: ComplianceResult,

    /// Findings of the stage-specific scans.
    pub violations: Vec<Violation>,

    pub flags: StageFlags,
}

impl StageResult {
    fn new(
        stage: Stage,
        pass: bool,
        compliance: ComplianceResult,
        violations: Vec<Violation>,
        flags: StageFlags,
    ) -> Self {
        let next = if pass {
            stage.successor()
        } else {
            Stage::Blocked
        };
        if pass {
            tracing::info!(stage = %stage, next = %next, "stage passed");
        } else {
            tracing::warn!(
                stage = %stage,
                blocking = violations.iter().filter(|v| v.is_blocking()).count()
                    + compliance.blocking_violations().count(),
                "stage blocked"
            );
        }
        Self {
            stage,
            pass,
            next,
            compliance,
            violations,
            flags,
        }
    }

    /// Stage violations followed by evaluator violations.
    pub fn all_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().chain(self.compliance.violations.iter())
    }

    pub fn blocking_violations(&self) -> impl Iterator<Item = &Violation> {
        self.all_violations().filter(|v| v.is_blocking())
    }
}

fn no_blocking(violations: &[Violation], compliance: &ComplianceResult) -> bool {
    !violations.iter().any(Violation::is_blocking) && !compliance.has_blocking()
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

/// The stateless three-stage validator. Cheap to share across threads.
pub struct ValidationPipeline {
    evaluator: Evaluator,
    sql: SqlAnalyzer,
    discriminatory_phrases: Vec<String>,
    personal_data_phrases: Vec<String>,
    refusal_phrases: Vec<String>,
    tone_words: Vec<(String, Regex)>,
}

impl ValidationPipeline {
    pub fn new(evaluator: Evaluator, settings: &GuardSettings) -> Result<Self, GuardError> {
        let tone_words = settings
            .tone_words
            .iter()
            .map(|word| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
                let regex = Regex::new(&pattern).map_err(|source| CharterError::InvalidPattern {
                    principle: Principle::FarmerCentric,
                    pattern,
                    source,
                })?;
                Ok((word.to_lowercase(), regex))
            })
            .collect::<Result<Vec<_>, GuardError>>()?;
        Ok(Self {
            sql: SqlAnalyzer::new(&evaluator)?,
            evaluator,
            discriminatory_phrases: lowercase_all(&settings.discriminatory_phrases),
            personal_data_phrases: lowercase_all(&settings.personal_data_phrases),
            refusal_phrases: lowercase_all(&settings.refusal_phrases),
            tone_words,
        })
    }

    /// The standard catalog and default phrase lists.
    pub fn standard() -> Result<Self, GuardError> {
        Self::from_config(&CharterConfig::default())
    }

    pub fn from_config(config: &CharterConfig) -> Result<Self, GuardError> {
        let evaluator = Evaluator::with_settings(&config.rules)?;
        Self::new(evaluator, &config.guard)
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Begin a new logical request.
    pub fn start(&self, context: PipelineContext) -> Result<GuardedRequest<'_>, GuardError> {
        context.validate()?;
        Ok(GuardedRequest {
            pipeline: self,
            context,
            original_query: None,
            stage: Stage::Input,
            history: Vec::new(),
        })
    }

    /// Stage INPUT: the farmer's natural-language question.
    pub fn validate_query(
        &self,
        query: &str,
        context: &PipelineContext,
    ) -> Result<StageResult, GuardError> {
        context.validate()?;
        let compliance = self
            .evaluator
            .evaluate(&Artifact::text(query).with_location("<query>"));
        let lowered = query.to_lowercase();
        let mut violations = Vec::new();

        for phrase in &self.discriminatory_phrases {
            if lowered.contains(phrase.as_str()) {
                violations.push(
                    Violation::new(
                        Principle::MangoRule,
                        Severity::Critical,
                        format!("Discriminatory language in query: \"{}\"", phrase),
                    )
                    .with_location("<query>")
                    .with_remedy("Rephrase the question so it applies to every farmer, crop and country"),
                );
            }
        }
        for phrase in &self.personal_data_phrases {
            if lowered.contains(phrase.as_str()) {
                violations.push(
                    Violation::new(
                        Principle::PrivacyFirst,
                        Severity::Warning,
                        format!("Personal data detected in query: \"{}\"", phrase),
                    )
                    .with_location("<query>")
                    .with_remedy("Personal data stays inside the system and is never forwarded"),
                );
            }
        }

        let mango_clean = compliance
            .rule_outcomes
            .get(&Principle::MangoRule)
            .map_or(true, |o| o.compliant)
            && !violations.iter().any(|v| v.principle == Principle::MangoRule);
        let flags = StageFlags {
            mango_rule_status: Some(if mango_clean { "PASS" } else { "FAIL" }.to_string()),
            ..StageFlags::default()
        };
        let pass = no_blocking(&violations, &compliance);
        Ok(StageResult::new(Stage::Input, pass, compliance, violations, flags))
    }

    /// Stage SQL: the statement generated for `original_query`.
    pub fn validate_sql(
        &self,
        sql: &str,
        original_query: &str,
        context: &PipelineContext,
    ) -> Result<StageResult, GuardError> {
        context.validate()?;
        tracing::debug!(query = %truncate_chars(original_query, 80), "validating generated sql");
        let assessment = self.sql.analyze(sql, context);
        let pass = !assessment.is_blocked();
        let flags = StageFlags {
            needs_confirmation: assessment.needs_confirmation,
            statement_kind: Some(assessment.statement_kind),
            write_operation: assessment.write_operation,
            sql_approved: Some(assessment.sql_approved),
            ..StageFlags::default()
        };
        Ok(StageResult::new(
            Stage::Sql,
            pass,
            assessment.compliance,
            assessment.safety_violations,
            flags,
        ))
    }

    /// Stage RESPONSE: the answer about to be sent to the farmer.
    pub fn validate_response(
        &self,
        response: &str,
        original_query: &str,
        context: &PipelineContext,
    ) -> Result<StageResult, GuardError> {
        context.validate()?;
        tracing::debug!(query = %truncate_chars(original_query, 80), "validating response");
        let compliance = self
            .evaluator
            .evaluate(&Artifact::text(response).with_location("<response>"));
        let lowered = response.to_lowercase();
        let mut violations = Vec::new();

        for phrase in &self.refusal_phrases {
            if lowered.contains(phrase.as_str()) {
                violations.push(
                    Violation::new(
                        Principle::MangoRule,
                        Severity::Critical,
                        format!("Refusal language: \"{}\"", phrase),
                    )
                    .with_location("<response>")
                    .with_remedy("Give constructive guidance for every crop and country"),
                );
            }
        }
        for (word, regex) in &self.tone_words {
            if regex.is_match(response) {
                violations.push(
                    Violation::new(
                        Principle::FarmerCentric,
                        Severity::Warning,
                        format!("Inappropriate tone: \"{}\"", word),
                    )
                    .with_location("<response>")
                    .with_remedy("Use professional agricultural language"),
                );
            }
        }
        if let Some(farmer_id) = &context.farmer_id {
            if contains_token(response, farmer_id) {
                violations.push(
                    Violation::new(
                        Principle::PrivacyFirst,
                        Severity::Warning,
                        "Farmer ID exposed in response",
                    )
                    .with_location("<response>")
                    .with_remedy("Remove identifying information from responses"),
                );
            }
        }

        let pass = no_blocking(&violations, &compliance);
        let flags = StageFlags {
            response_approved: Some(pass && compliance.is_compliant && violations.is_empty()),
            ..StageFlags::default()
        };
        Ok(StageResult::new(Stage::Response, pass, compliance, violations, flags))
    }
}

/// Whether `token` occurs in `text` with no word character on either side.
fn contains_token(text: &str, token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(token).any(|(start, m)| {
        let before = text[..start].chars().next_back();
        let after = text[start + m.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// One logical request moving through INPUT, SQL and RESPONSE in order.
///
/// The only way back is [`GuardedRequest::confirm_write`], which reopens the
/// SQL stage after it was blocked for a missing confirmation.
pub struct GuardedRequest<'p> {
    pipeline: &'p ValidationPipeline,
    context: PipelineContext,
    original_query: Option<String>,
    stage: Stage,
    history: Vec<StageResult>,
}

impl<'p> GuardedRequest<'p> {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Every stage result so far, oldest first.
    pub fn history(&self) -> &[StageResult] {
        &self.history
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    fn expect(&self, attempted: Stage) -> Result<(), GuardError> {
        if self.stage == attempted {
            Ok(())
        } else {
            Err(GuardError::InvalidTransition {
                current: self.stage,
                attempted,
            })
        }
    }

    fn record(&mut self, result: StageResult) -> &StageResult {
        self.stage = result.next;
        self.history.push(result);
        // Just pushed.
        &self.history[self.history.len() - 1]
    }

    pub fn query(&mut self, query: &str) -> Result<&StageResult, GuardError> {
        self.expect(Stage::Input)?;
        let result = self.pipeline.validate_query(query, &self.context)?;
        self.original_query = Some(query.to_string());
        Ok(self.record(result))
    }

    pub fn sql(&mut self, sql: &str) -> Result<&StageResult, GuardError> {
        self.expect(Stage::Sql)?;
        let query = self.original_query.clone().unwrap_or_default();
        let result = self.pipeline.validate_sql(sql, &query, &self.context)?;
        Ok(self.record(result))
    }

    pub fn response(&mut self, response: &str) -> Result<&StageResult, GuardError> {
        self.expect(Stage::Response)?;
        let query = self.original_query.clone().unwrap_or_default();
        let result = self
            .pipeline
            .validate_response(response, &query, &self.context)?;
        Ok(self.record(result))
    }

    /// Supply the write keyword after the SQL stage asked for it, reopening
    /// that stage. Only valid when the last result was a SQL block caused
    /// solely by the missing confirmation.
    pub fn confirm_write(&mut self, keyword: impl Into<String>) -> Result<(), GuardError> {
        let reopenable = self.stage == Stage::Blocked
            && self.history.last().is_some_and(|last| {
                last.stage == Stage::Sql
                    && last.flags.needs_confirmation
                    && !last
                        .blocking_violations()
                        .any(|v| v.severity == Severity::Critical)
            });
        if !reopenable {
            return Err(GuardError::InvalidTransition {
                current: self.stage,
                attempted: Stage::Sql,
            });
        }
        self.context.write_confirmation = Some(keyword.into());
        self.stage = Stage::Sql;
        tracing::info!("write confirmation supplied; sql stage reopened");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_match_requires_word_boundaries() {
        assert!(contains_token("Farmer 42, your field is ready", "42"));
        assert!(!contains_token("Apply 420 kg per hectare", "42"));
        assert!(contains_token("id=f-42.", "f-42"));
        assert!(!contains_token("anything", "  "));
    }

    #[test]
    fn stage_successors() {
        assert_eq!(Stage::Input.successor(), Stage::Sql);
        assert_eq!(Stage::Sql.successor(), Stage::Response);
        assert_eq!(Stage::Response.successor(), Stage::Done);
    }

    #[test]
    fn personal_data_in_query_warns_but_passes() {
        let pipeline = ValidationPipeline::standard().unwrap();
        let result = pipeline
            .validate_query(
                "My name is Ana, how much water do peppers need?",
                &PipelineContext::new(),
            )
            .unwrap();
        assert!(result.pass);
        assert_eq!(result.next, Stage::Sql);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, Severity::Warning);
        assert_eq!(result.flags.mango_rule_status.as_deref(), Some("PASS"));
    }

    #[test]
    fn tone_words_match_whole_words() {
        let pipeline = ValidationPipeline::standard().unwrap();
        let ctx = PipelineContext::new();
        let informal = pipeline
            .validate_response("Don't worry honey, water twice a week.", "q", &ctx)
            .unwrap();
        assert!(informal.pass);
        assert_eq!(informal.flags.response_approved, Some(false));
        assert!(informal
            .violations
            .iter()
            .any(|v| v.principle == Principle::FarmerCentric));

        let fine = pipeline
            .validate_response("Sweetcorn needs warm soil before sowing.", "q", &ctx)
            .unwrap();
        assert!(fine.violations.is_empty());
        assert_eq!(fine.flags.response_approved, Some(true));
    }
}
