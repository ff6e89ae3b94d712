// sql.rs: safety analysis of LLM-generated SQL before it reaches the database.
//
// Three independent layers:
//   1. Schema/permission changes (DROP, ALTER, ...) and stacked statements
//      are always blocked. No confirmation unlocks them.
//   2. Writes (INSERT, UPDATE, DELETE) need the caller to echo the exact
//      keyword in `writeConfirmation`. This is a guard against accidental
//      execution of hallucinated writes, not an authentication mechanism.
//   3. The catalog's MANGO_RULE and PRIVACY_FIRST rules run on the SQL text.

use std::fmt;

use charter_core::{
    Artifact, CharterError, ComplianceResult, Evaluator, Principle, Severity, Violation,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::PipelineContext;
use crate::error::GuardError;

/// Keywords that are never executed, whatever the context says.
pub const ALWAYS_BLOCKED: &[&str] = &["DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE"];

/// Principles the catalog checks on SQL text.
pub const SQL_PRINCIPLES: &[Principle] = &[Principle::MangoRule, Principle::PrivacyFirst];

const SNIPPET_CHARS: usize = 200;
const LOCATION: &str = "<sql>";

/// Classification of a statement by its leading verb.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Classify a statement, ignoring comments and quoted text.
    ///
    /// A statement led by a data verb is that verb. Anything else (`WITH`,
    /// `EXPLAIN ANALYZE`, ...) is a write if it contains a write verb at any
    /// depth, so a data-modifying CTE cannot pass as a SELECT.
    pub fn classify(sql: &str) -> Self {
        let code = code_only(sql).to_uppercase();
        let mut words = top_level_words(&code);
        let first = match words.next() {
            Some(first) => first,
            None => return StatementKind::Other,
        };
        let leading = Self::from_verb(first);
        if leading != StatementKind::Other {
            return leading;
        }
        if let Some(write) = all_words(&code).map(Self::from_verb).find(|k| k.is_write()) {
            return write;
        }
        if first == "WITH" {
            return words
                .map(Self::from_verb)
                .find(|k| *k != StatementKind::Other)
                .unwrap_or(StatementKind::Other);
        }
        StatementKind::Other
    }

    fn from_verb(word: &str) -> Self {
        match word {
            "SELECT" => StatementKind::Select,
            "INSERT" => StatementKind::Insert,
            "UPDATE" => StatementKind::Update,
            "DELETE" => StatementKind::Delete,
            _ => StatementKind::Other,
        }
    }

    /// INSERT, UPDATE and DELETE need a confirmation.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alphabetic words at parenthesis depth 0, in order.
fn top_level_words(sql: &str) -> impl Iterator<Item = &str> {
    let mut depth = 0usize;
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in sql.char_indices() {
        if c.is_ascii_alphabetic() || c == '_' {
            if start.is_none() && depth == 0 {
                start = Some(i);
            }
            continue;
        }
        if let Some(s) = start.take() {
            words.push(&sql[s..i]);
        }
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(&sql[s..]);
    }
    words.into_iter()
}

/// Alphabetic words at any depth, in order.
fn all_words(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !(c.is_ascii_alphabetic() || c == '_'))
        .filter(|w| !w.is_empty())
}

/// The statement with comments replaced by a space and quoted strings or
/// identifiers emptied (`'a;b'` becomes `''`). Unterminated quotes and
/// comments run to the end of the input.
fn code_only(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut depth = 1usize;
                while depth > 0 {
                    match chars.next() {
                        Some('*') if chars.peek() == Some(&'/') => {
                            chars.next();
                            depth -= 1;
                        }
                        Some('/') if chars.peek() == Some(&'*') => {
                            chars.next();
                            depth += 1;
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                out.push(' ');
            }
            '\'' | '"' => {
                let quote = c;
                while let Some(c) = chars.next() {
                    if c == quote {
                        // A doubled quote is an escaped quote.
                        if chars.peek() == Some(&quote) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                out.push(quote);
                out.push(quote);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Everything the pipeline needs to decide on one statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SqlAssessment {
    pub statement_kind: StatementKind,

    /// No CRITICAL safety violation.
    pub is_safe: bool,

    /// A write is waiting for the caller to echo its keyword.
    pub needs_confirmation: bool,

    /// The write verb, if the statement is a write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_operation: Option<StatementKind>,

    /// `is_safe && !needs_confirmation && compliance.is_compliant`.
    pub sql_approved: bool,

    pub safety_violations: Vec<Violation>,

    /// MANGO_RULE and PRIVACY_FIRST over the SQL text.
    pub compliance: ComplianceResult,
}

impl SqlAssessment {
    /// CRITICAL or CONFIRMATION_REQUIRED findings from either layer.
    pub fn is_blocked(&self) -> bool {
        !self.is_safe || self.needs_confirmation || self.compliance.has_blocking()
    }
}

pub struct SqlAnalyzer {
    compliance: Evaluator,
    always_blocked: Regex,
}

impl SqlAnalyzer {
    /// Build an analyzer that reuses `evaluator`'s MANGO_RULE and
    /// PRIVACY_FIRST rule instances.
    pub fn new(evaluator: &Evaluator) -> Result<Self, GuardError> {
        let pattern = format!(r"(?i)\b(?:{})\b", ALWAYS_BLOCKED.join("|"));
        let always_blocked = Regex::new(&pattern).map_err(|source| CharterError::InvalidPattern {
            principle: Principle::SqlSafety,
            pattern,
            source,
        })?;
        Ok(Self {
            compliance: evaluator.scoped(SQL_PRINCIPLES),
            always_blocked,
        })
    }

    pub fn analyze(&self, sql: &str, context: &PipelineContext) -> SqlAssessment {
        let statement_kind = StatementKind::classify(sql);
        let code = code_only(sql);
        let mut violations = Vec::new();

        if let Some(m) = self.always_blocked.find(sql) {
            let keyword = m.as_str().to_uppercase();
            violations.push(
                Violation::new(
                    Principle::SqlSafety,
                    Severity::Critical,
                    format!("Blocked SQL operation: {}", keyword),
                )
                .with_snippet(sql, SNIPPET_CHARS)
                .with_location(LOCATION)
                .with_remedy(format!(
                    "{} statements are never executed through this path, confirmed or not",
                    keyword
                )),
            );
        }

        let statements = code.split(';').filter(|s| !s.trim().is_empty()).count();
        if statements > 1 {
            violations.push(
                Violation::new(
                    Principle::SqlSafety,
                    Severity::Critical,
                    format!("Multiple SQL statements in one request ({})", statements),
                )
                .with_snippet(sql, SNIPPET_CHARS)
                .with_location(LOCATION)
                .with_remedy("Submit exactly one statement per request"),
            );
        }

        let mut needs_confirmation = false;
        let write_operation = statement_kind.is_write().then_some(statement_kind);
        if let Some(kind) = write_operation {
            let keyword = kind.as_str();
            let confirmed = context
                .write_confirmation()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case(keyword));
            if confirmed {
                violations.push(
                    Violation::new(
                        Principle::SqlSafety,
                        Severity::Warning,
                        format!("{} operation confirmed by user", keyword),
                    )
                    .with_snippet(sql, SNIPPET_CHARS)
                    .with_location(LOCATION),
                );
            } else {
                needs_confirmation = true;
                violations.push(
                    Violation::new(
                        Principle::SqlSafety,
                        Severity::ConfirmationRequired,
                        format!("{} operation requires explicit confirmation", keyword),
                    )
                    .with_snippet(sql, SNIPPET_CHARS)
                    .with_location(LOCATION)
                    .with_remedy(format!(
                        "Resubmit the request with writeConfirmation set to \"{}\" to allow this write",
                        keyword
                    )),
                );
            }

            let scoped_write = matches!(kind, StatementKind::Update | StatementKind::Delete);
            if scoped_write
                && context.farmer_id.is_some()
                && !code.to_lowercase().contains("farmer_id")
            {
                violations.push(
                    Violation::new(
                        Principle::SqlSafety,
                        Severity::Warning,
                        format!("{} is not scoped to farmer_id", keyword),
                    )
                    .with_snippet(sql, SNIPPET_CHARS)
                    .with_location(LOCATION)
                    .with_remedy("Add an explicit farmer_id condition to the WHERE clause"),
                );
            }
        }

        let compliance = self.compliance.evaluate(&Artifact::sql(sql));
        let is_safe = !violations.iter().any(|v| v.severity == Severity::Critical);
        let sql_approved = is_safe && !needs_confirmation && compliance.is_compliant;

        if sql_approved {
            tracing::info!(kind = %statement_kind, "sql approved");
        } else {
            tracing::warn!(
                kind = %statement_kind,
                safe = is_safe,
                needs_confirmation,
                compliance_score = compliance.overall_score,
                "sql not approved"
            );
        }

        SqlAssessment {
            statement_kind,
            is_safe,
            needs_confirmation,
            write_operation,
            sql_approved,
            safety_violations: violations,
            compliance,
        }
    }
}
