// violation.rs: a single finding produced by a rule.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::principle::Principle;

/// How serious a violation is.
///
/// Only `Critical` and `ConfirmationRequired` block. `Warning` and `Info`
/// lower the visible quality signals but never stop a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    /// A write operation that the caller has not confirmed yet.
    ConfirmationRequired,
}

impl Severity {
    /// Whether a violation of this severity blocks progression.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Critical | Severity::ConfirmationRequired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::ConfirmationRequired => "CONFIRMATION_REQUIRED",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding, owned by the RuleOutcome or StageResult that contains it.
///
/// Built with the `with_*` / `at_line` helpers at creation time and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Which principle was violated.
    pub principle: Principle,

    pub severity: Severity,

    /// Human-readable description of the finding.
    pub description: String,

    /// The offending code or SQL, truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,

    /// Where the artifact came from (a path, `<string>`, `<query>`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_location: Option<String>,

    /// 1-based line within the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,

    /// What the author should do about it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remedy: Option<String>,

    /// True when the rule itself could not process the artifact
    /// (parse failure, internal error) rather than finding a problem in it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rule_failure: bool,
}

impl Violation {
    pub fn new(principle: Principle, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            principle,
            severity,
            description: description.into(),
            code_snippet: None,
            file_location: None,
            line_number: None,
            remedy: None,
            rule_failure: false,
        }
    }

    /// A synthetic violation describing a rule that could not run.
    pub fn rule_failure(
        principle: Principle,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            rule_failure: true,
            ..Self::new(principle, severity, description)
        }
    }

    /// Attach a snippet, truncated to `max_chars` characters.
    pub fn with_snippet(mut self, snippet: &str, max_chars: usize) -> Self {
        self.code_snippet = Some(truncate_chars(snippet, max_chars));
        self
    }

    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remedy = Some(remedy.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.file_location = Some(location.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line_number = Some(line);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }
}

/// Truncate on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_critical_and_confirmation_block() {
        assert!(Severity::Critical.is_blocking());
        assert!(Severity::ConfirmationRequired.is_blocking());
        assert!(!Severity::Warning.is_blocking());
        assert!(!Severity::Info.is_blocking());
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let v = Violation::new(Principle::MangoRule, Severity::Critical, "x")
            .with_snippet("čćžšđ-abc", 3);
        assert_eq!(v.code_snippet.as_deref(), Some("čćž"));
    }

    #[test]
    fn json_uses_camel_case_and_omits_empty_fields() {
        let v = Violation::new(Principle::PrivacyFirst, Severity::Warning, "Farmer ID exposed")
            .at_line(4)
            .with_remedy("Remove identifying information");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["principle"], "PRIVACY_FIRST");
        assert_eq!(json["severity"], "WARNING");
        assert_eq!(json["lineNumber"], 4);
        assert!(json.get("codeSnippet").is_none());
        assert!(json.get("ruleFailure").is_none());

        let failure = Violation::rule_failure(Principle::MangoRule, Severity::Info, "parse error");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["ruleFailure"], true);
    }
}
