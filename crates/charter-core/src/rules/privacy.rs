// privacy.rs: PRIVACY_FIRST, personal farmer data must never leave the system.
//
// In code, any call that looks like an external API call and mentions a
// personal-data identifier is flagged. In SQL, selecting personal columns is
// a warning only: the query may be legitimate, but the result must not be
// forwarded to an external service.

use std::ops::Range;

use super::python;
use super::{line_at, Findings, Rule};
use crate::artifact::{Artifact, ArtifactKind};
use crate::config::RuleSettings;
use crate::error::RuleError;
use crate::principle::Principle;
use crate::violation::{Severity, Violation};

const SNIPPET_CHARS: usize = 150;

pub struct PrivacyFirstRule {
    external_markers: Vec<String>,
    personal_fields: Vec<String>,
    personal_columns: Vec<String>,
}

impl PrivacyFirstRule {
    pub fn new(settings: &RuleSettings) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items.iter().map(|s| s.to_lowercase()).collect()
        };
        Self {
            external_markers: lower(&settings.external_api_markers),
            personal_fields: lower(&settings.personal_data_fields),
            personal_columns: lower(&settings.personal_columns),
        }
    }

    fn scan_calls(&self, source: &str, findings: &mut Findings) -> Result<(), RuleError> {
        let tree = python::parse(source)?;
        let root = tree.root_node();
        if let Some(line) = python::first_error_line(root) {
            findings.push(python::parse_failure(Principle::PrivacyFirst, line));
            return Ok(());
        }

        // Byte ranges of calls already flagged; nested calls inside them
        // would only repeat the same finding.
        let mut flagged: Vec<Range<usize>> = Vec::new();
        python::walk(root, |node| {
            if node.kind() != "call" {
                return;
            }
            if flagged
                .iter()
                .any(|r| r.start <= node.start_byte() && node.end_byte() <= r.end)
            {
                return;
            }
            let call = python::text(node, source);
            let lowered = call.to_lowercase();
            if !self.external_markers.iter().any(|m| lowered.contains(m)) {
                return;
            }
            let Some(field) = self.personal_fields.iter().find(|f| lowered.contains(*f)) else {
                return;
            };
            flagged.push(node.start_byte()..node.end_byte());
            findings.push(
                Violation::new(
                    Principle::PrivacyFirst,
                    Severity::Critical,
                    format!("Personal data sent to external API: {}", field),
                )
                .with_snippet(call, SNIPPET_CHARS)
                .at_line(python::line_of(node))
                .with_remedy("Strip personal fields before calling external services"),
            );
        });
        Ok(())
    }

    fn scan_select(&self, sql: &str, findings: &mut Findings) {
        let lowered = sql.to_lowercase();
        if !lowered.contains("select") {
            return;
        }
        let exposed: Vec<&str> = self
            .personal_columns
            .iter()
            .filter(|c| lowered.contains(c.as_str()))
            .map(String::as_str)
            .collect();
        let Some(first) = exposed.first() else {
            return;
        };
        let offset = lowered.find(first).unwrap_or(0);
        findings.push(
            Violation::new(
                Principle::PrivacyFirst,
                Severity::Warning,
                format!("Query selects personal data: {}", exposed.join(", ")),
            )
            .with_snippet(sql, SNIPPET_CHARS)
            .at_line(line_at(sql, offset))
            .with_remedy("Keep personal columns inside the system; never forward them to external APIs"),
        );
    }
}

impl Rule for PrivacyFirstRule {
    fn principle(&self) -> Principle {
        Principle::PrivacyFirst
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        matches!(kind, ArtifactKind::Code | ArtifactKind::Sql)
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let mut findings = Findings::new();
        match artifact.kind {
            ArtifactKind::Code => self.scan_calls(&artifact.content, &mut findings)?,
            ArtifactKind::Sql => self.scan_select(&artifact.content, &mut findings),
            ArtifactKind::Text => {}
        }
        let at_risk = findings.violations.iter().any(|v| !v.rule_failure);
        findings.note(
            "privacyStatus",
            if at_risk { "AT_RISK" } else { "PROTECTED" },
        );
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> PrivacyFirstRule {
        PrivacyFirstRule::new(&RuleSettings::default())
    }

    #[test]
    fn flags_personal_data_in_external_call_once() {
        let code = "import requests\n\ndef sync(farmer):\n    requests.post(URL, json=dict(farmer_name=farmer.name))\n";
        let findings = rule().check(&Artifact::code(code)).unwrap();
        assert_eq!(findings.violations.len(), 1);
        let v = &findings.violations[0];
        assert_eq!(v.severity, Severity::Critical);
        assert_eq!(v.line_number, Some(4));
        assert_eq!(v.description, "Personal data sent to external API: farmer_name");
        assert_eq!(findings.details["privacyStatus"], "AT_RISK");
    }

    #[test]
    fn internal_calls_with_personal_data_are_fine() {
        let code = "def show(farmer):\n    render(farmer_name=farmer.name)\n";
        let findings = rule().check(&Artifact::code(code)).unwrap();
        assert!(findings.is_clean());
        assert_eq!(findings.details["privacyStatus"], "PROTECTED");
    }

    #[test]
    fn external_calls_without_personal_data_are_fine() {
        let code = "resp = openai.chat(messages=[{'role': 'user', 'content': question}])\n";
        let findings = rule().check(&Artifact::code(code)).unwrap();
        assert!(findings.is_clean());
    }

    #[test]
    fn select_of_personal_columns_is_a_warning() {
        let findings = rule()
            .check(&Artifact::sql("SELECT farmer_name, phone FROM farmers"))
            .unwrap();
        assert_eq!(findings.violations.len(), 1);
        assert_eq!(findings.violations[0].severity, Severity::Warning);
        assert!(findings.violations[0].description.contains("farmer_name, phone"));
    }

    #[test]
    fn does_not_apply_to_text() {
        assert!(!rule().applies_to(ArtifactKind::Text));
        let outcome = rule().outcome(&Artifact::text("my phone number is 555"));
        assert!(outcome.compliant);
    }
}
