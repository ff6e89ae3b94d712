// operations.rs: deployment hygiene (no dev leftovers, no literal
// configuration) and test presence.

use regex::Regex;

use super::{compile, line_at, Findings, Rule};
use crate::artifact::{Artifact, ArtifactKind};
use crate::error::{CharterError, RuleError};
use crate::principle::Principle;
use crate::violation::{Severity, Violation};

/// Compile `(pattern, description)` pairs for one principle.
fn compile_labeled(
    principle: Principle,
    patterns: &[(&str, &'static str)],
) -> Result<Vec<(Regex, &'static str)>, CharterError> {
    patterns
        .iter()
        .map(|(pattern, label)| Ok((compile(principle, pattern)?, *label)))
        .collect()
}

/// One violation per match of each pattern.
fn scan(
    principle: Principle,
    severity: Severity,
    patterns: &[(Regex, &'static str)],
    remedy: &str,
    code: &str,
) -> Findings {
    let mut findings = Findings::new();
    for (regex, label) in patterns {
        for m in regex.find_iter(code) {
            findings.push(
                Violation::new(principle, severity, *label)
                    .with_snippet(m.as_str(), 100)
                    .at_line(line_at(code, m.start()))
                    .with_remedy(remedy),
            );
        }
    }
    findings
}

// ── PRODUCTION_READY ──

const DEV_MARKERS: &[(&str, &str)] = &[
    (r"\blocalhost\b", "Hardcoded localhost reference"),
    (r"127\.0\.0\.1", "Hardcoded loopback address"),
    (r"(?i)\bdebug\s*=\s*true\b", "Debug mode enabled"),
    (
        r#"(?i)\benv(?:ironment)?\s*==?\s*["']dev(?:elopment)?["']"#,
        "Development environment literal",
    ),
];

pub struct ProductionReadyRule {
    patterns: Vec<(Regex, &'static str)>,
}

impl ProductionReadyRule {
    pub fn new() -> Result<Self, CharterError> {
        Ok(Self {
            patterns: compile_labeled(Principle::ProductionReady, DEV_MARKERS)?,
        })
    }
}

impl Rule for ProductionReadyRule {
    fn principle(&self) -> Principle {
        Principle::ProductionReady
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Code
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        Ok(scan(
            Principle::ProductionReady,
            Severity::Warning,
            &self.patterns,
            "Read hosts and flags from the environment so the code runs unchanged in production",
            &artifact.content,
        ))
    }
}

// ── CONFIGURATION ──

// Case-sensitive: only SHOUTY_CONSTANTS are treated as configuration.
const LITERAL_SETTINGS: &[(&str, &str)] = &[
    (
        r#"\b[A-Z_]*(?:PASSWORD|SECRET|API_KEY|TOKEN)\s*=\s*["'][^"']+["']"#,
        "Hardcoded secret",
    ),
    (r#"\b[A-Z_]*HOST\s*=\s*["'][^"']+["']"#, "Hardcoded host"),
    (r"\b[A-Z_]*PORT\s*=\s*\d{2,5}\b", "Hardcoded port"),
];

pub struct ConfigurationRule {
    patterns: Vec<(Regex, &'static str)>,
}

impl ConfigurationRule {
    pub fn new() -> Result<Self, CharterError> {
        Ok(Self {
            patterns: compile_labeled(Principle::Configuration, LITERAL_SETTINGS)?,
        })
    }
}

impl Rule for ConfigurationRule {
    fn principle(&self) -> Principle {
        Principle::Configuration
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Code
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        Ok(scan(
            Principle::Configuration,
            Severity::Warning,
            &self.patterns,
            "Load secrets, hosts and ports from environment variables or a config file",
            &artifact.content,
        ))
    }
}

// ── TEST_DRIVEN ──

const TEST_MARKERS: &[&str] = &["def test_", "#[test]", "pytest", "unittest", "assert"];

/// Records whether the artifact carries tests. Never fails.
pub struct TestDrivenRule;

impl Rule for TestDrivenRule {
    fn principle(&self) -> Principle {
        Principle::TestDriven
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let has_tests = TEST_MARKERS.iter().any(|m| artifact.content.contains(m));
        let mut findings = Findings::new();
        findings.note("hasTests", has_tests.to_string());
        Ok(findings)
    }
}
