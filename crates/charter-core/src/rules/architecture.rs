// architecture.rs: structural rules (datastore choice, service boundaries,
// error handling and logging presence).

use super::{line_at, Findings, Rule};
use crate::artifact::{Artifact, ArtifactKind};
use crate::config::RuleSettings;
use crate::error::RuleError;
use crate::principle::Principle;
use crate::violation::{Severity, Violation};

fn code_or_sql(kind: ArtifactKind) -> bool {
    matches!(kind, ArtifactKind::Code | ArtifactKind::Sql)
}

// ── POSTGRESQL_ONLY ──

/// PostgreSQL is the only approved datastore.
pub struct PostgresqlOnlyRule {
    forbidden: Vec<String>,
}

impl PostgresqlOnlyRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            forbidden: settings
                .forbidden_datastores
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Rule for PostgresqlOnlyRule {
    fn principle(&self) -> Principle {
        Principle::PostgresqlOnly
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        code_or_sql(kind)
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let content = &artifact.content;
        // ASCII lowering keeps byte offsets aligned with `content`.
        let lowered = content.to_ascii_lowercase();
        let mut findings = Findings::new();
        for store in &self.forbidden {
            if let Some(offset) = lowered.find(store.as_str()) {
                findings.push(
                    Violation::new(
                        Principle::PostgresqlOnly,
                        Severity::Critical,
                        format!("Non-PostgreSQL datastore detected: {}", store),
                    )
                    .at_line(line_at(content, offset))
                    .with_remedy("Use PostgreSQL for all persistent storage"),
                );
            }
        }
        Ok(findings)
    }
}

// ── MODULE_INDEPENDENCE ──

/// Independent services talk over APIs, never by importing each other.
pub struct ModuleIndependenceRule {
    modules: Vec<String>,
}

impl ModuleIndependenceRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            modules: settings.independent_modules.clone(),
        }
    }
}

impl Rule for ModuleIndependenceRule {
    fn principle(&self) -> Principle {
        Principle::ModuleIndependence
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Code
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let code = &artifact.content;
        let mut findings = Findings::new();
        for module in &self.modules {
            // A service may import itself.
            if artifact.location.contains(module.as_str()) {
                continue;
            }
            for needle in [format!("from {}", module), format!("import {}", module)] {
                if let Some(offset) = code.find(&needle) {
                    findings.push(
                        Violation::new(
                            Principle::ModuleIndependence,
                            Severity::Warning,
                            format!("Direct dependency on independent module: {}", module),
                        )
                        .with_snippet(&needle, 100)
                        .at_line(line_at(code, offset))
                        .with_remedy("Call the other service through its API instead of importing it"),
                    );
                    break;
                }
            }
        }
        Ok(findings)
    }
}

// ── API_FIRST ──

/// Reserved for API contract checks. Always compliant.
pub struct ApiFirstRule;

impl Rule for ApiFirstRule {
    fn principle(&self) -> Principle {
        Principle::ApiFirst
    }

    fn check(&self, _artifact: &Artifact) -> Result<Findings, RuleError> {
        Ok(Findings::new())
    }
}

// ── ERROR_ISOLATION ──

const ERROR_HANDLING_MARKERS: &[(&str, &str)] =
    &[("try:", "except"), ("try {", "catch"), ("Result<", "")];

/// Non-trivial code must contain some form of error handling.
pub struct ErrorIsolationRule {
    min_chars: usize,
}

impl ErrorIsolationRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_chars: settings.error_isolation_min_chars,
        }
    }
}

impl Rule for ErrorIsolationRule {
    fn principle(&self) -> Principle {
        Principle::ErrorIsolation
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Code
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let code = &artifact.content;
        let handled = ERROR_HANDLING_MARKERS
            .iter()
            .any(|(open, close)| code.contains(open) && code.contains(close));
        let mut findings = Findings::new();
        if !handled && artifact.char_len() > self.min_chars {
            findings.push(
                Violation::new(
                    Principle::ErrorIsolation,
                    Severity::Warning,
                    "No error handling found",
                )
                .with_remedy("Wrap external calls so one failure cannot take down the whole flow"),
            );
        }
        Ok(findings)
    }
}

// ── TRANSPARENCY ──

const LOGGING_MARKERS: &[&str] = &["logger", "logging", "tracing::", "log::"];

/// Non-trivial code must log what it does.
pub struct TransparencyRule {
    min_chars: usize,
}

impl TransparencyRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_chars: settings.transparency_min_chars,
        }
    }
}

impl Rule for TransparencyRule {
    fn principle(&self) -> Principle {
        Principle::Transparency
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Code
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let logs = LOGGING_MARKERS
            .iter()
            .any(|m| artifact.content.contains(m));
        let mut findings = Findings::new();
        if !logs && artifact.char_len() > self.min_chars {
            findings.push(
                Violation::new(Principle::Transparency, Severity::Info, "No logging found")
                    .with_remedy("Log decisions and external calls for debugging and audit"),
            );
        }
        Ok(findings)
    }
}
