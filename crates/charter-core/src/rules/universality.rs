// universality.rs: rules protecting universal, non-discriminatory support.
//
// MANGO_RULE is the headline check: a mango farmer in Bulgaria must get the
// same treatment as a wheat farmer anywhere else. It mixes AST scans over
// Python branching logic with text scans for refusal phrasing. The other
// rules here (LLM_FIRST, COUNTRY_AWARE, FARMER_CENTRIC) are regex-only.

use std::collections::HashSet;

use regex::Regex;
use tree_sitter::Node;

use super::python;
use super::{compile, line_at, Findings, Rule};
use crate::artifact::{Artifact, ArtifactKind};
use crate::config::RuleSettings;
use crate::error::{CharterError, RuleError};
use crate::principle::Principle;
use crate::violation::{Severity, Violation};

const SNIPPET_CHARS: usize = 100;

const REFUSAL_PATTERNS: &[&str] = &[
    r"(?i)unsupported.*crop",
    r"(?i)not.*available.*in.*country",
    r"(?i)cannot.*grow.*in",
    r"(?i)invalid.*crop.*for.*region",
    r"(?i)\b(?:unsupported|not\s+supported)\s+in\s+\w+",
];

/// `(?i)['"](a|b|c)['"]`, or `None` when there is nothing to match.
fn quoted_literal(principle: Principle, names: &[String]) -> Result<Option<Regex>, CharterError> {
    if names.is_empty() {
        return Ok(None);
    }
    let alternatives: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
    let pattern = format!(r#"(?i)['"](?:{})['"]"#, alternatives.join("|"));
    compile(principle, &pattern).map(Some)
}

fn is_quoted_in(haystack: &str, name: &str) -> bool {
    haystack.contains(&format!("'{}'", name)) || haystack.contains(&format!("\"{}\"", name))
}

// ── MANGO_RULE ──

/// Flags branching on crop or country and any phrasing that refuses a
/// farmer because of what or where they grow.
pub struct MangoRule {
    crops: Vec<String>,
    countries: Vec<String>,
    refusals: Vec<Regex>,
    crop_literal: Option<Regex>,
    country_literal: Option<Regex>,
}

impl MangoRule {
    pub fn new(settings: &RuleSettings) -> Result<Self, CharterError> {
        let principle = Principle::MangoRule;
        let mut refusals = Vec::new();
        for pattern in REFUSAL_PATTERNS {
            refusals.push(compile(principle, pattern)?);
        }
        for pattern in &settings.extra_refusal_patterns {
            refusals.push(compile(principle, pattern)?);
        }
        Ok(Self {
            crops: lowercase_all(&settings.hardcoded_crops),
            countries: lowercase_all(&settings.hardcoded_countries),
            refusals,
            crop_literal: quoted_literal(principle, &settings.hardcoded_crops)?,
            country_literal: quoted_literal(principle, &settings.hardcoded_countries)?,
        })
    }

    fn scan_branches(&self, source: &str, findings: &mut Findings) -> Result<(), RuleError> {
        let tree = python::parse(source)?;
        let root = tree.root_node();
        if let Some(line) = python::first_error_line(root) {
            findings.push(python::parse_failure(Principle::MangoRule, line));
            return Ok(());
        }
        python::walk(root, |node| {
            if !matches!(node.kind(), "if_statement" | "elif_clause") {
                return;
            }
            if let Some(condition) = node.child_by_field_name("condition") {
                if let Some(violation) = self.branch_violation(node, condition, source) {
                    findings.push(violation);
                }
            }
        });
        Ok(())
    }

    fn branch_violation(&self, branch: Node, condition: Node, source: &str) -> Option<Violation> {
        let cond = python::text(condition, source).to_lowercase();
        let description = if let Some(crop) = self.crops.iter().find(|c| is_quoted_in(&cond, c)) {
            format!("Hardcoded crop logic detected: {}", crop)
        } else if let Some(country) = self.countries.iter().find(|c| is_quoted_in(&cond, c)) {
            format!("Geographic discrimination detected: {}", country)
        } else if compares_subject_with_literal(condition, source) {
            "Hardcoded crop/country branching detected".to_string()
        } else {
            return None;
        };
        Some(
            Violation::new(Principle::MangoRule, Severity::Critical, description)
                .with_snippet(python::source_line(branch, source), SNIPPET_CHARS)
                .at_line(python::line_of(branch))
                .with_remedy(
                    "Remove the branch and let the LLM reason about every crop and country uniformly",
                ),
        )
    }

    fn scan_sql_literals(&self, sql: &str, findings: &mut Findings) {
        let scans = [
            (&self.crop_literal, "Hardcoded crop literal in SQL"),
            (&self.country_literal, "Hardcoded country literal in SQL"),
        ];
        for (regex, label) in scans {
            let Some(regex) = regex else { continue };
            for m in regex.find_iter(sql) {
                findings.push(
                    Violation::new(
                        Principle::MangoRule,
                        Severity::Critical,
                        format!("{}: {}", label, m.as_str()),
                    )
                    .with_snippet(sql, SNIPPET_CHARS)
                    .at_line(line_at(sql, m.start()))
                    .with_remedy("Query by farmer or field, never filter on a specific crop or country"),
                );
            }
        }
    }

    fn scan_refusals(&self, text: &str, findings: &mut Findings) {
        let mut reported_lines = HashSet::new();
        for regex in &self.refusals {
            for m in regex.find_iter(text) {
                let line = line_at(text, m.start());
                if !reported_lines.insert(line) {
                    continue;
                }
                findings.push(
                    Violation::new(
                        Principle::MangoRule,
                        Severity::Critical,
                        format!("Refusal pattern detected: {}", m.as_str().trim()),
                    )
                    .with_snippet(m.as_str().trim(), SNIPPET_CHARS)
                    .at_line(line)
                    .with_remedy("Always provide help; never refuse based on crop or location"),
                );
            }
        }
    }
}

/// True when some comparison in `condition` puts a crop/country identifier
/// next to a string literal, e.g. `crop == 'mango'` or `'x' != farm.country`.
fn compares_subject_with_literal(condition: Node, source: &str) -> bool {
    let mut hit = false;
    python::walk(condition, |node| {
        if hit || node.kind() != "comparison_operator" {
            return;
        }
        let mut has_subject = false;
        let mut has_literal = false;
        for i in 0..node.named_child_count() {
            let Some(child) = node.named_child(i) else { continue };
            match child.kind() {
                "identifier" | "attribute" => {
                    let name = python::text(child, source).to_lowercase();
                    if name.contains("crop") || name.contains("country") {
                        has_subject = true;
                    }
                }
                _ if python::is_string(child) => has_literal = true,
                _ => {}
            }
        }
        hit = has_subject && has_literal;
    });
    hit
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

impl Rule for MangoRule {
    fn principle(&self) -> Principle {
        Principle::MangoRule
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let mut findings = Findings::new();
        match artifact.kind {
            ArtifactKind::Code => self.scan_branches(&artifact.content, &mut findings)?,
            ArtifactKind::Sql => self.scan_sql_literals(&artifact.content, &mut findings),
            ArtifactKind::Text => {}
        }
        self.scan_refusals(&artifact.content, &mut findings);

        let verdict = if findings.violations.iter().any(|v| !v.rule_failure) {
            "FAIL"
        } else if findings.is_clean() {
            "PASS"
        } else {
            "INCOMPLETE"
        };
        findings.note("mangoTest", verdict);
        Ok(findings)
    }
}

// ── LLM_FIRST ──

const DECISION_PATTERNS: &[&str] = &[
    r"(?i)if.*crop.*==.*:",
    r"(?i)if.*country.*==.*:",
    r"(?i)elif.*language.*==.*:",
    r"(?i)switch.*\(.*crop.*\)",
    r"(?i)crop_advice\s*=\s*\{",
    r"(?i)fertilizer_map\s*=\s*\{",
    r"(?i)planting_schedule\s*=\s*\{",
];

const TRANSLATION_TABLE: &str = r"(?i)\b\w*translations?\s*=\s*[\{\[]";

const LLM_MARKERS: &[&str] = &["llm", "openai", "gpt", "anthropic"];

/// Business decisions belong to the LLM, not to hand-written tables.
pub struct LlmFirstRule {
    decisions: Vec<Regex>,
    translations: Regex,
}

impl LlmFirstRule {
    pub fn new() -> Result<Self, CharterError> {
        let principle = Principle::LlmFirst;
        Ok(Self {
            decisions: DECISION_PATTERNS
                .iter()
                .map(|p| compile(principle, p))
                .collect::<Result<_, _>>()?,
            translations: compile(principle, TRANSLATION_TABLE)?,
        })
    }
}

impl Rule for LlmFirstRule {
    fn principle(&self) -> Principle {
        Principle::LlmFirst
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Code
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let code = &artifact.content;
        let mut findings = Findings::new();

        for regex in &self.decisions {
            for m in regex.find_iter(code) {
                findings.push(
                    Violation::new(
                        Principle::LlmFirst,
                        Severity::Warning,
                        "Hardcoded business logic detected",
                    )
                    .with_snippet(m.as_str().trim(), SNIPPET_CHARS)
                    .at_line(line_at(code, m.start()))
                    .with_remedy("Move the decision into an LLM prompt instead of hardcoding it"),
                );
            }
        }

        if let Some(m) = self.translations.find(code) {
            findings.push(
                Violation::new(
                    Principle::LlmFirst,
                    Severity::Critical,
                    "Hardcoded translation table detected",
                )
                .with_snippet(m.as_str().trim(), SNIPPET_CHARS)
                .at_line(line_at(code, m.start()))
                .with_remedy("Let the LLM translate responses into the farmer's language"),
            );
        } else if artifact.location.ends_with("_translations.py") {
            findings.push(
                Violation::new(
                    Principle::LlmFirst,
                    Severity::Critical,
                    "Hardcoded translation file detected",
                )
                .with_remedy("Let the LLM translate responses into the farmer's language"),
            );
        }

        let lowered = code.to_lowercase();
        let has_llm = LLM_MARKERS.iter().any(|m| lowered.contains(m));
        findings.note("hasLlmIntegration", has_llm.to_string());
        Ok(findings)
    }
}

// ── COUNTRY_AWARE ──

const COUNTRY_PATTERNS: &[(&str, &str)] = &[
    (
        r#"(?i)\b(?:if|elif)\b.*\bcountry\w*\s*==\s*["'][a-z]{2}["']"#,
        "Hardcoded country check",
    ),
    (
        r#"(?i)\b(?:if|elif)\b.*\blanguage\w*\s*==\s*["'][a-z]{2,3}["']"#,
        "Hardcoded language check",
    ),
    (
        r#"(?m)^\s*\w*language\w*\s*=\s*["'][a-z]{2}["']"#,
        "Hardcoded default language",
    ),
];

/// Country and language must come from the farmer's profile, not from
/// literals in code.
pub struct CountryAwareRule {
    patterns: Vec<(Regex, &'static str)>,
}

impl CountryAwareRule {
    pub fn new() -> Result<Self, CharterError> {
        let patterns = COUNTRY_PATTERNS
            .iter()
            .map(|(p, label)| Ok((compile(Principle::CountryAware, p)?, *label)))
            .collect::<Result<_, CharterError>>()?;
        Ok(Self { patterns })
    }
}

impl Rule for CountryAwareRule {
    fn principle(&self) -> Principle {
        Principle::CountryAware
    }

    fn applies_to(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Code
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let code = &artifact.content;
        let mut findings = Findings::new();
        for (regex, label) in &self.patterns {
            for m in regex.find_iter(code) {
                findings.push(
                    Violation::new(Principle::CountryAware, Severity::Warning, *label)
                        .with_snippet(m.as_str().trim(), SNIPPET_CHARS)
                        .at_line(line_at(code, m.start()))
                        .with_remedy("Derive country and language from the farmer's profile"),
                );
            }
        }
        Ok(findings)
    }
}

// ── FARMER_CENTRIC ──

/// Farmers are addressed as professionals.
pub struct FarmerCentricRule {
    terms: Vec<(String, Regex)>,
}

impl FarmerCentricRule {
    pub fn new(settings: &RuleSettings) -> Result<Self, CharterError> {
        let terms = settings
            .informal_terms
            .iter()
            .map(|term| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
                Ok((term.clone(), compile(Principle::FarmerCentric, &pattern)?))
            })
            .collect::<Result<_, CharterError>>()?;
        Ok(Self { terms })
    }
}

impl Rule for FarmerCentricRule {
    fn principle(&self) -> Principle {
        Principle::FarmerCentric
    }

    fn check(&self, artifact: &Artifact) -> Result<Findings, RuleError> {
        let text = &artifact.content;
        let mut findings = Findings::new();
        for (term, regex) in &self.terms {
            if let Some(m) = regex.find(text) {
                findings.push(
                    Violation::new(
                        Principle::FarmerCentric,
                        Severity::Info,
                        format!("Informal tone detected: '{}'", term),
                    )
                    .at_line(line_at(text, m.start()))
                    .with_remedy("Use a professional, respectful tone"),
                );
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mango() -> MangoRule {
        MangoRule::new(&RuleSettings::default()).unwrap()
    }

    #[test]
    fn mango_flags_generic_crop_comparison() {
        let findings = mango()
            .check(&Artifact::code("if crop == 'mango': return 'not supported'"))
            .unwrap();
        assert_eq!(findings.violations.len(), 1);
        let v = &findings.violations[0];
        assert_eq!(v.severity, Severity::Critical);
        assert_eq!(v.line_number, Some(1));
        assert_eq!(v.description, "Hardcoded crop/country branching detected");
        assert_eq!(findings.details["mangoTest"], "FAIL");
    }

    #[test]
    fn mango_names_configured_crops_and_countries() {
        let code = "def advise(farm):\n    if farm.kind == 'Tomato':\n        pass\n    elif region == \"croatia\":\n        pass\n";
        let findings = mango().check(&Artifact::code(code)).unwrap();
        let descriptions: Vec<&str> = findings
            .violations
            .iter()
            .map(|v| v.description.as_str())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "Hardcoded crop logic detected: tomato",
                "Geographic discrimination detected: croatia"
            ]
        );
        assert_eq!(findings.violations[0].line_number, Some(2));
        assert_eq!(findings.violations[1].line_number, Some(4));
        assert_eq!(
            findings.violations[0].code_snippet.as_deref(),
            Some("if farm.kind == 'Tomato':")
        );
    }

    #[test]
    fn mango_ignores_unrelated_branches() {
        let code = "def total(items):\n    if len(items) == 0:\n        return 0\n    return sum(items)\n";
        let findings = mango().check(&Artifact::code(code)).unwrap();
        assert!(findings.is_clean());
        assert_eq!(findings.details["mangoTest"], "PASS");
    }

    #[test]
    fn mango_refusal_phrasing_in_text() {
        let findings = mango()
            .check(&Artifact::text("Sorry, mango is an unsupported crop here."))
            .unwrap();
        assert_eq!(findings.violations.len(), 1);
        assert!(findings.violations[0]
            .description
            .starts_with("Refusal pattern detected"));
    }

    #[test]
    fn mango_refusals_are_reported_once_per_line() {
        let text = "This crop is unsupported crop, not supported in Bulgaria";
        let findings = mango().check(&Artifact::text(text)).unwrap();
        assert_eq!(findings.violations.len(), 1);
    }

    #[test]
    fn mango_reports_parse_failure_and_still_scans_text() {
        let code = "def broken(:\n    return 'unsupported crop'\n";
        let findings = mango().check(&Artifact::code(code)).unwrap();
        assert!(findings.violations.iter().any(|v| v.rule_failure));
        assert!(findings
            .violations
            .iter()
            .any(|v| !v.rule_failure && v.severity == Severity::Critical));
    }

    #[test]
    fn mango_only_parse_failure_is_incomplete() {
        let findings = mango().check(&Artifact::code("def broken(:\n")).unwrap();
        assert_eq!(findings.violations.len(), 1);
        assert_eq!(findings.violations[0].severity, Severity::Info);
        assert_eq!(findings.details["mangoTest"], "INCOMPLETE");
    }

    #[test]
    fn mango_sql_literals() {
        let findings = mango()
            .check(&Artifact::sql("SELECT * FROM fields WHERE crop = 'corn'"))
            .unwrap();
        assert_eq!(findings.violations.len(), 1);
        assert!(findings.violations[0].description.contains("'corn'"));

        let clean = mango()
            .check(&Artifact::sql("SELECT * FROM fields WHERE farmer_id = 7"))
            .unwrap();
        assert!(clean.is_clean());
    }

    #[test]
    fn llm_first_flags_tables_and_decisions() {
        let code = "UI_TRANSLATIONS = {\n  'hr': 'Dobar dan'\n}\nif crop == 'corn':\n    pass\n";
        let findings = LlmFirstRule::new()
            .unwrap()
            .check(&Artifact::code(code))
            .unwrap();
        assert!(findings
            .violations
            .iter()
            .any(|v| v.severity == Severity::Critical && v.line_number == Some(1)));
        assert!(findings
            .violations
            .iter()
            .any(|v| v.severity == Severity::Warning && v.line_number == Some(4)));
        assert_eq!(findings.details["hasLlmIntegration"], "false");
    }

    #[test]
    fn llm_first_flags_translation_files_by_name() {
        let artifact = Artifact::code("GREETING = 'hi'").with_location("app/ui_translations.py");
        let findings = LlmFirstRule::new().unwrap().check(&artifact).unwrap();
        assert_eq!(findings.violations.len(), 1);
        assert_eq!(findings.violations[0].severity, Severity::Critical);
    }

    #[test]
    fn country_aware_flags_literal_checks_and_defaults() {
        let code = "default_language = 'hr'\nif user.country == 'HR':\n    pass\n";
        let findings = CountryAwareRule::new()
            .unwrap()
            .check(&Artifact::code(code))
            .unwrap();
        let lines: Vec<_> = findings.violations.iter().map(|v| v.line_number).collect();
        assert!(lines.contains(&Some(1)));
        assert!(lines.contains(&Some(2)));
    }

    #[test]
    fn farmer_centric_matches_whole_words_only() {
        let rule = FarmerCentricRule::new(&RuleSettings::default()).unwrap();
        let flagged = rule
            .check(&Artifact::text("What a cute little farm!"))
            .unwrap();
        assert_eq!(flagged.violations.len(), 1);
        assert_eq!(flagged.violations[0].severity, Severity::Info);

        let clean = rule
            .check(&Artifact::text("Plant sweetcorn after the last frost."))
            .unwrap();
        assert!(clean.is_clean());
    }
}
