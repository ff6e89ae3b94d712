//! report.rs: plain-text rendering of a ComplianceResult.
//!
//! Output is ASCII-only and deterministic for a given result, so it can be
//! diffed, logged or pasted into a review.

use crate::result::ComplianceResult;
use crate::violation::Violation;

const RULE: &str = "============================================================";

/// Render a human-readable report.
///
/// Content violations and rule failures are listed in separate sections so
/// "the tool broke" never reads as "the content is non-compliant".
pub fn format_report(result: &ComplianceResult) -> String {
    let mut out = String::new();
    let status = if result.is_compliant {
        "COMPLIANT"
    } else {
        "NON-COMPLIANT"
    };

    out.push_str(&format!("{}\nCOMPLIANCE REPORT\n{}\n", RULE, RULE));
    out.push_str(&format!("Status:    {}\n", status));
    out.push_str(&format!("Score:     {:.1}/100\n", result.overall_score));
    out.push_str(&format!(
        "Target:    {} ({})\n",
        ascii_only(&result.metadata.target_location),
        result.metadata.target_type
    ));
    out.push_str(&format!(
        "Timestamp: {}\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "Compliant principles: {}/{}\n",
        result.compliant_principles.len(),
        result.metadata.rule_count
    ));
    for principle in &result.compliant_principles {
        out.push_str(&format!("  [OK] {}\n", principle));
    }

    let content: Vec<&Violation> = result.content_violations().collect();
    if !content.is_empty() {
        out.push_str(&format!("\nViolations ({}):\n", content.len()));
        for violation in content {
            push_violation(&mut out, violation);
        }
    }

    let failures: Vec<&Violation> = result.rule_failures().collect();
    if !failures.is_empty() {
        out.push_str(&format!("\nRule failures ({}):\n", failures.len()));
        for violation in failures {
            push_violation(&mut out, violation);
        }
    }

    let closing = if result.is_compliant {
        "All checks passed."
    } else if result.has_blocking() {
        "Blocking violations found. Fix them before proceeding."
    } else {
        "Non-blocking findings only. Review before proceeding."
    };
    out.push_str(&format!("\n{}\n{}\n", closing, RULE));
    out
}

fn push_violation(out: &mut String, v: &Violation) {
    out.push_str(&format!(
        "  [{}] {}: {}\n",
        v.severity,
        v.principle,
        ascii_only(&v.description)
    ));
    match (v.line_number, v.code_snippet.as_deref()) {
        (Some(line), Some(snippet)) => {
            out.push_str(&format!("      Line {}: {}\n", line, ascii_only(snippet)));
        }
        (Some(line), None) => out.push_str(&format!("      Line {}\n", line)),
        (None, Some(snippet)) => out.push_str(&format!("      {}\n", ascii_only(snippet))),
        (None, None) => {}
    }
    if let Some(remedy) = &v.remedy {
        out.push_str(&format!("      Remedy: {}\n", ascii_only(remedy)));
    }
}

/// Replace non-ASCII characters and line breaks so a field stays on one
/// report line.
fn ascii_only(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_ascii() => c,
            _ => '?',
        })
        .collect()
}
