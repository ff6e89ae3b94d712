// check.rs: evaluate artifacts and gate on the result.
//
// Targets may be file paths, glob patterns (`src/**/*.py`) or inline code.
// The command fails when any target has a blocking violation, scores below
// `--min-score`, or (with `--fail-on-warnings`) has any warning.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use charter_core::report::format_report;
use charter_core::{Artifact, ArtifactKind, ComplianceResult, Evaluator, Principle, Severity};
use charter_guard::CharterConfig;

#[derive(Args)]
pub struct CheckArgs {
    /// Files, glob patterns or inline code.
    #[arg(required = true)]
    pub targets: Vec<String>,

    /// Treat every target as this kind instead of detecting it.
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// Only run these principles (e.g. `mango-rule,privacy-first`).
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<Principle>,

    /// Print results as JSON instead of reports.
    #[arg(long)]
    pub json: bool,

    /// Fail when any target scores below this.
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Fail on WARNING violations too.
    #[arg(long)]
    pub fail_on_warnings: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Code,
    Sql,
    Text,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Code => ArtifactKind::Code,
            KindArg::Sql => ArtifactKind::Sql,
            KindArg::Text => ArtifactKind::Text,
        }
    }
}

fn is_glob(target: &str) -> bool {
    target.contains(['*', '?', '['])
}

/// Expand targets into artifacts, preserving order.
pub fn collect_artifacts(
    targets: &[String],
    kind: Option<ArtifactKind>,
) -> anyhow::Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for target in targets {
        if is_glob(target) {
            let mut matched = 0;
            for entry in glob::glob(target)? {
                let path: PathBuf = entry?;
                if !path.is_file() {
                    continue;
                }
                let mut artifact = Artifact::from_file(&path)?;
                if let Some(kind) = kind {
                    artifact.kind = kind;
                }
                artifacts.push(artifact);
                matched += 1;
            }
            if matched == 0 {
                anyhow::bail!("pattern '{}' matched no files", target);
            }
            continue;
        }

        let artifact = match kind {
            Some(kind) if !std::path::Path::new(target).is_file() => match kind {
                ArtifactKind::Code => Artifact::code(target.as_str()),
                ArtifactKind::Sql => Artifact::sql(target.as_str()),
                ArtifactKind::Text => Artifact::text(target.as_str()),
            },
            Some(kind) => {
                let mut artifact = Artifact::from_file(target)?;
                artifact.kind = kind;
                artifact
            }
            None => Artifact::detect(target)?,
        };
        artifacts.push(artifact);
    }
    Ok(artifacts)
}

/// Why a result fails the gate, if it does.
pub fn gate_failure(
    result: &ComplianceResult,
    min_score: Option<f64>,
    fail_on_warnings: bool,
) -> Option<String> {
    if result.has_blocking() {
        return Some(format!(
            "{} blocking violation(s)",
            result.blocking_violations().count()
        ));
    }
    if let Some(min) = min_score {
        if result.overall_score < min {
            return Some(format!(
                "score {:.1} is below the minimum {:.1}",
                result.overall_score, min
            ));
        }
    }
    if fail_on_warnings {
        let warnings = result.count_by_severity(Severity::Warning);
        if warnings > 0 {
            return Some(format!("{} warning(s)", warnings));
        }
    }
    None
}

pub fn execute(args: &CheckArgs, config: &CharterConfig) -> anyhow::Result<()> {
    let mut evaluator = Evaluator::with_settings(&config.rules)?;
    if !args.only.is_empty() {
        evaluator = evaluator.scoped(&args.only);
    }

    let artifacts = collect_artifacts(&args.targets, args.kind.map(ArtifactKind::from))?;
    let results: Vec<ComplianceResult> = artifacts.iter().map(|a| evaluator.evaluate(a)).collect();

    if args.json {
        if results.len() == 1 {
            println!("{}", serde_json::to_string_pretty(&results[0])?);
        } else {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    } else {
        for result in &results {
            print!("{}", format_report(result));
        }
    }

    let mut failed = 0;
    for result in &results {
        if let Some(reason) = gate_failure(result, args.min_score, args.fail_on_warnings) {
            eprintln!("{}: {}", result.metadata.target_location, reason);
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!(
            "{} of {} target(s) failed the compliance gate",
            failed,
            results.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn glob_expands_to_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("b.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let pattern = format!("{}/*.py", dir.path().display());
        let artifacts = collect_artifacts(&[pattern], None).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].kind, ArtifactKind::Code);

        let pattern = format!("{}/*.sql", dir.path().display());
        let artifacts = collect_artifacts(&[pattern], None).unwrap();
        assert_eq!(artifacts[0].kind, ArtifactKind::Sql);
    }

    #[test]
    fn empty_glob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.py", dir.path().display());
        assert!(collect_artifacts(&[pattern], None).is_err());
    }

    #[test]
    fn kind_override_applies_to_inline_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answer.md");
        fs::write(&path, "Water weekly.").unwrap();

        let targets = vec![
            "Plant in spring.".to_string(),
            path.display().to_string(),
        ];
        let artifacts = collect_artifacts(&targets, Some(ArtifactKind::Text)).unwrap();
        assert_eq!(artifacts[0].kind, ArtifactKind::Text);
        assert_eq!(artifacts[0].location, "<text>");
        assert_eq!(artifacts[1].kind, ArtifactKind::Text);
        assert!(artifacts[1].from_file);
    }

    #[test]
    fn gate_checks_blocking_score_and_warnings() {
        let evaluator = Evaluator::standard().unwrap();

        let blocking = evaluator.evaluate(&Artifact::code("if crop == 'mango': return 'not supported'"));
        assert!(gate_failure(&blocking, None, false).is_some());

        let warning_only = evaluator.evaluate(&Artifact::code("DEBUG = True\n"));
        assert!(gate_failure(&warning_only, None, false).is_none());
        assert!(gate_failure(&warning_only, None, true).is_some());
        assert!(gate_failure(&warning_only, Some(99.0), false).is_some());

        let clean = evaluator.evaluate(&Artifact::text("Rotate crops yearly."));
        assert!(gate_failure(&clean, Some(100.0), true).is_none());
    }
}
