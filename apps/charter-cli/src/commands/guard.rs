// guard.rs: run a single pipeline stage from the command line.

use clap::Args;
use charter_guard::{CharterConfig, PipelineContext, StageResult, ValidationPipeline};

#[derive(Args)]
pub struct QueryArgs {
    /// The farmer's question.
    pub query: String,

    #[arg(long)]
    pub farmer_id: Option<String>,

    #[arg(long)]
    pub language: Option<String>,

    /// Print the stage result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct SqlArgs {
    /// The generated statement.
    pub sql: String,

    /// The question the statement was generated for.
    #[arg(long, default_value = "")]
    pub query: String,

    #[arg(long)]
    pub farmer_id: Option<String>,

    #[arg(long)]
    pub language: Option<String>,

    /// Keyword the user confirmed (e.g. UPDATE).
    #[arg(long)]
    pub write_confirmation: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ResponseArgs {
    /// The answer about to be sent.
    pub response: String,

    #[arg(long, default_value = "")]
    pub query: String,

    #[arg(long)]
    pub farmer_id: Option<String>,

    #[arg(long)]
    pub language: Option<String>,

    #[arg(long)]
    pub json: bool,
}

/// Context shared by every stage command.
fn context(farmer_id: Option<&str>, language: Option<&str>) -> PipelineContext {
    let ctx = match farmer_id {
        Some(id) => PipelineContext::for_farmer(id),
        None => PipelineContext::new(),
    };
    match language {
        Some(language) => ctx.with_language(language),
        None => ctx,
    }
}

pub fn query(args: &QueryArgs, config: &CharterConfig) -> anyhow::Result<()> {
    let pipeline = ValidationPipeline::from_config(config)?;
    let ctx = context(args.farmer_id.as_deref(), args.language.as_deref());
    let result = pipeline.validate_query(&args.query, &ctx)?;
    finish(&result, args.json)
}

pub fn sql(args: &SqlArgs, config: &CharterConfig) -> anyhow::Result<()> {
    let pipeline = ValidationPipeline::from_config(config)?;
    let mut ctx = context(args.farmer_id.as_deref(), args.language.as_deref());
    if let Some(keyword) = &args.write_confirmation {
        ctx = ctx.with_write_confirmation(keyword.as_str());
    }
    let result = pipeline.validate_sql(&args.sql, &args.query, &ctx)?;
    finish(&result, args.json)
}

pub fn response(args: &ResponseArgs, config: &CharterConfig) -> anyhow::Result<()> {
    let pipeline = ValidationPipeline::from_config(config)?;
    let ctx = context(args.farmer_id.as_deref(), args.language.as_deref());
    let result = pipeline.validate_response(&args.response, &args.query, &ctx)?;
    finish(&result, args.json)
}

fn finish(result: &StageResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", render(result));
    }
    if !result.pass {
        anyhow::bail!("{} stage blocked the request", result.stage);
    }
    Ok(())
}

/// Human-readable summary of one stage result.
pub fn render(result: &StageResult) -> String {
    let mut out = String::new();
    let verdict = if result.pass { "PASS" } else { "BLOCKED" };
    out.push_str(&format!(
        "Stage {}: {} (next: {})\n",
        result.stage, verdict, result.next
    ));
    out.push_str(&format!(
        "Compliance score: {:.1}\n",
        result.compliance.overall_score
    ));

    let flags = &result.flags;
    if let Some(kind) = flags.statement_kind {
        out.push_str(&format!("Statement: {}\n", kind));
    }
    if flags.needs_confirmation {
        if let Some(kind) = flags.write_operation {
            out.push_str(&format!(
                "Needs confirmation: rerun with --write-confirmation {}\n",
                kind
            ));
        }
    }
    if let Some(approved) = flags.sql_approved {
        out.push_str(&format!("SQL approved: {}\n", approved));
    }
    if let Some(approved) = flags.response_approved {
        out.push_str(&format!("Response approved: {}\n", approved));
    }
    if let Some(status) = &flags.mango_rule_status {
        out.push_str(&format!("Mango test: {}\n", status));
    }

    let violations: Vec<_> = result.all_violations().collect();
    if !violations.is_empty() {
        out.push_str("Violations:\n");
        for v in violations {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                v.severity.as_str(),
                v.principle,
                v.description
            ));
        }
    }
    out
}
