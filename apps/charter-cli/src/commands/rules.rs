// rules.rs: list the rule catalog.

use charter_core::Evaluator;
use charter_guard::CharterConfig;

pub fn execute(json: bool, config: &CharterConfig) -> anyhow::Result<()> {
    let evaluator = Evaluator::with_settings(&config.rules)?;
    let principles = evaluator.catalog().principles();

    if json {
        let entries: Vec<serde_json::Value> = principles
            .iter()
            .map(|p| serde_json::json!({ "principle": p, "summary": p.summary() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{} rule(s):", principles.len());
    for principle in principles {
        println!("  {:<20} {}", principle.as_str(), principle.summary());
    }
    Ok(())
}
