use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use solhound_core::engine::RunOptions;
use solhound_core::report::{model::ToolInfo, render};
use solhound_core::rules::catalog::{Family, RuleSet};

mod args;

fn main() -> Result<()> {
    let args = args::Args::parse();

    let tool = ToolInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: args.commit.clone(),
    };

    let mut rules = RuleSet::full();
    if !args.families.is_empty() {
        let mut families = Vec::new();
        for name in &args.families {
            match name.parse::<Family>() {
                Ok(family) => families.push(family),
                Err(e) => bail!(e),
            }
        }
        rules.retain_families(&families);
    }
    if !args.rules.is_empty() {
        let ids: Vec<&str> = args.rules.iter().map(String::as_str).collect();
        rules.retain_ids(&ids);
    }

    let options = RunOptions {
        sequential: args.sequential,
        deadline: args.deadline_ms.map(Duration::from_millis),
        cancel: None,
    };

    let report = solhound_core::analyze(&args.model_path, tool, &rules, &options)?;

    let output = match args.format {
        args::OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        args::OutputFormat::Text => render::render_text(&report),
    };

    match args.out {
        Some(path) => std::fs::write(path, &output)?,
        None => print!("{output}"),
    }

    // Findings are not failures: a completed run exits 0 regardless of how
    // many rules triggered. Only model-loading or engine errors are fatal.
    Ok(())
}
