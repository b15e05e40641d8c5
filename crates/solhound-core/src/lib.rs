use std::path::Path;

use anyhow::Result;

pub mod engine;
pub mod matcher;
pub mod model;
pub mod predicates;
pub mod report;
pub mod rules;
pub mod util;

use crate::engine::RunOptions;
use crate::report::model::{CatalogInfo, Report, ToolInfo};
use crate::rules::catalog::RuleSet;

pub const TOOL_NAME: &str = "solhound";

/// JSON schema version of reports.
/// This must be bumped only when the report contract changes semantically.
pub const SCHEMA_VERSION: &str = "0.1.0";

pub const RULE_CATALOG_VERSION: &str = "0.1.0";

/// Run the full pipeline over a contract-model file.
///
/// Reads and fingerprints the model, validates it (model errors are fatal,
/// no partial results), evaluates the given rule catalogue and assembles
/// the deterministic report. Findings are not failures: the function
/// returns `Ok` for any completed run, with findings and recovered rule
/// errors inside the report.
pub fn analyze(
    path: &Path,
    tool: ToolInfo,
    rules: &RuleSet,
    options: &RunOptions,
) -> Result<Report> {
    let ctx = model::load::read_model(path)?;
    let contract_model = model::load::parse_model(&ctx.bytes)?;
    model::load::validate(&contract_model)?;

    let outcome = engine::run(&contract_model, rules, options);

    let catalog = CatalogInfo {
        catalog_version: RULE_CATALOG_VERSION.to_string(),
        ruleset: rules.label().to_string(),
    };

    Ok(Report::new(tool, ctx.into_artifact(), catalog, outcome))
}
