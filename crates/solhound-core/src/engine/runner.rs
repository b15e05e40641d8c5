//! The engine runner: evaluates every (Contract × Rule) unit and collects
//! results into the finding sink.
//!
//! The model is read-only and rules are side-effect-free, so distinct
//! units have no data dependency and may run on independent worker
//! threads. Failures are isolated per unit: one rule erroring on one
//! contract never suppresses other rules' findings.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::sink::FindingSink;
use crate::model::ir::ContractModel;
use crate::report::model::{Finding, RuleError};
use crate::rules::catalog::{RuleContext, RuleSet};
use crate::util::deterministic;

/// Per-run execution knobs.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Evaluate units sequentially instead of on the rayon pool.
    pub sequential: bool,

    /// Wall-clock budget for the run, checked between units.
    pub deadline: Option<Duration>,

    /// External cancellation token, checked between units.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Counters describing what a run covered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStats {
    pub contracts: usize,
    pub rules: usize,
    pub units_evaluated: usize,
    /// True when a deadline or cancellation stopped the run before every
    /// unit was evaluated.
    pub cancelled: bool,
}

/// Everything a run produced: findings, recovered rule errors, counters.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub findings: Vec<Finding>,
    pub errors: Vec<RuleError>,
    pub stats: RunStats,
}

enum UnitOutput {
    Findings(Vec<Finding>),
    Error(RuleError),
    Skipped,
}

/// Evaluate every rule against every contract of the model.
///
/// Each (Contract × Rule) unit either contributes findings or one
/// recovered `RuleError`; an error is permanent for that unit within the
/// run (no retry) and does not affect any other unit. Findings and errors
/// are returned in canonical order, independent of scheduling.
pub fn run(model: &ContractModel, rules: &RuleSet, options: &RunOptions) -> RunOutcome {
    let started = Instant::now();
    let deadline = options.deadline.map(|budget| started + budget);
    let stop = AtomicBool::new(false);

    let units: Vec<(usize, usize)> = (0..model.contracts.len())
        .flat_map(|contract| (0..rules.len()).map(move |rule| (contract, rule)))
        .collect();
    let rule_list: Vec<&dyn crate::rules::catalog::Rule> = rules.iter().collect();

    let evaluated = AtomicUsize::new(0);
    let evaluate_unit = |&(contract_index, rule_index): &(usize, usize)| -> UnitOutput {
        if stop.load(Ordering::Relaxed)
            || options
                .cancel
                .as_ref()
                .is_some_and(|token| token.load(Ordering::Relaxed))
            || deadline.is_some_and(|at| Instant::now() >= at)
        {
            stop.store(true, Ordering::Relaxed);
            return UnitOutput::Skipped;
        }

        let contract = &model.contracts[contract_index];
        let rule = rule_list[rule_index];
        let ctx = RuleContext { model, contract };

        evaluated.fetch_add(1, Ordering::Relaxed);
        match rule.evaluate(&ctx) {
            Ok(findings) => UnitOutput::Findings(findings),
            Err(error) => {
                warn!(
                    rule = rule.meta().id,
                    contract = %contract.name,
                    %error,
                    "rule evaluation failed; continuing with remaining units"
                );
                UnitOutput::Error(RuleError {
                    rule_id: rule.meta().id.to_string(),
                    entity_identity: contract.name.clone(),
                    message: error.to_string(),
                })
            }
        }
    };

    let outputs: Vec<UnitOutput> = if options.sequential {
        units.iter().map(evaluate_unit).collect()
    } else {
        units.par_iter().map(evaluate_unit).collect()
    };

    // Single-writer aggregation into the append-only sink.
    let mut sink = FindingSink::new();
    let mut cancelled = false;
    for output in outputs {
        match output {
            UnitOutput::Findings(findings) => sink.record_all(findings),
            UnitOutput::Error(error) => sink.record_error(error),
            UnitOutput::Skipped => cancelled = true,
        }
    }

    let stats = RunStats {
        contracts: model.contracts.len(),
        rules: rules.len(),
        units_evaluated: evaluated.load(Ordering::Relaxed),
        cancelled,
    };
    debug!(
        contracts = stats.contracts,
        rules = stats.rules,
        findings = sink.finding_count(),
        errors = sink.error_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );

    let (mut findings, mut errors) = sink.into_parts();
    deterministic::sort_findings(&mut findings);
    deterministic::sort_errors(&mut errors);

    RunOutcome {
        findings,
        errors,
        stats,
    }
}
