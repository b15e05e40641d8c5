//! MEV risk rules: slippage protection, deadlines, flash-loan surfaces and
//! oracle usage.

use anyhow::Result;

use crate::matcher::text;
use crate::model::entity::EntityRef;
use crate::model::ir::{Function, Node};
use crate::predicates;
use crate::report::model::Finding;
use crate::rules::catalog::{Confidence, Family, Rule, RuleContext, RuleMeta, Severity};

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(MissingSlippage),
        Box::new(ExcessiveSlippage),
        Box::new(MissingDeadline),
        Box::new(FlashLoanEnabler),
        Box::new(OracleManipulation),
    ]
}

/// DEX router entry points that need a caller-supplied minimum output.
const DEX_SWAP_FUNCTIONS: &[&str] = &[
    "swap(",
    "swapexacttokensfortokens(",
    "swapexacttokensforeth(",
    "swapexactethfortokens(",
    "swaptokensforexacttokens(",
    "exchange(",
    "exchangeunderlying(",
    "sell(",
    "buy(",
    "exactinputsingle(",
    "exactinput(",
    "exactoutputsingle(",
    "exactoutput(",
];

/// Parameter names that indicate a minimum output amount.
const MIN_OUTPUT_PARAMS: &[&str] = &[
    "minamountout",
    "amountoutmin",
    "minout",
    "minimumamount",
    "minreceived",
    "minreturn",
    "amountoutminimum",
];

const DEADLINE_PARAMS: &[&str] = &["deadline", "expiry", "validuntil", "expires", "timeout"];

/// Known flash loan provider callback entry points.
const FLASH_LOAN_CALLBACKS: &[&str] = &[
    "onflashloan",
    "executeoperation",
    "uniswapv2call",
    "uniswapv3flashcallback",
    "pancakecall",
    "callee",
    "callback",
];

const SPOT_PRICE_FUNCTIONS: &[&str] = &[
    "getspot",
    "getspotprice",
    "getreserves",
    "slot0",
    "getprice",
    "getrate",
];

const TWAP_FUNCTIONS: &[&str] = &["observe", "consult", "twap", "gettwap", "getaverageprice"];

pub struct MissingSlippage;

static MISSING_SLIPPAGE_META: RuleMeta = RuleMeta {
    id: "mev-missing-slippage",
    family: Family::Mev,
    help: "Missing slippage protection in swap functions",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some("Always specify a reasonable minimum output amount based on expected output"),
};

impl MissingSlippage {
    fn has_slippage_protection(function: &Function, node: &Node) -> bool {
        // A dedicated minimum-output parameter protects every call site.
        if predicates::has_param_named(function, MIN_OUTPUT_PARAMS) {
            return true;
        }
        // A literal zero minimum defeats any other signal.
        if text::contains_any(&node.text, &["(0,", ",0,", ",0)"]) {
            return false;
        }
        // A caller-supplied argument flowing into the call is acceptable.
        function.parameters.iter().any(|param| {
            !param.name.is_empty() && text::contains_any(&node.text, &[param.name.as_str()])
        })
    }
}

impl Rule for MissingSlippage {
    fn meta(&self) -> &'static RuleMeta {
        &MISSING_SLIPPAGE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if function.is_constructor || !function.is_externally_reachable() {
                continue;
            }

            for node in &function.nodes {
                let Some(target) = DEX_SWAP_FUNCTIONS
                    .iter()
                    .copied()
                    .find(|t| text::contains_any(&node.text, &[*t]))
                else {
                    continue;
                };
                if Self::has_slippage_protection(function, node) {
                    continue;
                }
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    format!(
                        "calls {} without slippage protection",
                        target.trim_end_matches('(')
                    ),
                ));
            }
        }

        Ok(findings)
    }
}

pub struct ExcessiveSlippage;

static EXCESSIVE_SLIPPAGE_META: RuleMeta = RuleMeta {
    id: "mev-excessive-slippage",
    family: Family::Mev,
    help: "Excessive slippage tolerance in swap functions",
    severity: Severity::Medium,
    confidence: Confidence::Medium,
    remediation: Some("Use slippage tolerance of 0.5-2% for most trades"),
};

/// 5% in basis points; anything above is profitable MEV territory.
const MAX_SLIPPAGE_BPS: u64 = 500;

impl ExcessiveSlippage {
    fn initial_value(initializer: &str) -> Option<u64> {
        let normalized = text::normalize(initializer);
        let digits: String = normalized
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }
}

impl Rule for ExcessiveSlippage {
    fn meta(&self) -> &'static RuleMeta {
        &EXCESSIVE_SLIPPAGE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for var in &ctx.contract.state_variables {
            if !text::contains_any(&var.name, &["slippage", "tolerance", "maxslip", "minout"]) {
                continue;
            }
            let Some(value) = var.initializer.as_deref().and_then(Self::initial_value) else {
                continue;
            };
            if value > MAX_SLIPPAGE_BPS {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::contract(ctx.contract),
                    format!(
                        "excessive slippage tolerance: {} = {}bps (>{}bps)",
                        var.name, value, MAX_SLIPPAGE_BPS
                    ),
                ));
            }
        }

        Ok(findings)
    }
}

pub struct MissingDeadline;

static MISSING_DEADLINE_META: RuleMeta = RuleMeta {
    id: "mev-missing-deadline",
    family: Family::Mev,
    help: "Missing deadline check in swap functions",
    severity: Severity::Medium,
    confidence: Confidence::Medium,
    remediation: Some("Include a deadline parameter and check it against block.timestamp"),
};

impl MissingDeadline {
    fn has_deadline_check(function: &Function) -> bool {
        predicates::has_param_named(function, DEADLINE_PARAMS)
            || predicates::guard_contains_any(function, &["block.timestamp", "deadline"])
    }
}

impl Rule for MissingDeadline {
    fn meta(&self) -> &'static RuleMeta {
        &MISSING_DEADLINE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            let is_swap = predicates::is_name_like(
                &function.name,
                &["swap", "exchange", "trade", "sell", "buy"],
            );
            if is_swap && !Self::has_deadline_check(function) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "lacks deadline check - transactions can be delayed and front-run",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct FlashLoanEnabler;

static FLASH_LOAN_META: RuleMeta = RuleMeta {
    id: "mev-flash-loan-enabler",
    family: Family::Mev,
    help: "Function may enable flash loan attacks",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some("Use reentrancy guards, validate callback sources, and use commit-reveal patterns"),
};

impl FlashLoanEnabler {
    fn has_reentrancy_guard(function: &Function) -> bool {
        predicates::has_guarding_modifier(function, &["nonreentrant", "lock", "mutex"])
    }
}

impl Rule for FlashLoanEnabler {
    fn meta(&self) -> &'static RuleMeta {
        &FLASH_LOAN_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !function.is_externally_reachable() {
                continue;
            }

            let is_callback = FLASH_LOAN_CALLBACKS
                .iter()
                .any(|cb| text::normalize(&function.name) == *cb);
            if is_callback && !predicates::validates_caller(function) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "flash loan callback does not validate caller - may enable unauthorized calls",
                ));
            }

            if predicates::state_write_after_external_call(ctx.contract, function)
                && !Self::has_reentrancy_guard(function)
            {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "state change after external call - potential flash loan/reentrancy vector",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct OracleManipulation;

static ORACLE_META: RuleMeta = RuleMeta {
    id: "mev-oracle-manipulation",
    family: Family::Mev,
    help: "Potential oracle manipulation vulnerability",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some("Use TWAP oracles, implement freshness checks, and add circuit breakers"),
};

impl Rule for OracleManipulation {
    fn meta(&self) -> &'static RuleMeta {
        &ORACLE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            let uses_spot = predicates::body_contains_any(function, SPOT_PRICE_FUNCTIONS);
            let uses_twap = predicates::body_contains_any(function, TWAP_FUNCTIONS);
            let has_freshness = predicates::body_contains_any(
                function,
                &["updatedat", "staleness", "heartbeat"],
            ) || predicates::guard_contains_any(function, &["roundid"]);

            if uses_spot && !uses_twap {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "uses spot price without TWAP - vulnerable to flash loan manipulation",
                ));
            }

            if (uses_spot || uses_twap) && !has_freshness {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "no freshness/staleness check on oracle data",
                ));
            }
        }

        Ok(findings)
    }
}
