//! Layer-2 specific rules: sequencer downtime, cross-chain messaging,
//! address aliasing, gas assumptions and finality.

use anyhow::Result;

use crate::matcher::text;
use crate::model::entity::EntityRef;
use crate::model::ir::{ContractModel, Function};
use crate::predicates;
use crate::report::model::Finding;
use crate::rules::catalog::{Confidence, Family, Rule, RuleContext, RuleMeta, Severity};

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SequencerDependency),
        Box::new(MessageRisk),
        Box::new(AddressAliasing),
        Box::new(GasCalculation),
        Box::new(ReorgRisk),
    ]
}

/// Operations that must not silently stall during sequencer downtime.
const TIME_SENSITIVE_FUNCTIONS: &[&str] = &[
    "liquidate",
    "liquidation",
    "auction",
    "settle",
    "expire",
    "claim",
    "withdraw",
    "exercise",
    "executeliquidation",
    "triggerauction",
    "callmargin",
];

const SEQUENCER_CHECK_PATTERNS: &[&str] = &[
    "sequenceruptimefeed",
    "sequencerstatus",
    "l2sequencer",
    "issequencerup",
];

const L1L2_PATTERNS: &[&str] = &[
    "onlybridge",
    "onlymessenger",
    "crosschainmessage",
    "receivemessage",
    "finalizemessage",
    "relayermessage",
    "createretryableticket",
    "redeemticket",
];

/// Does the model look L2-targeted at all? Checked across every contract,
/// not just the one under evaluation.
fn is_l2_model(model: &ContractModel) -> bool {
    model.contracts.iter().any(|contract| {
        text::contains_any(&contract.name, &["arbitrum", "optimism", "l2", "rollup"])
            || predicates::contract_body_contains(
                contract,
                &["arbsys", "l2messenger", "ovmcontext"],
            )
    })
}

pub struct SequencerDependency;

static SEQUENCER_META: RuleMeta = RuleMeta {
    id: "l2-sequencer-dependency",
    family: Family::L2,
    help: "Operation vulnerable to sequencer downtime",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Check a sequencer uptime feed and add a grace period after recovery; support force-inclusion via L1 for critical operations",
    ),
};

impl Rule for SequencerDependency {
    fn meta(&self) -> &'static RuleMeta {
        &SEQUENCER_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !is_l2_model(ctx.model) {
            return Ok(Vec::new());
        }

        let has_sequencer_check =
            predicates::contract_body_contains(ctx.contract, SEQUENCER_CHECK_PATTERNS);
        if has_sequencer_check {
            return Ok(Vec::new());
        }

        let findings = ctx
            .contract
            .functions
            .iter()
            .filter(|function| {
                predicates::is_name_like(&function.name, TIME_SENSITIVE_FUNCTIONS)
            })
            .map(|function| {
                Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "is time-sensitive but contract lacks sequencer uptime check",
                )
            })
            .collect();

        Ok(findings)
    }
}

pub struct MessageRisk;

static MESSAGE_META: RuleMeta = RuleMeta {
    id: "l2-message-risk",
    family: Family::L2,
    help: "L1<->L2 message handling vulnerability",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Track message nonces for replay protection and validate message freshness with timestamps",
    ),
};

impl MessageRisk {
    fn is_message_handler(function: &Function) -> bool {
        predicates::is_name_like(&function.name, L1L2_PATTERNS)
            || predicates::has_guarding_modifier(function, &["bridge", "messenger"])
    }
}

impl Rule for MessageRisk {
    fn meta(&self) -> &'static RuleMeta {
        &MESSAGE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !Self::is_message_handler(function) {
                continue;
            }

            let has_replay_protection = predicates::body_contains_any(
                function,
                &["nonce", "processed", "executed", "messageid"],
            );
            let has_timestamp_check =
                predicates::body_contains_any(function, &["block.timestamp", "staleness"]);

            if !has_replay_protection {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "lacks replay protection (no nonce/processed check)",
                ));
            }
            if !has_timestamp_check {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "no freshness validation for cross-chain data",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct AddressAliasing;

static ALIASING_META: RuleMeta = RuleMeta {
    id: "l2-address-aliasing",
    family: Family::L2,
    help: "Address aliasing not handled in cross-chain communication",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some(
        "Undo the L1-to-L2 alias offset on msg.sender when validating cross-chain calls from L1 contracts",
    ),
};

impl AddressAliasing {
    fn has_cross_chain_handler(ctx: &RuleContext<'_>) -> bool {
        ctx.contract.functions.iter().any(|function| {
            function.is_externally_reachable()
                && (predicates::has_guarding_modifier(function, &["bridge", "l1", "crosschain"])
                    || predicates::is_name_like(
                        &function.name,
                        &["froml1", "onreceive", "relayed"],
                    ))
        })
    }
}

impl Rule for AddressAliasing {
    fn meta(&self) -> &'static RuleMeta {
        &ALIASING_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !Self::has_cross_chain_handler(ctx) {
            return Ok(Vec::new());
        }

        let handles_aliasing = predicates::contract_body_contains(
            ctx.contract,
            &[
                "addressaliashelper",
                "undol1tol2alias",
                "applyl1tol2alias",
                "1111000000000000",
            ],
        );
        if handles_aliasing {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::new(
            self.meta(),
            EntityRef::contract(ctx.contract),
            "handles cross-chain messages but may not account for L1-to-L2 address aliasing",
        )])
    }
}

pub struct GasCalculation;

static GAS_META: RuleMeta = RuleMeta {
    id: "l2-gas-calculation",
    family: Family::L2,
    help: "L2 gas calculation may be incorrect",
    severity: Severity::Medium,
    confidence: Confidence::Low,
    remediation: Some(
        "Avoid hardcoded gas limits and account for L1 data fees in cost calculations",
    ),
};

/// Hardcoded gas below this bound is suspicious on L2s, where the same
/// operation can cost considerably more than on mainnet.
const SUSPICIOUS_GAS_CEILING: u64 = 1_000_000;

impl Rule for GasCalculation {
    fn meta(&self) -> &'static RuleMeta {
        &GAS_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            for node in &function.nodes {
                if let Some(gas) = text::extract_numeric(&node.text, "gas") {
                    if gas > 0 && gas < SUSPICIOUS_GAS_CEILING {
                        findings.push(Finding::new(
                            self.meta(),
                            EntityRef::function(ctx.contract, function),
                            format!("hardcoded gas limit ({gas}) may be insufficient on L2"),
                        ));
                    }
                }
                if text::contains_any(&node.text, &["block.gaslimit"]) {
                    findings.push(Finding::new(
                        self.meta(),
                        EntityRef::function(ctx.contract, function),
                        "block.gaslimit differs significantly on L2 networks",
                    ));
                }
            }
        }

        Ok(findings)
    }
}

pub struct ReorgRisk;

static REORG_META: RuleMeta = RuleMeta {
    id: "l2-reorg-risk",
    family: Family::L2,
    help: "Operation may be affected by L2 reorg",
    severity: Severity::Medium,
    confidence: Confidence::Low,
    remediation: Some(
        "Add confirmation delay for high-value operations and never derive randomness from recent block data",
    ),
};

impl Rule for ReorgRisk {
    fn meta(&self) -> &'static RuleMeta {
        &REORG_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if predicates::body_contains_any(function, &["blockhash"]) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "uses blockhash - unreliable on L2 due to different finality",
                ));
            }
            if predicates::body_contains_any(function, &["prevrandao", "block.difficulty"]) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "uses prevrandao/difficulty - behavior differs on L2",
                ));
            }
        }

        Ok(findings)
    }
}
