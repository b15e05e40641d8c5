//! Emerging-protocol rules: restaking, intent-based settlement and
//! points/airdrop systems.

use anyhow::Result;

use crate::matcher::text;
use crate::model::entity::EntityRef;
use crate::model::ir::{Contract, Function};
use crate::predicates;
use crate::report::model::Finding;
use crate::rules::catalog::{Confidence, Family, Rule, RuleContext, RuleMeta, Severity};

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SlashingCascade),
        Box::new(DelegationRisk),
        Box::new(IntentReplay),
        Box::new(SolverCollusion),
        Box::new(PointsSybil),
        Box::new(MerkleProofRisk),
    ]
}

const SLASHING_PATTERNS: &[&str] = &[
    "slash",
    "penalize",
    "slashing",
    "penalty",
    "punish",
    "confiscate",
];

const DELEGATION_PATTERNS: &[&str] = &[
    "delegate",
    "undelegate",
    "redelegate",
    "setoperator",
    "chooseoperator",
    "selectvalidator",
];

const INTENT_PATTERNS: &[&str] = &[
    "executeintent",
    "fillorder",
    "settleintent",
    "resolveintent",
    "executesigned",
    "fillsigned",
];

const POINTS_PATTERNS: &[&str] = &[
    "addpoints",
    "accumulatepoints",
    "awardpoints",
    "updatepoints",
    "claimpoints",
    "refer",
    "referral",
];

pub struct SlashingCascade;

static SLASHING_META: RuleMeta = RuleMeta {
    id: "restaking-slashing-risk",
    family: Family::EmergingProtocols,
    help: "Potential slashing cascade vulnerability",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Cap slashing per service, track cumulative slashing and add a circuit breaker for excessive events",
    ),
};

impl SlashingCascade {
    fn is_restaking_contract(contract: &Contract) -> bool {
        text::contains_any(
            &contract.name,
            &[
                "restaking",
                "eigenlayer",
                "avs",
                "operator",
                "delegation",
                "staking",
                "symbiotic",
                "vault",
            ],
        )
    }
}

impl Rule for SlashingCascade {
    fn meta(&self) -> &'static RuleMeta {
        &SLASHING_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !Self::is_restaking_contract(ctx.contract) {
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for function in &ctx.contract.functions {
            if !predicates::is_name_like(&function.name, SLASHING_PATTERNS) {
                continue;
            }

            let mut has_cap =
                predicates::contract_has_state_var_like(ctx.contract, &["slashingcap", "maxslash"]);
            let mut tracks_cumulative = predicates::contract_has_state_var_like(
                ctx.contract,
                &["cumulativeslash", "totalslash"],
            );
            let mut has_circuit_breaker = false;

            for node in &function.nodes {
                if text::contains_any(&node.text, &["maxslash", "cap"]) {
                    has_cap = true;
                }
                if text::contains_any(&node.text, &["paused", "emergency"]) {
                    has_circuit_breaker = true;
                }
                if text::contains_any(&node.text, &["cumulative", "+="])
                    && text::contains_any(&node.text, &["slash", "penalty"])
                {
                    tracks_cumulative = true;
                }
            }

            let entity = EntityRef::function(ctx.contract, function);
            if !has_cap {
                findings.push(Finding::new(
                    self.meta(),
                    entity.clone(),
                    "no slashing cap implemented - cascade risk",
                ));
            }
            if !tracks_cumulative {
                findings.push(Finding::new(
                    self.meta(),
                    entity.clone(),
                    "doesn't track cumulative slashing across services",
                ));
            }
            if !has_circuit_breaker {
                findings.push(Finding::new(
                    self.meta(),
                    entity,
                    "no circuit breaker for excessive slashing",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct DelegationRisk;

static DELEGATION_META: RuleMeta = RuleMeta {
    id: "restaking-delegation-risk",
    family: Family::EmergingProtocols,
    help: "Delegation manipulation vulnerability",
    severity: Severity::Medium,
    confidence: Confidence::Medium,
    remediation: Some(
        "Add cooldown periods for delegation changes and withdrawal delays with checkpoints",
    ),
};

impl Rule for DelegationRisk {
    fn meta(&self) -> &'static RuleMeta {
        &DELEGATION_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !predicates::is_name_like(&function.name, DELEGATION_PATTERNS) {
                continue;
            }

            let has_cooldown =
                predicates::body_contains_any(function, &["cooldown", "waitperiod", "delay"])
                    || predicates::has_guarding_modifier(
                        function,
                        &["cooldown", "delay", "timelock"],
                    );
            let has_timelock = function.nodes.iter().any(|node| {
                text::contains_comparison(&node.text, "block.timestamp", &[">=", ">", "after"])
            });

            if !has_cooldown && !has_timelock {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "no cooldown/timelock - vulnerable to frontrunning",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct IntentReplay;

static INTENT_META: RuleMeta = RuleMeta {
    id: "intent-replay-risk",
    family: Family::EmergingProtocols,
    help: "Intent may be replayed or manipulated",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Track executed intents by hash or nonce, validate expiration and mark intents consumed",
    ),
};

impl Rule for IntentReplay {
    fn meta(&self) -> &'static RuleMeta {
        &INTENT_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !predicates::is_name_like(&function.name, INTENT_PATTERNS) {
                continue;
            }

            let mut has_nonce_check = false;
            let mut has_expiry_check = false;
            let mut marks_consumed = false;

            for node in &function.nodes {
                let tracking = text::contains_any(&node.text, &["nonce", "executed", "consumed"]);
                if tracking {
                    if node.is_guard() {
                        has_nonce_check = true;
                    }
                    if text::contains_any(&node.text, &["= true", "["]) {
                        marks_consumed = true;
                    }
                }

                if text::contains_any(&node.text, &["deadline", "expiry", "validuntil"])
                    && (text::contains_any(&node.text, &["block.timestamp"]) || node.is_guard())
                {
                    has_expiry_check = true;
                }
            }

            let entity = EntityRef::function(ctx.contract, function);
            if !has_nonce_check {
                findings.push(Finding::new(
                    self.meta(),
                    entity.clone(),
                    "no nonce/consumed check - intent may be replayed",
                ));
            }
            if !has_expiry_check {
                findings.push(Finding::new(
                    self.meta(),
                    entity.clone(),
                    "no expiry validation - stale intents may execute",
                ));
            }
            if !marks_consumed {
                findings.push(Finding::new(
                    self.meta(),
                    entity,
                    "intent not marked as consumed after execution",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct SolverCollusion;

static SOLVER_META: RuleMeta = RuleMeta {
    id: "solver-collusion-risk",
    family: Family::EmergingProtocols,
    help: "Solver may extract value through collusion",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some(
        "Run a competitive solver auction, require price improvement and track solver reputation",
    ),
};

impl Rule for SolverCollusion {
    fn meta(&self) -> &'static RuleMeta {
        &SOLVER_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !text::contains_any(
            &ctx.contract.name,
            &["solver", "resolver", "filler", "relayer", "settler"],
        ) {
            return Ok(Vec::new());
        }

        let has_auction =
            predicates::contract_has_function_like(ctx.contract, &["auction", "bid", "compete"]);
        let has_reputation = predicates::contract_has_function_like(
            ctx.contract,
            &["reputation", "score", "slash"],
        );
        let has_price_check = predicates::contract_body_contains(
            ctx.contract,
            &["minprice", "priceimprovement", "marketprice"],
        );

        let mut findings = Vec::new();
        let entity = EntityRef::contract(ctx.contract);
        if !has_auction {
            findings.push(Finding::new(
                self.meta(),
                entity.clone(),
                "no solver auction mechanism - single solver may extract value",
            ));
        }
        if !has_price_check {
            findings.push(Finding::new(
                self.meta(),
                entity.clone(),
                "no price improvement validation",
            ));
        }
        if !has_reputation {
            findings.push(Finding::new(
                self.meta(),
                entity,
                "no solver reputation/slashing mechanism",
            ));
        }

        Ok(findings)
    }
}

pub struct PointsSybil;

static POINTS_META: RuleMeta = RuleMeta {
    id: "points-sybil-risk",
    family: Family::EmergingProtocols,
    help: "Points system vulnerable to Sybil/gaming",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Use time-weighted balances, require minimum deposit duration and cap referral rewards",
    ),
};

impl Rule for PointsSybil {
    fn meta(&self) -> &'static RuleMeta {
        &POINTS_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !predicates::is_name_like(&function.name, POINTS_PATTERNS) {
                continue;
            }

            let has_time_weight =
                predicates::body_contains_any(function, &["timeweight", "duration", "elapsed"]);
            let has_min_duration = predicates::body_contains_any(
                function,
                &["minduration", "lockperiod", "vestingstart"],
            );
            let has_cap = predicates::body_contains_any(function, &["maxpoints", "cap", "limit"]);

            if !has_time_weight && !has_min_duration {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "no time-weighting - vulnerable to flash loan point farming",
                ));
            }
            if predicates::is_name_like(&function.name, &["referral"]) && !has_cap {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "referral rewards not capped - Sybil risk",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct MerkleProofRisk;

static MERKLE_META: RuleMeta = RuleMeta {
    id: "merkle-proof-risk",
    family: Family::EmergingProtocols,
    help: "Merkle proof claim may be manipulated",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Track claimed leaves and bind proofs to msg.sender to prevent reuse",
    ),
};

impl MerkleProofRisk {
    fn is_merkle_claim(function: &Function) -> bool {
        predicates::is_name_like(&function.name, &["claim", "redeem"])
            && predicates::has_param_named(function, &["proof"])
    }
}

impl Rule for MerkleProofRisk {
    fn meta(&self) -> &'static RuleMeta {
        &MERKLE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !Self::is_merkle_claim(function) {
                continue;
            }

            let has_claim_tracking =
                predicates::contract_has_state_var_like(ctx.contract, &["claimed", "redeemed"])
                    || predicates::body_contains_any(function, &["claimed[", "redeemed["]);
            let verifies_sender = function.nodes.iter().any(|node| {
                text::contains_any(&node.text, &["merkle", "verify"])
                    && text::contains_any(&node.text, &["msg.sender"])
            });

            let entity = EntityRef::function(ctx.contract, function);
            if !has_claim_tracking {
                findings.push(Finding::new(
                    self.meta(),
                    entity.clone(),
                    "no claim tracking - double claim possible",
                ));
            }
            if !verifies_sender {
                findings.push(Finding::new(
                    self.meta(),
                    entity,
                    "proof doesn't include msg.sender - proof may be reused",
                ));
            }
        }

        Ok(findings)
    }
}
