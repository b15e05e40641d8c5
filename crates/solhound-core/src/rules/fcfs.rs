//! FCFS and tiering rules: integer-division tier boundaries, ghost
//! stakers, cascading tier updates, position gaming and ranking-tree
//! consistency.

use anyhow::Result;

use crate::matcher::text;
use crate::model::entity::EntityRef;
use crate::model::ir::{Contract, Function};
use crate::predicates;
use crate::report::model::Finding;
use crate::rules::catalog::{Confidence, Family, Rule, RuleContext, RuleMeta, Severity};

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(TierBoundary),
        Box::new(GhostStaker),
        Box::new(CascadeDos),
        Box::new(PositionGaming),
        Box::new(TreeConsistency),
    ]
}

const TIER_PATTERNS: &[&str] = &["tier", "rank", "level", "boundary", "threshold"];

const TREE_PATTERNS: &[&str] = &[
    "fenwick",
    "bit",
    "binaryindexed",
    "segmenttree",
    "rankingtree",
];

pub struct TierBoundary;

static TIER_BOUNDARY_META: RuleMeta = RuleMeta {
    id: "fcfs-tier-boundary",
    family: Family::FcfsTiering,
    help: "Integer division in tier boundaries may cause edge case bugs",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Use cumulative percentage calculation with explicit rounding and test the modular edge cases of the staker count",
    ),
};

impl TierBoundary {
    fn handles_tiers(function: &Function) -> bool {
        predicates::is_name_like(&function.name, TIER_PATTERNS)
            || predicates::body_contains_any(function, TIER_PATTERNS)
    }

    /// Division by 100/1000 next to a tier keyword, or any percentage
    /// arithmetic, collides at specific counts (e.g. 10N+4 for a
    /// 40/30/30 split).
    fn has_tier_division(function: &Function) -> bool {
        function.nodes.iter().any(|node| {
            (text::contains_any(&node.text, &["/ 100", "/ 1000"])
                && text::contains_any(&node.text, TIER_PATTERNS))
                || text::contains_any(&node.text, &["percent", "bps"])
        })
    }
}

impl Rule for TierBoundary {
    fn meta(&self) -> &'static RuleMeta {
        &TIER_BOUNDARY_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if Self::handles_tiers(function) && Self::has_tier_division(function) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "calculates tier boundaries using integer division - boundaries may collide at specific staker counts",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct GhostStaker;

static GHOST_STAKER_META: RuleMeta = RuleMeta {
    id: "fcfs-ghost-staker",
    family: Family::FcfsTiering,
    help: "Zero-amount staking may create ghost entries in ranking",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Enforce a minimum stake amount greater than zero before inserting into the ranking structure",
    ),
};

impl Rule for GhostStaker {
    fn meta(&self) -> &'static RuleMeta {
        &GHOST_STAKER_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !predicates::is_name_like(&function.name, &["stake", "deposit", "join", "register"])
            {
                continue;
            }
            if !predicates::enforces_lower_bound(function) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "may allow zero-amount staking, creating ghost entries in the ranking",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct CascadeDos;

static CASCADE_META: RuleMeta = RuleMeta {
    id: "fcfs-cascade-dos",
    family: Family::FcfsTiering,
    help: "Cascading tier updates may cause gas exhaustion DoS",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some(
        "Prefer lazy tier calculation on read, or batch updates and cap the affected users per transaction",
    ),
};

impl CascadeDos {
    fn modifies_ranking(function: &Function) -> bool {
        predicates::is_name_like(
            &function.name,
            &["stake", "unstake", "update", "rerank", "recalculate"],
        ) || predicates::writes_state_like(
            function,
            &["rank", "tier", "position", "tree", "fenwick"],
        )
    }
}

impl Rule for CascadeDos {
    fn meta(&self) -> &'static RuleMeta {
        &CASCADE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !Self::modifies_ranking(function) {
                continue;
            }
            if predicates::has_loop_with(function, &["update", "recalculate", "tier", "rank"]) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "may trigger cascading tier updates inside a loop - gas cost grows with the number of affected stakers",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct PositionGaming;

static POSITION_META: RuleMeta = RuleMeta {
    id: "fcfs-position-gaming",
    family: Family::FcfsTiering,
    help: "FCFS ranking may be vulnerable to position gaming",
    severity: Severity::Medium,
    confidence: Confidence::Low,
    remediation: Some(
        "Add cooldowns for stake changes, or use time-weighted staking or commit-reveal",
    ),
};

impl PositionGaming {
    fn has_fcfs_mechanics(contract: &Contract) -> bool {
        predicates::contract_has_state_var_like(
            contract,
            &["rank", "tier", "position", "fcfs", "queue"],
        ) || predicates::contract_has_function_like(contract, &["rank", "tier", "position"])
    }

    fn has_anti_gaming(contract: &Contract) -> bool {
        predicates::contract_has_state_var_like(
            contract,
            &["cooldown", "lockup", "timelock", "commit", "reveal"],
        ) || predicates::contract_has_function_like(
            contract,
            &["cooldown", "commit", "reveal", "lock"],
        )
    }
}

impl Rule for PositionGaming {
    fn meta(&self) -> &'static RuleMeta {
        &POSITION_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !Self::has_fcfs_mechanics(ctx.contract) {
            return Ok(Vec::new());
        }
        if Self::has_anti_gaming(ctx.contract) {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::new(
            self.meta(),
            EntityRef::contract(ctx.contract),
            "implements FCFS ranking without anti-gaming measures",
        )])
    }
}

pub struct TreeConsistency;

static TREE_META: RuleMeta = RuleMeta {
    id: "fcfs-fenwick-consistency",
    family: Family::FcfsTiering,
    help: "Ranking tree may become inconsistent with actual state",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some(
        "Keep tree insert/remove atomic with stake state changes and assert tree size matches the active staker count",
    ),
};

impl TreeConsistency {
    fn uses_tree_structure(contract: &Contract) -> bool {
        contract.state_variables.iter().any(|var| {
            text::contains_any(&var.name, TREE_PATTERNS)
                || text::contains_any(&var.type_name, TREE_PATTERNS)
        })
    }

    fn is_unstake_like(function: &Function) -> bool {
        predicates::is_name_like(&function.name, &["unstake", "withdraw", "leave", "exit"])
    }
}

impl Rule for TreeConsistency {
    fn meta(&self) -> &'static RuleMeta {
        &TREE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !Self::uses_tree_structure(ctx.contract) {
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for function in &ctx.contract.functions {
            if !Self::is_unstake_like(function) {
                continue;
            }
            if !predicates::body_contains_any(function, &["remove", "delete", "pop"]) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "unstake path may not remove the entry from the ranking tree",
                ));
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ir::{ContractModel, Node, NodeKind, StateVariable};

    fn stmt(text: &str) -> Node {
        Node {
            kind: NodeKind::Statement,
            text: text.into(),
        }
    }

    fn guard(text: &str) -> Node {
        Node {
            kind: NodeKind::RequireOrAssert,
            text: text.into(),
        }
    }

    fn loop_start() -> Node {
        Node {
            kind: NodeKind::StartLoop,
            text: "for (uint i = 0; i < affected.length; i++)".into(),
        }
    }

    fn loop_end() -> Node {
        Node {
            kind: NodeKind::EndLoop,
            text: String::new(),
        }
    }

    fn eval(rule: &dyn Rule, contract: Contract) -> Vec<Finding> {
        let model = ContractModel {
            contracts: vec![contract],
        };
        let ctx = RuleContext {
            model: &model,
            contract: &model.contracts[0],
        };
        rule.evaluate(&ctx).unwrap()
    }

    #[test]
    fn tier_division_by_hundred_is_flagged() {
        let contract = Contract {
            name: "Tiers".into(),
            functions: vec![Function {
                name: "getTier".into(),
                nodes: vec![stmt("uint tier1Boundary = total * 40 / 100")],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert_eq!(eval(&TierBoundary, contract).len(), 1);
    }

    #[test]
    fn tier_function_without_division_is_clean() {
        let contract = Contract {
            name: "Tiers".into(),
            functions: vec![Function {
                name: "getTier".into(),
                nodes: vec![stmt("return tierOf[account]")],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(eval(&TierBoundary, contract).is_empty());
    }

    #[test]
    fn stake_without_minimum_check_is_a_ghost_staker() {
        let contract = Contract {
            name: "StakingPool".into(),
            functions: vec![Function {
                name: "stake".into(),
                signature: "stake(uint256)".into(),
                nodes: vec![
                    stmt("stakedAmount[msg.sender] += amount"),
                    stmt("rankingTree.add(msg.sender)"),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };

        let findings = eval(&GhostStaker, contract);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_identity, "StakingPool.stake(uint256)");
    }

    #[test]
    fn minimum_enforcement_suppresses_ghost_staker() {
        let contract = Contract {
            name: "StakingPool".into(),
            functions: vec![Function {
                name: "stake".into(),
                nodes: vec![
                    guard("require(amount > 0, \"zero stake\")"),
                    stmt("stakedAmount[msg.sender] += amount"),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(eval(&GhostStaker, contract).is_empty());
    }

    #[test]
    fn tier_update_inside_a_loop_is_a_cascade_risk() {
        let contract = Contract {
            name: "Ranking".into(),
            functions: vec![Function {
                name: "updateStake".into(),
                nodes: vec![
                    stmt("updateRanking(msg.sender)"),
                    loop_start(),
                    stmt("recalculateTier(affected[i])"),
                    loop_end(),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert_eq!(eval(&CascadeDos, contract).len(), 1);
    }

    #[test]
    fn tier_update_outside_loops_is_not_a_cascade() {
        let contract = Contract {
            name: "Ranking".into(),
            functions: vec![Function {
                name: "updateStake".into(),
                nodes: vec![stmt("recalculateTier(msg.sender)")],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(eval(&CascadeDos, contract).is_empty());
    }

    #[test]
    fn fcfs_mechanics_without_anti_gaming_is_flagged_once() {
        let gamed = Contract {
            name: "Queue".into(),
            state_variables: vec![StateVariable {
                name: "rankOf".into(),
                type_name: "mapping(address => uint256)".into(),
                initializer: None,
            }],
            ..Default::default()
        };
        let cooled = Contract {
            name: "Queue".into(),
            state_variables: vec![
                StateVariable {
                    name: "rankOf".into(),
                    type_name: "mapping(address => uint256)".into(),
                    initializer: None,
                },
                StateVariable {
                    name: "cooldownEnds".into(),
                    type_name: "mapping(address => uint256)".into(),
                    initializer: None,
                },
            ],
            ..Default::default()
        };

        let findings = eval(&PositionGaming, gamed);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_kind, "contract");
        assert!(eval(&PositionGaming, cooled).is_empty());
    }

    #[test]
    fn unstake_that_never_removes_from_the_tree_is_flagged() {
        let contract = Contract {
            name: "StakingPool".into(),
            state_variables: vec![StateVariable {
                name: "fenwickTree".into(),
                type_name: "FenwickTree".into(),
                initializer: None,
            }],
            functions: vec![
                Function {
                    name: "unstake".into(),
                    nodes: vec![
                        stmt("uint amount = stakedAmount[msg.sender]"),
                        stmt("stakedAmount[msg.sender] = 0"),
                        stmt("payable(msg.sender).transfer(amount)"),
                    ],
                    ..Default::default()
                },
                Function {
                    name: "exit".into(),
                    nodes: vec![stmt("fenwickTree.remove(msg.sender)")],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let findings = eval(&TreeConsistency, contract);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_identity, "StakingPool.unstake");
    }

    #[test]
    fn contracts_without_a_ranking_tree_are_not_selected() {
        let contract = Contract {
            name: "Vault".into(),
            functions: vec![Function {
                name: "withdraw".into(),
                nodes: vec![stmt("balances[msg.sender] = 0")],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(eval(&TreeConsistency, contract).is_empty());
    }
}
