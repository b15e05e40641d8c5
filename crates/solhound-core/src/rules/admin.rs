//! Admin security rules, with an L2 focus: instant proxy upgrades,
//! deployer-as-admin, bridge exits, emergency withdrawals and multi-sig
//! weakening.

use anyhow::Result;

use crate::matcher::text;
use crate::model::entity::EntityRef;
use crate::model::ir::{Contract, Function};
use crate::predicates;
use crate::report::model::Finding;
use crate::rules::catalog::{Confidence, Family, Rule, RuleContext, RuleMeta, Severity};

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(UpgradeNoTimelock),
        Box::new(SharedDeployer),
        Box::new(BridgeExitRisk),
        Box::new(EmergencyWithdraw),
        Box::new(MultisigBypass),
    ]
}

const UPGRADE_PATTERNS: &[&str] = &[
    "upgradeto",
    "upgradetoandcall",
    "setimplementation",
    "changeimplementation",
    "upgrade",
];

const TIMELOCK_PATTERNS: &[&str] = &[
    "timelock",
    "delay",
    "scheduledupgrade",
    "pendingimplementation",
    "upgradequeue",
    "mindelay",
];

const ADMIN_MODIFIER_PATTERNS: &[&str] = &[
    "onlyadmin",
    "onlyowner",
    "onlygovernance",
    "onlyauthorized",
    "adminonly",
];

pub struct UpgradeNoTimelock;

static UPGRADE_META: RuleMeta = RuleMeta {
    id: "admin-upgrade-no-timelock",
    family: Family::AdminSecurity,
    help: "Proxy upgrade without timelock - instant admin takeover risk",
    severity: Severity::High,
    confidence: Confidence::High,
    remediation: Some(
        "Add a timelock longer than the L2-to-L1 bridge delay and require a multi-sig for admin operations",
    ),
};

impl UpgradeNoTimelock {
    fn is_proxy_or_admin(contract: &Contract) -> bool {
        text::contains_any(
            &contract.name,
            &[
                "proxy",
                "admin",
                "upgradeable",
                "upgradeability",
                "proxyadmin",
                "transparentproxy",
                "uups",
            ],
        )
    }

    fn contract_has_timelock(contract: &Contract) -> bool {
        predicates::contract_has_state_var_like(contract, TIMELOCK_PATTERNS)
            || predicates::contract_has_function_like(contract, &["schedule", "queue", "execute"])
    }
}

impl Rule for UpgradeNoTimelock {
    fn meta(&self) -> &'static RuleMeta {
        &UPGRADE_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !Self::is_proxy_or_admin(ctx.contract) {
            return Ok(Vec::new());
        }

        let has_timelock = Self::contract_has_timelock(ctx.contract);
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !predicates::is_name_like(&function.name, UPGRADE_PATTERNS) {
                continue;
            }
            if !has_timelock && !predicates::function_has_delay(function) {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "allows immediate proxy upgrade without timelock - attacker can upgrade, drain and bridge out in one transaction",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct SharedDeployer;

static DEPLOYER_META: RuleMeta = RuleMeta {
    id: "admin-shared-deployer",
    family: Family::AdminSecurity,
    help: "Contract may be using deployer as admin - single point of failure",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Transfer admin to a dedicated multi-sig immediately after deployment and never share deployer keys across protocols",
    ),
};

impl SharedDeployer {
    fn has_admin_transfer(contract: &Contract) -> bool {
        predicates::contract_has_function_like(
            contract,
            &["transferadmin", "setadmin", "changeadmin"],
        )
    }

    fn has_ownership_transfer(contract: &Contract) -> bool {
        predicates::contract_has_function_like(
            contract,
            &["transferownership", "setowner", "changeowner"],
        )
    }
}

impl Rule for SharedDeployer {
    fn meta(&self) -> &'static RuleMeta {
        &DEPLOYER_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let Some(constructor) = ctx.contract.constructor() else {
            return Ok(Vec::new());
        };

        let mut findings = Vec::new();
        for node in &constructor.nodes {
            let assigns_sender = text::contains_any(&node.text, &["msg.sender"]);
            if !assigns_sender {
                continue;
            }

            if text::contains_any(&node.text, &["admin"]) && !Self::has_admin_transfer(ctx.contract)
            {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::contract(ctx.contract),
                    "assigns deployer (msg.sender) as admin without transfer mechanism",
                ));
            }
            if text::contains_any(&node.text, &["owner"])
                && !Self::has_ownership_transfer(ctx.contract)
            {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::contract(ctx.contract),
                    "assigns deployer as owner - ensure ownership is transferred to a multi-sig",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct BridgeExitRisk;

static BRIDGE_EXIT_META: RuleMeta = RuleMeta {
    id: "l2-bridge-exit-risk",
    family: Family::AdminSecurity,
    help: "Admin may drain funds via L2-to-L1 bridge",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some(
        "Limit withdrawals per time period, require a multi-sig for large movements and alert on unusual admin activity",
    ),
};

impl BridgeExitRisk {
    fn is_admin_withdrawal(function: &Function) -> bool {
        predicates::is_name_like(
            &function.name,
            &["withdraw", "rescue", "recover", "sweep", "transfer", "bridge"],
        ) && predicates::has_guarding_modifier(function, ADMIN_MODIFIER_PATTERNS)
    }
}

impl Rule for BridgeExitRisk {
    fn meta(&self) -> &'static RuleMeta {
        &BRIDGE_EXIT_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !Self::is_admin_withdrawal(function) {
                continue;
            }

            let has_limit = predicates::body_contains_any(
                function,
                &["maxwithdrawal", "withdrawallimit", "dailylimit"],
            );
            let has_delay =
                predicates::body_contains_any(function, &["delay", "timelock", "pending"]);
            let has_multisig =
                predicates::body_contains_any(function, &["multisig", "threshold", "signatures"]);

            let entity = EntityRef::function(ctx.contract, function);
            if !has_limit {
                findings.push(Finding::new(
                    self.meta(),
                    entity.clone(),
                    "no withdrawal limit - admin can drain all funds",
                ));
            }
            if !has_delay {
                findings.push(Finding::new(
                    self.meta(),
                    entity.clone(),
                    "no withdrawal delay - instant drain possible",
                ));
            }
            if !has_multisig {
                findings.push(Finding::new(
                    self.meta(),
                    entity,
                    "no multi-sig requirement - single key compromise sufficient",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct EmergencyWithdraw;

static EMERGENCY_META: RuleMeta = RuleMeta {
    id: "admin-emergency-withdraw",
    family: Family::AdminSecurity,
    help: "Emergency withdraw may enable admin to steal user funds",
    severity: Severity::High,
    confidence: Confidence::Medium,
    remediation: Some(
        "Restrict emergency withdrawals to the caller's own funds and whitelist rescuable tokens",
    ),
};

impl Rule for EmergencyWithdraw {
    fn meta(&self) -> &'static RuleMeta {
        &EMERGENCY_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for function in &ctx.contract.functions {
            if !predicates::is_name_like(
                &function.name,
                &["emergency", "rescue", "recover", "sweep", "panic"],
            ) {
                continue;
            }

            let restricted_to_admin =
                predicates::has_guarding_modifier(function, &["admin", "owner", "governance"]);
            let requires_user_action = function.nodes.iter().any(|node| {
                text::contains_any(&node.text, &["msg.sender"])
                    && text::contains_any(&node.text, &["user", "depositor", "position"])
            });
            let has_token_whitelist =
                predicates::body_contains_any(function, &["allowedtoken", "rescuetokens"]);

            if restricted_to_admin && !requires_user_action {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "admin can withdraw without user consent",
                ));
            }
            if !has_token_whitelist {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "no token whitelist - can rescue any token including user deposits",
                ));
            }
        }

        Ok(findings)
    }
}

pub struct MultisigBypass;

static MULTISIG_META: RuleMeta = RuleMeta {
    id: "admin-multisig-bypass",
    family: Family::AdminSecurity,
    help: "Multi-sig protection may be bypassable",
    severity: Severity::High,
    confidence: Confidence::Low,
    remediation: Some(
        "Keep the signing threshold at two or more and timelock threshold and signer changes",
    ),
};

impl Rule for MultisigBypass {
    fn meta(&self) -> &'static RuleMeta {
        &MULTISIG_META
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>> {
        if !text::contains_any(
            &ctx.contract.name,
            &["multisig", "gnosis", "safe", "wallet", "signers"],
        ) {
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for function in &ctx.contract.functions {
            if predicates::is_name_like(&function.name, &["threshold"])
                && !predicates::function_has_delay(function)
            {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "threshold change has no timelock",
                ));
            }
            if predicates::is_name_like(
                &function.name,
                &["addsigner", "removesigner", "addowner", "removeowner"],
            ) && !predicates::function_has_delay(function)
            {
                findings.push(Finding::new(
                    self.meta(),
                    EntityRef::function(ctx.contract, function),
                    "signer management has no timelock",
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

    fn proxy_admin(extra_vars: Vec<StateVariable>, upgrade_nodes: Vec<Node>) -> Contract {
        Contract {
            name: "ProxyAdmin".into(),
            state_variables: extra_vars,
            functions: vec![Function {
                name: "upgradeTo".into(),
                signature: "upgradeTo(address)".into(),
                nodes: upgrade_nodes,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn immediate_upgrade_without_timelock_is_flagged() {
        let contract = proxy_admin(vec![], vec![stmt("implementation = newImplementation")]);

        let findings = eval(&UpgradeNoTimelock, contract);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].entity_identity, "ProxyAdmin.upgradeTo(address)");
    }

    #[test]
    fn timelock_state_variable_suppresses_the_upgrade_finding() {
        let contract = proxy_admin(
            vec![StateVariable {
                name: "timelockDelay".into(),
                type_name: "uint256".into(),
                initializer: Some("7 days".into()),
            }],
            vec![
                stmt("require(block.timestamp >= queuedAt + timelockDelay)"),
                stmt("implementation = newImplementation"),
            ],
        );

        assert!(eval(&UpgradeNoTimelock, contract).is_empty());
    }

    #[test]
    fn non_proxy_contracts_are_not_selected() {
        let contract = Contract {
            name: "Token".into(),
            functions: vec![Function {
                name: "upgradeTo".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(eval(&UpgradeNoTimelock, contract).is_empty());
    }

    #[test]
    fn deployer_as_owner_without_transfer_is_flagged() {
        let contract = Contract {
            name: "Vault".into(),
            functions: vec![Function {
                name: "constructor".into(),
                is_constructor: true,
                nodes: vec![stmt("owner = msg.sender")],
                ..Default::default()
            }],
            ..Default::default()
        };

        let findings = eval(&SharedDeployer, contract);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("owner"));
    }

    #[test]
    fn ownership_transfer_function_suppresses_deployer_finding() {
        let contract = Contract {
            name: "Vault".into(),
            functions: vec![
                Function {
                    name: "constructor".into(),
                    is_constructor: true,
                    nodes: vec![stmt("owner = msg.sender")],
                    ..Default::default()
                },
                Function {
                    name: "transferOwnership".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert!(eval(&SharedDeployer, contract).is_empty());
    }

    #[test]
    fn admin_withdrawal_reports_each_missing_safeguard() {
        let contract = Contract {
            name: "Treasury".into(),
            modifiers: vec![crate::model::ir::ModifierDef {
                name: "onlyAdmin".into(),
            }],
            functions: vec![Function {
                name: "withdrawAll".into(),
                modifiers: vec!["onlyAdmin".into()],
                nodes: vec![stmt("token.transfer(to, balance)")],
                ..Default::default()
            }],
            ..Default::default()
        };

        let findings = eval(&BridgeExitRisk, contract);
        assert_eq!(findings.len(), 3);
    }

    #[test]
    fn unrestricted_withdraw_is_not_an_admin_exit() {
        let contract = Contract {
            name: "Pool".into(),
            functions: vec![Function {
                name: "withdraw".into(),
                nodes: vec![stmt("payout(msg.sender)")],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(eval(&BridgeExitRisk, contract).is_empty());
    }

    #[test]
    fn emergency_withdraw_without_user_consent_is_flagged() {
        let contract = Contract {
            name: "Farm".into(),
            modifiers: vec![crate::model::ir::ModifierDef {
                name: "onlyOwner".into(),
            }],
            functions: vec![Function {
                name: "emergencyWithdraw".into(),
                modifiers: vec!["onlyOwner".into()],
                nodes: vec![stmt("token.transfer(owner, token.balanceOf(address(this)))")],
                ..Default::default()
            }],
            ..Default::default()
        };

        let findings = eval(&EmergencyWithdraw, contract);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().any(|f| f.message.contains("user consent")));
        assert!(findings.iter().any(|f| f.message.contains("token whitelist")));
    }

    #[test]
    fn threshold_change_without_delay_is_flagged() {
        let contract = Contract {
            name: "TeamMultisig".into(),
            functions: vec![
                Function {
                    name: "setThreshold".into(),
                    nodes: vec![stmt("threshold = newThreshold")],
                    ..Default::default()
                },
                Function {
                    name: "removeSigner".into(),
                    nodes: vec![guard("require(block.timestamp >= changeQueuedAt + delay)")],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let findings = eval(&MultisigBypass, contract);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("threshold"));
    }
}
