//! Capability predicates: composable boolean questions about a function or
//! contract, built from the pattern matcher.
//!
//! Every predicate is a pure function over the read-only model. Rules
//! combine them with explicit AND/OR; nothing here imposes an implicit
//! combination.

use crate::matcher::{flow, text};
use crate::model::ir::{Contract, Function};

/// Name contains any token of `patterns` after normalization.
pub fn is_name_like(name: &str, patterns: &[&str]) -> bool {
    text::contains_any(name, patterns)
}

/// Any node of the body matches.
pub fn body_contains_any(function: &Function, patterns: &[&str]) -> bool {
    function
        .nodes
        .iter()
        .any(|node| text::contains_any(&node.text, patterns))
}

/// Any require/assert node of the body matches.
pub fn guard_contains_any(function: &Function, patterns: &[&str]) -> bool {
    function
        .nodes
        .iter()
        .filter(|node| node.is_guard())
        .any(|node| text::contains_any(&node.text, patterns))
}

/// Any applied modifier name matches.
pub fn has_guarding_modifier(function: &Function, patterns: &[&str]) -> bool {
    function
        .modifiers
        .iter()
        .any(|name| text::contains_any(name, patterns))
}

/// Any parameter name matches.
pub fn has_param_named(function: &Function, patterns: &[&str]) -> bool {
    function
        .parameters
        .iter()
        .any(|param| text::contains_any(&param.name, patterns))
}

/// Any parameter's declared type matches.
pub fn has_param_typed(function: &Function, patterns: &[&str]) -> bool {
    function
        .parameters
        .iter()
        .any(|param| text::contains_any(&param.type_name, patterns))
}

/// Any call target of the function matches.
pub fn calls_any(function: &Function, patterns: &[&str]) -> bool {
    function
        .calls
        .iter()
        .any(|target| text::contains_any(target, patterns))
}

/// Any written state variable name matches.
pub fn writes_state_like(function: &Function, patterns: &[&str]) -> bool {
    function
        .state_variables_written
        .iter()
        .any(|name| text::contains_any(name, patterns))
}

/// The body enforces a strictly-positive or minimum amount: a
/// require/assert-like node combined with a greater-than-zero or minimum
/// comparison, or an explicit zero-check-and-revert.
pub fn enforces_lower_bound(function: &Function) -> bool {
    function.nodes.iter().any(|node| {
        let guard_like =
            node.is_guard() || text::contains_any(&node.text, &["require", "assert", "revert"]);
        if !guard_like {
            return false;
        }
        text::contains_any(&node.text, &["> 0", ">= min", "minstake", "minamount", "minimum"])
            || (text::contains_any(&node.text, &["== 0"])
                && text::contains_any(&node.text, &["revert"]))
    })
}

/// A loop-type node exists and some node inside its scope matches.
pub fn has_loop_with(function: &Function, patterns: &[&str]) -> bool {
    flow::loop_body_contains(&function.nodes, patterns)
}

/// A require/assert node validates `msg.sender`.
pub fn validates_caller(function: &Function) -> bool {
    guard_contains_any(function, &["msg.sender"])
}

/// The body mentions a timelock-style keyword, or compares
/// `block.timestamp` with `>=`/`>` (delay enforcement).
pub fn function_has_delay(function: &Function) -> bool {
    function.nodes.iter().any(|node| {
        text::contains_any(
            &node.text,
            &["timelock", "delay", "pending", "queue", "cooldown"],
        ) || text::contains_comparison(&node.text, "block.timestamp", &[">=", ">"])
    })
}

/// Any state variable name of the contract matches.
pub fn contract_has_state_var_like(contract: &Contract, patterns: &[&str]) -> bool {
    contract
        .state_variables
        .iter()
        .any(|var| text::contains_any(&var.name, patterns))
}

/// Any function name of the contract matches.
pub fn contract_has_function_like(contract: &Contract, patterns: &[&str]) -> bool {
    contract
        .functions
        .iter()
        .any(|function| text::contains_any(&function.name, patterns))
}

/// Any node of any function of the contract matches.
pub fn contract_body_contains(contract: &Contract, patterns: &[&str]) -> bool {
    contract
        .functions
        .iter()
        .any(|function| body_contains_any(function, patterns))
}

/// A state write happens strictly after an external call in the body.
///
/// Call targets defined on the same contract are treated as internal; the
/// write side is any node that both names a written state variable and
/// contains an assignment.
pub fn state_write_after_external_call(contract: &Contract, function: &Function) -> bool {
    let external_targets: Vec<&str> = function
        .calls
        .iter()
        .map(String::as_str)
        .filter(|target| !contract.functions.iter().any(|f| f.name == *target))
        .collect();

    let Some(call_at) = function.nodes.iter().position(|node| {
        text::contains_any(&node.text, &[".call", ".transfer(", ".send("])
            || text::contains_any(&node.text, &external_targets)
    }) else {
        return false;
    };

    function.nodes[call_at + 1..].iter().any(|node| {
        text::has_assignment(&node.text)
            && function
                .state_variables_written
                .iter()
                .any(|name| text::contains_any(&node.text, &[name.as_str()]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ir::{Node, NodeKind, Parameter};

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

    #[test]
    fn lower_bound_requires_a_guard_like_node() {
        let enforcing = Function {
            name: "stake".into(),
            nodes: vec![guard("require(amount > 0, \"zero stake\")")],
            ..Default::default()
        };
        let plain_comparison = Function {
            name: "stake".into(),
            nodes: vec![stmt("bool ok = amount > 0")],
            ..Default::default()
        };
        let zero_check_revert = Function {
            name: "stake".into(),
            nodes: vec![stmt("if (amount == 0) revert ZeroStake()")],
            ..Default::default()
        };
        let unchecked = Function {
            name: "stake".into(),
            nodes: vec![stmt("staked[msg.sender] += amount")],
            ..Default::default()
        };

        assert!(enforces_lower_bound(&enforcing));
        assert!(!enforces_lower_bound(&plain_comparison));
        assert!(enforces_lower_bound(&zero_check_revert));
        assert!(!enforces_lower_bound(&unchecked));
    }

    #[test]
    fn caller_validation_needs_a_guard_node() {
        let validated = Function {
            nodes: vec![guard("require(msg.sender == pool)")],
            ..Default::default()
        };
        let mentioned_only = Function {
            nodes: vec![stmt("emit Called(msg.sender)")],
            ..Default::default()
        };

        assert!(validates_caller(&validated));
        assert!(!validates_caller(&mentioned_only));
    }

    #[test]
    fn delay_detection_accepts_timestamp_comparison() {
        let timestamp_gate = Function {
            nodes: vec![guard("require(block.timestamp >= eta)")],
            ..Default::default()
        };
        let keyword = Function {
            nodes: vec![stmt("pendingImplementation = impl")],
            ..Default::default()
        };
        let none = Function {
            nodes: vec![stmt("implementation = impl")],
            ..Default::default()
        };

        assert!(function_has_delay(&timestamp_gate));
        assert!(function_has_delay(&keyword));
        assert!(!function_has_delay(&none));
    }

    #[test]
    fn param_matching_normalizes_names_and_types() {
        let f = Function {
            parameters: vec![
                Parameter {
                    name: "amount_out_min".into(),
                    type_name: "uint256".into(),
                },
                Parameter {
                    name: "pubKey".into(),
                    type_name: "uint256[2]".into(),
                },
            ],
            ..Default::default()
        };

        assert!(has_param_named(&f, &["amountoutmin"]));
        assert!(has_param_typed(&f, &["uint256[2]"]));
        assert!(!has_param_named(&f, &["deadline"]));
    }

    #[test]
    fn external_call_then_state_write_is_order_sensitive() {
        let contract = Contract {
            name: "Pool".into(),
            functions: vec![Function {
                name: "helper".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let vulnerable = Function {
            name: "withdraw".into(),
            calls: vec!["token.transferFrom".into()],
            state_variables_written: vec!["balances".into()],
            nodes: vec![
                stmt("token.transferFrom(msg.sender, address(this), amount)"),
                stmt("balances[msg.sender] = 0"),
            ],
            ..Default::default()
        };
        let safe_order = Function {
            name: "withdraw".into(),
            calls: vec!["token.transferFrom".into()],
            state_variables_written: vec!["balances".into()],
            nodes: vec![
                stmt("balances[msg.sender] = 0"),
                stmt("token.transferFrom(msg.sender, address(this), amount)"),
            ],
            ..Default::default()
        };
        let internal_only = Function {
            name: "withdraw".into(),
            calls: vec!["helper".into()],
            state_variables_written: vec!["balances".into()],
            nodes: vec![stmt("helper()"), stmt("balances[msg.sender] = 0")],
            ..Default::default()
        };

        assert!(state_write_after_external_call(&contract, &vulnerable));
        assert!(!state_write_after_external_call(&contract, &safe_order));
        assert!(!state_write_after_external_call(&contract, &internal_only));
    }

    #[test]
    fn contract_level_lookups() {
        let contract = Contract {
            name: "Ranking".into(),
            state_variables: vec![crate::model::ir::StateVariable {
                name: "tierBoundaries".into(),
                type_name: "uint256[]".into(),
                initializer: None,
            }],
            functions: vec![Function {
                name: "getTier".into(),
                nodes: vec![stmt("return rank * 40 / 100")],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(contract_has_state_var_like(&contract, &["tier"]));
        assert!(contract_has_function_like(&contract, &["gettier"]));
        assert!(contract_body_contains(&contract, &["/ 100"]));
        assert!(!contract_has_state_var_like(&contract, &["fenwick"]));
    }
}
