//! Deterministic ordering helpers.
//!
//! These utilities enforce the stable ordering guarantees of the report
//! schema: identical inputs always produce identical output, independent
//! of rule evaluation order or worker scheduling.

use crate::report::model::{Finding, RuleError};

/// Sort findings canonically by `(rule_id, entity_identity, message)`.
///
/// This ordering is part of the report contract and must not change
/// without a schema version bump.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        (a.rule_id.as_str(), a.entity_identity.as_str(), a.message.as_str()).cmp(&(
            b.rule_id.as_str(),
            b.entity_identity.as_str(),
            b.message.as_str(),
        ))
    });
}

/// Sort rule errors canonically by `(rule_id, entity_identity, message)`.
pub fn sort_errors(errors: &mut [RuleError]) {
    errors.sort_by(|a, b| {
        (a.rule_id.as_str(), a.entity_identity.as_str(), a.message.as_str()).cmp(&(
            b.rule_id.as_str(),
            b.entity_identity.as_str(),
            b.message.as_str(),
        ))
    });
}
