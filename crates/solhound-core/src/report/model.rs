use serde::{Deserialize, Serialize};

use crate::SCHEMA_VERSION;
use crate::engine::runner::{RunOutcome, RunStats};
use crate::model::entity::EntityRef;
use crate::rules::catalog::{Confidence, RuleMeta, Severity};
use crate::util::deterministic;

/// One heuristic finding.
///
/// This struct is the stable JSON contract consumed by downstream tooling:
/// `{rule_id, severity, confidence, entity_kind, entity_identity, message,
/// remediation?}`. Findings are immutable once created; they are only
/// appended to the sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub entity_kind: String,
    pub entity_identity: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    /// Build a finding from rule metadata and the triggering entity.
    pub fn new(meta: &RuleMeta, entity: EntityRef, message: impl Into<String>) -> Self {
        Self {
            rule_id: meta.id.to_string(),
            severity: meta.severity,
            confidence: meta.confidence,
            entity_kind: entity.kind().to_string(),
            entity_identity: entity.identity(),
            message: message.into(),
            remediation: meta.remediation.map(str::to_string),
        }
    }
}

/// A recovered rule-evaluation failure, tagged with enough context to
/// reproduce: the rule and the entity it was examining.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleError {
    pub rule_id: String,
    pub entity_identity: String,
    pub message: String,
}

/// Top-level report.
///
/// Deterministic for identical inputs: findings and errors are sorted
/// canonically, independent of evaluation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub tool: ToolInfo,
    pub artifact: ArtifactInfo,
    pub catalog: CatalogInfo,
    pub stats: RunStats,
    pub findings: Vec<Finding>,
    pub errors: Vec<RuleError>,
}

impl Report {
    /// Assemble a report from pipeline outputs, enforcing canonical order.
    pub fn new(
        tool: ToolInfo,
        artifact: ArtifactInfo,
        catalog: CatalogInfo,
        outcome: RunOutcome,
    ) -> Self {
        let RunOutcome {
            mut findings,
            mut errors,
            stats,
        } = outcome;

        deterministic::sort_findings(&mut findings);
        deterministic::sort_errors(&mut errors);

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            tool,
            artifact,
            catalog,
            stats,
            findings,
            errors,
        }
    }
}

/// Tool metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
    pub commit: Option<String>,
}

/// Model-file metadata bound to this report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: Option<String>,
    pub size_bytes: u64,
    pub hash: ArtifactHash,
}

/// Cryptographic model-file fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHash {
    pub algorithm: String,
    pub value: String,
}

/// Rule catalogue metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogInfo {
    pub catalog_version: String,
    pub ruleset: String,
}
