//! Rule metadata and the per-run rule catalogue.
//!
//! The catalogue is an explicit, passed-in list: there is no process-wide
//! registry, so parallel runs and tests can build isolated rule sets
//! without hidden shared state.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::ir::{Contract, ContractModel};
use crate::report::model::Finding;

/// Finding severity. Ordering is semantic: LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How confident the heuristic is. Ordering is semantic: LOW < MEDIUM < HIGH.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named rule family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Family {
    Mev,
    L2,
    AdminSecurity,
    Crypto,
    EmergingProtocols,
    FcfsTiering,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Mev,
        Family::L2,
        Family::AdminSecurity,
        Family::Crypto,
        Family::EmergingProtocols,
        Family::FcfsTiering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mev => "mev",
            Self::L2 => "l2",
            Self::AdminSecurity => "admin-security",
            Self::Crypto => "crypto",
            Self::EmergingProtocols => "emerging-protocols",
            Self::FcfsTiering => "fcfs-tiering",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| format!("unknown rule family `{s}`"))
    }
}

/// Static rule metadata, independent of any evaluation state.
#[derive(Debug, Clone, Copy)]
pub struct RuleMeta {
    /// Unique string identifier, e.g. `mev-missing-slippage`.
    pub id: &'static str,
    pub family: Family,
    /// One-line help text.
    pub help: &'static str,
    pub severity: Severity,
    pub confidence: Confidence,
    pub remediation: Option<&'static str>,
}

/// Evaluation context handed to a rule: the contract under examination and
/// the whole model, for cross-contract gating (e.g. "does this model look
/// L2-targeted at all").
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'m> {
    pub model: &'m ContractModel,
    pub contract: &'m Contract,
}

/// One detection rule.
///
/// `evaluate` is a pure function of (rule, contract, model): it selects its
/// own entities (the contract itself, functions, nodes) and returns zero or
/// more findings, one per distinct violated check. Rules never see the
/// finding sink or other rules' output, so they stay independent and may be
/// evaluated in any order or in parallel.
pub trait Rule: Send + Sync {
    fn meta(&self) -> &'static RuleMeta;

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>>;
}

/// An explicit, per-run rule catalogue.
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
    label: String,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            label: "empty".to_string(),
        }
    }

    /// The full built-in catalogue, in family order.
    pub fn full() -> Self {
        let mut rules: Vec<Box<dyn Rule>> = Vec::new();
        rules.extend(crate::rules::mev::rules());
        rules.extend(crate::rules::l2::rules());
        rules.extend(crate::rules::admin::rules());
        rules.extend(crate::rules::crypto::rules());
        rules.extend(crate::rules::emerging::rules());
        rules.extend(crate::rules::fcfs::rules());
        Self {
            rules,
            label: "default".to_string(),
        }
    }

    pub fn push(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Keep only rules belonging to one of `families`.
    pub fn retain_families(&mut self, families: &[Family]) {
        self.rules
            .retain(|rule| families.contains(&rule.meta().family));
        self.label = "subset".to_string();
    }

    /// Keep only rules whose id is listed.
    pub fn retain_ids(&mut self, ids: &[&str]) {
        self.rules.retain(|rule| ids.contains(&rule.meta().id));
        self.label = "subset".to_string();
    }

    /// Label describing how this catalogue was selected (`default` for the
    /// full built-in set).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    pub fn metas(&self) -> Vec<&'static RuleMeta> {
        self.rules.iter().map(|rule| rule.meta()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn full_catalog_has_unique_ids_across_six_families() {
        let rules = RuleSet::full();

        let ids: Vec<&str> = rules.metas().iter().map(|m| m.id).collect();
        let unique: HashSet<&&str> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate rule id in catalog");

        let families: HashSet<&str> = rules.metas().iter().map(|m| m.family.as_str()).collect();
        assert_eq!(families.len(), 6);
        assert_eq!(rules.label(), "default");
    }

    #[test]
    fn family_round_trips_through_from_str() {
        for family in Family::ALL {
            assert_eq!(family.as_str().parse::<Family>().unwrap(), family);
        }
        assert!("no-such-family".parse::<Family>().is_err());
    }

    #[test]
    fn retain_families_filters_and_relabels() {
        let mut rules = RuleSet::full();
        rules.retain_families(&[Family::Mev]);

        assert!(!rules.is_empty());
        assert!(rules.metas().iter().all(|m| m.family == Family::Mev));
        assert_eq!(rules.label(), "subset");
    }

    #[test]
    fn retain_ids_keeps_exactly_the_listed_rules() {
        let mut rules = RuleSet::full();
        rules.retain_ids(&["fcfs-ghost-staker", "mev-missing-slippage"]);

        let mut ids: Vec<&str> = rules.metas().iter().map(|m| m.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["fcfs-ghost-staker", "mev-missing-slippage"]);
    }

    #[test]
    fn severity_and_confidence_order_semantically() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Confidence::High > Confidence::Low);
    }

    #[test]
    fn severity_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"CRITICAL\""
        );
        assert_eq!(
            serde_json::to_string(&Confidence::Medium).unwrap(),
            "\"MEDIUM\""
        );
    }
}
