use crate::report::model::{Finding, RuleError};

/// Append-only accumulator for findings and rule-execution errors.
///
/// Findings are never mutated after being recorded. The sink is owned by
/// the runner: rules return findings and never see the sink itself, which
/// keeps rules independent by construction. In the parallel path, per-unit
/// results are aggregated into the sink by a single writer.
#[derive(Debug, Default)]
pub struct FindingSink {
    findings: Vec<Finding>,
    errors: Vec<RuleError>,
}

impl FindingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn record_all(&mut self, findings: Vec<Finding>) {
        self.findings.extend(findings);
    }

    pub fn record_error(&mut self, error: RuleError) {
        self.errors.push(error);
    }

    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn into_parts(self) -> (Vec<Finding>, Vec<RuleError>) {
        (self.findings, self.errors)
    }
}
