use crate::TOOL_NAME;
use crate::report::model::Report;

pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", TOOL_NAME, report.tool.version));
    out.push_str(&format!(
        "Model: {} ({} contracts, {} rules)\n",
        report.artifact.path.as_deref().unwrap_or("<unknown>"),
        report.stats.contracts,
        report.stats.rules,
    ));
    out.push_str(&format!("Findings: {}\n", report.findings.len()));
    for f in &report.findings {
        out.push_str(&format!(
            "  - {} [{}/{}] {}: {}\n",
            f.rule_id, f.severity, f.confidence, f.entity_identity, f.message
        ));
    }
    if !report.errors.is_empty() {
        out.push_str(&format!("Rule errors: {}\n", report.errors.len()));
        for e in &report.errors {
            out.push_str(&format!(
                "  - {} on {}: {}\n",
                e.rule_id, e.entity_identity, e.message
            ));
        }
    }
    out
}
