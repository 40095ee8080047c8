//! Fallback record synthesis
//!
//! When the provider cannot be reached or its response cannot be parsed, the
//! orchestrator still returns a record. Findings are derived from the raw
//! execution data and the diagnostic classifier.

use std::collections::BTreeSet;

use crate::diagnostics::{self, DiagnosticTag};
use crate::error::FailureReason;
use crate::model::{AnalysisRecord, AttackFinding, Execution, Outcome, RecordMeta};

pub const FALLBACK_SECURITY_IMPLICATIONS: &str =
    "Unknown: no model analysis was available for this execution";
pub const RETRY_STEP: &str = "Re-run the analysis once the underlying issue is resolved";

/// Build the record returned when automated analysis fails.
pub fn build_fallback(execution: &Execution, reason: &FailureReason, meta: &RecordMeta) -> AnalysisRecord {
    let mut all_tags = BTreeSet::new();

    let attack_findings = execution
        .attacks
        .iter()
        .map(|attack| {
            let tags = diagnostics::classify_attack(attack);
            all_tags.extend(tags.iter().copied());
            AttackFinding {
                attack_label: attack.label().to_string(),
                tool_label: attack.tool_id.clone(),
                outcome: Outcome::normalize(&attack.status),
                analysis: finding_analysis(&attack.status, &tags),
                recommendation: recommendation(&tags),
            }
        })
        .collect();

    let mut next_steps: Vec<String> = all_tags
        .iter()
        .map(|tag| tag.remediation().to_string())
        .collect();
    next_steps.push(RETRY_STEP.to_string());

    AnalysisRecord {
        summary: format!("Automated analysis failed ({}): {}", reason.kind(), reason),
        attack_findings,
        overall_assessment: format!(
            "Automated analysis could not be completed for execution {} ({} attacks, status {}). \
             Findings below are derived from raw execution data only.",
            execution.id,
            execution.attacks.len(),
            execution.status
        ),
        security_implications: FALLBACK_SECURITY_IMPLICATIONS.to_string(),
        next_steps,
        external_monitoring_summary: None,
        generated_at: meta.generated_at,
        provider_id: meta.provider_id,
        model_id: meta.model_id.clone(),
    }
}

fn finding_analysis(status: &str, tags: &BTreeSet<DiagnosticTag>) -> String {
    if tags.is_empty() {
        format!("Attack finished with status '{}'; no known failure signatures in its logs", status)
    } else {
        let labels: Vec<&str> = tags.iter().map(|tag| tag.label()).collect();
        format!("Attack finished with status '{}'. Detected: {}", status, labels.join(", "))
    }
}

fn recommendation(tags: &BTreeSet<DiagnosticTag>) -> Option<String> {
    if tags.is_empty() {
        return None;
    }
    let remediations: Vec<&str> = tags.iter().map(|tag| tag.remediation()).collect();
    Some(remediations.join(". "))
}
