//! Validation and defaulting
//!
//! Coerces any parsed JSON object into an [`AnalysisRecord`]. Every field has
//! a documented default and a list of accepted source keys, so this step
//! cannot fail once parsing has succeeded.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::{AnalysisRecord, AttackFinding, Outcome, ProviderKind, RecordMeta};

pub const DEFAULT_SUMMARY: &str = "Analysis completed";
pub const DEFAULT_OVERALL_ASSESSMENT: &str = "No overall assessment provided";
pub const DEFAULT_SECURITY_IMPLICATIONS: &str = "No security implications identified";
pub const DEFAULT_ATTACK_LABEL: &str = "Unknown attack";
pub const DEFAULT_TOOL_LABEL: &str = "Unknown tool";
pub const DEFAULT_FINDING_ANALYSIS: &str = "No analysis provided";

const SUMMARY_KEYS: &[&str] = &["summary"];
const FINDINGS_KEYS: &[&str] = &["attackFindings", "attacksAnalysis", "attacks"];
const OVERALL_KEYS: &[&str] = &["overallAssessment"];
const IMPLICATIONS_KEYS: &[&str] = &["securityImplications"];
const NEXT_STEPS_KEYS: &[&str] = &["nextSteps"];
const MONITORING_KEYS: &[&str] = &["externalMonitoringSummary"];

const ATTACK_LABEL_KEYS: &[&str] = &["attackLabel", "attackName", "attack", "name"];
const TOOL_LABEL_KEYS: &[&str] = &["toolLabel", "tool", "toolName"];
const OUTCOME_KEYS: &[&str] = &["outcome", "status"];
const ANALYSIS_KEYS: &[&str] = &["analysis"];
const RECOMMENDATION_KEYS: &[&str] = &["recommendation"];

/// Build a record from a parsed value, filling gaps from the defaults above
/// and provenance from `meta`.
pub fn into_record(value: &Value, meta: &RecordMeta) -> AnalysisRecord {
    let empty = Map::new();
    let object = value.as_object().unwrap_or(&empty);

    AnalysisRecord {
        summary: text_field(object, SUMMARY_KEYS, DEFAULT_SUMMARY),
        attack_findings: findings(first_present(object, FINDINGS_KEYS)),
        overall_assessment: text_field(object, OVERALL_KEYS, DEFAULT_OVERALL_ASSESSMENT),
        security_implications: text_field(object, IMPLICATIONS_KEYS, DEFAULT_SECURITY_IMPLICATIONS),
        next_steps: string_list(first_present(object, NEXT_STEPS_KEYS)),
        external_monitoring_summary: first_present(object, MONITORING_KEYS).and_then(rendered_text),
        generated_at: object
            .get("generatedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(meta.generated_at),
        provider_id: object
            .get("providerId")
            .and_then(Value::as_str)
            .and_then(ProviderKind::parse)
            .unwrap_or(meta.provider_id),
        model_id: object
            .get("modelId")
            .and_then(scalar_text)
            .unwrap_or_else(|| meta.model_id.clone()),
    }
}

/// Coerce one entry of the findings array.
pub fn into_finding(value: &Value) -> AttackFinding {
    if let Some(text) = value.as_str() {
        return AttackFinding {
            attack_label: DEFAULT_ATTACK_LABEL.to_string(),
            tool_label: DEFAULT_TOOL_LABEL.to_string(),
            outcome: Outcome::normalize(text),
            analysis: text.to_string(),
            recommendation: None,
        };
    }

    let empty = Map::new();
    let object = value.as_object().unwrap_or(&empty);

    AttackFinding {
        attack_label: text_field(object, ATTACK_LABEL_KEYS, DEFAULT_ATTACK_LABEL),
        tool_label: text_field(object, TOOL_LABEL_KEYS, DEFAULT_TOOL_LABEL),
        outcome: first_present(object, OUTCOME_KEYS)
            .and_then(scalar_text)
            .map(|s| Outcome::normalize(&s))
            .unwrap_or(Outcome::Partial),
        analysis: text_field(object, ANALYSIS_KEYS, DEFAULT_FINDING_ANALYSIS),
        recommendation: first_present(object, RECOMMENDATION_KEYS).and_then(scalar_text),
    }
}

fn findings(value: Option<&Value>) -> Vec<AttackFinding> {
    match value {
        Some(Value::Array(items)) => items.iter().map(into_finding).collect(),
        Some(single @ Value::Object(_)) => vec![into_finding(single)],
        _ => Vec::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// First key in `keys` whose value is present and non-null.
fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(object: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(scalar_text)
        .unwrap_or_else(|| default.to_string())
}

/// Strings as-is, numbers and booleans stringified, everything else `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Like [`scalar_text`], but structured values are rendered as compact JSON.
fn rendered_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
        other => scalar_text(other),
    }
}
