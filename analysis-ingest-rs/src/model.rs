//! Data model
//!
//! This module defines the validated analysis record produced by ingestion and
//! the read-only execution records consumed as input.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single attack, always one of three tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Partial,
}

impl Outcome {
    /// Normalize a free-text outcome by keyword matching.
    ///
    /// `success`/`completed` map to [`Outcome::Success`], `fail`/`error` to
    /// [`Outcome::Failed`], anything else to [`Outcome::Partial`].
    pub fn normalize(text: &str) -> Self {
        let lowered = text.to_lowercase();
        if lowered.contains("success") || lowered.contains("completed") {
            Outcome::Success
        } else if lowered.contains("fail") || lowered.contains("error") {
            Outcome::Failed
        } else {
            Outcome::Partial
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Partial => write!(f, "partial"),
        }
    }
}

/// Which kind of model provider produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// A daemon on the local network reached over plain HTTP
    Local,
    /// A hosted API reached with bearer-token authentication
    Remote,
}

impl ProviderKind {
    /// Upper bound on a single provider dispatch.
    pub fn default_timeout(&self) -> Duration {
        match self {
            ProviderKind::Local => Duration::from_secs(10 * 60),
            ProviderKind::Remote => Duration::from_secs(5 * 60),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Some(ProviderKind::Local),
            "remote" => Some(ProviderKind::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::Remote => write!(f, "remote"),
        }
    }
}

/// Per-attack finding inside an [`AnalysisRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackFinding {
    pub attack_label: String,
    pub tool_label: String,
    pub outcome: Outcome,
    pub analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// The validated, fully-defaulted result of ingesting a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub summary: String,
    pub attack_findings: Vec<AttackFinding>,
    pub overall_assessment: String,
    pub security_implications: String,
    pub next_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_monitoring_summary: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub provider_id: ProviderKind,
    pub model_id: String,
}

/// Provenance stamped onto a record during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub generated_at: DateTime<Utc>,
    pub provider_id: ProviderKind,
    pub model_id: String,
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self {
            generated_at: DateTime::<Utc>::default(),
            provider_id: ProviderKind::Local,
            model_id: "unknown".to_string(),
        }
    }
}

/// Classification of a single tool log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLineType {
    Info,
    Output,
    Warning,
    Error,
    #[serde(other)]
    Other,
}

/// One line of tool output captured during an attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(rename = "type")]
    pub line_type: LogLineType,
    pub content: String,
}

impl LogLine {
    pub fn new(line_type: LogLineType, content: impl Into<String>) -> Self {
        Self {
            line_type,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(LogLineType::Error, content)
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self::new(LogLineType::Info, content)
    }
}

/// A single attack run as part of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attack {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub tool_id: String,
    pub status: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub logs: Vec<LogLine>,
}

impl Attack {
    /// Human-readable label, falling back to the attack id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A target the execution was pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Target {
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.address.as_deref())
            .unwrap_or(&self.id)
    }
}

/// An execution record as supplied by the execution-history backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub attacks: Vec<Attack>,
    #[serde(default)]
    pub targets: Vec<Target>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_normalization() {
        assert_eq!(Outcome::normalize("SUCCESS"), Outcome::Success);
        assert_eq!(Outcome::normalize("Completed with findings"), Outcome::Success);
        assert_eq!(Outcome::normalize("failed"), Outcome::Failed);
        assert_eq!(Outcome::normalize("tool error"), Outcome::Failed);
        assert_eq!(Outcome::normalize("running"), Outcome::Partial);
        assert_eq!(Outcome::normalize(""), Outcome::Partial);
    }

    #[test]
    fn test_provider_timeouts() {
        assert_eq!(ProviderKind::Remote.default_timeout(), Duration::from_secs(300));
        assert_eq!(ProviderKind::Local.default_timeout(), Duration::from_secs(600));
        assert_eq!(ProviderKind::parse(" Remote "), Some(ProviderKind::Remote));
        assert_eq!(ProviderKind::parse("cloud"), None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = AnalysisRecord {
            summary: "s".to_string(),
            attack_findings: vec![AttackFinding {
                attack_label: "a".to_string(),
                tool_label: "t".to_string(),
                outcome: Outcome::Failed,
                analysis: "x".to_string(),
                recommendation: None,
            }],
            overall_assessment: "o".to_string(),
            security_implications: "i".to_string(),
            next_steps: vec![],
            external_monitoring_summary: None,
            generated_at: DateTime::<Utc>::default(),
            provider_id: ProviderKind::Remote,
            model_id: "m".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["attackFindings"][0]["outcome"], "failed");
        assert_eq!(json["providerId"], "remote");
        assert!(json.get("externalMonitoringSummary").is_none());
    }

    #[test]
    fn test_execution_deserializes_log_types() {
        let execution: Execution = serde_json::from_str(
            r#"{
                "id": "exec-1",
                "status": "completed",
                "attacks": [{
                    "id": "atk-1",
                    "toolId": "nmap",
                    "status": "failed",
                    "logs": [
                        {"type": "error", "content": "boom"},
                        {"type": "debug", "content": "ignored"}
                    ]
                }]
            }"#,
        )
        .unwrap();

        let logs = &execution.attacks[0].logs;
        assert_eq!(logs[0].line_type, LogLineType::Error);
        assert_eq!(logs[1].line_type, LogLineType::Other);
        assert_eq!(execution.attacks[0].label(), "atk-1");
        assert!(execution.targets.is_empty());
    }
}
