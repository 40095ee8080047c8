//! Unit tests for analysis ingestion
//!
//! Broader suites than the per-module tests: cache policy, HTTP adapters
//! against mock servers, and orchestrator behaviour with mocked collaborators.

pub mod monitoring_mock_tests;

use chrono::{DateTime, Utc};

use crate::model::{
    AnalysisRecord, Attack, AttackFinding, Execution, LogLine, Outcome, ProviderKind,
};

/// Fixed starting point for manual clocks.
pub fn epoch() -> DateTime<Utc> {
    "2024-06-01T00:00:00Z".parse().expect("valid timestamp")
}

pub fn sample_record(summary: &str) -> AnalysisRecord {
    AnalysisRecord {
        summary: summary.to_string(),
        attack_findings: vec![AttackFinding {
            attack_label: "Port scan".to_string(),
            tool_label: "nmap".to_string(),
            outcome: Outcome::Success,
            analysis: "Ports 22 and 443 open".to_string(),
            recommendation: None,
        }],
        overall_assessment: "Low exposure".to_string(),
        security_implications: "None significant".to_string(),
        next_steps: vec!["Re-test quarterly".to_string()],
        external_monitoring_summary: None,
        generated_at: epoch(),
        provider_id: ProviderKind::Local,
        model_id: "llama3".to_string(),
    }
}

pub fn sample_execution(id: &str) -> Execution {
    Execution {
        id: id.to_string(),
        status: "completed".to_string(),
        attacks: vec![Attack {
            id: "atk-1".to_string(),
            name: Some("Container image pull".to_string()),
            tool_id: "trivy".to_string(),
            status: "failed".to_string(),
            parameters: serde_json::Map::new(),
            logs: vec![
                LogLine::info("pulling image"),
                LogLine::error("Cannot connect to the container daemon"),
            ],
        }],
        targets: vec![],
    }
}
