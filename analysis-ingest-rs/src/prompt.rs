//! Prompt construction
//!
//! The prompt combines the execution summary, per-attack details with the
//! tail of each attack's logs, diagnostic hints from the classifier and, when
//! available, the monitoring context. It ends with the response schema the
//! repair engine expects.

use std::fmt::Write;

use crate::diagnostics;
use crate::model::{Attack, Execution};
use crate::monitoring::MonitoringContext;

/// System instruction shared by both provider kinds.
pub const SYSTEM_PROMPT: &str = "You are a security analyst reviewing the results of an automated \
penetration test. Respond with a single JSON object and nothing else.";

/// Number of trailing log lines included per attack.
pub const MAX_LOG_LINES_PER_ATTACK: usize = 20;

const RESPONSE_SCHEMA: &str = r#"{
  "summary": "one paragraph overview of the execution",
  "attacksAnalysis": [
    {
      "attackName": "name of the attack",
      "tool": "tool that ran it",
      "status": "success | failed | partial",
      "analysis": "what happened and why",
      "recommendation": "optional remediation"
    }
  ],
  "overallAssessment": "overall security posture",
  "securityImplications": "what the results mean for the target",
  "nextSteps": ["ordered follow-up actions"]"#;

/// Build the user prompt for one execution.
pub fn build_prompt(execution: &Execution, monitoring: Option<&MonitoringContext>) -> String {
    let mut prompt = String::with_capacity(4096);

    let _ = writeln!(prompt, "# Execution {}", execution.id);
    let _ = writeln!(prompt, "Status: {}", execution.status);
    let _ = writeln!(prompt, "Attacks run: {}", execution.attacks.len());
    if !execution.targets.is_empty() {
        let targets: Vec<&str> = execution.targets.iter().map(|t| t.label()).collect();
        let _ = writeln!(prompt, "Targets: {}", targets.join(", "));
    }

    for (index, attack) in execution.attacks.iter().enumerate() {
        prompt.push('\n');
        write_attack(&mut prompt, index + 1, attack);
    }

    if let Some(context) = monitoring {
        let _ = writeln!(prompt, "\n## External Monitoring\n{}", context);
    }

    let _ = writeln!(
        prompt,
        "\nRespond with a JSON object using exactly these keys:\n{}",
        RESPONSE_SCHEMA
    );
    if monitoring.is_some() {
        prompt.push_str(
            ",\n  \"externalMonitoringSummary\": \"how the monitoring alerts relate to the attacks\"",
        );
    }
    prompt.push_str("\n}\n");

    prompt
}

fn write_attack(prompt: &mut String, number: usize, attack: &Attack) {
    let _ = writeln!(prompt, "## Attack {}: {}", number, attack.label());
    let _ = writeln!(prompt, "Tool: {}", attack.tool_id);
    let _ = writeln!(prompt, "Status: {}", attack.status);
    if !attack.parameters.is_empty() {
        let params = serde_json::to_string(&attack.parameters).unwrap_or_default();
        let _ = writeln!(prompt, "Parameters: {}", params);
    }

    let tags = diagnostics::classify_attack(attack);
    if !tags.is_empty() {
        let _ = writeln!(prompt, "Error Analysis:");
        for tag in &tags {
            let _ = writeln!(prompt, "- {}: {}", tag.label(), tag.remediation());
        }
    }

    if !attack.logs.is_empty() {
        let skip = attack.logs.len().saturating_sub(MAX_LOG_LINES_PER_ATTACK);
        let _ = writeln!(prompt, "Logs (last {}):", attack.logs.len() - skip);
        for line in &attack.logs[skip..] {
            let _ = writeln!(prompt, "[{:?}] {}", line.line_type, line.content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogLine, Target};
    use crate::monitoring::AlertPattern;

    fn execution() -> Execution {
        Execution {
            id: "exec-42".to_string(),
            status: "completed".to_string(),
            attacks: vec![Attack {
                id: "atk-1".to_string(),
                name: Some("Image pull".to_string()),
                tool_id: "trivy".to_string(),
                status: "failed".to_string(),
                parameters: serde_json::Map::new(),
                logs: (0..30)
                    .map(|i| LogLine::info(format!("line {}", i)))
                    .chain(std::iter::once(LogLine::error(
                        "Cannot connect to the Docker daemon at unix:///var/run/docker.sock",
                    )))
                    .collect(),
            }],
            targets: vec![Target {
                id: "t1".to_string(),
                name: None,
                address: Some("10.0.0.5".to_string()),
            }],
        }
    }

    #[test]
    fn test_prompt_includes_attack_details_and_hints() {
        let prompt = build_prompt(&execution(), None);
        assert!(prompt.contains("# Execution exec-42"));
        assert!(prompt.contains("Targets: 10.0.0.5"));
        assert!(prompt.contains("## Attack 1: Image pull"));
        assert!(prompt.contains("Error Analysis:"));
        assert!(prompt.contains("- container runtime unreachable:"));
        assert!(prompt.contains("\"attacksAnalysis\""));
        assert!(!prompt.contains("externalMonitoringSummary"));
    }

    #[test]
    fn test_prompt_keeps_only_trailing_logs() {
        let prompt = build_prompt(&execution(), None);
        assert!(prompt.contains("Logs (last 20):"));
        assert!(!prompt.contains("line 10\n"));
        assert!(prompt.contains("line 11\n"));
    }

    #[test]
    fn test_prompt_with_monitoring() {
        let context = MonitoringContext {
            total_alerts: 3,
            top_patterns: vec![AlertPattern {
                pattern: "Port scan detected".to_string(),
                count: 3,
            }],
            ..Default::default()
        };
        let prompt = build_prompt(&execution(), Some(&context));
        assert!(prompt.contains("## External Monitoring"));
        assert!(prompt.contains("Port scan detected"));
        assert!(prompt.trim_end().ends_with("}"));
        assert!(prompt.contains("\"externalMonitoringSummary\""));
    }
}
