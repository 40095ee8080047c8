//! # Extraction/Repair Engine
//!
//! Converts unreliable model output into a validated [`AnalysisRecord`].
//!
//! Stages run strictly in order and the first success wins:
//!
//! 1. Direct parse of the trimmed text
//! 2. Markdown unwrap of the first fenced code block
//! 3. Balanced-brace extraction of the first complete object
//! 4. Heuristic repair of the best candidate span
//!
//! A stage only succeeds when the text parses to a JSON object. Once a stage
//! succeeds, validation fills every missing or mistyped field with its
//! documented default, so validation itself cannot fail.

pub mod heuristics;
pub mod stages;
pub mod validate;

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::error::ParseFailure;
use crate::model::{AnalysisRecord, RecordMeta};

/// One of the four ordered attempts to obtain parseable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairStage {
    Direct,
    MarkdownStripped,
    BalancedBrace,
    HeuristicRepair,
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairStage::Direct => write!(f, "direct"),
            RepairStage::MarkdownStripped => write!(f, "markdown-stripped"),
            RepairStage::BalancedBrace => write!(f, "balanced-brace"),
            RepairStage::HeuristicRepair => write!(f, "heuristic-repair"),
        }
    }
}

/// Trace entry for a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairAttempt {
    pub stage: RepairStage,
    /// The exact text handed to the parser at this stage
    pub result_text: String,
    /// Parser error, `None` when the stage succeeded
    pub error: Option<String>,
}

impl RepairAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A successfully extracted JSON object and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub value: Value,
    pub stage: RepairStage,
    pub attempts: Vec<RepairAttempt>,
}

/// Parse raw model output into a record with neutral provenance.
///
/// Equivalent to [`parse_with`] using [`RecordMeta::default`].
pub fn parse(raw: &str) -> Result<AnalysisRecord, ParseFailure> {
    parse_with(raw, &RecordMeta::default())
}

/// Parse raw model output, stamping `meta` wherever the text does not carry
/// its own provenance fields.
pub fn parse_with(raw: &str, meta: &RecordMeta) -> Result<AnalysisRecord, ParseFailure> {
    let extraction = extract(raw)?;
    debug!(stage = %extraction.stage, attempts = extraction.attempts.len(), "Model response parsed");
    Ok(validate::into_record(&extraction.value, meta))
}

/// Run the staged extraction pipeline and return the parsed object together
/// with the stage trace.
pub fn extract(raw: &str) -> Result<Extraction, ParseFailure> {
    let trimmed = raw.trim();
    let mut attempts = Vec::with_capacity(4);

    // 1. Direct
    let direct_error = match attempt(RepairStage::Direct, trimmed, &mut attempts) {
        Ok(value) => return Ok(finish(value, RepairStage::Direct, attempts)),
        Err(message) => message,
    };

    // 2. Markdown unwrap
    let working = match stages::unwrap_markdown(trimmed) {
        Some(inner) => {
            if let Ok(value) = attempt(RepairStage::MarkdownStripped, inner, &mut attempts) {
                return Ok(finish(value, RepairStage::MarkdownStripped, attempts));
            }
            inner
        }
        None => trimmed,
    };

    // 3. Balanced-brace extraction
    let span = stages::extract_balanced(working);
    if let Some(span) = span {
        if let Ok(value) = attempt(RepairStage::BalancedBrace, span, &mut attempts) {
            return Ok(finish(value, RepairStage::BalancedBrace, attempts));
        }
    }

    // 4. Heuristic repair
    let repaired = heuristics::repair(span.unwrap_or(working));
    if let Ok(value) = attempt(RepairStage::HeuristicRepair, &repaired, &mut attempts) {
        return Ok(finish(value, RepairStage::HeuristicRepair, attempts));
    }

    Err(ParseFailure::new(direct_error, raw, attempts))
}

fn attempt(
    stage: RepairStage,
    text: &str,
    attempts: &mut Vec<RepairAttempt>,
) -> Result<Value, String> {
    let outcome = parse_object(text);
    attempts.push(RepairAttempt {
        stage,
        result_text: text.to_string(),
        error: outcome.as_ref().err().cloned(),
    });
    outcome
}

fn finish(value: Value, stage: RepairStage, attempts: Vec<RepairAttempt>) -> Extraction {
    Extraction {
        value,
        stage,
        attempts,
    }
}

/// Parse `text` and require a top-level object.
fn parse_object(text: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!("expected a JSON object, found {}", kind_of(&other))),
        Err(err) => Err(err.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;

    #[test]
    fn test_direct_stage() {
        let extraction = extract(r#"  {"summary": "ok"}  "#).unwrap();
        assert_eq!(extraction.stage, RepairStage::Direct);
        assert_eq!(extraction.attempts.len(), 1);
        assert!(extraction.attempts[0].succeeded());
    }

    #[test]
    fn test_markdown_stage() {
        let raw = "Here is the analysis:\n```JSON\n{\"summary\": \"fenced\"}\n```\nThanks!";
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.stage, RepairStage::MarkdownStripped);
        assert_eq!(extraction.value["summary"], "fenced");
        assert_eq!(extraction.attempts[1].result_text, "{\"summary\": \"fenced\"}");
    }

    #[test]
    fn test_balanced_stage_is_quote_aware() {
        let raw = r#"older text {"summary": "a {weird} string"} trailing"#;
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.stage, RepairStage::BalancedBrace);
        assert_eq!(
            extraction.attempts.last().unwrap().result_text,
            r#"{"summary": "a {weird} string"}"#
        );
    }

    #[test]
    fn test_heuristic_stage() {
        let raw = "{\n  \"summary\" \"Test run\"\n  \"attacksAnalysis\" [ {\"attackName\" \"X\" \"tool\" \"Y\" \"status\" \"success\"} ]\n}";
        let extraction = extract(raw).unwrap();
        assert_eq!(extraction.stage, RepairStage::HeuristicRepair);
        let stages: Vec<_> = extraction.attempts.iter().map(|a| a.stage).collect();
        assert_eq!(
            stages,
            vec![RepairStage::Direct, RepairStage::BalancedBrace, RepairStage::HeuristicRepair]
        );

        let record = parse(raw).unwrap();
        assert_eq!(record.summary, "Test run");
        assert_eq!(record.attack_findings.len(), 1);
        assert_eq!(record.attack_findings[0].outcome, Outcome::Success);
        assert_eq!(record.attack_findings[0].attack_label, "X");
        assert_eq!(record.attack_findings[0].tool_label, "Y");
    }

    #[test]
    fn test_truncated_response_is_closed() {
        let raw = r#"{"summary": "Partial", "nextSteps": ["Patch the host", "Re-run"#;
        let record = parse(raw).unwrap();
        assert_eq!(record.summary, "Partial");
        assert_eq!(record.next_steps, vec!["Patch the host", "Re-run"]);
    }

    #[test]
    fn test_bare_value_with_tab_parses() {
        let record = parse("{\"summary\": Test\trun}").unwrap();
        assert_eq!(record.summary, "Test\trun");
    }

    #[test]
    fn test_quoted_brace_in_leading_prose() {
        let extraction = extract(r#"Output of "echo {x" follows: {"summary": "ok"}"#).unwrap();
        assert_eq!(extraction.stage, RepairStage::BalancedBrace);
        assert_eq!(extraction.value["summary"], "ok");

        let record = parse(r#"Output of "echo {x" follows: {"summary": "ok", "nextSteps": ["a""#).unwrap();
        assert_eq!(record.summary, "ok");
        assert_eq!(record.next_steps, vec!["a"]);
    }

    #[test]
    fn test_failure_carries_direct_error_and_excerpt() {
        let raw = "I'm sorry, I cannot produce that analysis.";
        let failure = parse(raw).unwrap_err();
        assert!(failure.message.contains("expected value"));
        assert_eq!(failure.excerpt, raw);
        assert_eq!(failure.attempts.last().unwrap().stage, RepairStage::HeuristicRepair);
    }

    #[test]
    fn test_total_on_hostile_inputs() {
        let deep = "[".repeat(5000) + &"]".repeat(5000);
        let unclosed = "{\"a\":".repeat(2000);
        let inputs = [
            "",
            "   ",
            "\u{0}\u{1}\u{2}garbage\u{7f}",
            "}}}}]]]",
            "\"just a string\"",
            "null",
            "```",
            "```json",
            "{\"\\",
            deep.as_str(),
            unclosed.as_str(),
        ];

        for input in inputs {
            if let Ok(record) = parse(input) {
                assert!(!record.summary.is_empty());
            }
        }

        assert!(parse("").is_err());
        assert!(parse("null").is_err());
        assert!(parse("\"just a string\"").is_err());
    }

    #[test]
    fn test_non_object_stage_output_is_rejected() {
        let failure = extract("[1, 2, 3]").unwrap_err();
        assert!(failure.attempts[0].error.as_deref().unwrap().contains("an array"));
    }
}
