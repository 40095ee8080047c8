//! Diagnostic classifier
//!
//! Scans tool log lines for known failure signatures. Only lines typed as
//! errors are considered, and each line contributes at most one tag: the
//! first entry of [`PATTERNS`] whose substring it contains.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Attack, LogLine, LogLineType};

/// Canonical failure signature found in tool output.
///
/// Ordering follows declaration order so tag sets render deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticTag {
    /// The container engine socket could not be reached
    ContainerRuntimeUnreachable,
    /// The image registry refused anonymous access
    RegistryAuthRequired,
    /// The requested image or repository does not exist
    RepositoryNotFound,
    /// The container command itself failed (engine exit code 125)
    ContainerCommandFailed,
    NetworkUnreachable,
    PermissionDenied,
    OperationTimedOut,
}

impl DiagnosticTag {
    pub const fn all() -> &'static [Self] {
        &[
            Self::ContainerRuntimeUnreachable,
            Self::RegistryAuthRequired,
            Self::RepositoryNotFound,
            Self::ContainerCommandFailed,
            Self::NetworkUnreachable,
            Self::PermissionDenied,
            Self::OperationTimedOut,
        ]
    }

    /// Human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ContainerRuntimeUnreachable => "container runtime unreachable",
            Self::RegistryAuthRequired => "registry authentication required",
            Self::RepositoryNotFound => "repository not found",
            Self::ContainerCommandFailed => "container command failed (exit code 125)",
            Self::NetworkUnreachable => "network unreachable",
            Self::PermissionDenied => "permission denied",
            Self::OperationTimedOut => "operation timed out",
        }
    }

    /// One-line suggested fix.
    pub const fn remediation(self) -> &'static str {
        match self {
            Self::ContainerRuntimeUnreachable => {
                "Start the container runtime and verify the executor can reach its socket"
            }
            Self::RegistryAuthRequired => {
                "Log in to the image registry or configure pull credentials for the tool image"
            }
            Self::RepositoryNotFound => "Check the tool image name and tag, then pull it again",
            Self::ContainerCommandFailed => {
                "Review the container run arguments; the engine rejected the command before the tool started"
            }
            Self::NetworkUnreachable => {
                "Verify DNS and routing from the executor host to the target"
            }
            Self::PermissionDenied => {
                "Grant the executor the required privileges or run the tool with adequate permissions"
            }
            Self::OperationTimedOut => {
                "Increase the tool timeout or confirm the target is responsive"
            }
        }
    }
}

impl fmt::Display for DiagnosticTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered substring table. Patterns are lowercase and matched against the
/// lowercased line content.
pub const PATTERNS: &[(&str, DiagnosticTag)] = &[
    ("cannot connect to the docker daemon", DiagnosticTag::ContainerRuntimeUnreachable),
    ("cannot connect to the container daemon", DiagnosticTag::ContainerRuntimeUnreachable),
    ("is the docker daemon running", DiagnosticTag::ContainerRuntimeUnreachable),
    ("error during connect", DiagnosticTag::ContainerRuntimeUnreachable),
    ("authentication required", DiagnosticTag::RegistryAuthRequired),
    ("requested access to the resource is denied", DiagnosticTag::RegistryAuthRequired),
    ("no basic auth credentials", DiagnosticTag::RegistryAuthRequired),
    ("unauthorized: ", DiagnosticTag::RegistryAuthRequired),
    ("repository does not exist", DiagnosticTag::RepositoryNotFound),
    ("manifest unknown", DiagnosticTag::RepositoryNotFound),
    ("pull access denied", DiagnosticTag::RepositoryNotFound),
    ("exit code 125", DiagnosticTag::ContainerCommandFailed),
    ("exited with code 125", DiagnosticTag::ContainerCommandFailed),
    ("exit status 125", DiagnosticTag::ContainerCommandFailed),
    ("network is unreachable", DiagnosticTag::NetworkUnreachable),
    ("no route to host", DiagnosticTag::NetworkUnreachable),
    ("could not resolve host", DiagnosticTag::NetworkUnreachable),
    ("temporary failure in name resolution", DiagnosticTag::NetworkUnreachable),
    ("permission denied", DiagnosticTag::PermissionDenied),
    ("operation not permitted", DiagnosticTag::PermissionDenied),
    ("timed out", DiagnosticTag::OperationTimedOut),
    ("deadline exceeded", DiagnosticTag::OperationTimedOut),
    ("timeout", DiagnosticTag::OperationTimedOut),
];

/// Tag for a single line, if it is an error line matching a known pattern.
pub fn classify_line(line: &LogLine) -> Option<DiagnosticTag> {
    if line.line_type != LogLineType::Error {
        return None;
    }
    let content = line.content.to_lowercase();
    PATTERNS
        .iter()
        .find(|(pattern, _)| content.contains(pattern))
        .map(|(_, tag)| *tag)
}

/// Collapse the tags of every error line into a deterministic set.
pub fn classify(lines: &[LogLine]) -> BTreeSet<DiagnosticTag> {
    lines.iter().filter_map(classify_line).collect()
}

pub fn classify_attack(attack: &Attack) -> BTreeSet<DiagnosticTag> {
    classify(&attack.logs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_daemon_line_maps_to_single_tag() {
        let tags = classify(&[LogLine::error("Cannot connect to the container daemon")]);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains(&DiagnosticTag::ContainerRuntimeUnreachable));
    }

    #[test]
    fn test_only_error_lines_are_scanned() {
        let lines = vec![
            LogLine::info("permission denied while probing"),
            LogLine::new(LogLineType::Warning, "connection timed out"),
            LogLine::new(LogLineType::Output, "no route to host"),
        ];
        assert!(classify(&lines).is_empty());
    }

    #[test]
    fn test_first_pattern_wins_per_line() {
        // "pull access denied ... repository does not exist" names both
        // registry and repository problems; the table order decides.
        let line = LogLine::error(
            "Error response from daemon: pull access denied for foo, repository does not exist",
        );
        assert_eq!(classify_line(&line), Some(DiagnosticTag::RepositoryNotFound));

        let line = LogLine::error("docker: Error response from daemon: ... exit code 125 (timed out)");
        assert_eq!(classify_line(&line), Some(DiagnosticTag::ContainerCommandFailed));
    }

    #[test]
    fn test_duplicates_collapse_and_order_is_stable() {
        let lines = vec![
            LogLine::error("ssh: connect to host 10.0.0.5: Connection timed out"),
            LogLine::error("Permission denied (publickey)"),
            LogLine::error("context deadline exceeded"),
            LogLine::error("Cannot connect to the Docker daemon at unix:///var/run/docker.sock"),
            LogLine::error("unexpected EOF"),
        ];
        let tags: Vec<_> = classify(&lines).into_iter().collect();
        assert_eq!(
            tags,
            vec![
                DiagnosticTag::ContainerRuntimeUnreachable,
                DiagnosticTag::PermissionDenied,
                DiagnosticTag::OperationTimedOut,
            ]
        );
    }

    #[test]
    fn test_every_tag_has_a_pattern() {
        for tag in DiagnosticTag::all() {
            assert!(PATTERNS.iter().any(|(_, t)| t == tag), "no pattern for {}", tag);
            assert!(!tag.remediation().is_empty());
        }
    }

    #[test]
    fn test_patterns_are_lowercase() {
        for (pattern, _) in PATTERNS {
            assert_eq!(*pattern, pattern.to_lowercase());
        }
    }
}
