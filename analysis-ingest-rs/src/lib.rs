//! # Analysis Ingest
//!
//! Resilient ingestion of model-generated security-test analyses.
//!
//! This crate provides:
//!
//! - A staged extraction/repair engine that turns unreliable model output
//!   into a validated [`AnalysisRecord`]
//! - A diagnostic classifier for known tool failure signatures
//! - A bounded, expiring, persisted result cache
//! - An orchestrator that ties them together behind a surface that never fails
//!
//! ## Architecture
//!
//! - `repair`: pure parse/repair/validate pipeline
//! - `diagnostics`: pure log classifier
//! - `cache`: `ResultCache` over a `KeyValueStore`
//! - `providers`: `ProviderAdapter` plus local and remote HTTP adapters
//! - `orchestrator`: `AnalysisOrchestrator`, the public entry point

pub mod cache;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod model;
pub mod monitoring;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod repair;

pub use cache::{CacheLimits, CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::IngestConfig;
pub use diagnostics::{classify, DiagnosticTag};
pub use error::{ConfigError, FailureReason, MonitoringUnavailable, ParseFailure, TransportError};
pub use model::{AnalysisRecord, AttackFinding, Execution, Outcome, ProviderKind};
pub use orchestrator::AnalysisOrchestrator;
pub use repair::{parse, parse_with, RepairAttempt, RepairStage};

#[cfg(test)]
mod tests;
