//! Spancover - instrumentation coverage for tracing and metrics APIs.
//!
//! Spancover inspects Python and Java codebases and reports, per file and per
//! function, how they use an OpenTelemetry-style API: tracer acquisition,
//! span lifecycle, attributes, events, counters and exception recording.
//!
//! # Architecture
//!
//! The codebase uses tree-sitter for AST-based analysis:
//!
//! - `analysis`: normalization, call detection, function extraction and
//!   conciliation, with one analyzer per language
//! - `config`: YAML configuration schema
//! - `engine`: file discovery and parallel per-file analysis
//! - `report`: output formatting (coverage table, JSON)
//! - `cli`: command-line front-end
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement `LanguageAnalyzer`
//! trait and register in `languages/mod.rs`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;

pub use analysis::{
    conciliate, register_analyzers, CallDescriptor, Category, ConciliatedReport,
    DetectionResult, FunctionReport, FunctionSpec, InstrumentationCall, JavaAnalyzer,
    LanguageAnalyzer, NormalizedValue, PythonAnalyzer, Scalar,
};
pub use config::Config;
pub use engine::{Engine, FileReport, RunReport, SkippedFile};
pub use error::SpanError;

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    register_analyzers();
}
