//! Error types for spancover.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by parsing, configuration and the run orchestrator.
#[derive(Error, Debug)]
pub enum SpanError {
    /// The source file could not be parsed into a syntax tree without errors.
    #[error("syntax error in {path} at {line}:{column}")]
    Parse {
        path: String,
        line: usize,
        column: usize,
    },

    /// The grammar could not be loaded or the parser gave up.
    #[error("parser failure for {path}: {message}")]
    Parser { path: String, message: String },

    /// A built-in tree-sitter query failed to compile against the grammar.
    #[error("invalid {language} query: {message}")]
    Query { language: String, message: String },

    /// Reading a source file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No analyzer is registered for the requested language or extension.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SpanError {
    /// Whether this error only affects a single file (the run continues).
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            SpanError::Parse { .. } | SpanError::Parser { .. } | SpanError::Io { .. }
        )
    }
}
