//! AST-backed instrumentation analysis.
//!
//! This module finds tracing and metrics API calls in source code using
//! tree-sitter and attributes them to the functions that contain them:
//! - Normalization of argument and receiver nodes into `NormalizedValue`s
//! - Detection of instrumentation calls against a closed keyword table
//! - Function boundary extraction (name, description, line range)
//! - Conciliation of calls into their innermost enclosing function
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ Source File     │────▶│ Analyzer     │────▶│ ParsedFile     │
//! └─────────────────┘     │ (Python,Java)│     └────────────────┘
//!                         └──────────────┘        │          │
//!                                                 ▼          ▼
//!                                   ┌──────────────┐  ┌──────────────┐
//!                                   │ Detector     │  │ FunctionSpec │
//!                                   │ (normalize)  │  │ extraction   │
//!                                   └──────────────┘  └──────────────┘
//!                                                 │          │
//!                                                 ▼          ▼
//!                                          ┌─────────────────────┐
//!                                          │ ConciliatedReport   │
//!                                          └─────────────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement `LanguageAnalyzer`: parsing, `normalize`, `call_site`
//!    and `extract_functions`
//! 3. Add a keyword table to `keywords.rs`
//! 4. Register the analyzer in `languages/mod.rs`

pub mod conciliation;
pub mod detector;
mod facts;
pub mod keywords;
mod languages;
mod traits;
mod value;

pub use conciliation::conciliate;
pub use detector::{Detector, ExtractionError};
pub use facts::{
    CallBuckets, Category, ConciliatedReport, DetectionResult, FunctionReport, FunctionSpec,
    InstrumentationCall,
};
pub use keywords::Operation;
pub use languages::{
    get_analyzer, get_analyzer_by_id, register_analyzers, registered_languages, JavaAnalyzer,
    PythonAnalyzer,
};
pub use traits::{CallSite, LanguageAnalyzer, ParsedFile};
pub use value::{CallDescriptor, ChainStyle, Keywords, NormalizedValue, Scalar};
