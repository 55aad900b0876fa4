//! Core traits for language analysis.

use std::path::Path;

use tree_sitter::Node;

use super::conciliation::conciliate;
use super::detector::Detector;
use super::keywords::Operation;
use super::{ConciliatedReport, DetectionResult, FunctionSpec, NormalizedValue};
use crate::error::SpanError;

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// The tree is parsed once and shared by detection and function
/// boundary extraction.
#[derive(Debug)]
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Position (1-indexed line, column) of the first ERROR or MISSING node.
    pub fn first_error(&self) -> Option<(usize, usize)> {
        let root = self.tree.root_node();
        if !root.has_error() {
            return None;
        }

        let mut cursor = root.walk();
        loop {
            let node = cursor.node();
            if node.is_error() || node.is_missing() {
                let pos = node.start_position();
                return Some((pos.row + 1, pos.column + 1));
            }
            // Descend only into subtrees that contain the error.
            if node.has_error() && cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    let pos = root.start_position();
                    return Some((pos.row + 1, pos.column + 1));
                }
            }
        }
    }
}

/// A call expression broken into the parts the detector dispatches on.
#[derive(Debug, Clone)]
pub struct CallSite<'tree> {
    /// Invoked method or function name.
    pub operation: String,
    /// 1-indexed line of the operation name.
    pub line: usize,
    /// Receiver expression (`span` in `span.end()`).
    pub receiver: Option<Node<'tree>>,
    /// Positional argument expressions in order.
    pub positional: Vec<Node<'tree>>,
    /// Named arguments (`name=value`) in order.
    pub named: Vec<(String, Node<'tree>)>,
}

/// Language-specific analyzer trait.
///
/// Each language implements parsing, node normalization, call-site
/// decomposition and function boundary extraction. Detection and
/// conciliation are shared and provided as default methods.
///
/// # Thread Safety
///
/// Note: tree_sitter::Parser is not Sync, so implementations should
/// create parsers as needed or use thread-local storage.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "python", "java").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// The closed table of recognized instrumentation operations.
    fn keywords(&self) -> &'static phf::Map<&'static str, Operation>;

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Fails with [`SpanError::Parse`] if the tree contains syntax errors.
    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedFile, SpanError>;

    /// Convert a node into its canonical value, or `None` for unsupported kinds.
    fn normalize(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue>;

    /// Whether the node is an unambiguous literal.
    fn is_literal(&self, node: Node) -> bool;

    /// Decompose a call-shaped node; `None` for every other node.
    fn call_site<'tree>(&self, node: Node<'tree>, parsed: &ParsedFile) -> Option<CallSite<'tree>>;

    /// All function-like declarations, ordered by start line.
    fn extract_functions(&self, parsed: &ParsedFile) -> Result<Vec<FunctionSpec>, SpanError>;

    /// Walk the whole tree once and classify instrumentation calls.
    fn detect(&self, parsed: &ParsedFile) -> DetectionResult {
        Detector::new(self).run(parsed)
    }

    /// Detect calls and attribute them to their innermost enclosing function.
    fn analyze(&self, parsed: &ParsedFile) -> Result<ConciliatedReport, SpanError> {
        let functions = self.extract_functions(parsed)?;
        let detection = self.detect(parsed);
        Ok(conciliate(&functions, detection))
    }

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}

/// Parse `source` with `language`, rejecting trees that contain syntax errors.
pub(crate) fn parse_strict(
    language: &tree_sitter::Language,
    path: &Path,
    source: &[u8],
) -> Result<ParsedFile, SpanError> {
    let path_str = path.to_string_lossy().to_string();
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(language)
        .map_err(|e| SpanError::Parser {
            path: path_str.clone(),
            message: e.to_string(),
        })?;
    let tree = parser.parse(source, None).ok_or_else(|| SpanError::Parser {
        path: path_str.clone(),
        message: "parser returned no tree".to_string(),
    })?;

    let parsed = ParsedFile {
        tree,
        source: source.to_vec(),
        path: path_str,
    };

    if let Some((line, column)) = parsed.first_error() {
        return Err(SpanError::Parse {
            path: parsed.path,
            line,
            column,
        });
    }

    Ok(parsed)
}
