//! Language-specific analyzer implementations.

mod java;
mod python;

pub use java::JavaAnalyzer;
pub use python::PythonAnalyzer;

use super::{LanguageAnalyzer, Scalar};
use once_cell::sync::OnceCell;
use tree_sitter::Node;

/// Static storage for Java analyzer.
static JAVA_ANALYZER: OnceCell<JavaAnalyzer> = OnceCell::new();

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Register all available language analyzers.
///
/// Idempotent; concurrent callers block until initialization is done.
pub fn register_analyzers() {
    JAVA_ANALYZER.get_or_init(JavaAnalyzer::new);
    PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new);
}

/// Get an analyzer for the given file extension.
///
/// Returns None if no analyzer is registered for the extension.
pub fn get_analyzer(ext: &str) -> Option<&'static dyn LanguageAnalyzer> {
    register_analyzers();

    match ext {
        "java" => JAVA_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        "py" => PYTHON_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        _ => None,
    }
}

/// Get an analyzer by language ID.
pub fn get_analyzer_by_id(lang_id: &str) -> Option<&'static dyn LanguageAnalyzer> {
    register_analyzers();

    match lang_id {
        "java" => JAVA_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        "python" => PYTHON_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        _ => None,
    }
}

/// Get all registered language IDs.
pub fn registered_languages() -> &'static [&'static str] {
    &["java", "python"]
}

/// Parse a numeric literal, ignoring digit separators and the given type suffixes.
///
/// Text that does not fit an `i64` or `f64` is kept as a string.
pub(crate) fn number_literal(text: &str, suffixes: &[char]) -> Scalar {
    let cleaned: String = text
        .trim()
        .trim_end_matches(suffixes)
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();

    let int = if let Some(hex) = cleaned.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = cleaned.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = cleaned.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        cleaned.parse::<i64>().ok()
    };

    if let Some(i) = int {
        return Scalar::Int(i);
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() => Scalar::Float(f),
        _ => Scalar::Str(text.to_string()),
    }
}

/// Negate a numeric scalar.
pub(crate) fn negate(value: Scalar) -> Option<Scalar> {
    match value {
        Scalar::Int(i) => i.checked_neg().map(Scalar::Int),
        Scalar::Float(f) => Some(Scalar::Float(-f)),
        _ => None,
    }
}

/// 1-indexed line of the last character of `node`.
fn end_line(node: Node) -> usize {
    let start = node.start_position();
    let end = node.end_position();
    // A node ending at column 0 stops before that line.
    if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    }
}

/// Largest 1-indexed line reached by any statement in `node`'s statement
/// lists, nested lists included. A statement spanning several lines (a
/// fluent chain, an unbraced `if` body) counts up to its last line.
/// Comments are not statements.
pub(crate) fn last_statement_line(
    node: Node,
    list_kinds: &[&str],
    comment_kinds: &[&str],
) -> Option<usize> {
    let is_list = list_kinds.contains(&node.kind());
    let mut max = None;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if comment_kinds.contains(&child.kind()) {
            continue;
        }
        if is_list {
            max = max.max(Some(end_line(child)));
        }
        max = max.max(last_statement_line(child, list_kinds, comment_kinds));
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_extension_and_id() {
        assert_eq!(get_analyzer("py").unwrap().language_id(), "python");
        assert_eq!(get_analyzer("java").unwrap().language_id(), "java");
        assert!(get_analyzer("rb").is_none());
        assert_eq!(get_analyzer_by_id("java").unwrap().file_extensions(), &["java"]);
        assert!(get_analyzer_by_id("go").is_none());
        for lang in registered_languages() {
            assert!(get_analyzer_by_id(lang).is_some());
        }
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("10", &[]), Scalar::Int(10));
        assert_eq!(number_literal("1_000_000", &[]), Scalar::Int(1_000_000));
        assert_eq!(number_literal("0xFF", &[]), Scalar::Int(255));
        assert_eq!(number_literal("0b101", &[]), Scalar::Int(5));
        assert_eq!(number_literal("42L", &['l', 'L']), Scalar::Int(42));
        assert_eq!(number_literal("1.5f", &['f', 'F', 'd', 'D']), Scalar::Float(1.5));
        assert_eq!(number_literal("3j", &[]), Scalar::Str("3j".to_string()));
    }

    fn python_body_end(source: &str) -> Option<usize> {
        let analyzer = get_analyzer_by_id("python").unwrap();
        let parsed = analyzer
            .parse(std::path::Path::new("t.py"), source.as_bytes())
            .unwrap();
        let root = parsed.tree.root_node();
        let function = root.named_child(0).unwrap();
        let body = function.child_by_field_name("body").unwrap();
        last_statement_line(body, &["block"], &["comment"])
    }

    #[test]
    fn test_last_statement_line_reaches_statement_end() {
        assert_eq!(python_body_end("def f():\n    x = 1\n    return x\n"), Some(3));
        assert_eq!(
            python_body_end("def make():\n    return (tracer\n        .start_span(\"x\"))\n"),
            Some(3)
        );
        // Trailing comments do not extend the body.
        assert_eq!(python_body_end("def f():\n    x = 1\n    # done\n"), Some(2));
    }

    #[test]
    fn test_negate() {
        assert_eq!(negate(Scalar::Int(4)), Some(Scalar::Int(-4)));
        assert_eq!(negate(Scalar::Float(0.5)), Some(Scalar::Float(-0.5)));
        assert_eq!(negate(Scalar::Bool(true)), None);
    }
}
