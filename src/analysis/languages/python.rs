//! Python language analyzer using tree-sitter.

use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use super::{last_statement_line, negate, number_literal};
use crate::analysis::keywords::{Operation, PYTHON_KEYWORDS};
use crate::analysis::traits::parse_strict;
use crate::analysis::{
    CallDescriptor, CallSite, FunctionSpec, Keywords, LanguageAnalyzer, NormalizedValue,
    ParsedFile, Scalar,
};
use crate::error::SpanError;

const FUNCTION_QUERY: &str = r#"
; Functions, methods, nested and async functions (decorated ones included)
(function_definition
  name: (identifier) @name
  body: (block) @body
) @function
"#;

/// Node kinds that hold a list of statements.
const STATEMENT_LISTS: &[&str] = &["block"];

const COMMENTS: &[&str] = &["comment"];

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    /// Raw text between the quotes of a `string` node.
    fn string_content(&self, node: Node, parsed: &ParsedFile) -> String {
        let mut start = node.start_byte();
        let mut end = node.end_byte();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "string_start" => start = child.end_byte(),
                "string_end" => end = child.start_byte(),
                _ => {}
            }
        }
        if start > end {
            return String::new();
        }
        String::from_utf8_lossy(&parsed.source[start..end]).into_owned()
    }

    /// `a.b.c` as one dotted string.
    fn member(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue> {
        let object = node.child_by_field_name("object")?;
        let attribute = node.child_by_field_name("attribute")?;
        let base = match self.normalize(object, parsed) {
            Some(value) => value.to_string(),
            None => parsed.node_text(object).to_string(),
        };
        Some(NormalizedValue::str(format!(
            "{}.{}",
            base,
            parsed.node_text(attribute)
        )))
    }

    fn call(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue> {
        let function = node.child_by_field_name("function")?;
        let (target, qualifier) = match function.kind() {
            "attribute" => {
                let attribute = function.child_by_field_name("attribute")?;
                let qualifier = function
                    .child_by_field_name("object")
                    .map(|o| self.value_or_text(o, parsed));
                (NormalizedValue::str(parsed.node_text(attribute)), qualifier)
            }
            "identifier" => (NormalizedValue::str(parsed.node_text(function)), None),
            _ => (self.value_or_text(function, parsed), None),
        };

        let (arguments, keywords) = match node.child_by_field_name("arguments") {
            Some(args) if args.kind() == "argument_list" => self.arguments(args, parsed),
            Some(other) => (vec![self.value_or_null(other, parsed)], None),
            None => (Vec::new(), None),
        };

        Some(NormalizedValue::Call(Box::new(CallDescriptor {
            target,
            qualifier,
            arguments,
            keywords,
            trailing_calls: None,
        })))
    }

    fn arguments(
        &self,
        args: Node,
        parsed: &ParsedFile,
    ) -> (Vec<NormalizedValue>, Option<Keywords>) {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        let mut cursor = args.walk();
        for child in args.named_children(&mut cursor) {
            match child.kind() {
                "comment" => {}
                "keyword_argument" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| parsed.node_text(n).to_string())
                        .unwrap_or_default();
                    let value = child
                        .child_by_field_name("value")
                        .map(|v| self.value_or_null(v, parsed))
                        .unwrap_or_else(NormalizedValue::null);
                    keywords.push((name, value));
                }
                "dictionary_splat" => {
                    let value = child
                        .named_child(0)
                        .map(|v| self.value_or_null(v, parsed))
                        .unwrap_or_else(NormalizedValue::null);
                    keywords.push(("**".to_string(), value));
                }
                "list_splat" => positional.push(NormalizedValue::str(parsed.node_text(child))),
                _ => positional.push(self.value_or_null(child, parsed)),
            }
        }
        let keywords = if keywords.is_empty() {
            None
        } else {
            Some(keywords)
        };
        (positional, keywords)
    }

    fn collection(&self, node: Node, parsed: &ParsedFile) -> Vec<NormalizedValue> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .map(|c| self.value_or_null(c, parsed))
            .collect()
    }

    fn dictionary(&self, node: Node, parsed: &ParsedFile) -> NormalizedValue {
        let mut pairs = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "pair" => {
                    let key = child
                        .child_by_field_name("key")
                        .map(|k| self.value_or_null(k, parsed))
                        .unwrap_or_else(NormalizedValue::null);
                    let value = child
                        .child_by_field_name("value")
                        .map(|v| self.value_or_null(v, parsed))
                        .unwrap_or_else(NormalizedValue::null);
                    pairs.push((key, value));
                }
                "dictionary_splat" => {
                    let value = child
                        .named_child(0)
                        .map(|v| self.value_or_null(v, parsed))
                        .unwrap_or_else(NormalizedValue::null);
                    pairs.push((NormalizedValue::str("**"), value));
                }
                _ => {}
            }
        }
        NormalizedValue::Mapping(pairs)
    }

    fn value_or_null(&self, node: Node, parsed: &ParsedFile) -> NormalizedValue {
        self.normalize(node, parsed)
            .unwrap_or_else(NormalizedValue::null)
    }

    fn value_or_text(&self, node: Node, parsed: &ParsedFile) -> NormalizedValue {
        self.normalize(node, parsed)
            .unwrap_or_else(|| NormalizedValue::str(parsed.node_text(node)))
    }

    /// The docstring node if the block starts with one.
    fn docstring<'tree>(&self, body: Node<'tree>) -> Option<Node<'tree>> {
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|c| c.kind() != "comment")?;
        if first.kind() != "expression_statement" || first.named_child_count() != 1 {
            return None;
        }
        let inner = first.named_child(0)?;
        matches!(inner.kind(), "string" | "concatenated_string").then_some(first)
    }

    fn function_spec(
        &self,
        name: String,
        function: Node,
        body: Node,
        parsed: &ParsedFile,
    ) -> FunctionSpec {
        let declaration_line = function.start_position().row + 1;
        let docstring = self.docstring(body);

        let description = docstring
            .and_then(|d| self.normalize(d, parsed))
            .and_then(|v| v.as_str().map(clean_docstring))
            .filter(|d| !d.is_empty());

        let mut cursor = body.walk();
        let start_line = body
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "comment")
            .find(|c| Some(*c) != docstring)
            .map(|c| c.start_position().row + 1)
            .unwrap_or(declaration_line);

        let end_line = last_statement_line(body, STATEMENT_LISTS, COMMENTS)
            .unwrap_or(start_line)
            .max(start_line);

        FunctionSpec {
            name,
            description,
            start_line,
            end_line,
        }
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn keywords(&self) -> &'static phf::Map<&'static str, Operation> {
        &PYTHON_KEYWORDS
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedFile, SpanError> {
        parse_strict(&self.language, path, source)
    }

    fn normalize(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue> {
        match node.kind() {
            "string" => Some(NormalizedValue::str(self.string_content(node, parsed))),
            "concatenated_string" => {
                let mut cursor = node.walk();
                let joined: String = node
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "string")
                    .map(|c| self.string_content(c, parsed))
                    .collect();
                Some(NormalizedValue::str(joined))
            }
            "integer" | "float" => Some(number_literal(parsed.node_text(node), &[]).into()),
            "true" => Some(Scalar::Bool(true).into()),
            "false" => Some(Scalar::Bool(false).into()),
            "none" => Some(Scalar::Null.into()),
            "identifier" => Some(NormalizedValue::str(parsed.node_text(node))),
            "attribute" => self.member(node, parsed),
            "list" | "tuple" | "set" => Some(NormalizedValue::Sequence(self.collection(node, parsed))),
            "dictionary" => Some(self.dictionary(node, parsed)),
            "call" => self.call(node, parsed),
            "expression_statement" | "parenthesized_expression" | "await" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() != "comment")?;
                self.normalize(inner, parsed)
            }
            "subscript" => self.normalize(node.child_by_field_name("value")?, parsed),
            "unary_operator" => {
                let operator = node.child_by_field_name("operator")?;
                let argument = node.child_by_field_name("argument")?;
                match (parsed.node_text(operator), argument.kind()) {
                    ("-", "integer" | "float") => {
                        negate(number_literal(parsed.node_text(argument), &[])).map(Into::into)
                    }
                    ("+", "integer" | "float") => self.normalize(argument, parsed),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn is_literal(&self, node: Node) -> bool {
        match node.kind() {
            "string" | "concatenated_string" | "integer" | "float" | "true" | "false" | "none" => {
                true
            }
            "unary_operator" => node
                .child_by_field_name("argument")
                .is_some_and(|a| matches!(a.kind(), "integer" | "float")),
            _ => false,
        }
    }

    fn call_site<'tree>(&self, node: Node<'tree>, parsed: &ParsedFile) -> Option<CallSite<'tree>> {
        if node.kind() != "call" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        let (name_node, receiver) = match function.kind() {
            "attribute" => (
                function.child_by_field_name("attribute")?,
                function.child_by_field_name("object"),
            ),
            "identifier" => (function, None),
            _ => return None,
        };

        let mut positional = Vec::new();
        let mut named = Vec::new();
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for child in args.named_children(&mut cursor) {
                match child.kind() {
                    "comment" | "dictionary_splat" => {}
                    "keyword_argument" => {
                        if let (Some(n), Some(v)) = (
                            child.child_by_field_name("name"),
                            child.child_by_field_name("value"),
                        ) {
                            named.push((parsed.node_text(n).to_string(), v));
                        }
                    }
                    _ => positional.push(child),
                }
            }
        }

        Some(CallSite {
            operation: parsed.node_text(name_node).to_string(),
            line: name_node.start_position().row + 1,
            receiver,
            positional,
            named,
        })
    }

    fn extract_functions(&self, parsed: &ParsedFile) -> Result<Vec<FunctionSpec>, SpanError> {
        let query = Query::new(&self.language, FUNCTION_QUERY).map_err(|e| SpanError::Query {
            language: self.language_id().to_string(),
            message: e.to_string(),
        })?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut functions = Vec::new();
        while let Some(m) = matches.next() {
            let mut name = None;
            let mut function = None;
            let mut body = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "name" => name = Some(parsed.node_text(capture.node).to_string()),
                    "function" => function = Some(capture.node),
                    "body" => body = Some(capture.node),
                    _ => {}
                }
            }

            if let (Some(name), Some(function), Some(body)) = (name, function, body) {
                functions.push(self.function_spec(name, function, body, parsed));
            }
        }

        functions.sort_by_key(|f| f.start_line);
        Ok(functions)
    }
}

/// Normalize docstring indentation: strip the first line, dedent the rest by
/// their common indentation and drop surrounding blank lines.
fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    if let Some(first) = lines.first() {
        cleaned.push(first.trim());
    }
    for line in lines.iter().skip(1) {
        let dedented = line.get(indent..).unwrap_or_else(|| line.trim_start());
        cleaned.push(dedented.trim_end());
    }

    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_python(source: &str) -> (PythonAnalyzer, ParsedFile) {
        let analyzer = PythonAnalyzer::new();
        let parsed = analyzer
            .parse(Path::new("test.py"), source.as_bytes())
            .unwrap();
        (analyzer, parsed)
    }

    /// Normalize the expression of the first statement in `source`.
    fn normalize_expr(source: &str) -> Option<NormalizedValue> {
        let (analyzer, parsed) = parse_python(source);
        let root = parsed.tree.root_node();
        let statement = root.named_child(0).unwrap();
        analyzer.normalize(statement, &parsed)
    }

    fn functions(source: &str) -> Vec<FunctionSpec> {
        let (analyzer, parsed) = parse_python(source);
        analyzer.extract_functions(&parsed).unwrap()
    }

    #[test]
    fn test_normalize_literals() {
        assert_eq!(normalize_expr("'svc'"), Some(NormalizedValue::str("svc")));
        assert_eq!(normalize_expr("\"a\" \"b\""), Some(NormalizedValue::str("ab")));
        assert_eq!(normalize_expr("42"), Some(Scalar::Int(42).into()));
        assert_eq!(normalize_expr("1_000"), Some(Scalar::Int(1000).into()));
        assert_eq!(normalize_expr("0x10"), Some(Scalar::Int(16).into()));
        assert_eq!(normalize_expr("2.5"), Some(Scalar::Float(2.5).into()));
        assert_eq!(normalize_expr("-3"), Some(Scalar::Int(-3).into()));
        assert_eq!(normalize_expr("True"), Some(Scalar::Bool(true).into()));
        assert_eq!(normalize_expr("None"), Some(Scalar::Null.into()));
    }

    #[test]
    fn test_normalize_names_and_members() {
        assert_eq!(normalize_expr("request_counter"), Some(NormalizedValue::str("request_counter")));
        assert_eq!(normalize_expr("a.b.c"), Some(NormalizedValue::str("a.b.c")));
        assert_eq!(
            normalize_expr("get_provider().tracer"),
            Some(NormalizedValue::str("get_provider().tracer"))
        );
        assert_eq!(normalize_expr("items[0]"), Some(NormalizedValue::str("items")));
    }

    #[test]
    fn test_normalize_collections() {
        assert_eq!(
            normalize_expr("[1, 'x', (2, 3)]"),
            Some(NormalizedValue::Sequence(vec![
                Scalar::Int(1).into(),
                NormalizedValue::str("x"),
                NormalizedValue::Sequence(vec![Scalar::Int(2).into(), Scalar::Int(3).into()]),
            ]))
        );
        assert_eq!(
            normalize_expr("{'k': v, key_var: 1}"),
            Some(NormalizedValue::Mapping(vec![
                (NormalizedValue::str("k"), NormalizedValue::str("v")),
                (NormalizedValue::str("key_var"), Scalar::Int(1).into()),
            ]))
        );
        assert_eq!(normalize_expr("[x for x in y]"), None);
        // Unsupported elements become null rather than being dropped.
        assert_eq!(
            normalize_expr("[lambda: 1, 2]"),
            Some(NormalizedValue::Sequence(vec![NormalizedValue::null(), Scalar::Int(2).into()]))
        );
    }

    #[test]
    fn test_normalize_call_with_keywords() {
        let value = normalize_expr("time.time()").unwrap();
        let call = value.as_call().unwrap();
        assert_eq!(call.target_name(), Some("time"));
        assert_eq!(call.qualifier, Some(NormalizedValue::str("time")));
        assert!(call.arguments.is_empty());

        let value = normalize_expr("meter.create_counter('requests', unit='1')").unwrap();
        let call = value.as_call().unwrap();
        assert_eq!(call.arguments, vec![NormalizedValue::str("requests")]);
        assert_eq!(
            call.keywords,
            Some(vec![("unit".to_string(), NormalizedValue::str("1"))])
        );
    }

    #[test]
    fn test_fluent_chain_nests_three_levels() {
        let value = normalize_expr("builder().put('a', 1).put('b', 2).build()").unwrap();
        let build = value.as_call().unwrap();
        assert_eq!(build.target_name(), Some("build"));
        assert_eq!(build.qualifier_depth(), 3);

        let put_b = build.qualifier.as_ref().and_then(NormalizedValue::as_call).unwrap();
        assert_eq!(put_b.arguments[0], NormalizedValue::str("b"));
        let put_a = put_b.qualifier.as_ref().and_then(NormalizedValue::as_call).unwrap();
        assert_eq!(put_a.arguments[0], NormalizedValue::str("a"));
        let head = put_a.qualifier.as_ref().and_then(NormalizedValue::as_call).unwrap();
        assert_eq!(head.target_name(), Some("builder"));
        assert!(head.qualifier.is_none());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let (analyzer, parsed) = parse_python("span.add_events([{'t': time.time()}, {'n': -1.5}])\n");
        let node = parsed.tree.root_node().named_child(0).unwrap();
        assert_eq!(analyzer.normalize(node, &parsed), analyzer.normalize(node, &parsed));
    }

    #[test]
    fn test_unsupported_kinds() {
        assert_eq!(normalize_expr("a + b"), None);
        assert_eq!(normalize_expr("lambda: 1"), None);
        assert_eq!(normalize_expr("x if y else z"), None);
    }

    #[test]
    fn test_function_boundaries() {
        let source = r#"import os

def handler(event):
    """Handle one event.

    Extra detail.
    """
    value = event.get("v")
    if value:
        for item in value:
            print(item)
    return value


async def fetch():
    await go()

class Service:
    def method(self):
        pass
"#;
        let specs = functions(source);
        assert_eq!(specs.len(), 3);

        let handler = &specs[0];
        assert_eq!(handler.name, "handler");
        assert_eq!(handler.description.as_deref(), Some("Handle one event.\n\nExtra detail."));
        assert_eq!(handler.start_line, 8);
        assert_eq!(handler.end_line, 12);

        assert_eq!(specs[1].name, "fetch");
        assert_eq!((specs[1].start_line, specs[1].end_line), (16, 16));
        assert_eq!(specs[1].description, None);

        assert_eq!(specs[2].name, "method");
        assert_eq!((specs[2].start_line, specs[2].end_line), (20, 20));
    }

    #[test]
    fn test_nested_functions_are_subsets() {
        let source = r#"def outer():
    x = 1
    def inner():
        y = 2
        return y
    return inner
"#;
        let specs = functions(source);
        let outer = specs.iter().find(|f| f.name == "outer").unwrap();
        let inner = specs.iter().find(|f| f.name == "inner").unwrap();
        assert_eq!((outer.start_line, outer.end_line), (2, 6));
        assert_eq!((inner.start_line, inner.end_line), (4, 5));
        assert!(outer.start_line <= inner.start_line && inner.end_line <= outer.end_line);
    }

    #[test]
    fn test_docstring_only_body_uses_declaration_line() {
        let specs = functions("def documented():\n    \"\"\"Only docs.\"\"\"\n");
        assert_eq!(specs[0].start_line, 1);
        assert_eq!(specs[0].end_line, 2);
        assert_eq!(specs[0].description.as_deref(), Some("Only docs."));
    }

    #[test]
    fn test_multiline_return_chain_stays_in_function() {
        let source = "def make():\n    return (tracer\n        .start_span(\"x\"))\n";
        let (analyzer, parsed) = parse_python(source);
        let report = analyzer.analyze(&parsed).unwrap();

        let make = report.function("make").unwrap();
        assert_eq!((make.start_line, make.end_line), (2, 3));
        assert_eq!(make.calls.spans.len(), 1);
        assert_eq!(make.calls.spans[0].line, 3);
        assert!(report.calls.is_empty());
    }

    #[test]
    fn test_decorated_function() {
        let specs = functions("@tracer.start_as_current_span('x')\ndef job():\n    run()\n");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "job");
        assert_eq!(specs[0].start_line, 3);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let analyzer = PythonAnalyzer::new();
        let err = analyzer
            .parse(Path::new("broken.py"), b"def broken(:\n    pass\n")
            .err()
            .unwrap();
        assert!(matches!(err, SpanError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_clean_docstring() {
        assert_eq!(clean_docstring("  Summary.  "), "Summary.");
        assert_eq!(
            clean_docstring("\n    First.\n\n      Indented.\n    "),
            "First.\n\n  Indented."
        );
        assert_eq!(clean_docstring(""), "");
    }
}
