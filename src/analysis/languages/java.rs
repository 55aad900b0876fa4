//! Java language analyzer using tree-sitter.

use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Query, QueryCursor};

use super::{last_statement_line, negate, number_literal};
use crate::analysis::keywords::{Operation, JAVA_KEYWORDS};
use crate::analysis::traits::parse_strict;
use crate::analysis::{
    CallDescriptor, CallSite, FunctionSpec, LanguageAnalyzer, NormalizedValue, ParsedFile,
    Scalar,
};
use crate::error::SpanError;

const FUNCTION_QUERY: &str = r#"
; Method declarations (abstract and interface methods have no body)
(method_declaration
  name: (identifier) @name
) @function

; Constructor declarations
(constructor_declaration
  name: (identifier) @name
) @function
"#;

const STATEMENT_LISTS: &[&str] = &["block", "constructor_body", "switch_block_statement_group"];

const COMMENTS: &[&str] = &["line_comment", "block_comment"];

const INTEGER_SUFFIXES: &[char] = &['l', 'L'];
const FLOAT_SUFFIXES: &[char] = &['f', 'F', 'd', 'D'];

pub struct JavaAnalyzer {
    language: Language,
}

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn string_content(&self, node: Node, parsed: &ParsedFile) -> String {
        let text = parsed.node_text(node);
        let inner = match text.strip_prefix("\"\"\"") {
            Some(rest) => rest.strip_suffix("\"\"\"").unwrap_or(rest),
            None => text
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .unwrap_or(text),
        };
        inner.to_string()
    }

    fn numeric(&self, node: Node, parsed: &ParsedFile) -> Option<Scalar> {
        let text = parsed.node_text(node);
        match node.kind() {
            "octal_integer_literal" => {
                let digits: String = text
                    .trim_end_matches(INTEGER_SUFFIXES)
                    .chars()
                    .filter(|c| *c != '_')
                    .collect();
                Some(
                    i64::from_str_radix(digits.trim_start_matches('0'), 8)
                        .map(Scalar::Int)
                        .unwrap_or(Scalar::Int(0)),
                )
            }
            "decimal_integer_literal" | "hex_integer_literal" | "binary_integer_literal" => {
                Some(number_literal(text, INTEGER_SUFFIXES))
            }
            "decimal_floating_point_literal" => Some(number_literal(text, FLOAT_SUFFIXES)),
            "hex_floating_point_literal" => Some(Scalar::Str(text.to_string())),
            _ => None,
        }
    }

    fn is_numeric_kind(kind: &str) -> bool {
        matches!(
            kind,
            "decimal_integer_literal"
                | "hex_integer_literal"
                | "octal_integer_literal"
                | "binary_integer_literal"
                | "decimal_floating_point_literal"
                | "hex_floating_point_literal"
        )
    }

    fn member(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue> {
        let object = node.child_by_field_name("object")?;
        let field = node.child_by_field_name("field")?;
        let base = match self.normalize(object, parsed) {
            Some(value) => value.to_string(),
            None => parsed.node_text(object).to_string(),
        };
        Some(NormalizedValue::str(format!("{}.{}", base, parsed.node_text(field))))
    }

    fn invocation(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue> {
        let name = node.child_by_field_name("name")?;
        let qualifier = node
            .child_by_field_name("object")
            .map(|o| self.value_or_text(o, parsed));
        Some(NormalizedValue::Call(Box::new(CallDescriptor {
            target: NormalizedValue::str(parsed.node_text(name)),
            qualifier,
            arguments: self.arguments(node, parsed),
            keywords: None,
            trailing_calls: None,
        })))
    }

    fn creation(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue> {
        let ty = node.child_by_field_name("type")?;
        Some(NormalizedValue::Call(Box::new(CallDescriptor {
            target: NormalizedValue::str(format!("new {}", parsed.node_text(ty))),
            qualifier: None,
            arguments: self.arguments(node, parsed),
            keywords: None,
            trailing_calls: None,
        })))
    }

    fn arguments(&self, call: Node, parsed: &ParsedFile) -> Vec<NormalizedValue> {
        self.argument_nodes(call)
            .into_iter()
            .map(|n| self.value_or_null(n, parsed))
            .collect()
    }

    fn argument_nodes<'tree>(&self, call: Node<'tree>) -> Vec<Node<'tree>> {
        let args = match call.child_by_field_name("arguments") {
            Some(args) => args,
            None => return Vec::new(),
        };
        let mut cursor = args.walk();
        args.named_children(&mut cursor)
            .filter(|c| !COMMENTS.contains(&c.kind()))
            .collect()
    }

    fn elements(&self, node: Node, parsed: &ParsedFile) -> Vec<NormalizedValue> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| !COMMENTS.contains(&c.kind()))
            .map(|c| self.value_or_null(c, parsed))
            .collect()
    }

    /// `left`, `operator` and `right` of a binary node as a mapping.
    fn operation(
        &self,
        node: Node,
        parsed: &ParsedFile,
        keys: [&str; 3],
    ) -> Option<NormalizedValue> {
        let left = node.child_by_field_name("left")?;
        let operator = node.child_by_field_name("operator")?;
        let right = node.child_by_field_name("right")?;
        Some(NormalizedValue::Mapping(vec![
            (NormalizedValue::str(keys[0]), self.value_or_null(left, parsed)),
            (
                NormalizedValue::str(keys[1]),
                NormalizedValue::str(parsed.node_text(operator)),
            ),
            (NormalizedValue::str(keys[2]), self.value_or_null(right, parsed)),
        ]))
    }

    fn value_or_null(&self, node: Node, parsed: &ParsedFile) -> NormalizedValue {
        self.normalize(node, parsed)
            .unwrap_or_else(NormalizedValue::null)
    }

    fn value_or_text(&self, node: Node, parsed: &ParsedFile) -> NormalizedValue {
        self.normalize(node, parsed)
            .unwrap_or_else(|| NormalizedValue::str(parsed.node_text(node)))
    }

    /// The `/** ... */` comment directly before the declaration.
    fn javadoc(&self, declaration: Node, parsed: &ParsedFile) -> Option<String> {
        let comment = declaration.prev_named_sibling()?;
        if comment.kind() != "block_comment" {
            return None;
        }
        let text = parsed.node_text(comment);
        if !text.starts_with("/**") {
            return None;
        }
        Some(clean_javadoc(text)).filter(|d| !d.is_empty())
    }

    fn function_spec(&self, name: Node, declaration: Node, parsed: &ParsedFile) -> FunctionSpec {
        let declaration_line = name.start_position().row + 1;
        let body = declaration.child_by_field_name("body");

        let start_line = body
            .and_then(|b| {
                let mut cursor = b.walk();
                let first = b
                    .named_children(&mut cursor)
                    .find(|c| !COMMENTS.contains(&c.kind()));
                first
            })
            .map(|s| s.start_position().row + 1)
            .unwrap_or(declaration_line);

        let end_line = body
            .and_then(|b| last_statement_line(b, STATEMENT_LISTS, COMMENTS))
            .unwrap_or(start_line)
            .max(start_line);

        FunctionSpec {
            name: parsed.node_text(name).to_string(),
            description: self.javadoc(declaration, parsed),
            start_line,
            end_line,
        }
    }
}

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaAnalyzer {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn keywords(&self) -> &'static phf::Map<&'static str, Operation> {
        &JAVA_KEYWORDS
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedFile, SpanError> {
        parse_strict(&self.language, path, source)
    }

    fn normalize(&self, node: Node, parsed: &ParsedFile) -> Option<NormalizedValue> {
        match node.kind() {
            "string_literal" => Some(NormalizedValue::str(self.string_content(node, parsed))),
            "character_literal" => {
                let text = parsed.node_text(node);
                let inner = text
                    .strip_prefix('\'')
                    .and_then(|t| t.strip_suffix('\''))
                    .unwrap_or(text);
                Some(NormalizedValue::str(inner))
            }
            kind if Self::is_numeric_kind(kind) => self.numeric(node, parsed).map(Into::into),
            "true" => Some(Scalar::Bool(true).into()),
            "false" => Some(Scalar::Bool(false).into()),
            "null_literal" => Some(Scalar::Null.into()),
            "identifier" | "type_identifier" | "this" | "super" | "scoped_identifier"
            | "class_literal" => Some(NormalizedValue::str(parsed.node_text(node))),
            "field_access" => self.member(node, parsed),
            "array_initializer" => Some(NormalizedValue::Sequence(self.elements(node, parsed))),
            "array_creation_expression" => {
                self.normalize(node.child_by_field_name("value")?, parsed)
            }
            "method_invocation" => self.invocation(node, parsed),
            "object_creation_expression" => self.creation(node, parsed),
            "expression_statement" | "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .find(|c| !COMMENTS.contains(&c.kind()))?;
                self.normalize(inner, parsed)
            }
            "cast_expression" => self.normalize(node.child_by_field_name("value")?, parsed),
            "unary_expression" => {
                let operator = node.child_by_field_name("operator")?;
                let operand = node.child_by_field_name("operand")?;
                if !Self::is_numeric_kind(operand.kind()) {
                    return None;
                }
                let value = self.numeric(operand, parsed)?;
                match parsed.node_text(operator) {
                    "-" => negate(value).map(Into::into),
                    "+" => Some(value.into()),
                    _ => None,
                }
            }
            "binary_expression" => self.operation(node, parsed, ["left", "operator", "right"]),
            "assignment_expression" => {
                self.operation(node, parsed, ["target", "operator", "value"])
            }
            _ => None,
        }
    }

    fn is_literal(&self, node: Node) -> bool {
        match node.kind() {
            "string_literal" | "character_literal" | "true" | "false" | "null_literal" => true,
            "unary_expression" => node
                .child_by_field_name("operand")
                .is_some_and(|o| Self::is_numeric_kind(o.kind())),
            kind => Self::is_numeric_kind(kind),
        }
    }

    fn call_site<'tree>(&self, node: Node<'tree>, parsed: &ParsedFile) -> Option<CallSite<'tree>> {
        if node.kind() != "method_invocation" {
            return None;
        }
        let name = node.child_by_field_name("name")?;
        Some(CallSite {
            operation: parsed.node_text(name).to_string(),
            line: name.start_position().row + 1,
            receiver: node.child_by_field_name("object"),
            positional: self.argument_nodes(node),
            named: Vec::new(),
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
            let mut declaration = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "name" => name = Some(capture.node),
                    "function" => declaration = Some(capture.node),
                    _ => {}
                }
            }

            if let (Some(name), Some(declaration)) = (name, declaration) {
                functions.push(self.function_spec(name, declaration, parsed));
            }
        }

        functions.sort_by_key(|f| f.start_line);
        Ok(functions)
    }
}

/// Strip comment markers and leading asterisks from a javadoc block.
fn clean_javadoc(raw: &str) -> String {
    let body = raw.trim().trim_start_matches("/**").trim_end_matches("*/");
    let mut lines: Vec<&str> = body
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            match trimmed.strip_prefix('*') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).trim_end(),
                None => trimmed,
            }
        })
        .collect();

    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
