//! Instrumentation call detection.
//!
//! The detector walks the full syntax tree once in pre-order. Every node the
//! language analyzer recognizes as a call is looked up in the analyzer's
//! keyword table and, when it matches, turned into an `InstrumentationCall`
//! (or a flag for span ends and exception recording).

use thiserror::Error;
use tracing::debug;
use tree_sitter::Node;

use super::keywords::Operation;
use super::traits::{CallSite, LanguageAnalyzer, ParsedFile};
use super::value::{Keywords, NormalizedValue};
use super::{DetectionResult, InstrumentationCall};

/// Payload extraction failure for a single recognized call.
///
/// The call is still recorded, with empty args and keywords.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("`{operation}` at line {line} has no argument naming it")]
    MissingName { operation: String, line: usize },

    #[error("`{operation}` at line {line} has no attribute payload")]
    MissingAttributes { operation: String, line: usize },

    #[error("`{operation}` at line {line} has no events")]
    MissingEvents { operation: String, line: usize },
}

type Payload = (Option<NormalizedValue>, Option<Keywords>);

/// Single-pass detector over one parsed file.
pub struct Detector<'a, A: LanguageAnalyzer + ?Sized> {
    analyzer: &'a A,
    result: DetectionResult,
}

impl<'a, A: LanguageAnalyzer + ?Sized> Detector<'a, A> {
    pub fn new(analyzer: &'a A) -> Self {
        Self {
            analyzer,
            result: DetectionResult::default(),
        }
    }

    /// Walk every node of the tree and return the classified calls.
    pub fn run(mut self, parsed: &ParsedFile) -> DetectionResult {
        let mut cursor = parsed.tree.root_node().walk();
        'walk: loop {
            self.visit(cursor.node(), parsed);
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        self.result.calls.sort_by_line();
        self.result
    }

    fn visit(&mut self, node: Node, parsed: &ParsedFile) {
        let site = match self.analyzer.call_site(node, parsed) {
            Some(site) => site,
            None => return,
        };
        let operation = match self.analyzer.keywords().get(site.operation.as_str()) {
            Some(op) => *op,
            None => return,
        };
        if operation.requires_receiver() && site.receiver.is_none() {
            return;
        }

        match operation {
            Operation::EndSpan => {
                self.result.span_ended = true;
                self.result.span_end_lines.push(site.line);
            }
            Operation::RecordException => {
                self.result.exception_recorded = true;
                self.result.exception_lines.push(site.line);
            }
            _ => {
                let (args, keywords) = match self.payload(operation, &site, parsed) {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!(path = %parsed.path, "{}", e);
                        (None, None)
                    }
                };
                self.result.calls.push(
                    operation.category(),
                    InstrumentationCall {
                        operation: site.operation,
                        line: site.line,
                        args,
                        keywords,
                    },
                );
            }
        }
    }

    fn payload(
        &self,
        operation: Operation,
        site: &CallSite,
        parsed: &ParsedFile,
    ) -> Result<Payload, ExtractionError> {
        let keywords = self.keywords_of(site, parsed);

        let args = match operation {
            Operation::AcquireTracer | Operation::StartSpan => {
                let node = site
                    .positional
                    .first()
                    .copied()
                    .or_else(|| named(site, "name"))
                    .or_else(|| site.named.first().map(|(_, n)| *n))
                    .ok_or_else(|| ExtractionError::MissingName {
                        operation: site.operation.clone(),
                        line: site.line,
                    })?;
                NormalizedValue::Sequence(vec![self.identity(node, parsed)])
            }
            Operation::SetAttribute => self.attribute_payload(site, parsed)?,
            Operation::AddEvent => {
                let name = site
                    .positional
                    .first()
                    .copied()
                    .or_else(|| named(site, "name"))
                    .ok_or_else(|| ExtractionError::MissingName {
                        operation: site.operation.clone(),
                        line: site.line,
                    })?;
                let mut items = vec![self.value(name, parsed)];
                if let Some(payload) = site
                    .positional
                    .get(1)
                    .copied()
                    .or_else(|| named(site, "attributes"))
                {
                    items.push(self.value(payload, parsed));
                }
                NormalizedValue::Sequence(items)
            }
            Operation::AddEvents => {
                let node = site
                    .positional
                    .first()
                    .copied()
                    .or_else(|| named(site, "events"))
                    .ok_or_else(|| ExtractionError::MissingEvents {
                        operation: site.operation.clone(),
                        line: site.line,
                    })?;
                match self.value(node, parsed) {
                    seq @ NormalizedValue::Sequence(_) => seq,
                    other => NormalizedValue::Sequence(vec![other]),
                }
            }
            Operation::IncrementCounter => {
                let receiver = site
                    .receiver
                    .map(|r| self.identity(r, parsed))
                    .unwrap_or_else(NormalizedValue::null);
                let increments = site
                    .positional
                    .iter()
                    .map(|n| self.value(*n, parsed))
                    .collect();
                NormalizedValue::Sequence(vec![receiver, NormalizedValue::Sequence(increments)])
            }
            // Flags are handled before payload extraction.
            Operation::EndSpan | Operation::RecordException => return Ok((None, keywords)),
        };

        Ok((Some(args), keywords))
    }

    fn attribute_payload(
        &self,
        site: &CallSite,
        parsed: &ParsedFile,
    ) -> Result<NormalizedValue, ExtractionError> {
        match site.positional.as_slice() {
            [key, value, ..] => Ok(NormalizedValue::Mapping(vec![(
                self.value(*key, parsed),
                self.value(*value, parsed),
            )])),
            [single] => Ok(self.value(*single, parsed)),
            [] => {
                if let (Some(key), Some(value)) = (named(site, "key"), named(site, "value")) {
                    return Ok(NormalizedValue::Mapping(vec![(
                        self.value(key, parsed),
                        self.value(value, parsed),
                    )]));
                }
                named(site, "attributes")
                    .map(|n| self.value(n, parsed))
                    .ok_or_else(|| ExtractionError::MissingAttributes {
                        operation: site.operation.clone(),
                        line: site.line,
                    })
            }
        }
    }

    fn keywords_of(&self, site: &CallSite, parsed: &ParsedFile) -> Option<Keywords> {
        if site.named.is_empty() {
            return None;
        }
        Some(
            site.named
                .iter()
                .map(|(name, node)| (name.clone(), self.value(*node, parsed)))
                .collect(),
        )
    }

    fn value(&self, node: Node, parsed: &ParsedFile) -> NormalizedValue {
        self.analyzer
            .normalize(node, parsed)
            .unwrap_or_else(NormalizedValue::null)
    }

    /// Literal scalar when the node is a literal, otherwise the referenced name.
    fn identity(&self, node: Node, parsed: &ParsedFile) -> NormalizedValue {
        let normalized = self.analyzer.normalize(node, parsed);
        if self.analyzer.is_literal(node) {
            if let Some(value @ NormalizedValue::Scalar(_)) = normalized {
                return value;
            }
        }
        match normalized {
            Some(value) => NormalizedValue::str(value.key_string()),
            None => NormalizedValue::str(parsed.node_text(node).trim()),
        }
    }
}

fn named<'tree>(site: &CallSite<'tree>, name: &str) -> Option<Node<'tree>> {
    site.named
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, node)| *node)
}
