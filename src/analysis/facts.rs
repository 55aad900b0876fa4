//! Fact structures produced by detection, boundary extraction and conciliation.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::value::{serialize_keywords, serialize_pairs, ChainStyle, Keywords, NormalizedValue};

/// Instrumentation category reported per file and per function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Tracers,
    Spans,
    Attributes,
    Events,
    Counters,
    /// `record_exception` / `recordException` seen.
    Exceptions,
    /// `end()` seen on a span.
    SpanEnds,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Tracers,
        Category::Spans,
        Category::Attributes,
        Category::Events,
        Category::Counters,
        Category::Exceptions,
        Category::SpanEnds,
    ];

    /// Categories backed by a call bucket.
    pub const CALLS: [Category; 5] = [
        Category::Tracers,
        Category::Spans,
        Category::Attributes,
        Category::Events,
        Category::Counters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tracers => "tracers",
            Category::Spans => "spans",
            Category::Attributes => "attributes",
            Category::Events => "events",
            Category::Counters => "counters",
            Category::Exceptions => "exceptions",
            Category::SpanEnds => "span_ends",
        }
    }

    /// Parse a category name as used in configuration files.
    pub fn parse(name: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Whether this category is a boolean flag rather than a call bucket.
    pub fn is_flag(&self) -> bool {
        matches!(self, Category::Exceptions | Category::SpanEnds)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detected instrumentation call site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentationCall {
    /// The matched operation keyword, e.g. `set_attribute`.
    pub operation: String,
    /// 1-indexed line of the operation name.
    pub line: usize,
    /// Category-specific payload; `None` when extraction failed.
    pub args: Option<NormalizedValue>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_keywords"
    )]
    pub keywords: Option<Keywords>,
}

/// Calls grouped by category, each in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallBuckets {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tracers: Vec<InstrumentationCall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<InstrumentationCall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<InstrumentationCall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<InstrumentationCall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub counters: Vec<InstrumentationCall>,
}

impl InstrumentationCall {
    /// Rewrite call chains in the payload and keywords.
    pub fn into_chain_style(self, style: ChainStyle) -> Self {
        Self {
            args: self.args.map(|a| a.into_chain_style(style)),
            keywords: self.keywords.map(|kw| {
                kw.into_iter()
                    .map(|(k, v)| (k, v.into_chain_style(style)))
                    .collect()
            }),
            ..self
        }
    }
}

impl CallBuckets {
    /// The bucket for a call category; `None` for flag categories.
    pub fn get(&self, category: Category) -> Option<&Vec<InstrumentationCall>> {
        match category {
            Category::Tracers => Some(&self.tracers),
            Category::Spans => Some(&self.spans),
            Category::Attributes => Some(&self.attributes),
            Category::Events => Some(&self.events),
            Category::Counters => Some(&self.counters),
            Category::Exceptions | Category::SpanEnds => None,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> Option<&mut Vec<InstrumentationCall>> {
        match category {
            Category::Tracers => Some(&mut self.tracers),
            Category::Spans => Some(&mut self.spans),
            Category::Attributes => Some(&mut self.attributes),
            Category::Events => Some(&mut self.events),
            Category::Counters => Some(&mut self.counters),
            Category::Exceptions | Category::SpanEnds => None,
        }
    }

    /// Append a call to its bucket. Flag categories are ignored.
    pub fn push(&mut self, category: Category, call: InstrumentationCall) {
        if let Some(bucket) = self.get_mut(category) {
            bucket.push(call);
        }
    }

    /// Total number of calls across buckets.
    pub fn len(&self) -> usize {
        Category::CALLS
            .iter()
            .filter_map(|c| self.get(*c))
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All calls with their category, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &InstrumentationCall)> {
        Category::CALLS.into_iter().flat_map(move |category| {
            self.get(category)
                .into_iter()
                .flatten()
                .map(move |call| (category, call))
        })
    }

    /// Stable sort of every bucket by line, keeping discovery order within a line.
    pub fn sort_by_line(&mut self) {
        for category in Category::CALLS {
            if let Some(bucket) = self.get_mut(category) {
                bucket.sort_by_key(|c| c.line);
            }
        }
    }

    pub fn into_chain_style(self, style: ChainStyle) -> Self {
        let apply = |bucket: Vec<InstrumentationCall>| -> Vec<InstrumentationCall> {
            bucket
                .into_iter()
                .map(|c| c.into_chain_style(style))
                .collect()
        };
        Self {
            tracers: apply(self.tracers),
            spans: apply(self.spans),
            attributes: apply(self.attributes),
            events: apply(self.events),
            counters: apply(self.counters),
        }
    }
}

/// Source range of a function-like declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: Option<String>,
    /// First body statement after leading documentation (1-indexed).
    pub start_line: usize,
    /// Last statement line reached in the body, nested statements included.
    pub end_line: usize,
}

impl FunctionSpec {
    pub fn contains(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Number of lines between start and end; smaller means more deeply nested.
    pub fn line_span(&self) -> usize {
        self.end_line.saturating_sub(self.start_line)
    }
}

/// Everything the detector found in one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    pub calls: CallBuckets,
    pub exception_recorded: bool,
    pub span_ended: bool,
    /// Lines of every exception-recording call.
    pub exception_lines: Vec<usize>,
    /// Lines of every span-end call.
    pub span_end_lines: Vec<usize>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && !self.exception_recorded && !self.span_ended
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Instrumentation attributed to one function.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(flatten)]
    pub calls: CallBuckets,
    #[serde(skip_serializing_if = "is_false")]
    pub exception_recorded: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub span_ended: bool,
}

impl FunctionReport {
    /// Whether this function carries anything in the given category.
    pub fn has(&self, category: Category) -> bool {
        match category {
            Category::Exceptions => self.exception_recorded,
            Category::SpanEnds => self.span_ended,
            other => self.calls.get(other).is_some_and(|b| !b.is_empty()),
        }
    }
}

/// Per-file report: unattributed calls at file level plus one entry per function.
///
/// Unlike function entries, the file level always carries every bucket and
/// flag, empty or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConciliatedReport {
    pub calls: CallBuckets,
    pub exception_recorded: bool,
    pub span_ended: bool,
    /// Functions in source order.
    pub functions: Vec<(String, FunctionReport)>,
}

struct FunctionMap<'a>(&'a [(String, FunctionReport)]);

impl Serialize for FunctionMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_pairs(self.0, serializer)
    }
}

impl Serialize for ConciliatedReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for category in Category::CALLS {
            if let Some(bucket) = self.calls.get(category) {
                map.serialize_entry(category.as_str(), bucket)?;
            }
        }
        map.serialize_entry("exception_recorded", &self.exception_recorded)?;
        map.serialize_entry("span_ended", &self.span_ended)?;
        map.serialize_entry("functions", &FunctionMap(&self.functions))?;
        map.end()
    }
}

impl ConciliatedReport {
    pub fn function(&self, name: &str) -> Option<&FunctionReport> {
        self.functions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, report)| report)
    }

    /// Whether the category appears anywhere in the file.
    pub fn has(&self, category: Category) -> bool {
        let file_level = match category {
            Category::Exceptions => self.exception_recorded,
            Category::SpanEnds => self.span_ended,
            other => self.calls.get(other).is_some_and(|b| !b.is_empty()),
        };
        file_level || self.functions.iter().any(|(_, f)| f.has(category))
    }

    /// Rewrite every call payload into the requested chain layout.
    pub fn into_chain_style(self, style: ChainStyle) -> Self {
        if style == ChainStyle::Nested {
            return self;
        }
        Self {
            calls: self.calls.into_chain_style(style),
            functions: self
                .functions
                .into_iter()
                .map(|(name, f)| {
                    let calls = f.calls.into_chain_style(style);
                    (name, FunctionReport { calls, ..f })
                })
                .collect(),
            ..self
        }
    }

    /// Total number of calls, attributed or not.
    pub fn call_count(&self) -> usize {
        self.calls.len()
            + self
                .functions
                .iter()
                .map(|(_, f)| f.calls.len())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(operation: &str, line: usize) -> InstrumentationCall {
        InstrumentationCall {
            operation: operation.to_string(),
            line,
            args: None,
            keywords: None,
        }
    }

    #[test]
    fn test_category_parse() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("metrics"), None);
        assert!(Category::SpanEnds.is_flag());
        assert!(!Category::Counters.is_flag());
    }

    #[test]
    fn test_buckets_sort_is_stable() {
        let mut buckets = CallBuckets::default();
        buckets.push(Category::Attributes, call("second_on_7", 7));
        buckets.push(Category::Attributes, call("on_3", 3));
        buckets.push(Category::Attributes, call("third_on_7", 7));
        buckets.push(Category::Exceptions, call("ignored", 1));
        buckets.sort_by_line();

        let ops: Vec<_> = buckets.attributes.iter().map(|c| c.operation.as_str()).collect();
        assert_eq!(ops, vec!["on_3", "second_on_7", "third_on_7"]);
        assert_eq!(buckets.len(), 3);
    }

    #[test]
    fn test_empty_buckets_are_not_serialized() {
        let mut report = FunctionReport {
            start_line: 2,
            end_line: 4,
            ..Default::default()
        };
        report.calls.spans.push(call("start_span", 3));
        let json = serde_json::to_value(&report).unwrap();

        assert!(json.get("spans").is_some());
        assert!(json.get("tracers").is_none());
        assert!(json.get("description").is_none());
        assert!(json.get("span_ended").is_none());
        assert_eq!(json["spans"][0]["args"], serde_json::Value::Null);
    }

    #[test]
    fn test_file_level_keeps_empty_buckets() {
        let mut function = FunctionReport {
            start_line: 1,
            end_line: 2,
            ..Default::default()
        };
        function.calls.events.push(call("add_event", 2));
        let report = ConciliatedReport {
            functions: vec![("handler".to_string(), function)],
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();

        for category in Category::CALLS {
            assert_eq!(json[category.as_str()], serde_json::json!([]));
        }
        assert_eq!(json["exception_recorded"], false);
        assert_eq!(json["span_ended"], false);
        assert!(json["functions"]["handler"].get("spans").is_none());
        assert_eq!(json["functions"]["handler"]["events"][0]["line"], 2);
    }

    #[test]
    fn test_report_has_checks_functions() {
        let mut function = FunctionReport::default();
        function.span_ended = true;
        let report = ConciliatedReport {
            functions: vec![("handler".to_string(), function)],
            ..Default::default()
        };
        assert!(report.has(Category::SpanEnds));
        assert!(!report.has(Category::Spans));
        assert!(report.function("handler").is_some());
        assert!(report.function("missing").is_none());
    }
}
