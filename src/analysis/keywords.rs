//! Closed keyword tables mapping operation names to instrumentation effects.
//!
//! Only names listed here are treated as instrumentation; every other call
//! is ignored by the detector. The tables are plain statics so callers can
//! inspect them (`spancover keywords`).

use phf::phf_map;

use super::facts::Category;

/// What a recognized call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AcquireTracer,
    StartSpan,
    EndSpan,
    SetAttribute,
    AddEvent,
    /// Several events passed as one sequence.
    AddEvents,
    RecordException,
    IncrementCounter,
}

impl Operation {
    pub fn category(&self) -> Category {
        match self {
            Operation::AcquireTracer => Category::Tracers,
            Operation::StartSpan => Category::Spans,
            Operation::EndSpan => Category::SpanEnds,
            Operation::SetAttribute => Category::Attributes,
            Operation::AddEvent | Operation::AddEvents => Category::Events,
            Operation::RecordException => Category::Exceptions,
            Operation::IncrementCounter => Category::Counters,
        }
    }

    /// Operations whose names are too generic to match as bare function calls.
    pub fn requires_receiver(&self) -> bool {
        matches!(self, Operation::EndSpan | Operation::IncrementCounter)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::AcquireTracer => "acquire-tracer",
            Operation::StartSpan => "start-span",
            Operation::EndSpan => "end-span",
            Operation::SetAttribute => "set-attribute",
            Operation::AddEvent => "add-event",
            Operation::AddEvents => "add-events",
            Operation::RecordException => "record-exception",
            Operation::IncrementCounter => "increment-counter",
        }
    }
}

/// OpenTelemetry Python API names.
pub static PYTHON_KEYWORDS: phf::Map<&'static str, Operation> = phf_map! {
    "get_tracer" => Operation::AcquireTracer,
    "start_as_current_span" => Operation::StartSpan,
    "start_span" => Operation::StartSpan,
    "use_span" => Operation::StartSpan,
    "end" => Operation::EndSpan,
    "set_attribute" => Operation::SetAttribute,
    "set_attributes" => Operation::SetAttribute,
    "add_event" => Operation::AddEvent,
    "add_events" => Operation::AddEvents,
    "record_exception" => Operation::RecordException,
    "add" => Operation::IncrementCounter,
};

/// OpenTelemetry Java API names.
pub static JAVA_KEYWORDS: phf::Map<&'static str, Operation> = phf_map! {
    "getTracer" => Operation::AcquireTracer,
    "getGlobalTracer" => Operation::AcquireTracer,
    "spanBuilder" => Operation::StartSpan,
    "end" => Operation::EndSpan,
    "setAttribute" => Operation::SetAttribute,
    "setAttributes" => Operation::SetAttribute,
    "addEvent" => Operation::AddEvent,
    "recordException" => Operation::RecordException,
    "add" => Operation::IncrementCounter,
};

/// Table entries sorted by name, for display.
pub fn sorted_entries(table: &phf::Map<&'static str, Operation>) -> Vec<(&'static str, Operation)> {
    let mut entries: Vec<_> = table.entries().map(|(k, v)| (*k, *v)).collect();
    entries.sort_by_key(|(name, _)| *name);
    entries
}
