//! Attribution of detected calls to their innermost enclosing function.

use super::{
    CallBuckets, Category, ConciliatedReport, DetectionResult, FunctionReport, FunctionSpec,
    InstrumentationCall,
};

/// Index of the innermost function whose range contains `line`.
///
/// The innermost candidate has the smallest `end_line - start_line`; ties go
/// to the later `start_line`, then to the later function in the list.
pub fn innermost(functions: &[FunctionSpec], line: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, function) in functions.iter().enumerate() {
        if !function.contains(line) {
            continue;
        }
        best = match best {
            None => Some(idx),
            Some(current) => {
                let cur = &functions[current];
                let narrower = function.line_span() < cur.line_span();
                let same_span = function.line_span() == cur.line_span();
                if narrower || (same_span && function.start_line >= cur.start_line) {
                    Some(idx)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

/// Merge function boundaries and detected calls into one report.
///
/// Calls outside every function stay at file level. Every function gets an
/// entry, in source order; functions sharing a name share one entry.
pub fn conciliate(functions: &[FunctionSpec], detection: DetectionResult) -> ConciliatedReport {
    let mut report = ConciliatedReport::default();

    // Slot in `report.functions` for each entry of `functions`.
    let mut slots = Vec::with_capacity(functions.len());
    for function in functions {
        let existing = report
            .functions
            .iter()
            .position(|(name, _)| *name == function.name);
        let slot = match existing {
            Some(slot) => {
                // Widen so merged calls stay inside the reported range.
                let merged = &mut report.functions[slot].1;
                merged.start_line = merged.start_line.min(function.start_line);
                merged.end_line = merged.end_line.max(function.end_line);
                slot
            }
            None => {
                report.functions.push((
                    function.name.clone(),
                    FunctionReport {
                        description: function.description.clone(),
                        start_line: function.start_line,
                        end_line: function.end_line,
                        ..Default::default()
                    },
                ));
                report.functions.len() - 1
            }
        };
        slots.push(slot);
    }

    let DetectionResult {
        calls,
        exception_lines,
        span_end_lines,
        ..
    } = detection;

    let CallBuckets {
        tracers,
        spans,
        attributes,
        events,
        counters,
    } = calls;
    let buckets: [(Category, Vec<InstrumentationCall>); 5] = [
        (Category::Tracers, tracers),
        (Category::Spans, spans),
        (Category::Attributes, attributes),
        (Category::Events, events),
        (Category::Counters, counters),
    ];

    for (category, bucket) in buckets {
        for call in bucket {
            match innermost(functions, call.line) {
                Some(idx) => report.functions[slots[idx]].1.calls.push(category, call),
                None => report.calls.push(category, call),
            }
        }
    }

    for line in exception_lines {
        match innermost(functions, line) {
            Some(idx) => report.functions[slots[idx]].1.exception_recorded = true,
            None => report.exception_recorded = true,
        }
    }
    for line in span_end_lines {
        match innermost(functions, line) {
            Some(idx) => report.functions[slots[idx]].1.span_ended = true,
            None => report.span_ended = true,
        }
    }

    report
}
