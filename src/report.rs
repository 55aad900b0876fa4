//! Output formatting for spancover results.
//!
//! Supports two output formats:
//! - Basic: a coverage table, one row per file, for the terminal
//! - Detailed: the full per-function JSON document

use colored::*;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::analysis::Category;
use crate::engine::{FileReport, RunReport, SkippedFile};

const TRUE_SYMBOL: &str = "✓";
const FALSE_SYMBOL: &str = "✗";
const FIRST_COLUMN_WIDTH: usize = 26;

// =============================================================================
// Basic format
// =============================================================================

/// One row of the coverage table.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRow {
    pub file: String,
    /// Presence per configured category, in column order.
    pub present: Vec<bool>,
    /// Rounded percentage of present categories.
    pub coverage: u32,
}

impl CoverageRow {
    pub fn from_file(file: &FileReport, categories: &[Category], root: &Path) -> Self {
        let present: Vec<bool> = categories.iter().map(|c| file.report.has(*c)).collect();
        Self {
            file: folder_trim(&file.file, root),
            coverage: coverage_percent(&present),
            present,
        }
    }
}

fn coverage_percent(present: &[bool]) -> u32 {
    if present.is_empty() {
        return 0;
    }
    let hits = present.iter().filter(|p| **p).count();
    ((hits as f64 / present.len() as f64) * 100.0).round() as u32
}

/// Prefix a root-relative path with the name of the scanned directory.
///
/// When the root is the file itself, its parent directory name is used.
pub fn folder_trim(file: &str, root: &Path) -> String {
    let dir = if root.file_name().is_some_and(|n| n.to_string_lossy() == file) {
        root.parent()
    } else {
        Some(root)
    };
    match dir.and_then(Path::file_name) {
        Some(name) => format!("{}/{}", name.to_string_lossy(), file),
        None => file.to_string(),
    }
}

fn header_label(category: Category) -> String {
    let name = category.as_str().replace('_', " ");
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

fn format_record(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(v, w)| format!("{:<width$}", v, width = *w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the coverage table. An empty row set renders as an empty string.
pub fn render_table(rows: &[CoverageRow], categories: &[Category]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut headers = vec!["File".to_string()];
    headers.extend(categories.iter().map(|c| header_label(*c)));
    headers.push("Coverage".to_string());

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            if idx == 0 {
                FIRST_COLUMN_WIDTH
            } else {
                h.chars().count() + 3
            }
        })
        .collect();

    let header = format_record(&headers, &widths);
    let separator = "-".repeat(header.chars().count());

    let mut lines = vec![header, separator.clone()];
    for row in rows {
        let mut values = vec![row.file.clone()];
        values.extend(row.present.iter().map(|p| {
            if *p {
                TRUE_SYMBOL.to_string()
            } else {
                FALSE_SYMBOL.to_string()
            }
        }));
        values.push(format!("{}%", row.coverage));
        lines.push(format_record(&values, &widths));
    }
    lines.push(separator);

    lines.join("\n")
}

/// Build table rows for a run.
pub fn coverage_rows(report: &RunReport, categories: &[Category]) -> Vec<CoverageRow> {
    let root = Path::new(&report.root);
    report
        .files
        .iter()
        .map(|f| CoverageRow::from_file(f, categories, root))
        .collect()
}

/// Print the coverage table and any skipped files.
pub fn write_table(report: &RunReport, categories: &[Category]) {
    let rows = coverage_rows(report, categories);
    let table = render_table(&rows, categories);

    println!();
    print!("  ");
    print!("{}", "spancover".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
    print!("  {}", "Scanning: ".dimmed());
    println!("{}", report.root);
    println!();

    if table.is_empty() {
        println!("  {}", "No instrumented source files found.".dimmed());
    } else {
        for (idx, line) in table.lines().enumerate() {
            if idx == 0 {
                println!("{}", line.bold());
            } else {
                println!(
                    "{}",
                    line.replace(TRUE_SYMBOL, &TRUE_SYMBOL.green().to_string())
                        .replace(FALSE_SYMBOL, &FALSE_SYMBOL.red().to_string())
                );
            }
        }
    }

    if !report.skipped.is_empty() {
        write_skipped(&report.skipped);
    }
    println!();
}

fn write_skipped(skipped: &[SkippedFile]) {
    println!();
    println!("  {} ({}):", "Skipped".yellow(), skipped.len());
    for s in skipped {
        print!("    {}", s.file.blue());
        println!("  {}", s.reason.dimmed());
    }
}

// =============================================================================
// Detailed format
// =============================================================================

/// Top-level detailed JSON document.
#[derive(Serialize)]
pub struct DetailedReport<'a> {
    pub version: &'static str,
    #[serde(flatten)]
    pub run: &'a RunReport,
}

/// Render the detailed JSON document.
pub fn render_json(report: &RunReport) -> anyhow::Result<String> {
    let doc = DetailedReport {
        version: env!("CARGO_PKG_VERSION"),
        run: report,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Write the detailed JSON document to `output`, or stdout when it is `-`.
pub fn write_json(report: &RunReport, output: &Path) -> anyhow::Result<()> {
    let json = render_json(report)?;
    if output == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", json)?;
        return Ok(());
    }

    fs::write(output, format!("{}\n", json))?;
    eprintln!(
        "  {} {} ({} files, {} skipped)",
        "Report written to".dimmed(),
        output.display(),
        report.files.len(),
        report.skipped.len()
    );
    Ok(())
}
