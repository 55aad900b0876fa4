//! Command-line interface for spancover.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::analysis::{get_analyzer_by_id, keywords, registered_languages};
use crate::config::{self, Config};
use crate::engine::Engine;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 2;

/// Default output file of the detailed report.
pub const DEFAULT_OUTPUT: &str = "spancover_report.json";

/// Instrumentation coverage for OpenTelemetry-style tracing and metrics calls.
///
/// Spancover scans Python and Java sources, detects tracer, span, attribute,
/// event, counter and exception calls, and attributes each one to the
/// innermost function that contains it.
#[derive(Parser)]
#[command(name = "spancover")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a per-file coverage table
    Basic(ScanArgs),
    /// Write the per-function JSON report
    Detailed(DetailedArgs),
    /// List the recognized instrumentation keywords
    Keywords(KeywordsArgs),
}

/// Arguments shared by the scanning commands.
#[derive(Args)]
pub struct ScanArgs {
    /// Path to scan (file or directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Only scan one language: python or java
    #[arg(short, long)]
    pub language: Option<String>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the detailed command.
#[derive(Args)]
pub struct DetailedArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Output file for the report, or '-' for stdout
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

/// Arguments for the keywords command.
#[derive(Args)]
pub struct KeywordsArgs {
    /// Only list one language
    #[arg(short, long)]
    pub language: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ReportKind<'a> {
    Basic,
    Detailed { output: &'a Path },
}

/// Run the basic command.
pub fn run_basic(args: &ScanArgs) -> anyhow::Result<i32> {
    run_scan(args, ReportKind::Basic)
}

/// Run the detailed command.
pub fn run_detailed(args: &DetailedArgs) -> anyhow::Result<i32> {
    run_scan(
        &args.scan,
        ReportKind::Detailed {
            output: &args.output,
        },
    )
}

fn load_config(args: &ScanArgs) -> Result<Config, String> {
    let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
    let mut config = Config::load(args.config.as_deref(), &cwd).map_err(|e| e.to_string())?;
    if args.language.is_some() {
        config.language = args.language.clone();
    }
    config::validate(&config).map_err(|e| e.to_string())?;
    Ok(config)
}

fn run_scan(args: &ScanArgs, kind: ReportKind) -> anyhow::Result<i32> {
    let config = match load_config(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Resolve path
    let abs_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let categories = config.categories()?;
    let engine = Engine::new(&abs_path, config)?;
    let files = engine.collect_files()?;
    if files.is_empty() {
        eprintln!("Warning: no files to scan");
    }

    let result = engine.run(&files)?;

    match kind {
        ReportKind::Basic => report::write_table(&result, &categories),
        ReportKind::Detailed { output } => report::write_json(&result, output)?,
    }

    Ok(EXIT_SUCCESS)
}

/// Run the keywords command.
pub fn run_keywords(args: &KeywordsArgs) -> anyhow::Result<i32> {
    let languages: Vec<&str> = match &args.language {
        Some(lang) => {
            if get_analyzer_by_id(lang).is_none() {
                eprintln!(
                    "Error: unknown language {:?}, must be one of: {}",
                    lang,
                    registered_languages().join(", ")
                );
                return Ok(EXIT_ERROR);
            }
            vec![lang.as_str()]
        }
        None => registered_languages().to_vec(),
    };

    for (idx, lang) in languages.iter().enumerate() {
        let Some(analyzer) = get_analyzer_by_id(lang) else {
            continue;
        };
        if idx > 0 {
            println!();
        }
        println!("{}:", lang);
        for (keyword, operation) in keywords::sorted_entries(analyzer.keywords()) {
            println!(
                "  {:<24} {:<18} {}",
                keyword,
                operation.as_str(),
                operation.category()
            );
        }
    }

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_detailed_args() {
        let cli = Cli::try_parse_from([
            "spancover", "-v", "detailed", "src", "-l", "java", "-o", "-",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Detailed(args) => {
                assert_eq!(args.scan.path, PathBuf::from("src"));
                assert_eq!(args.scan.language.as_deref(), Some("java"));
                assert_eq!(args.output, PathBuf::from("-"));
            }
            _ => panic!("expected detailed command"),
        }
    }

    #[test]
    fn test_basic_defaults() {
        let cli = Cli::try_parse_from(["spancover", "basic"]).unwrap();
        match cli.command {
            Commands::Basic(args) => {
                assert_eq!(args.path, PathBuf::from("."));
                assert!(args.config.is_none());
            }
            _ => panic!("expected basic command"),
        }
    }

    #[test]
    fn test_output_is_detailed_only() {
        assert!(Cli::try_parse_from(["spancover", "basic", "-o", "out.json"]).is_err());

        let cli = Cli::try_parse_from(["spancover", "detailed"]).unwrap();
        match cli.command {
            Commands::Detailed(args) => {
                assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT));
                assert_eq!(args.scan.path, PathBuf::from("."));
            }
            _ => panic!("expected detailed command"),
        }
    }

    #[test]
    fn test_unknown_keyword_language() {
        let args = KeywordsArgs {
            language: Some("cobol".to_string()),
        };
        assert_eq!(run_keywords(&args).unwrap(), EXIT_ERROR);
    }
}
