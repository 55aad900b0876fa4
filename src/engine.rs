//! Run orchestration: file discovery and per-file analysis.
//!
//! Each file is parsed once, analyzed independently and dropped; a file that
//! cannot be read or parsed is reported as skipped and never aborts the run.

use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analysis::{get_analyzer, ConciliatedReport, LanguageAnalyzer};
use crate::config::Config;
use crate::error::SpanError;

/// Analysis result for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path relative to the scanned root.
    pub file: String,
    pub language: String,
    #[serde(flatten)]
    pub report: ConciliatedReport,
}

/// A file that could not be analyzed.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Result of a whole run, sorted by file path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub root: String,
    pub files: Vec<FileReport>,
    pub skipped: Vec<SkippedFile>,
}

/// Scans a directory tree (or single file) with the registered analyzers.
pub struct Engine {
    root: PathBuf,
    config: Config,
    globs: GlobSet,
}

impl Engine {
    /// Create an engine for `root`. Fails on invalid configuration.
    pub fn new<P: AsRef<Path>>(root: P, config: Config) -> Result<Self, SpanError> {
        crate::config::validate(&config)?;
        let globs = config.glob_set()?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            config,
            globs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The analyzer for `path`, honouring the configured language.
    fn analyzer_for(&self, path: &Path) -> Option<&'static dyn LanguageAnalyzer> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let analyzer = get_analyzer(ext)?;
        match &self.config.language {
            Some(lang) if lang != analyzer.language_id() => None,
            _ => Some(analyzer),
        }
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Path shown in reports: relative to the root, or the file name when the
    /// root is the file itself.
    fn display_path(&self, path: &Path) -> String {
        let relative = self.relative(path);
        let shown = if relative.as_os_str().is_empty() {
            path.file_name().map(Path::new).unwrap_or(path)
        } else {
            relative
        };
        shown.to_string_lossy().replace('\\', "/")
    }

    /// Collect analyzable files under the root, sorted.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>, SpanError> {
        if self.root.is_file() {
            return Ok(self
                .analyzer_for(&self.root)
                .map(|_| vec![self.root.clone()])
                .unwrap_or_default());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                let relative = self.relative(e.path());
                e.depth() == 0
                    || !(self.config.is_name_excluded(relative) || self.globs.is_match(relative))
            });

        for entry in walker {
            let entry = entry.map_err(|e| SpanError::Io {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()),
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            })?;
            if entry.file_type().is_file() && self.analyzer_for(entry.path()).is_some() {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort();
        debug!(count = files.len(), root = %self.root.display(), "collected files");
        Ok(files)
    }

    /// Read, parse and analyze one file.
    pub fn analyze_file(&self, path: &Path) -> Result<FileReport, SpanError> {
        let analyzer = self
            .analyzer_for(path)
            .ok_or_else(|| SpanError::UnsupportedLanguage(path.display().to_string()))?;

        let source = fs::read(path).map_err(|e| SpanError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let relative = self.display_path(path);
        let parsed = analyzer.parse(Path::new(&relative), &source)?;
        let report = analyzer
            .analyze(&parsed)?
            .into_chain_style(self.config.chain_style);

        debug!(file = %relative, calls = report.call_count(), "analyzed");
        Ok(FileReport {
            file: relative,
            language: analyzer.language_id().to_string(),
            report,
        })
    }

    /// Analyze `files` in parallel. Per-file failures become skipped entries.
    pub fn run(&self, files: &[PathBuf]) -> Result<RunReport, SpanError> {
        let results: Vec<_> = files
            .par_iter()
            .map(|p| (p, self.analyze_file(p)))
            .collect();

        let mut report = RunReport {
            root: self.root.display().to_string(),
            ..Default::default()
        };
        for (path, result) in results {
            match result {
                Ok(file) => report.files.push(file),
                Err(e) if e.is_per_file() => {
                    warn!("skipping {}: {}", path.display(), e);
                    report.skipped.push(SkippedFile {
                        file: self.display_path(path),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        report.files.sort_by(|a, b| a.file.cmp(&b.file));
        report.skipped.sort_by(|a, b| a.file.cmp(&b.file));
        info!(
            analyzed = report.files.len(),
            skipped = report.skipped.len(),
            "run complete"
        );
        Ok(report)
    }

    /// Collect and analyze everything under the root.
    pub fn scan(&self) -> Result<RunReport, SpanError> {
        let files = self.collect_files()?;
        self.run(&files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collect_files_skips_excluded() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app/main.py", "x = 1\n");
        write(temp.path(), "app/__init__.py", "");
        write(temp.path(), "venv/lib/site.py", "x = 1\n");
        write(temp.path(), "tests/test_main.py", "x = 1\n");
        write(temp.path(), "src/Main.java", "class Main {}\n");
        write(temp.path(), "README.md", "# readme\n");

        let engine = Engine::new(temp.path(), Config::default()).unwrap();
        let files = engine.collect_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| engine.relative(f).to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["app/main.py", "src/Main.java"]);
    }

    #[test]
    fn test_language_filter_and_globs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.py", "x = 1\n");
        write(temp.path(), "gen/b.py", "x = 1\n");
        write(temp.path(), "C.java", "class C {}\n");

        let config = Config {
            language: Some("python".to_string()),
            exclude_globs: vec!["gen".to_string()],
            ..Config::default()
        };
        let engine = Engine::new(temp.path(), config).unwrap();
        let files = engine.collect_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.py"));
    }

    #[test]
    fn test_run_skips_unparsable_files() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "good.py",
            "from opentelemetry import trace\ntracer = trace.get_tracer(\"svc\")\n",
        );
        write(temp.path(), "bad.py", "def broken(:\n");

        let engine = Engine::new(temp.path(), Config::default()).unwrap();
        let report = engine.scan().unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].file, "good.py");
        assert_eq!(report.files[0].language, "python");
        assert_eq!(report.files[0].report.calls.tracers.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].file, "bad.py");
        assert!(report.skipped[0].reason.contains("syntax error"));
    }

    #[test]
    fn test_single_file_root() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "only.py", "def f():\n    return 1\n");
        let engine = Engine::new(temp.path().join("only.py"), Config::default()).unwrap();

        let files = engine.collect_files().unwrap();
        assert_eq!(files.len(), 1);
        let report = engine.run(&files).unwrap();
        assert_eq!(report.files[0].file, "only.py");
        assert!(report.files[0].report.function("f").is_some());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            columns: vec!["nope".to_string()],
            ..Config::default()
        };
        assert!(matches!(
            Engine::new(".", config),
            Err(SpanError::Configuration(_))
        ));
    }
}
