//! The boundary to the external static-analysis tool.
//!
//! The CBRI client does not run the analysis itself. A [`MetricsProducer`]
//! turns a source tree into a [`MetricsRecord`]; [`ReportProducer`] does it
//! by announcing the Understand commands the pipeline has to run beforehand
//! and then reading the metrics report those commands leave behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::{Language, ToolPaths};
use crate::error::{AnalysisError, AnalysisResult};
use crate::metrics::MetricsRecord;
use crate::sink::LogSink;

/// Name of the analysis database created in the source tree.
pub const UNDERSTAND_DB: &str = "understand.udb";

/// Directory, relative to the source tree, the core-metrics script writes to.
pub const OUTPUT_DIR: &str = "understand";

/// Report file read by [`ReportProducer`] inside [`OUTPUT_DIR`].
pub const REPORT_FILE: &str = "cbri_metrics.json";

/// Minimum length of a block counted as duplicated code.
pub const DUPLICATE_MIN_LINES: u32 = 10;

/// Produces the metrics for one source tree.
pub trait MetricsProducer {
    fn produce(&self, source_tree: &Path, language: Language) -> AnalysisResult<MetricsRecord>;
}

/// `"Jenkins-Build-<n>"`, the revision id used when the build has no better one.
pub fn revision_id_for_build(build_number: u64) -> String {
    format!("Jenkins-Build-{build_number}")
}

/// The two tool invocations that compute the core metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPlan {
    pub database: PathBuf,
    pub output_dir: PathBuf,
    pub analyze_command: String,
    pub metrics_command: String,
}

impl AnalysisPlan {
    pub fn new(tools: &ToolPaths, source_tree: &Path, language: Language) -> Self {
        let database = source_tree.join(UNDERSTAND_DB);
        let output_dir = source_tree.join(OUTPUT_DIR);

        let analyze_command = format!(
            "{} -quiet create -languages {} add {} analyze {}",
            tools.und_path.display(),
            language,
            source_tree.display(),
            database.display(),
        );
        let metrics_command = format!(
            "{} {} -db {} -createMetrics -DuplicateMinLines {} -outputDir {}",
            tools.uperl_path.display(),
            tools.plugin_path.display(),
            database.display(),
            DUPLICATE_MIN_LINES,
            output_dir.display(),
        );

        Self {
            database,
            output_dir,
            analyze_command,
            metrics_command,
        }
    }

    /// Write both commands to the sink for the pipeline to run.
    pub fn announce(&self, sink: &dyn LogSink) {
        for command in [&self.analyze_command, &self.metrics_command] {
            sink.line("The pipeline should run this command BEFORE the CBRI step:");
            sink.line(command);
            sink.line("");
        }
    }
}

/// Metrics as written by the core-metrics script.
#[derive(Debug, Deserialize)]
struct ReportMetrics {
    #[serde(default)]
    captured_at: Option<DateTime<Utc>>,
    architecture_type: String,
    is_core: bool,
    propagation_cost: f64,
    uloc: u64,
    num_classes: u64,
    num_files: u64,
    core_size: u64,
    num_files_in_core: u64,
    num_files_overly_complex: u64,
    percent_files_overly_complex: f64,
    useful_lines_of_comments: u64,
    useful_comment_density: f64,
    duplicate_uloc: u64,
    percent_duplicate_uloc: f64,
}

/// Reads the metrics report produced by the Understand commands.
pub struct ReportProducer<'a> {
    tools: ToolPaths,
    revision_id: String,
    report_path: Option<PathBuf>,
    include_tree_map: bool,
    sink: &'a dyn LogSink,
}

impl<'a> ReportProducer<'a> {
    pub fn new(tools: ToolPaths, revision_id: impl Into<String>, sink: &'a dyn LogSink) -> Self {
        Self {
            tools,
            revision_id: revision_id.into(),
            report_path: None,
            include_tree_map: false,
            sink,
        }
    }

    /// Read the report from `path` instead of `<tree>/understand/cbri_metrics.json`.
    pub fn with_report_path(mut self, path: impl AsRef<Path>) -> Self {
        self.report_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_include_tree_map(mut self, include: bool) -> Self {
        self.include_tree_map = include;
        self
    }

    fn load(&self, path: &Path) -> AnalysisResult<MetricsRecord> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AnalysisError::ReportMissing {
                path: path.display().to_string(),
            },
            _ => AnalysisError::Report {
                path: path.display().to_string(),
                message: e.to_string(),
            },
        })?;

        let report: ReportMetrics =
            serde_json::from_str(&text).map_err(|e| AnalysisError::Report {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let record = MetricsRecord::builder()
            .captured_at(report.captured_at.unwrap_or_else(Utc::now))
            .revision_id(self.revision_id.clone())
            .architecture_type(report.architecture_type)
            .is_core(report.is_core)
            .propagation_cost(report.propagation_cost)
            .uloc(report.uloc)
            .num_classes(report.num_classes)
            .num_files(report.num_files)
            .core_size(report.core_size)
            .num_files_in_core(report.num_files_in_core)
            .num_files_overly_complex(report.num_files_overly_complex)
            .percent_files_overly_complex(report.percent_files_overly_complex)
            .useful_lines_of_comments(report.useful_lines_of_comments)
            .useful_comment_density(report.useful_comment_density)
            .duplicate_uloc(report.duplicate_uloc)
            .percent_duplicate_uloc(report.percent_duplicate_uloc)
            .include_tree_map(self.include_tree_map)
            .build()?;

        Ok(record)
    }
}

impl MetricsProducer for ReportProducer<'_> {
    fn produce(&self, source_tree: &Path, language: Language) -> AnalysisResult<MetricsRecord> {
        let plan = AnalysisPlan::new(&self.tools, source_tree, language);
        plan.announce(self.sink);

        let path = self
            .report_path
            .clone()
            .unwrap_or_else(|| plan.output_dir.join(REPORT_FILE));
        debug!(path = %path.display(), "Reading metrics report");

        let record = self.load(&path)?;
        self.sink.line(&format!(
            "Loaded CBRI metrics for {} from {}",
            record.revision_id(),
            path.display()
        ));
        Ok(record)
    }
}
