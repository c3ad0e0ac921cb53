//! CBRI Step
//!
//! Collects the core metrics for a workspace and posts them to the dashboard.

use std::path::PathBuf;

use anyhow::Result;
use cbri_core::config::{Language, ToolPaths, UploadConfig};
use cbri_core::sink::WriterSink;
use cbri_step::*;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dashboard repository that receives the measurement
    #[arg(long, env = "CBRI_REPO_ID")]
    repo_id: String,

    /// Source language: Ada, C, C#, C++, FORTRAN or Java
    #[arg(long, env = "CBRI_LANG")]
    lang: String,

    /// REST API root, ending in /api
    #[arg(long, env = "CBRI_BASE_URL")]
    base_url: String,

    #[arg(long, env = "CBRI_USERNAME")]
    username: String,

    #[arg(long, env = "CBRI_PASSWORD", hide_env_values = true)]
    password: String,

    /// Source tree that was analyzed
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Build number used to name the revision
    #[arg(long, env = "BUILD_NUMBER")]
    build_number: Option<u64>,

    /// Explicit revision id, overrides --build-number
    #[arg(long)]
    revision: Option<String>,

    /// Metrics report, defaults to <workspace>/understand/cbri_metrics.json
    #[arg(long)]
    report: Option<PathBuf>,

    /// Ask the dashboard for the tree-map view
    #[arg(long)]
    include_tree_map: bool,

    #[arg(long, env = "CBRI_UND_PATH", default_value = "und")]
    und_path: PathBuf,

    #[arg(long, env = "CBRI_UPERL_PATH", default_value = "uperl")]
    uperl_path: PathBuf,

    /// Core-metrics script run by uperl
    #[arg(long, env = "CBRI_PLUGIN_PATH", default_value = "cbri.pl")]
    plugin_path: PathBuf,

    /// Emit JSON logs on stderr
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let language: Language = args.lang.parse()?;
    let revision_id = resolve_revision(args.revision, args.build_number)?;
    let config = UploadConfig::new(args.base_url, args.username, args.password, args.repo_id)
        .with_include_tree_map(args.include_tree_map);

    let settings = StepSettings {
        config,
        language,
        workspace: args.workspace,
        revision_id,
        report: args.report,
        tools: ToolPaths::new(args.und_path, args.uperl_path, args.plugin_path),
    };

    let sink = WriterSink::new(std::io::stdout());
    run_step(settings, &sink).await
}
