//! CBRI build step
//!
//! Runs the CBRI upload for one build: validate the settings, collect the
//! metrics the analysis tool produced for the workspace, and post them to the
//! dashboard. Any failure is fatal to the step.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cbri_core::analysis::{revision_id_for_build, MetricsProducer, ReportProducer};
use cbri_core::config::{Language, ToolPaths, UploadConfig};
use cbri_core::logging::setup::{init_logging, LoggingConfig};
use cbri_core::sink::LogSink;
use cbri_core::upload::UploadClient;
use tracing::info;

/// Everything one step invocation needs.
#[derive(Debug, Clone)]
pub struct StepSettings {
    pub config: UploadConfig,
    pub language: Language,
    pub workspace: PathBuf,
    pub revision_id: String,
    pub report: Option<PathBuf>,
    pub tools: ToolPaths,
}

/// Pick the revision id: an explicit one wins, otherwise `Jenkins-Build-<n>`.
pub fn resolve_revision(revision: Option<String>, build_number: Option<u64>) -> Result<String> {
    match (revision, build_number) {
        (Some(revision), _) if !revision.trim().is_empty() => Ok(revision),
        (_, Some(number)) => Ok(revision_id_for_build(number)),
        _ => bail!("Either --revision or --build-number is required"),
    }
}

/// Run the step, writing progress to `sink`.
pub async fn run_step(settings: StepSettings, sink: &dyn LogSink) -> Result<()> {
    settings
        .config
        .validate()
        .context("Invalid CBRI configuration")?;

    let mut producer = ReportProducer::new(settings.tools, settings.revision_id.as_str(), sink)
        .with_include_tree_map(settings.config.include_tree_map());
    if let Some(report) = &settings.report {
        producer = producer.with_report_path(report);
    }

    let record = producer
        .produce(&settings.workspace, settings.language)
        .context("Failed to collect CBRI metrics")?;

    let mut uploader =
        UploadClient::from_config(&settings.config).context("Invalid CBRI configuration")?;
    uploader
        .post_action(record, sink)
        .await
        .context("Failed to post CBRI measurement")?;

    info!(revision = %settings.revision_id, "CBRI step finished");
    Ok(())
}

/// Initialize tracing on stderr.
pub fn init_tracing(json: bool) {
    let config = LoggingConfig::default().with_json_format(json);
    if let Err(e) = init_logging(config) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbri_core::sink::MemorySink;
    use mockito::Matcher;
    use serde_json::json;
    use std::fs;

    fn write_report(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("metrics.json");
        let report = json!({
            "captured_at": "2024-02-01T08:30:00Z",
            "architecture_type": "Multi-Core",
            "is_core": true,
            "propagation_cost": 18.0,
            "uloc": 5120,
            "num_classes": 64,
            "num_files": 50,
            "core_size": 9,
            "num_files_in_core": 9,
            "num_files_overly_complex": 1,
            "percent_files_overly_complex": 2.0,
            "useful_lines_of_comments": 900,
            "useful_comment_density": 17.5,
            "duplicate_uloc": 0,
            "percent_duplicate_uloc": 0.0,
        });
        fs::write(&path, report.to_string()).unwrap();
        path
    }

    fn settings(base_url: String, workspace: PathBuf, report: Option<PathBuf>) -> StepSettings {
        StepSettings {
            config: UploadConfig::new(base_url, "ci", "pw", "7"),
            language: Language::Java,
            workspace,
            revision_id: "Jenkins-Build-12".to_string(),
            report,
            tools: ToolPaths::default(),
        }
    }

    #[test]
    fn test_resolve_revision() {
        assert_eq!(
            resolve_revision(Some("abc1234".into()), Some(3)).unwrap(),
            "abc1234"
        );
        assert_eq!(
            resolve_revision(None, Some(3)).unwrap(),
            "Jenkins-Build-3"
        );
        assert_eq!(
            resolve_revision(Some("  ".into()), Some(4)).unwrap(),
            "Jenkins-Build-4"
        );
        assert!(resolve_revision(None, None).is_err());
    }

    #[tokio::test]
    async fn test_run_step_uploads_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = write_report(dir.path());

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/login")
            .with_status(200)
            .with_body(r#"{"token":"t0k"}"#)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/api/repositories/7/measurements/")
            .match_header("authorization", "JWT t0k")
            .match_body(Matcher::PartialJson(json!({
                "date": "2024-02-01T08:30:00Z",
                "is_core": "True",
                "propagation_cost": "18.0",
                "useful_lines_of_code": "5120",
                "duplicate_uloc": "0",
            })))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let sink = MemorySink::new();
        let settings = settings(
            format!("{}/api", server.url()),
            dir.path().to_path_buf(),
            Some(report),
        );
        run_step(settings, &sink).await.unwrap();

        post.assert_async().await;
        assert!(sink.contains("-quiet create -languages Java"));
        assert!(sink.contains("Posted measurement for Jenkins-Build-12 to CBRI"));
    }

    #[tokio::test]
    async fn test_run_step_rejects_bad_config_before_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let settings = settings(
            "https://cbri.example.org/v1".to_string(),
            dir.path().to_path_buf(),
            None,
        );

        let err = run_step(settings, &sink).await.unwrap_err();
        assert!(format!("{err:#}").contains("must end in '/api'"));
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_run_step_missing_report() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let settings = settings(
            "https://cbri.example.org/api".to_string(),
            dir.path().to_path_buf(),
            None,
        );

        let err = run_step(settings, &sink).await.unwrap_err();
        assert!(format!("{err:#}").contains("Metrics report not found"));
    }
}
