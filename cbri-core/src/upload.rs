use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{error, info, instrument};
use url::Url;

use crate::config::UploadConfig;
use crate::error::{ConfigResult, UploadError, UploadResult};
use crate::logging::{truncate_field, MAX_LOGGED_BODY};
use crate::metrics::MetricsRecord;
use crate::session::{join_segments, SessionClient};
use crate::sink::LogSink;

const REPOSITORIES_PATH: &str = "repositories";
const MEASUREMENTS_PATH: &str = "measurements";
const TREE_MAP_PARAM: &str = "include_tree_map";

/// Posts measurements for one dashboard repository.
#[derive(Debug)]
pub struct UploadClient {
    session: SessionClient,
    repo_id: String,
    include_tree_map: bool,
}

impl UploadClient {
    pub fn new(session: SessionClient, repo_id: impl Into<String>) -> Self {
        Self {
            session,
            repo_id: repo_id.into(),
            include_tree_map: false,
        }
    }

    /// Build the session and upload clients from a configuration.
    pub fn from_config(config: &UploadConfig) -> ConfigResult<Self> {
        let session = SessionClient::from_config(config)?;
        Ok(Self::new(session, config.repo_id()).with_include_tree_map(config.include_tree_map()))
    }

    /// Request the tree-map view for every measurement posted by this client.
    pub fn with_include_tree_map(mut self, include: bool) -> Self {
        self.include_tree_map = include;
        self
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// `{base}/repositories/{repo_id}/measurements/`, with the tree-map query
    /// when requested.
    pub fn measurement_url(&self, include_tree_map: bool) -> Url {
        let mut url = join_segments(
            self.session.base_url(),
            &[REPOSITORIES_PATH, self.repo_id.as_str(), MEASUREMENTS_PATH, ""],
        );
        if include_tree_map {
            url.query_pairs_mut().append_pair(TREE_MAP_PARAM, "True");
        }
        url
    }

    /// Authenticate and post `record` as one measurement.
    ///
    /// Nothing is posted if no valid token can be obtained. A 4xx response is
    /// returned as [`UploadError::BadRequest`] with the response body.
    #[instrument(skip_all, fields(repo_id = %self.repo_id, revision = %record.revision_id()))]
    pub async fn post_action(
        &mut self,
        record: MetricsRecord,
        sink: &dyn LogSink,
    ) -> UploadResult<()> {
        let token = self
            .session
            .ensure_authenticated(sink)
            .await
            .map_err(UploadError::AuthFailed)?;

        let url = self.measurement_url(self.include_tree_map || record.include_tree_map());
        let body = serde_json::to_vec(&record.to_payload()).map_err(|e| UploadError::Transport {
            message: format!("Failed to serialize measurement: {e}"),
        })?;

        sink.line(&format!("Attempting to post to CBRI: {url}"));

        let response = self
            .session
            .http()
            .post(url)
            .header(AUTHORIZATION, format!("JWT {}", token.expose()))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                sink.line(&format!("Failed to reach CBRI: {e}"));
                UploadError::Transport {
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if status.is_success() {
            sink.line(&format!(
                "Posted measurement for {} to CBRI",
                record.revision_id()
            ));
            info!(status = status.as_u16(), "Measurement accepted");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        sink.line(&format!("CBRI responded {status}"));
        sink.line(&text);
        error!(
            status = status.as_u16(),
            body = %truncate_field(&text, MAX_LOGGED_BODY),
            "Measurement rejected"
        );

        if status.is_client_error() {
            Err(UploadError::BadRequest {
                status: status.as_u16(),
                body: text,
            })
        } else {
            Err(UploadError::Transport {
                message: format!("Server returned {status}: {text}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> UploadClient {
        let base = Url::parse(base).unwrap();
        UploadClient::new(SessionClient::new(base, "u", "p").unwrap(), "42")
    }

    #[test]
    fn test_measurement_url() {
        let client = client("https://cbri.example.org/api");
        assert_eq!(
            client.measurement_url(false).as_str(),
            "https://cbri.example.org/api/repositories/42/measurements/"
        );
        assert_eq!(
            client.measurement_url(true).as_str(),
            "https://cbri.example.org/api/repositories/42/measurements/?include_tree_map=True"
        );
    }

    #[test]
    fn test_from_config_carries_repo_and_tree_map() {
        let config = UploadConfig::new("https://cbri.example.org/api/", "u", "p", "my repo")
            .with_include_tree_map(true);
        let client = UploadClient::from_config(&config).unwrap();

        assert_eq!(client.repo_id(), "my repo");
        assert!(client.include_tree_map);
        assert_eq!(
            client.measurement_url(false).as_str(),
            "https://cbri.example.org/api/repositories/my%20repo/measurements/"
        );
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = UploadConfig::new("https://cbri.example.org/api", "u", "p", "");
        assert!(UploadClient::from_config(&config).is_err());
    }
}
