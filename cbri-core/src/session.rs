//! Session handling against the dashboard login endpoints.
//!
//! ```text
//!   POST {base}/login          {"username": .., "password": ..}  -> {"token": ..}
//!   GET  {base}/login/{token}                                    -> {"token": ..} | 404
//! ```
//!
//! A [`SessionClient`] caches the last token it obtained and asks the server
//! whether that token is still good before every use. It never logs in when
//! the cached token checks out, and never retries a failed login.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::UploadConfig;
use crate::error::{AuthError, AuthResult, ConfigError, ConfigResult};
use crate::logging::{truncate_field, MAX_LOGGED_BODY};
use crate::security::{redact_token, SecureString};
use crate::sink::LogSink;

const LOGIN_PATH: &str = "login";
const TOKEN_FIELD: &str = "token";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Holds credentials and the cached token for one dashboard instance.
pub struct SessionClient {
    client: Client,
    base_url: Url,
    username: String,
    password: SecureString,
    token: Option<SecureString>,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl SessionClient {
    /// Create a client for the REST root `base_url` (the `.../api` URL).
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: impl Into<SecureString>,
    ) -> ConfigResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                message: "url cannot carry a path".to_string(),
            });
        }

        let client = Client::builder()
            .user_agent(concat!("cbri-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            username: username.into(),
            password: password.into(),
            token: None,
        })
    }

    /// Create a client from a validated configuration.
    pub fn from_config(config: &UploadConfig) -> ConfigResult<Self> {
        config.validate()?;
        Self::new(
            config.parsed_base_url()?,
            config.username(),
            config.password().clone(),
        )
    }

    /// Seed the cache with a token obtained elsewhere. It is still checked
    /// before use.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecureString::new(token.into()));
        self
    }

    /// The cached token, if any. It may have expired since it was obtained.
    pub fn token(&self) -> Option<&SecureString> {
        self.token.as_ref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Return a token the server currently accepts, logging in if needed.
    ///
    /// The cached token is re-checked on every call. Exactly one login request
    /// is made when there is no usable token; none when the cached one is valid.
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    pub async fn ensure_authenticated(&mut self, sink: &dyn LogSink) -> AuthResult<SecureString> {
        let valid = match &self.token {
            Some(token) => match self.check_valid(token.expose()).await {
                Ok(valid) => valid,
                Err(e) => {
                    sink.line(&e.to_string());
                    return Err(e);
                }
            },
            None => false,
        };
        sink.line(&format!("Check CBRI logged in: {valid}"));

        if valid {
            if let Some(token) = &self.token {
                debug!("Reusing cached session token");
                return Ok(token.clone());
            }
        }

        match self.login(sink).await {
            Ok(token) => {
                sink.line("Logged into CBRI");
                info!(token = %redact_token(token.expose()), "Logged into CBRI");
                self.token = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                sink.line(&e.to_string());
                warn!(error = %e, "Login failed");
                Err(e)
            }
        }
    }

    /// Ask the server whether `token` is still valid.
    ///
    /// A 404 means the server does not know the token and is not an error.
    /// Any other refusal counts as invalid. Failing to send the request or to
    /// read the whole response body is an [`AuthError::Network`].
    #[instrument(skip_all)]
    pub async fn check_valid(&self, token: &str) -> AuthResult<bool> {
        let url = join_segments(&self.base_url, &[LOGIN_PATH, token]);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Session token not recognized");
            return Ok(false);
        }
        if !status.is_success() {
            debug!(status = status.as_u16(), "Session check refused");
            return Ok(false);
        }

        let body = response.text().await.map_err(|e| AuthError::Network {
            message: e.to_string(),
        })?;
        let echoed = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get(TOKEN_FIELD).and_then(Value::as_str).map(str::to_owned));

        Ok(echoed.as_deref() == Some(token))
    }

    async fn login(&self, sink: &dyn LogSink) -> AuthResult<SecureString> {
        let url = join_segments(&self.base_url, &[LOGIN_PATH]);
        sink.line("Attempting to log into CBRI");
        sink.line(url.as_str());

        let body = LoginRequest {
            username: &self.username,
            password: self.password.expose(),
        };

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AuthError::Network {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| AuthError::Malformed {
            message: format!("{e}: {}", truncate_field(&text, MAX_LOGGED_BODY)),
        })?;

        value
            .get(TOKEN_FIELD)
            .and_then(Value::as_str)
            .map(SecureString::new)
            .ok_or(AuthError::MissingToken)
    }
}

/// Append path segments to `base`, percent-encoding each one.
///
/// A trailing empty segment yields a trailing slash.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
