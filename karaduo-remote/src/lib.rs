//! HTTP client for the stem separation and forced alignment backend.
//!
//! The backend runs both jobs as long-lived streaming requests: the client
//! uploads its input, then follows an SSE progress stream until the
//! terminal event arrives. Separation additionally downloads the produced
//! stem files afterwards.

pub mod sse;

use async_trait::async_trait;
use futures::StreamExt;
use karaduo_core::{
    Alignment, CoreError, LyricAligner, RemoteConfig, SeparatedStems, StemSeparator, TimedLine,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;
use sse::SseParser;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of retry attempts for short requests
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Connect timeout applied to every request
const CONNECT_TIMEOUT_SECS: u64 = 5;
/// Timeout for short (non-streaming) requests
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection details for the backend.
#[derive(Debug, Clone)]
pub struct BackendCredentials {
    pub server_url: String,
    pub api_key: Option<String>,
}

/// A source of backend credentials.
///
/// The client takes whatever store the host application provides: a config
/// file, a keyring, or a fixed value in tests.
pub trait CredentialStore: Send + Sync {
    /// Current credentials, or `None` when the backend is not configured.
    fn credentials(&self) -> Option<BackendCredentials>;
}

impl CredentialStore for RemoteConfig {
    fn credentials(&self) -> Option<BackendCredentials> {
        Some(BackendCredentials {
            server_url: self.backend_url.clone(),
            api_key: self.api_key.clone(),
        })
    }
}

/// Client for the separation/alignment backend.
///
/// Short requests (health check, stem downloads) go through a retrying
/// client; job submissions stream SSE progress and are never retried, since
/// re-running a half-finished inference job is worse than reporting the
/// failure.
pub struct BackendClient {
    base_url: String,
    api_key: Option<String>,
    client: ClientWithMiddleware,
    stream_client: reqwest::Client,
}

impl BackendClient {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be created.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(remote_error)?;
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        // No overall timeout: inference jobs legitimately run for minutes
        let stream_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(remote_error)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
            stream_client,
        })
    }

    /// Create a client from a credential store.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when the store has no credentials.
    pub fn from_store(store: &dyn CredentialStore) -> Result<Self, CoreError> {
        let credentials = store
            .credentials()
            .ok_or_else(|| CoreError::config("no backend credentials configured"))?;
        Self::new(credentials.server_url, credentials.api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(
        &self,
        builder: reqwest_middleware::RequestBuilder,
    ) -> reqwest_middleware::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn authorize_stream(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Health check: whether the backend reports itself ready.
    ///
    /// # Errors
    ///
    /// Returns a `RemoteService` error on transport failure.
    pub async fn check(&self) -> Result<bool, CoreError> {
        let response = self
            .authorize(self.client.get(self.url("/check")))
            .send()
            .await
            .map_err(remote_error)?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body: serde_json::Value = response.json().await.map_err(remote_error)?;
        Ok(body["status"] == "ok")
    }

    /// Download a produced file from the backend's data directory.
    async fn download(&self, filename: &str) -> Result<Vec<u8>, CoreError> {
        debug!("Downloading {filename} from backend");
        let response = self
            .authorize(self.client.get(self.url(&format!("/data/{filename}"))))
            .send()
            .await
            .map_err(remote_error)?;
        if !response.status().is_success() {
            return Err(CoreError::RemoteService {
                reason: format!("download of {filename} returned {}", response.status()),
            });
        }
        Ok(response.bytes().await.map_err(remote_error)?.to_vec())
    }

    /// Follow a job's SSE stream until `terminal` arrives, returning its
    /// payload along with any content hash the backend reported.
    async fn follow_job(
        &self,
        response: reqwest::Response,
        terminal: &str,
    ) -> Result<JobOutcome, CoreError> {
        if !response.status().is_success() {
            return Err(CoreError::RemoteService {
                reason: format!("backend returned {}", response.status()),
            });
        }

        let mut parser = SseParser::new();
        let mut reported_hash = None;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(remote_error)?;
            for event in parser.push(&chunk) {
                let data: serde_json::Value =
                    serde_json::from_str(&event.data).unwrap_or(serde_json::Value::Null);
                if let Some(hash) = data["sha256"].as_str().or_else(|| data["hash"].as_str()) {
                    reported_hash = Some(hash.to_string());
                }
                if event.event == terminal {
                    return Ok(JobOutcome {
                        payload: data,
                        reported_hash,
                    });
                }
                match event.event.as_str() {
                    "infer_queued" => info!("Backend job queued"),
                    "infer_start" => info!("Backend job started"),
                    "infer_progress" => debug!("Backend job still running"),
                    other => debug!("Backend event: {other}"),
                }
            }
        }

        Err(CoreError::RemoteService {
            reason: format!("stream ended before '{terminal}' event"),
        })
    }
}

struct JobOutcome {
    payload: serde_json::Value,
    reported_hash: Option<String>,
}

/// Lyric line in the aligner's wire format: millisecond floats, with an
/// unbounded final line sent as -1.
#[derive(Debug, Serialize)]
struct WireLyricLine {
    #[serde(rename = "startTime")]
    start_time: f64,
    #[serde(rename = "endTime")]
    end_time: f64,
    text: String,
}

impl From<&TimedLine> for WireLyricLine {
    fn from(line: &TimedLine) -> Self {
        Self {
            start_time: line.start.as_secs_f64() * 1000.0,
            end_time: line
                .end
                .map_or(-1.0, |end| end.as_secs_f64() * 1000.0),
            text: line.text.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AlignRequest {
    lyrics: Vec<WireLyricLine>,
    reference: String,
    input_hash: String,
}

#[async_trait]
impl StemSeparator for BackendClient {
    async fn separate(
        &self,
        audio: &[u8],
        content_hash: &str,
    ) -> Result<SeparatedStems, CoreError> {
        info!(
            "Submitting {} bytes for stem separation (hash {content_hash})",
            audio.len()
        );

        let part = reqwest::multipart::Part::bytes(audio.to_vec()).file_name("input.wav");
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .authorize_stream(self.stream_client.post(self.url("/separate")))
            .multipart(form)
            .send()
            .await
            .map_err(remote_error)?;

        let outcome = self.follow_job(response, "results").await?;
        if let Some(reported) = &outcome.reported_hash {
            if reported != content_hash {
                warn!("Backend reported hash {reported}, expected {content_hash}");
            }
        }

        let filenames: Vec<String> =
            serde_json::from_value(outcome.payload["filenames"].clone()).unwrap_or_default();
        let [vocals_name, instrumentals_name] = filenames.as_slice() else {
            return Err(CoreError::RemoteService {
                reason: format!(
                    "separation produced {} files, expected vocals and instrumentals",
                    filenames.len()
                ),
            });
        };

        let vocals = self.download(vocals_name).await?;
        let instrumentals = self.download(instrumentals_name).await?;
        info!(
            "Separation complete: {} vocal bytes, {} instrumental bytes",
            vocals.len(),
            instrumentals.len()
        );
        Ok(SeparatedStems {
            vocals,
            instrumentals,
            format: "wav".to_string(),
        })
    }
}

#[async_trait]
impl LyricAligner for BackendClient {
    async fn align(
        &self,
        lines: &[TimedLine],
        reference_text: &str,
        content_hash: &str,
    ) -> Result<Alignment, CoreError> {
        info!(
            "Submitting {} lyric lines for alignment (hash {content_hash})",
            lines.len()
        );

        let request = AlignRequest {
            lyrics: lines.iter().map(WireLyricLine::from).collect(),
            reference: reference_text.to_string(),
            input_hash: content_hash.to_string(),
        };
        let response = self
            .authorize_stream(self.stream_client.post(self.url("/align")))
            .json(&request)
            .send()
            .await
            .map_err(remote_error)?;

        let outcome = self.follow_job(response, "alignment").await?;
        let alignment: Alignment = serde_json::from_value(outcome.payload["alignment"].clone())
            .map_err(|e| CoreError::RemoteService {
                reason: format!("unparseable alignment payload: {e}"),
            })?;
        info!("Alignment complete: {} segments", alignment.segments.len());
        Ok(alignment)
    }
}

fn remote_error(e: impl std::fmt::Display) -> CoreError {
    CoreError::RemoteService {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = BackendClient::new("http://localhost:8000/", None).unwrap();
        assert_eq!(client.url("/check"), "http://localhost:8000/check");
    }

    #[test]
    fn test_wire_line_millisecond_conversion() {
        let line = TimedLine {
            start: StdDuration::from_millis(1500),
            end: Some(StdDuration::from_millis(2750)),
            text: "hello".to_string(),
        };
        let wire = WireLyricLine::from(&line);
        assert!((wire.start_time - 1500.0).abs() < 1e-9);
        assert!((wire.end_time - 2750.0).abs() < 1e-9);
    }

    #[test]
    fn test_wire_line_open_end_is_sentinel() {
        let line = TimedLine {
            start: StdDuration::from_secs(10),
            end: None,
            text: "last".to_string(),
        };
        let wire = WireLyricLine::from(&line);
        assert!((wire.end_time - -1.0).abs() < 1e-9);
    }

    #[test]
    fn test_align_request_field_names() {
        let request = AlignRequest {
            lyrics: vec![],
            reference: "vocals".to_string(),
            input_hash: "abc".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("lyrics").is_some());
        assert_eq!(json["reference"], "vocals");
        assert_eq!(json["input_hash"], "abc");
    }

    #[test]
    fn test_config_credential_store() {
        let config = RemoteConfig {
            backend_url: "http://backend:9000".to_string(),
            api_key: Some("secret".to_string()),
        };
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.server_url, "http://backend:9000");
        assert_eq!(credentials.api_key.as_deref(), Some("secret"));
    }
}
