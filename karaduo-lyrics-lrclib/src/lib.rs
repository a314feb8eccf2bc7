use async_trait::async_trait;
use karaduo_core::{parse_lrc, CoreError, LyricsSource, TimedLine, TrackQuery};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const LRCLIB_API_URL: &str = "https://lrclib.net/api";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Duration tolerance for search matching (±2 seconds)
const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// Calculate a score for duration matching (lower is better).
/// Returns 0 for exact matches, higher values for larger differences.
/// Capped at `i32::MAX` to prevent overflow.
fn duration_score(actual: Option<f64>, expected: Option<Duration>, scale: f64) -> i32 {
    match (actual, expected) {
        (Some(d), Some(q)) => {
            let diff = (d - q.as_secs_f64()).abs() * scale;
            // Clamp to i32::MAX and safely convert
            #[allow(clippy::cast_possible_truncation)]
            if diff > f64::from(i32::MAX) {
                i32::MAX
            } else {
                diff as i32
            }
        }
        _ => 50, // Default score when duration is unknown
    }
}

/// LRCLIB.net lyrics source
pub struct LrclibSource {
    client: ClientWithMiddleware,
}

impl LrclibSource {
    /// Create a new LRCLIB source with default 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(user_agent: &str) -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| transport_error(&e))?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, CoreError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        debug!("LRCLIB response status: {}", response.status());

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CoreError::LyricsSourceFailed {
                source_name: "lrclib".to_string(),
                reason: format!("LRCLIB returned status: {}", response.status()),
            });
        }
        let parsed = response.json().await.map_err(|e| transport_error(&e))?;
        Ok(Some(parsed))
    }

    /// Search by track name only and match duration within ±2 seconds
    async fn search_by_track_name(&self, query: &TrackQuery) -> Result<Vec<TimedLine>, CoreError> {
        let url = format!(
            "{}/search?track_name={}",
            LRCLIB_API_URL,
            urlencoding::encode(&query.title)
        );
        info!("LRCLIB GET (search by track): {}", url);

        let Some(results) = self.get_json::<Vec<LrclibResponse>>(&url).await? else {
            return self.search_fallback(query).await;
        };
        if results.is_empty() {
            info!("LRCLIB search by track name returned no results, trying full search");
            return self.search_fallback(query).await;
        }

        // Filter by duration (±2 seconds) if we have a query duration
        let filtered: Vec<_> = if let Some(query_duration) = query.duration {
            let query_secs = query_duration.as_secs_f64();
            results
                .into_iter()
                .filter(|r| {
                    r.duration
                        .is_some_and(|d| (d - query_secs).abs() <= DURATION_TOLERANCE_SECS)
                })
                .collect()
        } else {
            results
        };

        let best = best_match(filtered, query.duration, 10.0);
        match best {
            Some(result) => {
                info!(
                    "LRCLIB found match by track name + duration (id: {}, artist: {})",
                    result.id, result.artist_name
                );
                parse_result(result, query)
            }
            None => {
                info!("LRCLIB search by track name: no usable lyrics, trying full search");
                self.search_fallback(query).await
            }
        }
    }

    async fn search_fallback(&self, query: &TrackQuery) -> Result<Vec<TimedLine>, CoreError> {
        let search_query = format!("{} {}", query.artist, query.title);
        let url = format!(
            "{}/search?q={}",
            LRCLIB_API_URL,
            urlencoding::encode(&search_query)
        );
        info!("LRCLIB GET (full search): {}", url);

        let results = self
            .get_json::<Vec<LrclibResponse>>(&url)
            .await?
            .unwrap_or_default();

        match best_match(results, query.duration, 1.0) {
            Some(result) => {
                info!(
                    "LRCLIB found match via full search (id: {}, artist: {})",
                    result.id, result.artist_name
                );
                parse_result(result, query)
            }
            None => Err(not_found(query)),
        }
    }
}

/// Response from LRCLIB API
/// Note: API returns additional fields (trackName, albumName) that we don't
/// use; serde ignores unknown fields by default.
#[derive(Debug, Deserialize)]
struct LrclibResponse {
    id: i64,
    #[serde(rename = "artistName")]
    artist_name: String,
    duration: Option<f64>,
    instrumental: bool,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
}

#[async_trait]
impl LyricsSource for LrclibSource {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    async fn fetch(&self, query: &TrackQuery) -> Result<Vec<TimedLine>, CoreError> {
        info!(
            "Fetching lyrics from LRCLIB for: {} - {} (duration: {:?})",
            query.artist, query.title, query.duration
        );

        // Try the /get endpoint first for an exact match
        let mut url = format!(
            "{}/get?artist_name={}&track_name={}",
            LRCLIB_API_URL,
            urlencoding::encode(&query.artist),
            urlencoding::encode(&query.title)
        );
        if let Some(ref album) = query.album {
            use std::fmt::Write;
            let _ = write!(url, "&album_name={}", urlencoding::encode(album));
        }
        if let Some(duration) = query.duration {
            use std::fmt::Write;
            let _ = write!(url, "&duration={}", duration.as_secs());
        }
        info!("LRCLIB GET (exact match): {}", url);

        match self.get_json::<LrclibResponse>(&url).await? {
            Some(result) => {
                info!("LRCLIB found exact match with id: {}", result.id);
                parse_result(result, query)
            }
            None => {
                info!("LRCLIB exact match not found, trying search by track name only");
                self.search_by_track_name(query).await
            }
        }
    }
}

/// Pick the best candidate: prefer synced lyrics, then closest duration.
fn best_match(
    results: Vec<LrclibResponse>,
    query_duration: Option<Duration>,
    scale: f64,
) -> Option<LrclibResponse> {
    results
        .into_iter()
        .filter(|r| r.synced_lyrics.is_some() && !r.instrumental)
        .min_by_key(|r| duration_score(r.duration, query_duration, scale))
}

fn parse_result(result: LrclibResponse, query: &TrackQuery) -> Result<Vec<TimedLine>, CoreError> {
    if result.instrumental {
        debug!("Track is instrumental (lrclib id: {})", result.id);
        return Err(not_found(query));
    }

    let Some(synced) = result.synced_lyrics else {
        return Err(not_found(query));
    };
    let lines = parse_lrc(&synced);
    if lines.is_empty() {
        warn!(
            "LRCLIB synced lyrics were unparseable (lrclib id: {})",
            result.id
        );
        return Err(not_found(query));
    }
    debug!(
        "Got synced lyrics with {} lines (lrclib id: {})",
        lines.len(),
        result.id
    );
    Ok(lines)
}

fn not_found(query: &TrackQuery) -> CoreError {
    CoreError::LyricsNotFound {
        track: query.title.clone(),
        artist: query.artist.clone(),
    }
}

fn transport_error(e: &dyn std::fmt::Display) -> CoreError {
    CoreError::LyricsSourceFailed {
        source_name: "lrclib".to_string(),
        reason: e.to_string(),
    }
}
