use std::time::Duration;

use camino::Utf8Path;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::HipsError;
use crate::store::write_bytes_atomic;

/// What the survey answered for a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpReply {
    Body(Vec<u8>),
    NotFound,
    Status(u16),
}

/// Network boundary to the tile server. `Err` is reserved for transport
/// failures (connection, timeout, body read).
pub trait TileSource: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, HipsError>;
}

#[derive(Clone)]
pub struct HipsHttpClient {
    client: Client,
}

impl HipsHttpClient {
    pub fn new() -> Result<Self, HipsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("hips-provision/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HipsError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| HipsError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

impl TileSource for HipsHttpClient {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, HipsError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|err| HipsError::Http(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(HttpReply::NotFound);
        }
        if !status.is_success() {
            return Ok(HttpReply::Status(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .map_err(|err| HipsError::Http(err.to_string()))?;
        Ok(HttpReply::Body(bytes.to_vec()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    Fetched { bytes: u64 },
    AlreadyPresent,
    /// The survey has no data for this cell.
    NotFound,
    TransientFailure { reason: String },
}

impl FetchOutcome {
    /// Whether the tile exists locally after the fetch.
    pub fn is_stored(&self) -> bool {
        matches!(self, FetchOutcome::Fetched { .. } | FetchOutcome::AlreadyPresent)
    }
}

/// Idempotent single-tile retrieval.
pub struct FetchEngine<'a, S: TileSource + ?Sized> {
    source: &'a S,
    timeout: Duration,
}

impl<'a, S: TileSource + ?Sized> FetchEngine<'a, S> {
    pub fn new(source: &'a S, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Fetch `url` into `destination` unless it is already there.
    ///
    /// Never fails: transport errors, unexpected statuses and local write
    /// errors all come back as [`FetchOutcome::TransientFailure`]. The
    /// destination only appears once the whole body has been received.
    pub fn fetch(&self, url: &str, destination: &Utf8Path) -> FetchOutcome {
        if destination.as_std_path().exists() {
            return FetchOutcome::AlreadyPresent;
        }
        match self.source.get(url, self.timeout) {
            Ok(HttpReply::Body(body)) => match write_bytes_atomic(destination, &body) {
                Ok(()) => FetchOutcome::Fetched {
                    bytes: body.len() as u64,
                },
                Err(err) => {
                    warn!(%destination, error = %err, "failed to store tile");
                    FetchOutcome::TransientFailure {
                        reason: err.to_string(),
                    }
                }
            },
            Ok(HttpReply::NotFound) => {
                debug!(url, "no tile at this cell");
                FetchOutcome::NotFound
            }
            Ok(HttpReply::Status(status)) => {
                warn!(url, status, "tile request failed");
                FetchOutcome::TransientFailure {
                    reason: format!("status {status}"),
                }
            }
            Err(err) => {
                warn!(url, error = %err, "tile request failed");
                FetchOutcome::TransientFailure {
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use camino::Utf8PathBuf;

    use super::*;

    struct Scripted {
        reply: Result<HttpReply, String>,
        calls: Mutex<usize>,
    }

    impl TileSource for Scripted {
        fn get(&self, _url: &str, _timeout: Duration) -> Result<HttpReply, HipsError> {
            *self.calls.lock().unwrap() += 1;
            self.reply.clone().map_err(HipsError::Http)
        }
    }

    fn scripted(reply: Result<HttpReply, String>) -> Scripted {
        Scripted {
            reply,
            calls: Mutex::new(0),
        }
    }

    #[test]
    fn unexpected_status_leaves_no_file() {
        let temp = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(temp.path().join("Order0/Dir0/Index1.jpg")).unwrap();
        let source = scripted(Ok(HttpReply::Status(503)));
        let outcome = FetchEngine::new(&source, Duration::from_secs(1)).fetch("u", &dest);
        assert_eq!(
            outcome,
            FetchOutcome::TransientFailure {
                reason: "status 503".to_string()
            }
        );
        assert!(!dest.as_std_path().exists());
    }

    #[test]
    fn transport_error_is_transient() {
        let temp = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(temp.path().join("tile.jpg")).unwrap();
        let source = scripted(Err("timed out".to_string()));
        let outcome = FetchEngine::new(&source, Duration::from_secs(1)).fetch("u", &dest);
        assert!(!outcome.is_stored());
        assert!(matches!(outcome, FetchOutcome::TransientFailure { .. }));
    }
}
