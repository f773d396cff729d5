use std::{collections::HashMap, io::Read as _, sync::Arc};

use async_trait::async_trait;

use crate::error::{ReplayError, ReplayResult};

/// Read-only asset source a dataset is loaded from.
///
/// Implementations must not block the scheduling thread: blocking transports
/// go through `tokio::task::spawn_blocking` (see [`HttpAssetSource`]).
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch a required asset. Any failure, including a missing asset, is a
    /// [`ReplayError::DataUnavailable`].
    async fn fetch(&self, path: &str) -> ReplayResult<Vec<u8>>;

    /// Fetch an optional asset. A missing asset (HTTP 404 or equivalent)
    /// resolves to `Ok(None)`; transport failures still error.
    async fn fetch_optional(&self, path: &str) -> ReplayResult<Option<Vec<u8>>>;
}

/// HTTP asset source for a dataset server, e.g. a static file server rooted
/// at `http://localhost:8080/pandaset_0`.
pub struct HttpAssetSource {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpAssetSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: ureq::agent(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get(&self, url: String, missing_ok: bool) -> ReplayResult<Option<Vec<u8>>> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || match agent.get(&url).call() {
            Ok(response) => {
                let mut body = Vec::new();
                response
                    .into_reader()
                    .read_to_end(&mut body)
                    .map_err(|e| {
                        ReplayError::data_unavailable(format!("reading GET {url}: {e}"))
                    })?;
                Ok(Some(body))
            }
            Err(ureq::Error::Status(404, _)) if missing_ok => Ok(None),
            Err(e) => Err(ReplayError::data_unavailable(format!("GET {url}: {e}"))),
        })
        .await
        .map_err(|e| ReplayError::data_unavailable(format!("fetch task aborted: {e}")))?
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, path: &str) -> ReplayResult<Vec<u8>> {
        let url = self.url_for(path);
        self.get(url.clone(), false).await?.ok_or_else(|| {
            ReplayError::data_unavailable(format!("GET {url}: empty response"))
        })
    }

    async fn fetch_optional(&self, path: &str) -> ReplayResult<Option<Vec<u8>>> {
        self.get(self.url_for(path), true).await
    }
}

/// In-memory asset source for tests and pre-baked fixtures. Paths map 1:1 to
/// the keys inserted; anything not inserted behaves as a 404.
#[derive(Clone, Default)]
pub struct MemorySource {
    entries: Arc<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new(entries: HashMap<String, Vec<u8>>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn builder() -> MemorySourceBuilder {
        MemorySourceBuilder::default()
    }
}

#[derive(Default)]
pub struct MemorySourceBuilder {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySourceBuilder {
    pub fn bytes(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.entries.insert(path.into(), bytes);
        self
    }

    pub fn json(self, path: impl Into<String>, value: &impl serde::Serialize) -> Self {
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        self.bytes(path, bytes)
    }

    pub fn build(self) -> MemorySource {
        MemorySource::new(self.entries)
    }
}

#[async_trait]
impl AssetSource for MemorySource {
    async fn fetch(&self, path: &str) -> ReplayResult<Vec<u8>> {
        self.entries
            .get(path)
            .cloned()
            .ok_or_else(|| ReplayError::data_unavailable(format!("no such asset: {path}")))
    }

    async fn fetch_optional(&self, path: &str) -> ReplayResult<Option<Vec<u8>>> {
        Ok(self.entries.get(path).cloned())
    }
}
