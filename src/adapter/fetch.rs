//! Raw fetchers: byte-level access to framework sources
//!
//! Fetchers never transform content. A fetch failure is fatal to the run
//! that requested it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Where a framework's raw source lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceSpec {
    /// Local document bytes
    File(PathBuf),
    /// Remote bundle over HTTP(S)
    Url(String),
    /// Named in-memory blob served by a `StaticFetcher`
    Memory(String),
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Url(url) => f.write_str(url),
            Self::Memory(name) => write!(f, "memory:{}", name),
        }
    }
}

/// Bytes of one fetched source plus where they came from.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub origin: String,
    pub bytes: Vec<u8>,
}

impl RawSource {
    pub fn new(origin: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            origin: origin.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("no source registered for {0}")]
    NotFound(String),

    #[error("{0} is not supported by this fetcher")]
    Unsupported(String),
}

/// Retrieves raw bytes for a source.
#[async_trait]
pub trait RawFetcher: Send + Sync {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSource, FetchError>;
}

/// Reads local files.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

#[async_trait]
impl RawFetcher for FileFetcher {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSource, FetchError> {
        let SourceSpec::File(path) = spec else {
            return Err(FetchError::Unsupported(spec.to_string()));
        };
        let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "read source file");
        Ok(RawSource::new(spec.to_string(), bytes))
    }
}

/// Downloads remote bundles.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// A fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RawFetcher for HttpFetcher {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSource, FetchError> {
        let SourceSpec::Url(url) = spec else {
            return Err(FetchError::Unsupported(spec.to_string()));
        };
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        debug!(%url, bytes = bytes.len(), "downloaded source");
        Ok(RawSource::new(url.clone(), bytes.to_vec()))
    }
}

/// Serves fixed bytes, keyed by source spec.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    sources: HashMap<SourceSpec, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, spec: SourceSpec, bytes: impl Into<Vec<u8>>) -> Self {
        self.sources.insert(spec, bytes.into());
        self
    }

    /// Shorthand for an in-memory blob addressed as `SourceSpec::Memory(name)`.
    pub fn with_memory(self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.with(SourceSpec::Memory(name.into()), bytes)
    }
}

#[async_trait]
impl RawFetcher for StaticFetcher {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSource, FetchError> {
        self.sources
            .get(spec)
            .map(|bytes| RawSource::new(spec.to_string(), bytes.clone()))
            .ok_or_else(|| FetchError::NotFound(spec.to_string()))
    }
}

/// Dispatches on the spec variant: files, URLs, then in-memory blobs.
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    files: FileFetcher,
    http: HttpFetcher,
    memory: StaticFetcher,
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http(mut self, http: HttpFetcher) -> Self {
        self.http = http;
        self
    }

    pub fn with_memory(mut self, memory: StaticFetcher) -> Self {
        self.memory = memory;
        self
    }
}

#[async_trait]
impl RawFetcher for SourceFetcher {
    async fn fetch(&self, spec: &SourceSpec) -> Result<RawSource, FetchError> {
        match spec {
            SourceSpec::File(_) => self.files.fetch(spec).await,
            SourceSpec::Url(_) => self.http.fetch(spec).await,
            SourceSpec::Memory(_) => self.memory.fetch(spec).await,
        }
    }
}
