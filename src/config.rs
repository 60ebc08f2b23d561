//! Runtime configuration
//!
//! Everything has a default; a YAML file overrides any subset. Frameworks
//! missing from the file's `sources` keep their default source.

use crate::adapter::{SourceSpec, DEFAULT_PAGE_LIMIT};
use crate::graph::Framework;
use crate::ingest::{RetryPolicy, SourceBinding, DEFAULT_BATCH_SIZE};
use crate::resolve::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ATTACK_BUNDLE_URL: &str =
    "https://raw.githubusercontent.com/mitre/cti/master/enterprise-attack/enterprise-attack.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("source for {framework}: {reason}")]
    InvalidSource {
        framework: Framework,
        reason: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Where to fetch one framework from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Label recorded in every citation from this source
    pub document_id: String,
}

impl SourceConfig {
    pub fn file(path: impl Into<PathBuf>, document_id: impl Into<String>) -> Self {
        Self {
            file: Some(path.into()),
            url: None,
            document_id: document_id.into(),
        }
    }

    pub fn url(url: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            file: None,
            url: Some(url.into()),
            document_id: document_id.into(),
        }
    }

    pub fn binding(&self, framework: Framework) -> Result<SourceBinding, ConfigError> {
        let spec = match (&self.file, &self.url) {
            (Some(path), None) => SourceSpec::File(path.clone()),
            (None, Some(url)) => SourceSpec::Url(url.clone()),
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidSource {
                    framework,
                    reason: "set either file or url, not both",
                })
            }
            (None, None) => {
                return Err(ConfigError::InvalidSource {
                    framework,
                    reason: "needs a file or a url",
                })
            }
        };
        if self.document_id.trim().is_empty() {
            return Err(ConfigError::InvalidSource {
                framework,
                reason: "document_id is empty",
            });
        }
        Ok(SourceBinding::new(spec, self.document_id.trim()))
    }
}

/// Default source per framework: the ATT&CK bundle over HTTP, the
/// published PDFs under `documents/`.
pub fn default_source(framework: Framework) -> SourceConfig {
    match framework {
        Framework::ThreatModel => SourceConfig::url(ATTACK_BUNDLE_URL, "enterprise-attack"),
        Framework::ControlsCatalog => {
            SourceConfig::file("documents/nist-sp-800-53r5.pdf", "nist-sp-800-53r5")
        }
        Framework::RiskFunctions => SourceConfig::file("documents/nist-csf-2.0.pdf", "nist-csf-2.0"),
        Framework::HealthPrivacy => {
            SourceConfig::file("documents/hipaa-security-rule.pdf", "hipaa-security-rule")
        }
        Framework::FinancialExam => {
            SourceConfig::file("documents/ffiec-it-handbook.pdf", "ffiec-it-handbook")
        }
        Framework::PaymentSecurity => SourceConfig::file("documents/pci-dss-v4.pdf", "pci-dss-v4"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::exponential();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            multiplier: policy.multiplier,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file; `None` = the user data directory
    pub database: Option<PathBuf>,
    pub batch_size: usize,
    /// Bounds fetch and parse of each run
    pub fetch_timeout_secs: Option<u64>,
    /// Pages read from each document; `None` reads them all
    pub max_pages: Option<usize>,
    pub retry: RetryConfig,
    pub resolver: ResolverConfig,
    pub sources: BTreeMap<Framework, SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_timeout_secs: Some(300),
            max_pages: Some(DEFAULT_PAGE_LIMIT),
            retry: RetryConfig::default(),
            resolver: ResolverConfig::default(),
            sources: Framework::ALL
                .iter()
                .map(|f| (*f, default_source(*f)))
                .collect(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(text)?;
        for framework in Framework::ALL {
            config
                .sources
                .entry(framework)
                .or_insert_with(|| default_source(framework));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.max_pages == Some(0) {
            return Err(ConfigError::Invalid("max_pages must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid("retry.multiplier must be >= 1.0".into()));
        }
        if !(0.0..=1.0).contains(&self.resolver.threshold) {
            return Err(ConfigError::Invalid(format!(
                "resolver.threshold {} outside [0, 1]",
                self.resolver.threshold
            )));
        }
        for (framework, source) in &self.sources {
            source.binding(*framework)?;
        }
        Ok(())
    }

    /// The database path, falling back to `<data dir>/cyberweave/cyberweave.db`.
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_db_path)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn bindings(&self) -> Result<Vec<(Framework, SourceBinding)>, ConfigError> {
        self.sources
            .iter()
            .map(|(framework, source)| Ok((*framework, source.binding(*framework)?)))
            .collect()
    }
}

pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("cyberweave").join("cyberweave.db")
}
