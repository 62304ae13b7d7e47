use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use corpus_core::{compose_filter, RunSettings, DEFAULT_FIELDS};
use corpus_engine::DEFAULT_STORAGE_ENDPOINT;
use serde::{Deserialize, Serialize};

pub const BUCKET_ENV: &str = "GCLOUD_STORAGE_BUCKET_PRIVATE_NAME";
pub const STORAGE_TOKEN_ENV: &str = "GCLOUD_STORAGE_TOKEN";

/// Contents of the RON run configuration. Secrets come from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// GraphQL endpoint of the metadata store.
    pub endpoint: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub run: RunSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            bucket: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub document_type: String,
    /// Filter clauses, joined with `, `.
    pub filters: Vec<String>,
    pub uids: Vec<String>,
    pub fields: String,
    pub limit: Option<usize>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            document_type: "verdict".to_string(),
            filters: Vec::new(),
            uids: Vec::new(),
            fields: DEFAULT_FIELDS.to_string(),
            limit: None,
        }
    }
}

impl QueryConfig {
    pub fn filter(&self) -> String {
        compose_filter(&self.uids, &self.filters)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    /// Prefix of every document id.
    pub base_name: String,
    pub ledger_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            base_name: "corpus".to_string(),
            ledger_file: "data.jsonl".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }
}

impl CollectorConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.run.validate()?;
        Ok(config)
    }
}

/// Blob store location and access, environment taking precedence over the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccess {
    pub endpoint: String,
    pub bucket: String,
    pub token: Option<String>,
}

impl StorageConfig {
    pub fn resolve<F>(&self, lookup: F) -> anyhow::Result<StorageAccess>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup(BUCKET_ENV)
            .filter(|b| !b.is_empty())
            .or_else(|| self.bucket.clone())
            .ok_or_else(|| anyhow!("required env var {BUCKET_ENV} not set and no bucket configured"))?;
        Ok(StorageAccess {
            endpoint: self.endpoint.clone(),
            bucket,
            token: lookup(STORAGE_TOKEN_ENV).filter(|t| !t.is_empty()),
        })
    }
}
