use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Sizing and concurrency knobs for one ingestion run.
///
/// `connection_limit` bounds in-flight network requests on the shared
/// transport session (metadata pages plus the two requests of every content
/// fetch). `max_concurrent_fetches` bounds how many documents are being
/// fetched at once. The two are independent and must stay that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub batch_size: usize,
    pub connection_limit: usize,
    pub max_concurrent_fetches: usize,
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,
    pub max_content_bytes: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            connection_limit: 110,
            max_concurrent_fetches: 300,
            fetch_timeout: Duration::from_secs(1000),
            max_content_bytes: 64 * 1024 * 1024,
        }
    }
}

impl RunSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 {
            return Err(SettingsError::Zero("batch_size"));
        }
        if self.connection_limit == 0 {
            return Err(SettingsError::Zero("connection_limit"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(SettingsError::Zero("max_concurrent_fetches"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(SettingsError::Zero("fetch_timeout"));
        }
        if self.max_content_bytes == 0 {
            return Err(SettingsError::Zero("max_content_bytes"));
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
