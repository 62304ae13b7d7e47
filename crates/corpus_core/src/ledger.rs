use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One line of the progress ledger, written once a document is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub doc_id: String,
    pub uri: String,
    pub date_built: String,
}

impl ProgressEntry {
    pub fn new(doc_id: impl Into<String>, uri: impl Into<String>, built: DateTime<Utc>) -> Self {
        Self {
            doc_id: doc_id.into(),
            uri: uri.into(),
            date_built: built.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    /// Serializes the entry as one complete ledger line, newline included.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ledger line {line} is malformed: {message}")]
pub struct LedgerCorruption {
    pub line: usize,
    pub message: String,
}

// Older ledgers carry timestamps in assorted formats; only the uri matters for
// resuming.
#[derive(Deserialize)]
struct LedgerLine {
    uri: String,
}

/// Immutable set of source URIs ingested by earlier runs.
///
/// Loaded once before a run starts and never merged with the entries the
/// current run appends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    uris: HashSet<String>,
}

impl LedgerSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses ledger contents. Blank lines are skipped; anything else that is
    /// not a JSON object with a string `uri` fails the whole parse.
    pub fn parse(contents: &str) -> Result<Self, LedgerCorruption> {
        let mut uris = HashSet::new();
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let parsed: LedgerLine =
                serde_json::from_str(line).map_err(|err| LedgerCorruption {
                    line: idx + 1,
                    message: err.to_string(),
                })?;
            uris.insert(parsed.uri);
        }
        Ok(Self { uris })
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.uris.contains(uri)
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    /// Remaining work set: discovered URIs not yet ingested, first occurrence
    /// order kept, duplicates dropped.
    pub fn remaining<'a, I>(&self, discovered: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        discovered
            .into_iter()
            .filter(|uri| !self.contains(uri) && seen.insert(*uri))
            .collect()
    }
}

impl FromIterator<String> for LedgerSnapshot {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            uris: iter.into_iter().collect(),
        }
    }
}
