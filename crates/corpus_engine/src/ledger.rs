use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use corpus_core::{LedgerSnapshot, ProgressEntry};
use corpus_logging::{corpus_debug, corpus_info};

use crate::LedgerError;

/// Reads the ledger at `path` once. A missing file is an empty ledger; a
/// malformed line fails the load.
pub fn load_ledger(path: &Path) -> Result<LedgerSnapshot, LedgerError> {
    let contents = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            corpus_info!("No progress ledger at {:?}; starting from scratch", path);
            return Ok(LedgerSnapshot::empty());
        }
        Err(err) => return Err(LedgerError::Io(err)),
    };
    let snapshot = LedgerSnapshot::parse(&contents)?;
    corpus_info!(
        "Loaded {} already ingested uris from {:?}",
        snapshot.len(),
        path
    );
    Ok(snapshot)
}

/// Append-only writer for the progress ledger.
///
/// Each entry goes out as a single `write_all` of one complete line while the
/// file lock is held, so concurrent appenders never interleave partial lines.
#[derive(Debug)]
pub struct LedgerAppender {
    path: PathBuf,
    file: Mutex<File>,
}

impl LedgerAppender {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn append(&self, entry: &ProgressEntry) -> Result<(), LedgerError> {
        let line = entry.to_line()?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| LedgerError::Io(io::Error::other("ledger lock poisoned")))?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        corpus_debug!("{:?} += {} {}", self.path, entry.doc_id, entry.uri);
        Ok(())
    }
}
