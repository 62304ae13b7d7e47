use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("data directory {path} unusable: {reason}")]
    DataDir { path: PathBuf, reason: String },
    #[error("document write failed: {0}")]
    Io(#[from] io::Error),
}

impl PersistError {
    fn data_dir(path: &Path, reason: impl ToString) -> Self {
        PersistError::DataDir {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Creates the data directory if needed and probes that it accepts files.
pub fn prepare_data_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(PersistError::data_dir(dir, "not a directory")),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| PersistError::data_dir(dir, err))?;
        }
        Err(err) => return Err(PersistError::data_dir(dir, err)),
    }
    NamedTempFile::new_in(dir).map_err(|err| PersistError::data_dir(dir, err))?;
    Ok(())
}

/// Places document files in one directory via temp file plus rename, so a
/// reader never observes a half-written document.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, doc_id: &str, payload: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(payload.as_ref())?;
        staged.as_file().sync_all()?;
        // A re-run of a document replaces the earlier file.
        let target = self.dir.join(doc_id);
        staged.persist(&target).map_err(|err| err.error)?;
        Ok(target)
    }
}
