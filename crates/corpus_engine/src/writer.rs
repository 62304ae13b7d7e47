use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use corpus_core::{AssembledDocument, FetchedContent, ProgressEntry};
use corpus_logging::{corpus_info, corpus_warn};
use futures_util::StreamExt;

use crate::filename::document_id;
use crate::ledger::LedgerAppender;
use crate::normalize::{count_tokens, normalize_markup};
use crate::orchestrator::DocumentStream;
use crate::persist::{prepare_data_dir, AtomicFileWriter};
use crate::{DocumentOutcome, FailureKind, RunError};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A document that reached disk and the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocument {
    pub doc_id: String,
    pub uri: String,
    pub path: PathBuf,
    pub tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDocument {
    pub id: String,
    pub uri: String,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub written: Vec<WrittenDocument>,
    pub failed: Vec<FailedDocument>,
    pub tokens: u64,
}

/// Persists assembled documents: normalized text (or raw bytes for binary
/// content) to `<data_dir>/<doc_id>`, then one ledger entry.
///
/// The ledger entry is appended only after the file is in place, so the
/// ledger never names a document that is not on disk. Calls are independent
/// of each other and of arrival order.
pub struct BatchWriter {
    files: AtomicFileWriter,
    ledger: LedgerAppender,
    base_name: String,
    clock: Clock,
    tokens: AtomicU64,
}

impl BatchWriter {
    pub fn new(data_dir: PathBuf, ledger: LedgerAppender, base_name: impl Into<String>) -> Result<Self, RunError> {
        prepare_data_dir(&data_dir)?;
        Ok(Self {
            files: AtomicFileWriter::new(data_dir),
            ledger,
            base_name: base_name.into(),
            clock: Arc::new(Utc::now),
            tokens: AtomicU64::new(0),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn write(&self, document: &AssembledDocument) -> Result<WrittenDocument, RunError> {
        let metadata = &document.metadata;
        let doc_id = document_id(&self.base_name, &metadata.id);

        let (path, tokens) = match &document.content {
            FetchedContent::Text(markup) => {
                let text = normalize_markup(markup);
                let tokens = count_tokens(&text);
                (self.files.write(&doc_id, text)?, Some(tokens))
            }
            FetchedContent::Binary(bytes) => (self.files.write(&doc_id, bytes)?, None),
        };

        let entry = ProgressEntry::new(&doc_id, &metadata.uri, (self.clock)());
        self.ledger.append(&entry)?;

        if let Some(tokens) = tokens {
            let total = self.tokens.fetch_add(tokens, Ordering::Relaxed) + tokens;
            corpus_info!("Collected {} which has {} tokens", doc_id, tokens);
            corpus_info!("Collected {} tokens in total", total);
        } else {
            corpus_info!("Collected {} (binary, {} bytes)", doc_id, document.content.len());
        }

        Ok(WrittenDocument {
            doc_id,
            uri: metadata.uri.clone(),
            path,
            tokens,
        })
    }

    /// Runs `write` on the blocking pool so file and ledger syncs never stall
    /// a runtime worker.
    pub async fn write_detached(
        self: &Arc<Self>,
        document: AssembledDocument,
    ) -> Result<WrittenDocument, RunError> {
        let writer = Arc::clone(self);
        tokio::task::spawn_blocking(move || writer.write(&document)).await?
    }
}

/// Drains a run into the writer.
///
/// Per-document fetch failures are collected in the summary. A fatal run
/// error, or a failure to persist, stops the drain and is returned; everything
/// written before that point stays in the ledger.
pub async fn ingest(
    mut stream: DocumentStream,
    writer: &Arc<BatchWriter>,
) -> Result<IngestSummary, RunError> {
    let mut summary = IngestSummary::default();
    while let Some(item) = stream.next().await {
        match item? {
            DocumentOutcome::Assembled(document) => {
                let written = writer.write_detached(document).await?;
                summary.tokens += written.tokens.unwrap_or(0);
                summary.written.push(written);
            }
            DocumentOutcome::Failed { metadata, error } => {
                corpus_warn!("Skipping {} ({}): {}", metadata.id, metadata.uri, error);
                summary.failed.push(FailedDocument {
                    id: metadata.id,
                    uri: metadata.uri,
                    kind: error.kind,
                });
            }
        }
    }
    corpus_info!(
        "Ingested {} documents ({} tokens), {} failed",
        summary.written.len(),
        summary.tokens,
        summary.failed.len()
    );
    Ok(summary)
}
