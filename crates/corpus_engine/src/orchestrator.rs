use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use corpus_core::{
    update, AssembledDocument, DocumentMetadata, Effect, LedgerSnapshot, Msg, PageRequest,
    RunSettings, RunState,
};
use corpus_logging::{corpus_debug, corpus_info, corpus_warn};
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::content::ContentSource;
use crate::query::MetadataSource;
use crate::{DocumentOutcome, FailureKind, FetchError, ProtocolError, ProtocolFailure, RunError};

/// What to ingest in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub document_type: String,
    /// Pre-composed filter expression, see `corpus_core::compose_filter`.
    pub filter: String,
    pub fields: String,
    /// Overrides the store's count when set.
    pub limit: Option<usize>,
}

type StreamItem = Result<DocumentOutcome, RunError>;

/// Completion-ordered output of a run.
///
/// Yields one item per fetched document in the order fetches finish. A
/// `RunError` item, if any, is the last one.
pub struct DocumentStream {
    rx: mpsc::Receiver<StreamItem>,
}

impl Stream for DocumentStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Pages document metadata and fans out content fetches.
///
/// A single producer task drives the paging state machine. Each page is
/// split into sub-groups of at most `max_concurrent_fetches` documents; a
/// sub-group's fetches run concurrently and are delivered as they complete,
/// and the next sub-group starts only once the current one is drained.
#[derive(Clone)]
pub struct Orchestrator {
    metadata: Arc<dyn MetadataSource>,
    content: Arc<dyn ContentSource>,
    settings: RunSettings,
}

enum Halt {
    /// The consumer dropped the stream.
    Detached,
    Fatal(RunError),
}

impl From<RunError> for Halt {
    fn from(err: RunError) -> Self {
        Halt::Fatal(err)
    }
}

impl Orchestrator {
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        content: Arc<dyn ContentSource>,
        settings: RunSettings,
    ) -> Self {
        Self {
            metadata,
            content,
            settings,
        }
    }

    /// Starts a run on the current tokio runtime.
    ///
    /// Documents whose uri is in `ingested`, or that an earlier page of the
    /// same run already delivered, are skipped before any content is fetched
    /// for them.
    pub fn run(&self, request: RunRequest, ingested: Arc<LedgerSnapshot>) -> DocumentStream {
        let (tx, rx) = mpsc::channel(self.settings.max_concurrent_fetches.max(1));
        let producer = self.clone();
        tokio::spawn(async move {
            match producer.drive(&request, &ingested, &tx).await {
                Ok(()) | Err(Halt::Detached) => {}
                Err(Halt::Fatal(err)) => {
                    let _ = tx.send(Err(err)).await;
                }
            }
        });
        DocumentStream { rx }
    }

    async fn drive(
        &self,
        request: &RunRequest,
        ingested: &LedgerSnapshot,
        tx: &mpsc::Sender<StreamItem>,
    ) -> Result<(), Halt> {
        self.settings.validate().map_err(RunError::from)?;

        let total = match request.limit {
            Some(limit) => limit,
            None => self
                .metadata
                .count(&request.document_type, &request.filter)
                .await
                .map_err(RunError::from)?,
        };
        let (mut state, effects) =
            update(RunState::new(self.settings.batch_size), Msg::Sized { total });
        corpus_info!(
            "Run {} (filter {:?}): {} documents, batch size {}, {} concurrent fetches",
            request.document_type,
            request.filter,
            state.total(),
            self.settings.batch_size,
            self.settings.max_concurrent_fetches
        );
        let mut pending: VecDeque<Effect> = effects.into();
        // Uris handed to fan-out during this run, kept apart from the ledger snapshot.
        let mut dispatched: HashSet<String> = HashSet::new();

        while let Some(effect) = pending.pop_front() {
            let Effect::FetchPage(page) = effect else {
                report(request, &effect);
                continue;
            };
            let msg = match self.page(request, page, ingested, &mut dispatched, tx).await {
                Ok((received, skipped)) => Msg::PageReceived {
                    page,
                    received,
                    skipped,
                },
                Err(Halt::Fatal(err)) => {
                    let (_, effects) = update(state, Msg::PageFailed { page });
                    effects.iter().for_each(|effect| report(request, effect));
                    return Err(Halt::Fatal(err));
                }
                Err(Halt::Detached) => return Err(Halt::Detached),
            };
            let (next, effects) = update(state, msg);
            state = next;
            pending.extend(effects);
        }
        Ok(())
    }

    /// Fetches one metadata page and drains its fan-out.
    /// Returns `(received, skipped)` record counts.
    async fn page(
        &self,
        request: &RunRequest,
        page: PageRequest,
        ingested: &LedgerSnapshot,
        dispatched: &mut HashSet<String>,
        tx: &mpsc::Sender<StreamItem>,
    ) -> Result<(usize, usize), Halt> {
        let records = self
            .metadata
            .fetch_page(
                &request.document_type,
                &request.filter,
                &request.fields,
                page.offset,
                page.limit,
            )
            .await
            .map_err(RunError::from)?;
        let received = records.len();

        let mut documents = Vec::with_capacity(received);
        for (idx, record) in records.into_iter().enumerate() {
            let metadata = DocumentMetadata::from_record(record).map_err(|err| {
                RunError::from(ProtocolError::new(
                    ProtocolFailure::Malformed,
                    format!("record {} of page at offset {}: {err}", idx, page.offset),
                ))
            })?;
            documents.push(metadata);
        }

        let remaining: Vec<DocumentMetadata> = documents
            .into_iter()
            .filter(|doc| !ingested.contains(&doc.uri) && dispatched.insert(doc.uri.clone()))
            .collect();
        let skipped = received - remaining.len();
        corpus_info!(
            "Collected metadata for {} {} at offset {} ({} requested, {} already ingested or seen)",
            received,
            request.document_type,
            page.offset,
            page.limit,
            skipped
        );

        self.fan_out(remaining, tx).await?;
        Ok((received, skipped))
    }

    async fn fan_out(
        &self,
        documents: Vec<DocumentMetadata>,
        tx: &mpsc::Sender<StreamItem>,
    ) -> Result<(), Halt> {
        let width = self.settings.max_concurrent_fetches.max(1);
        let mut documents = documents.into_iter().peekable();

        while documents.peek().is_some() {
            let mut in_flight: FuturesUnordered<_> = documents
                .by_ref()
                .take(width)
                .map(|metadata| self.assemble(metadata))
                .collect();
            corpus_debug!("Fetching content for {} documents", in_flight.len());

            while let Some(outcome) = in_flight.next().await {
                if tx.send(Ok(outcome)).await.is_err() {
                    return Err(Halt::Detached);
                }
            }
        }
        Ok(())
    }

    async fn assemble(&self, metadata: DocumentMetadata) -> DocumentOutcome {
        let Some(reference) = metadata.primary_content().cloned() else {
            let error = FetchError::new(
                FailureKind::MissingContentReference,
                format!("document {} has no content files", metadata.id),
            );
            return DocumentOutcome::Failed { metadata, error };
        };

        match self
            .content
            .fetch(&reference, self.settings.fetch_timeout)
            .await
        {
            Ok(content) => DocumentOutcome::Assembled(AssembledDocument { metadata, content }),
            Err(error) => {
                corpus_warn!(
                    "Content fetch for {} ({}) failed: {}",
                    metadata.id,
                    reference.name,
                    error
                );
                DocumentOutcome::Failed { metadata, error }
            }
        }
    }
}

fn report(request: &RunRequest, effect: &Effect) {
    match effect {
        Effect::FetchPage(_) => {}
        Effect::Finish(stats) => corpus_info!(
            "Run {} finished: {} pages, {} records, {} already ingested",
            request.document_type,
            stats.pages,
            stats.records,
            stats.skipped
        ),
        Effect::Abort { offset } => {
            corpus_warn!("Run {} aborted at offset {}", request.document_type, offset)
        }
    }
}
