//! Corpus engine: network clients, the ingestion orchestrator and persistence.
mod content;
mod credentials;
mod filename;
mod ledger;
mod normalize;
mod orchestrator;
mod persist;
mod query;
mod session;
mod types;
mod writer;

pub use content::{
    decode_payload, BlobStoreFetcher, BlobStoreSettings, ContentSource, DEFAULT_STORAGE_ENDPOINT,
};
pub use credentials::{
    provider_from_env, CredentialProvider, SharedSecret, StaticToken, SECRET_ENV, TOKEN_ENV,
};
pub use filename::document_id;
pub use ledger::{load_ledger, LedgerAppender};
pub use normalize::{count_tokens, normalize_markup};
pub use orchestrator::{DocumentStream, Orchestrator, RunRequest};
pub use persist::{prepare_data_dir, AtomicFileWriter, PersistError};
pub use query::{GraphQlClient, MetadataSource};
pub use session::TransportSession;
pub use types::{
    CredentialError, DocumentOutcome, FailureKind, FetchError, LedgerError, ProtocolError,
    ProtocolFailure, RunError,
};
pub use writer::{ingest, BatchWriter, Clock, FailedDocument, IngestSummary, WrittenDocument};
