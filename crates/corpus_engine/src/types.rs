use std::fmt;
use std::io;

use corpus_core::{AssembledDocument, DocumentMetadata, LedgerCorruption, SettingsError};
use thiserror::Error;

use crate::persist::PersistError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolFailure {
    Transport,
    Timeout,
    HttpStatus(u16),
    /// The store answered with a GraphQL `errors` array.
    Remote,
    Malformed,
}

impl fmt::Display for ProtocolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFailure::Transport => write!(f, "transport error"),
            ProtocolFailure::Timeout => write!(f, "timeout"),
            ProtocolFailure::HttpStatus(code) => write!(f, "http status {code}"),
            ProtocolFailure::Remote => write!(f, "query rejected by store"),
            ProtocolFailure::Malformed => write!(f, "malformed response"),
        }
    }
}

/// Failed metadata query. Fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProtocolError {
    pub kind: ProtocolFailure,
    pub message: String,
}

impl ProtocolError {
    pub fn new(kind: ProtocolFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Failed content fetch for a single document. Never fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Transport,
    HttpStatus(u16),
    UnsupportedContentKind { content_kind: String },
    InvalidUtf8,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    MissingContentReference,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Transport => write!(f, "transport error"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::UnsupportedContentKind { content_kind } => {
                write!(f, "unsupported content kind {content_kind}")
            }
            FailureKind::InvalidUtf8 => write!(f, "text payload is not utf-8"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "payload too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::MissingContentReference => write!(f, "no content file attached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("environment variable {0} is not set; export it before running")]
    Missing(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Corruption(#[from] LedgerCorruption),
    #[error("ledger io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode ledger entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("metadata query failed: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("credentials unavailable: {0}")]
    Credential(#[from] CredentialError),
    #[error("progress ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("persist: {0}")]
    Persist(#[from] PersistError),
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("document writer task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

/// One item of the orchestrator's output.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Assembled(AssembledDocument),
    Failed {
        metadata: DocumentMetadata,
        error: FetchError,
    },
}

impl DocumentOutcome {
    pub fn metadata(&self) -> &DocumentMetadata {
        match self {
            DocumentOutcome::Assembled(doc) => &doc.metadata,
            DocumentOutcome::Failed { metadata, .. } => metadata,
        }
    }
}
