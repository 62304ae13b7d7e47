//! Corpus core: pure domain types and the paging state machine.
mod effect;
mod filter;
mod ledger;
mod model;
mod msg;
mod settings;
mod state;
mod update;

pub use effect::Effect;
pub use filter::compose_filter;
pub use ledger::{LedgerCorruption, LedgerSnapshot, ProgressEntry};
pub use model::{
    AssembledDocument, ContentKind, ContentReference, DocumentMetadata, FetchedContent, Record,
    UniqueIdentifier, DEFAULT_FIELDS,
};
pub use msg::Msg;
pub use settings::{RunSettings, SettingsError};
pub use state::{PageRequest, RunPhase, RunState, RunStats};
pub use update::update;
