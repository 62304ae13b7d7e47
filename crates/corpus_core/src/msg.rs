#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Number of documents the run should cover.
    Sized { total: usize },
    /// A metadata page came back and its fan-out has been drained.
    PageReceived {
        page: crate::PageRequest,
        received: usize,
        skipped: usize,
    },
    /// A metadata page failed.
    PageFailed { page: crate::PageRequest },
}
