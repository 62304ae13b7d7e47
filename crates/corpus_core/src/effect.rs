#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchPage(crate::PageRequest),
    Finish(crate::RunStats),
    Abort { offset: usize },
}
