#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Waiting for the number of documents to fetch.
    Sizing,
    /// One metadata page is outstanding.
    Paging,
    /// Every page was fetched or the store ran dry.
    Finished,
    /// A metadata page failed; nothing further is requested.
    Aborted,
}

/// One metadata page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub pages: usize,
    pub records: usize,
    pub skipped: usize,
}

/// Paging state of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    phase: RunPhase,
    batch_size: usize,
    total: usize,
    in_flight: Option<PageRequest>,
    stats: RunStats,
}

impl RunState {
    /// A zero batch size is treated as one so paging always advances.
    pub fn new(batch_size: usize) -> Self {
        Self {
            phase: RunPhase::Sizing,
            batch_size: batch_size.max(1),
            total: 0,
            in_flight: None,
            stats: RunStats::default(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn in_flight(&self) -> Option<PageRequest> {
        self.in_flight
    }

    pub(crate) fn start_paging(&mut self, total: usize) -> Option<PageRequest> {
        self.total = total;
        self.request_page(0)
    }

    pub(crate) fn record_page(
        &mut self,
        page: PageRequest,
        received: usize,
        skipped: usize,
    ) -> Option<PageRequest> {
        self.stats.pages += 1;
        self.stats.records += received;
        self.stats.skipped += skipped;
        if received < page.limit {
            return self.finish();
        }
        self.request_page(page.offset + page.limit)
    }

    pub(crate) fn abort(&mut self) {
        self.in_flight = None;
        self.phase = RunPhase::Aborted;
    }

    fn request_page(&mut self, offset: usize) -> Option<PageRequest> {
        if offset >= self.total {
            return self.finish();
        }
        let page = PageRequest {
            offset,
            limit: self.batch_size.min(self.total - offset),
        };
        self.in_flight = Some(page);
        self.phase = RunPhase::Paging;
        Some(page)
    }

    fn finish(&mut self) -> Option<PageRequest> {
        self.in_flight = None;
        self.phase = RunPhase::Finished;
        None
    }
}
