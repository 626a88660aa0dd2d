//! Paginated record extractor.
//!
//! Walks a server-rendered, paginated results table inside a live browser
//! session: for every row, opens the detail view, extracts one record,
//! appends it to the sink and returns to the list, then advances to the next
//! page until no next-page control exists.
//!
//! Row- and navigation-level failures are absorbed into the summary and
//! traversal continues; only session loss is fatal. Already-persisted
//! records are never rolled back.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::extract::build_record;
use crate::portal::{CasePortal, PortalError};
use crate::sink::RecordSink;

// ============================================================================
// Summary
// ============================================================================

/// Explicit accumulator for one traversal. Replaces any notion of shared
/// mutable counters: every step reports into this value and the caller gets
/// it back whole.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    /// List pages visited (at least 1 for any run that saw a table).
    pub pages: usize,
    /// Records persisted to the sink, partial ones included.
    pub extracted: usize,
    /// Subset of `extracted` that was missing one or more fields.
    pub partial: usize,
    /// Rows skipped because no view control could be located.
    pub skipped: usize,
    /// Row- or navigation-level errors absorbed during the walk.
    pub errors: usize,
    /// Pages abandoned after all return-to-list strategies failed.
    pub pages_abandoned: usize,
    /// True when the run was cut short by session loss.
    pub fatal: bool,
}

impl ExtractionSummary {
    pub fn log(&self) {
        info!("=== Extraction Summary ===");
        info!("Pages visited:   {}", self.pages);
        info!("Records:         {} ({} partial)", self.extracted, self.partial);
        info!("Rows skipped:    {}", self.skipped);
        info!("Errors absorbed: {}", self.errors);
        if self.pages_abandoned > 0 {
            info!("Pages abandoned: {}", self.pages_abandoned);
        }
        if self.fatal {
            error!("Run terminated by session loss; persisted records remain valid");
        }
    }
}

// ============================================================================
// Return-to-List Strategies
// ============================================================================

/// Ordered fallback for getting from a detail view back to the list. Each
/// strategy is attempted in declaration order until the table marker
/// reappears; exhausting all three abandons the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStrategy {
    BackControl,
    HistoryBack,
    ReloadList,
}

pub const RETURN_STRATEGIES: [ReturnStrategy; 3] = [
    ReturnStrategy::BackControl,
    ReturnStrategy::HistoryBack,
    ReturnStrategy::ReloadList,
];

// ============================================================================
// Extractor
// ============================================================================

#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Settle delay after advancing to the next page.
    pub page_delay: Duration,
    /// Hard cap on list pages, `None` to walk until the control disappears.
    pub max_pages: Option<usize>,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_secs(2),
            max_pages: None,
        }
    }
}

/// What a row left behind for the rest of the page.
enum RowFlow {
    Continue,
    AbandonPage,
}

pub struct Extractor<'a, P, S> {
    portal: &'a P,
    sink: &'a mut S,
    options: ExtractorOptions,
}

impl<'a, P: CasePortal, S: RecordSink> Extractor<'a, P, S> {
    pub fn new(portal: &'a P, sink: &'a mut S, options: ExtractorOptions) -> Self {
        Self {
            portal,
            sink,
            options,
        }
    }

    /// Executes the full traversal. Requires the session collaborator to
    /// have left the browser on page 1 of results ("session ready").
    ///
    /// Never returns an error: non-fatal failures are counted and logged
    /// with row/page context, and session loss sets the summary's `fatal`
    /// flag instead of propagating.
    pub async fn run(mut self) -> ExtractionSummary {
        let mut summary = ExtractionSummary::default();

        loop {
            match self.walk_page(&mut summary).await {
                Ok(()) => {}
                Err(e) => {
                    error!(page = summary.pages + 1, "fatal: {e}");
                    summary.fatal = true;
                    return summary;
                }
            }
            summary.pages += 1;

            if let Some(max) = self.options.max_pages {
                if summary.pages >= max {
                    info!("page cap of {max} reached, stopping");
                    return summary;
                }
            }

            match self.portal.advance_page().await {
                Ok(true) => {
                    debug!("advanced to page {}", summary.pages + 1);
                    tokio::time::sleep(self.options.page_delay).await;
                }
                Ok(false) => {
                    info!("no next-page control, traversal complete");
                    return summary;
                }
                Err(e) if e.is_fatal() => {
                    error!("fatal while advancing page: {e}");
                    summary.fatal = true;
                    return summary;
                }
                Err(e) => {
                    // A broken pager is indistinguishable from the last page.
                    warn!("next-page control unusable ({e}), stopping");
                    return summary;
                }
            }
        }
    }

    /// Processes every row of the current page. `Err` only on session loss.
    async fn walk_page(&mut self, summary: &mut ExtractionSummary) -> Result<(), PortalError> {
        let page = summary.pages + 1;

        if let Err(e) = self.portal.await_list().await {
            if e.is_fatal() {
                return Err(e);
            }
            // Table never showed up: abandon this page, let the next-page
            // step decide whether the run is over.
            warn!(page, "list table did not appear: {e}");
            summary.errors += 1;
            summary.pages_abandoned += 1;
            return Ok(());
        }

        let n = match self.portal.row_count().await {
            Ok(n) => n,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(page, "could not count rows: {e}");
                summary.errors += 1;
                summary.pages_abandoned += 1;
                return Ok(());
            }
        };
        debug!(page, rows = n, "processing page");

        for index in 0..n {
            match self.process_row(page, index, summary).await? {
                RowFlow::Continue => {}
                RowFlow::AbandonPage => {
                    warn!(page, row = index, "abandoning remainder of page");
                    summary.pages_abandoned += 1;
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// One row: open, read, persist, return to list. The row handle is
    /// re-acquired by index inside the portal on every call; nothing from a
    /// previous iteration survives a detail-view round trip.
    async fn process_row(
        &mut self,
        page: usize,
        index: usize,
        summary: &mut ExtractionSummary,
    ) -> Result<RowFlow, PortalError> {
        match self.portal.open_row(index).await {
            Ok(()) => {}
            Err(PortalError::MissingViewControl { .. }) => {
                warn!(page, row = index, "no view control, skipping row");
                summary.skipped += 1;
                return Ok(RowFlow::Continue);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                // We may have half-navigated; make sure we are on the list
                // before touching the next row.
                warn!(page, row = index, "could not open row: {e}");
                summary.errors += 1;
                return self.return_to_list(summary).await;
            }
        }

        match self.portal.read_detail().await {
            Ok(detail) => {
                let record = build_record(detail);
                match self.sink.append(&record).await {
                    Ok(()) => {
                        summary.extracted += 1;
                        // Counted only once the record is actually persisted,
                        // so `partial` stays a subset of `extracted`.
                        if record.partial {
                            summary.partial += 1;
                        }
                        debug!(page, row = index, case = %record.case_number, "persisted");
                    }
                    Err(e) => {
                        error!(page, row = index, "sink append failed: {e}");
                        summary.errors += 1;
                    }
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(page, row = index, "detail extraction failed: {e}");
                summary.errors += 1;
            }
        }

        self.return_to_list(summary).await
    }

    /// Three-tier navigation back to the list view: back control, browser
    /// history, full reload of the last known list URL. Success means the
    /// table marker reappeared within the bounded wait.
    async fn return_to_list(
        &mut self,
        summary: &mut ExtractionSummary,
    ) -> Result<RowFlow, PortalError> {
        for strategy in RETURN_STRATEGIES {
            let nav = match strategy {
                ReturnStrategy::BackControl => self.portal.close_detail().await,
                ReturnStrategy::HistoryBack => self.portal.history_back().await,
                ReturnStrategy::ReloadList => self.portal.reload_list().await,
            };
            match nav {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("return strategy {strategy:?} failed: {e}");
                    summary.errors += 1;
                    continue;
                }
            }
            match self.portal.await_list().await {
                Ok(()) => return Ok(RowFlow::Continue),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("list not back after {strategy:?}: {e}");
                    summary.errors += 1;
                }
            }
        }

        Ok(RowFlow::AbandonPage)
    }
}
