//! The seam between the traversal algorithm and the live browser session.
//!
//! Everything the extractor needs from the site is expressed here as a small
//! trait so the traversal logic can be exercised against a scripted portal in
//! tests. The production implementation lives in [`crate::webdriver`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PortalError {
    /// A bounded wait for a DOM marker expired. Transient; handled by the
    /// per-step policy (skip the row, or abandon the page for table-level
    /// failures).
    #[error("timed out after {timeout:?} waiting for {what}")]
    WaitTimeout { what: &'static str, timeout: Duration },

    /// The row exists but carries no "view" control. Always a skip.
    #[error("row {index} has no view control")]
    MissingViewControl { index: usize },

    /// The row index no longer resolves; the table re-rendered underneath us.
    #[error("row {index} is no longer present in the table")]
    RowGone { index: usize },

    /// A navigation step (back control, history back, reload) failed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The browser session itself is gone. The only fatal condition.
    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl PortalError {
    /// Only session loss terminates the run; everything else is absorbed
    /// with row/page context and traversal continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PortalError::SessionLost(_))
    }
}

// ============================================================================
// Raw Detail Capture
// ============================================================================

/// Raw field capture from a detail view, before normalization.
///
/// Missing fields are `None`, never an error: a detail page missing an
/// expected field still counts as extracted, just marked partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseDetail {
    pub case_number: Option<String>,
    pub jurisdiction: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub caption: Option<String>,
    /// (date, kind, detail) cells in table order.
    pub movements: Vec<(String, String, String)>,
    /// (role, name) rows from the participants table.
    pub parties: Vec<(String, String)>,
}

// ============================================================================
// Portal Trait
// ============================================================================

/// Operations the extractor performs against the results site.
///
/// All methods are strictly sequential over a single browser session; no
/// concurrent page interaction is safe because the site's state is tied to
/// one server-side session. Element handles never cross a call boundary —
/// implementations resolve rows by index, freshly, on every call.
#[async_trait]
pub trait CasePortal {
    /// Blocks (bounded) until the list-view table marker is present.
    async fn await_list(&self) -> Result<(), PortalError>;

    /// Number of data rows in the current list page (header excluded).
    async fn row_count(&self) -> Result<usize, PortalError>;

    /// Re-locates row `index`, finds its view control and activates it,
    /// then waits (bounded) for the detail view's root marker.
    async fn open_row(&self, index: usize) -> Result<(), PortalError>;

    /// Reads all detail-view fields for the currently open case.
    async fn read_detail(&self) -> Result<CaseDetail, PortalError>;

    /// Activates the detail view's "back" control.
    async fn close_detail(&self) -> Result<(), PortalError>;

    /// Browser history back; first fallback when the back control fails.
    async fn history_back(&self) -> Result<(), PortalError>;

    /// Full reload of the last known list URL; last-resort fallback.
    async fn reload_list(&self) -> Result<(), PortalError>;

    /// Activates the "next page" control if present, visible and enabled.
    /// Returns `false` when there is no further page.
    async fn advance_page(&self) -> Result<bool, PortalError>;
}
