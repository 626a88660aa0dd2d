//! Paginated scraper for the PJN public judicial case portal.
//!
//! Drives a single browser session through a multi-page results table: each
//! row's detail view is opened, one [`model::CaseRecord`] is extracted and
//! appended to a sink, and the session returns to the list before the next
//! row. Traversal ends when no next-page control exists.

pub mod extract;
pub mod extractor;
pub mod model;
pub mod portal;
pub mod selectors;
pub mod session;
pub mod sink;
pub mod webdriver;

pub use extractor::{ExtractionSummary, Extractor, ExtractorOptions};
pub use model::{CaseRecord, Movement};
pub use portal::{CaseDetail, CasePortal, PortalError};
pub use session::SearchRequest;
pub use sink::{JsonlSink, MemorySink, PostgresSink, RecordSink};
pub use webdriver::WebPortal;
