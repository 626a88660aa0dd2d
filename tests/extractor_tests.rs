//! Traversal tests against a scripted portal: no browser involved, the fake
//! models the list/detail state machine and the failure modes the live site
//! exhibits.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use expedientes::{
    CaseDetail, CasePortal, CaseRecord, ExtractionSummary, Extractor, ExtractorOptions,
    MemorySink, PortalError, RecordSink,
};

// ============================================================================
// Scripted Portal
// ============================================================================

#[derive(Clone)]
struct FakeRow {
    view_control: bool,
    /// When false, the detail view opens but its fields never load.
    detail_readable: bool,
    detail: CaseDetail,
}

fn detail(case_number: &str) -> CaseDetail {
    CaseDetail {
        case_number: Some(case_number.to_string()),
        jurisdiction: Some("CAMARA COMERCIAL".to_string()),
        department: Some("JUZGADO COMERCIAL 1".to_string()),
        status: Some("EN TRAMITE".to_string()),
        caption: Some(format!("{case_number} c/ DEMANDADO s/ ORDINARIO")),
        movements: vec![(
            "Fecha: 01/02/2024".to_string(),
            "DESPACHO".to_string(),
            "Agreguese".to_string(),
        )],
        parties: vec![
            ("ACTOR".to_string(), "PEREZ JUAN".to_string()),
            ("DEMANDADO".to_string(), "GOMEZ SA".to_string()),
        ],
    }
}

fn row(case_number: &str) -> FakeRow {
    FakeRow {
        view_control: true,
        detail_readable: true,
        detail: detail(case_number),
    }
}

/// Delegates to a [`MemorySink`] but rejects configured case numbers, the
/// way a full disk or a dropped database connection would.
struct RejectingSink {
    inner: MemorySink,
    reject: Vec<String>,
}

impl RejectingSink {
    fn rejecting(case_numbers: &[&str]) -> Self {
        Self {
            inner: MemorySink::new(),
            reject: case_numbers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl RecordSink for RejectingSink {
    async fn append(&mut self, record: &CaseRecord) -> anyhow::Result<()> {
        if self.reject.contains(&record.case_number) {
            anyhow::bail!("no space left on device");
        }
        self.inner.append(record).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum View {
    List,
    Detail(usize),
}

struct FakeState {
    page: usize,
    view: View,
    rows_opened: usize,
    nav_log: Vec<&'static str>,
}

struct FakePortal {
    pages: Vec<Vec<FakeRow>>,
    back_control_works: bool,
    history_back_works: bool,
    reload_works: bool,
    /// Injects session loss on the (n+1)-th row open.
    fail_open_after: Option<usize>,
    state: Mutex<FakeState>,
}

impl FakePortal {
    fn new(pages: Vec<Vec<FakeRow>>) -> Self {
        Self {
            pages,
            back_control_works: true,
            history_back_works: true,
            reload_works: true,
            fail_open_after: None,
            state: Mutex::new(FakeState {
                page: 0,
                view: View::List,
                rows_opened: 0,
                nav_log: Vec::new(),
            }),
        }
    }

    fn without_back_control(mut self) -> Self {
        self.back_control_works = false;
        self
    }

    fn without_history_back(mut self) -> Self {
        self.history_back_works = false;
        self
    }

    fn without_reload(mut self) -> Self {
        self.reload_works = false;
        self
    }

    fn losing_session_after(mut self, opens: usize) -> Self {
        self.fail_open_after = Some(opens);
        self
    }

    fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.page = 0;
        state.view = View::List;
        state.rows_opened = 0;
        state.nav_log.clear();
    }

    fn nav_log(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().nav_log.clone()
    }

    fn timeout(what: &'static str) -> PortalError {
        PortalError::WaitTimeout {
            what,
            timeout: Duration::from_millis(10),
        }
    }
}

#[async_trait]
impl CasePortal for FakePortal {
    async fn await_list(&self) -> Result<(), PortalError> {
        let state = self.state.lock().unwrap();
        match state.view {
            View::List => Ok(()),
            View::Detail(_) => Err(Self::timeout("results table")),
        }
    }

    async fn row_count(&self) -> Result<usize, PortalError> {
        let state = self.state.lock().unwrap();
        Ok(self.pages[state.page].len())
    }

    async fn open_row(&self, index: usize) -> Result<(), PortalError> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = self.fail_open_after {
            if state.rows_opened >= limit {
                return Err(PortalError::SessionLost("browser gone".to_string()));
            }
        }
        let row = self.pages[state.page]
            .get(index)
            .ok_or(PortalError::RowGone { index })?;
        if !row.view_control {
            return Err(PortalError::MissingViewControl { index });
        }
        state.view = View::Detail(index);
        state.rows_opened += 1;
        Ok(())
    }

    async fn read_detail(&self) -> Result<CaseDetail, PortalError> {
        let state = self.state.lock().unwrap();
        match state.view {
            View::Detail(index) => {
                let row = &self.pages[state.page][index];
                if !row.detail_readable {
                    return Err(Self::timeout("detail fields"));
                }
                Ok(row.detail.clone())
            }
            View::List => Err(Self::timeout("detail view")),
        }
    }

    async fn close_detail(&self) -> Result<(), PortalError> {
        let mut state = self.state.lock().unwrap();
        state.nav_log.push("back");
        if self.back_control_works {
            state.view = View::List;
            Ok(())
        } else {
            Err(PortalError::Navigation("back control missing".to_string()))
        }
    }

    async fn history_back(&self) -> Result<(), PortalError> {
        let mut state = self.state.lock().unwrap();
        state.nav_log.push("history");
        if self.history_back_works {
            state.view = View::List;
            Ok(())
        } else {
            Err(PortalError::Navigation("history back failed".to_string()))
        }
    }

    async fn reload_list(&self) -> Result<(), PortalError> {
        let mut state = self.state.lock().unwrap();
        state.nav_log.push("reload");
        if self.reload_works {
            state.view = View::List;
            Ok(())
        } else {
            Err(PortalError::Navigation("reload failed".to_string()))
        }
    }

    async fn advance_page(&self) -> Result<bool, PortalError> {
        let mut state = self.state.lock().unwrap();
        if state.view != View::List {
            return Err(PortalError::Navigation("not on list view".to_string()));
        }
        if state.page + 1 < self.pages.len() {
            state.page += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn two_by_three() -> Vec<Vec<FakeRow>> {
    vec![
        vec![row("COM 1/2024"), row("COM 2/2024"), row("COM 3/2024")],
        vec![row("COM 4/2024"), row("COM 5/2024"), row("COM 6/2024")],
    ]
}

fn options() -> ExtractorOptions {
    ExtractorOptions {
        page_delay: Duration::ZERO,
        max_pages: None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn full_grid_extracts_every_row() {
    let portal = FakePortal::new(two_by_three());
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    assert_eq!(
        summary,
        ExtractionSummary {
            pages: 2,
            extracted: 6,
            partial: 0,
            skipped: 0,
            errors: 0,
            pages_abandoned: 0,
            fatal: false,
        }
    );

    let numbers: Vec<&str> = sink
        .records()
        .iter()
        .map(|r| r.case_number.as_str())
        .collect();
    assert_eq!(
        numbers,
        vec![
            "COM 1/2024",
            "COM 2/2024",
            "COM 3/2024",
            "COM 4/2024",
            "COM 5/2024",
            "COM 6/2024"
        ]
    );

    // Field normalization made it through the pipeline.
    let first = &sink.records()[0];
    assert_eq!(
        first.movements[0].date,
        chrono::NaiveDate::from_ymd_opt(2024, 2, 1)
    );
    assert_eq!(first.actors, vec!["PEREZ JUAN"]);
    assert_eq!(first.defendants, vec!["GOMEZ SA"]);
    assert!(!first.partial);
}

#[tokio::test]
async fn row_without_view_control_is_skipped() {
    let mut pages = two_by_three();
    pages[0][1].view_control = false;
    let portal = FakePortal::new(pages);
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    assert_eq!(summary.extracted, 5);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 0);
    assert!(!summary.fatal);

    // Rows after the skip were still processed.
    assert!(sink
        .records()
        .iter()
        .all(|r| r.case_number != "COM 2/2024"));
    assert!(sink
        .records()
        .iter()
        .any(|r| r.case_number == "COM 6/2024"));
}

#[tokio::test]
async fn missing_field_yields_partial_record() {
    let mut pages = vec![vec![row("COM 1/2024"), row("COM 2/2024")]];
    pages[0][1].detail.status = None;
    let portal = FakePortal::new(pages);
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    // A missing field is an empty value, not a skip.
    assert_eq!(summary.extracted, 2);
    assert_eq!(summary.partial, 1);
    assert_eq!(summary.skipped, 0);

    let second = &sink.records()[1];
    assert_eq!(second.status, "");
    assert!(second.partial);
}

#[tokio::test]
async fn detail_read_failure_counts_error_and_returns_to_list() {
    let mut pages = vec![vec![row("COM 1/2024"), row("COM 2/2024")]];
    pages[0][0].detail_readable = false;
    let portal = FakePortal::new(pages);
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    // The unreadable row is an absorbed error, not a skip and not a record.
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.fatal);

    let numbers: Vec<&str> = sink
        .records()
        .iter()
        .map(|r| r.case_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["COM 2/2024"]);

    // The detail view was still closed before touching the next row.
    assert_eq!(portal.nav_log(), vec!["back", "back"]);
}

#[tokio::test]
async fn sink_failure_counts_error_and_traversal_continues() {
    let portal = FakePortal::new(two_by_three());
    let mut sink = RejectingSink::rejecting(&["COM 2/2024"]);

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    assert_eq!(summary.extracted, 5);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.fatal);

    // Rows after the rejected one were still walked and persisted.
    assert_eq!(sink.inner.len(), 5);
    assert!(sink
        .inner
        .records()
        .iter()
        .any(|r| r.case_number == "COM 6/2024"));
}

#[tokio::test]
async fn rejected_partial_record_counts_as_neither() {
    let mut pages = vec![vec![row("COM 1/2024")]];
    pages[0][0].detail.status = None;
    let portal = FakePortal::new(pages);
    let mut sink = RejectingSink::rejecting(&["COM 1/2024"]);

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    // `partial` counts persisted records only; a record the sink refused is
    // neither extracted nor partial.
    assert_eq!(summary.extracted, 0);
    assert_eq!(summary.partial, 0);
    assert_eq!(summary.errors, 1);
}

#[tokio::test]
async fn broken_back_control_falls_back_to_history() {
    let portal = FakePortal::new(two_by_three()).without_back_control();
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    assert_eq!(summary.extracted, 6);
    assert!(!summary.fatal);
    assert_eq!(summary.pages_abandoned, 0);

    // Back control is attempted first, history back second, reload never.
    let log = portal.nav_log();
    assert_eq!(&log[..2], &["back", "history"]);
    assert!(!log.contains(&"reload"));
}

#[tokio::test]
async fn exhausted_return_strategies_abandon_the_page() {
    let pages = vec![vec![row("COM 1/2024"), row("COM 2/2024"), row("COM 3/2024")]];
    let portal = FakePortal::new(pages)
        .without_back_control()
        .without_history_back()
        .without_reload();
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    // Row 0 was persisted before the return failed; the rest of the page is
    // abandoned but the run stays non-fatal.
    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.pages_abandoned, 1);
    assert!(!summary.fatal);
    assert_eq!(sink.len(), 1);
    assert_eq!(portal.nav_log(), vec!["back", "history", "reload"]);
}

#[tokio::test]
async fn no_next_page_terminates_cleanly() {
    let pages = vec![vec![row("COM 1/2024")]];
    let portal = FakePortal::new(pages);
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    assert!(!summary.fatal);
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.extracted, 1);
}

#[tokio::test]
async fn page_cap_stops_the_walk() {
    let portal = FakePortal::new(two_by_three());
    let mut sink = MemorySink::new();
    let options = ExtractorOptions {
        page_delay: Duration::ZERO,
        max_pages: Some(1),
    };

    let summary = Extractor::new(&portal, &mut sink, options).run().await;

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.extracted, 3);
}

#[tokio::test]
async fn session_loss_is_fatal_but_keeps_persisted_records() {
    let portal = FakePortal::new(two_by_three()).losing_session_after(4);
    let mut sink = MemorySink::new();

    let summary = Extractor::new(&portal, &mut sink, options()).run().await;

    assert!(summary.fatal);
    assert_eq!(summary.extracted, 4);
    // Nothing already persisted is rolled back.
    assert_eq!(sink.len(), 4);
    assert_eq!(sink.records()[3].case_number, "COM 4/2024");
}

#[tokio::test]
async fn deduplicating_sink_makes_reruns_idempotent() {
    let portal = FakePortal::new(two_by_three());
    let mut sink = MemorySink::deduplicating();

    let first = Extractor::new(&portal, &mut sink, options()).run().await;
    assert_eq!(first.extracted, 6);
    assert_eq!(sink.len(), 6);

    portal.reset();
    let second = Extractor::new(&portal, &mut sink, options()).run().await;
    assert_eq!(second.extracted, 6);
    // The second walk over an unchanged page set added nothing.
    assert_eq!(sink.len(), 6);
}
