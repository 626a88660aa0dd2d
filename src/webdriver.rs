//! Live-browser implementation of [`CasePortal`] over a WebDriver session
//! (chromedriver via thirtyfour).
//!
//! The results table is re-rendered server-side on every navigation, so no
//! element handle is held across calls: rows are re-resolved by index with a
//! fresh `find_all` each time they are touched.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver, WebElement};
use tokio::time::Instant;
use tracing::debug;

use crate::portal::{CaseDetail, CasePortal, PortalError};
use crate::selectors;

/// Poll interval for bounded DOM waits.
const POLL: Duration = Duration::from_millis(250);

// ============================================================================
// Error Classification
// ============================================================================

/// Element-level failures are transient and handled by per-step policy;
/// anything else means the session or the driver connection is gone.
fn is_transient(err: &WebDriverError) -> bool {
    matches!(
        err,
        WebDriverError::NoSuchElement(_)
            | WebDriverError::StaleElementReference(_)
            | WebDriverError::ElementNotInteractable(_)
            | WebDriverError::ElementClickIntercepted(_)
    )
}

fn session_lost(err: WebDriverError) -> PortalError {
    PortalError::SessionLost(err.to_string())
}

// ============================================================================
// WebPortal
// ============================================================================

pub struct WebPortal {
    pub(crate) driver: WebDriver,
    wait_timeout: Duration,
    /// Last URL at which the list table was observed; target of the
    /// reload-list fallback.
    list_url: Mutex<Option<String>>,
}

impl WebPortal {
    /// Connects to a running WebDriver server and opens a fresh browser
    /// session with the container-safe Chrome flags the portal needs.
    pub async fn connect(
        server_url: &str,
        headless: bool,
        wait_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        if headless {
            caps.add_arg("--headless=new")?;
        }

        let driver = WebDriver::new(server_url, caps).await?;
        Ok(Self {
            driver,
            wait_timeout,
            list_url: Mutex::new(None),
        })
    }

    /// Releases the browser session. Must run on every exit path, fatal
    /// errors included.
    pub async fn quit(self) -> anyhow::Result<()> {
        self.driver.quit().await?;
        Ok(())
    }

    /// Bounded-timeout blocking wait for an element to be present. A wait
    /// that expires is reported as `WaitTimeout` and handled by the caller's
    /// step policy.
    pub(crate) async fn wait_for(
        &self,
        by: By,
        what: &'static str,
    ) -> Result<WebElement, PortalError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            match self.driver.find(by.clone()).await {
                Ok(element) => return Ok(element),
                Err(e) if is_transient(&e) => {}
                Err(e) => return Err(session_lost(e)),
            }
            if Instant::now() >= deadline {
                return Err(PortalError::WaitTimeout {
                    what,
                    timeout: self.wait_timeout,
                });
            }
            tokio::time::sleep(POLL).await;
        }
    }

    /// Immediate single-element text lookup; `None` when the element is not
    /// there (missing detail fields are tolerated, not errors).
    async fn text_of(&self, by: By) -> Result<Option<String>, PortalError> {
        match self.driver.find(by).await {
            Ok(element) => match element.text().await {
                Ok(text) => Ok(Some(text.trim().to_string())),
                Err(e) if is_transient(&e) => Ok(None),
                Err(e) => Err(session_lost(e)),
            },
            Err(e) if is_transient(&e) => Ok(None),
            Err(e) => Err(session_lost(e)),
        }
    }

    /// Fresh resolution of the list table's data rows (header dropped).
    async fn list_rows(&self) -> Result<Vec<WebElement>, PortalError> {
        let table = self
            .wait_for(By::ClassName(selectors::LIST_TABLE), "results table")
            .await?;
        let mut rows = table
            .find_all(By::Tag("tr"))
            .await
            .map_err(session_lost)?;
        if rows.is_empty() {
            return Ok(rows);
        }
        rows.remove(0); // header
        Ok(rows)
    }

    /// Movement table rows, columns (date, kind, detail). The table renders
    /// after the detail root marker, so it gets its own bounded wait; a
    /// table that never appears is read as empty, like one with no rows.
    async fn read_movements(&self) -> Result<Vec<(String, String, String)>, PortalError> {
        match self
            .wait_for(By::Css(selectors::MOVEMENT_TABLE_CSS), "movement table")
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => return Ok(Vec::new()),
        }

        let rows = self
            .driver
            .find_all(By::Css(selectors::MOVEMENT_ROWS_CSS))
            .await
            .map_err(session_lost)?;

        let mut movements = Vec::new();
        for row in rows.iter().skip(1) {
            let cells = row.find_all(By::Tag("td")).await.map_err(session_lost)?;
            if cells.len() < 5 {
                continue;
            }
            let date = cells[2].text().await.map_err(session_lost)?;
            let kind = cells[3].text().await.map_err(session_lost)?;
            let detail = cells[4].text().await.map_err(session_lost)?;
            movements.push((date, kind, detail));
        }
        Ok(movements)
    }

    /// Switches to the participants tab and reads (role, name) rows. A
    /// missing tab or table leaves the party sets empty.
    async fn read_parties(&self) -> Result<Vec<(String, String)>, PortalError> {
        let tab = match self
            .wait_for(By::XPath(selectors::PARTIES_TAB_XPATH), "participants tab")
            .await
        {
            Ok(tab) => tab,
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => return Ok(Vec::new()),
        };
        match tab.click().await {
            Ok(()) => {}
            Err(e) if is_transient(&e) => return Ok(Vec::new()),
            Err(e) => return Err(session_lost(e)),
        }
        match self
            .wait_for(By::Css(selectors::PARTIES_TABLE_CSS), "participants table")
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => return Ok(Vec::new()),
        }

        let rows = self
            .driver
            .find_all(By::Css(selectors::PARTY_ROWS_CSS))
            .await
            .map_err(session_lost)?;

        let mut parties = Vec::new();
        for row in rows {
            let cells = row.find_all(By::Tag("td")).await.map_err(session_lost)?;
            if cells.len() < 2 {
                continue;
            }
            let role = cells[0].text().await.map_err(session_lost)?;
            let name = cells[1].text().await.map_err(session_lost)?;
            parties.push((role, name));
        }
        Ok(parties)
    }
}

#[async_trait]
impl CasePortal for WebPortal {
    async fn await_list(&self) -> Result<(), PortalError> {
        self.wait_for(By::ClassName(selectors::LIST_TABLE), "results table")
            .await?;
        if let Ok(url) = self.driver.current_url().await {
            *self.list_url.lock().unwrap() = Some(url.to_string());
        }
        Ok(())
    }

    async fn row_count(&self) -> Result<usize, PortalError> {
        Ok(self.list_rows().await?.len())
    }

    async fn open_row(&self, index: usize) -> Result<(), PortalError> {
        let rows = self.list_rows().await?;
        let row = rows
            .into_iter()
            .nth(index)
            .ok_or(PortalError::RowGone { index })?;

        let control = match row.find(By::ClassName(selectors::VIEW_CONTROL)).await {
            Ok(control) => control,
            Err(e) if is_transient(&e) => {
                return Err(PortalError::MissingViewControl { index })
            }
            Err(e) => return Err(session_lost(e)),
        };

        match control.click().await {
            Ok(()) => {}
            Err(e) if is_transient(&e) => {
                return Err(PortalError::Navigation(format!(
                    "view control of row {index} not clickable: {e}"
                )))
            }
            Err(e) => return Err(session_lost(e)),
        }

        self.wait_for(By::ClassName(selectors::DETAIL_ROOT), "detail view")
            .await?;
        Ok(())
    }

    async fn read_detail(&self) -> Result<CaseDetail, PortalError> {
        let case_number = match self.driver.find(By::ClassName(selectors::DETAIL_ROOT)).await {
            Ok(container) => match container.find(By::Tag("span")).await {
                Ok(span) => match span.text().await {
                    Ok(text) => Some(text.trim().to_string()),
                    Err(e) if is_transient(&e) => None,
                    Err(e) => return Err(session_lost(e)),
                },
                Err(e) if is_transient(&e) => None,
                Err(e) => return Err(session_lost(e)),
            },
            Err(e) if is_transient(&e) => None,
            Err(e) => return Err(session_lost(e)),
        };

        let jurisdiction = self
            .text_of(By::Id(selectors::DETAIL_JURISDICTION))
            .await?;
        let department = self.text_of(By::Id(selectors::DETAIL_DEPARTMENT)).await?;
        let status = self.text_of(By::Id(selectors::DETAIL_STATUS)).await?;
        let caption = self.text_of(By::Id(selectors::DETAIL_CAPTION)).await?;
        let movements = self.read_movements().await?;
        let parties = self.read_parties().await?;

        Ok(CaseDetail {
            case_number,
            jurisdiction,
            department,
            status,
            caption,
            movements,
            parties,
        })
    }

    async fn close_detail(&self) -> Result<(), PortalError> {
        let button = self
            .wait_for(By::ClassName(selectors::BACK_CONTROL), "back control")
            .await?;
        match button.click().await {
            Ok(()) => Ok(()),
            Err(e) if is_transient(&e) => {
                Err(PortalError::Navigation(format!("back control: {e}")))
            }
            Err(e) => Err(session_lost(e)),
        }
    }

    async fn history_back(&self) -> Result<(), PortalError> {
        self.driver.back().await.map_err(session_lost)
    }

    async fn reload_list(&self) -> Result<(), PortalError> {
        let url = self
            .list_url
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PortalError::Navigation("no list URL recorded yet".into()))?;
        debug!("reloading list at {url}");
        self.driver.goto(url.as_str()).await.map_err(session_lost)
    }

    async fn advance_page(&self) -> Result<bool, PortalError> {
        let button = match self.driver.find(By::XPath(selectors::NEXT_PAGE_XPATH)).await {
            Ok(button) => button,
            Err(e) if is_transient(&e) => return Ok(false),
            Err(e) => return Err(session_lost(e)),
        };

        let usable = async {
            Ok::<bool, WebDriverError>(
                button.is_displayed().await? && button.is_enabled().await?,
            )
        }
        .await;
        match usable {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) if is_transient(&e) => return Ok(false),
            Err(e) => return Err(session_lost(e)),
        }

        match button.click().await {
            Ok(()) => Ok(true),
            Err(e) if is_transient(&e) => Err(PortalError::Navigation(format!(
                "next-page control not clickable: {e}"
            ))),
            Err(e) => Err(session_lost(e)),
        }
    }
}
