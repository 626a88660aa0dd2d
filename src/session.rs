//! Session collaborator: everything that has to happen before the extractor
//! may assume "page 1 of results, table marker present".
//!
//! The portal puts a CAPTCHA between the filled-in form and the search
//! results. That step is strictly operator-interactive — this module blocks
//! on stdin until a human confirms it is solved; no attempt is made to
//! automate or bypass it.

use anyhow::{Context, Result};
use thirtyfour::By;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::portal::{CasePortal, PortalError};
use crate::selectors;
use crate::webdriver::WebPortal;

/// Search parameters the form is filled with. The jurisdiction code is the
/// value of the portal's `<select>` option (e.g. "10" for the commercial
/// chamber).
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub term: String,
    pub jurisdiction: String,
}

impl WebPortal {
    /// Navigates to the portal and fills in the by-party search form, up to
    /// but not including the CAPTCHA.
    pub async fn open_search(&self, request: &SearchRequest) -> Result<()> {
        self.driver
            .goto(selectors::PORTAL_URL)
            .await
            .context("Failed to open portal")?;

        let tab = self
            .wait_for(By::Id(selectors::BY_PARTY_TAB), "by-party tab")
            .await?;
        tab.click().await.context("Failed to switch to by-party search")?;
        info!("switched to by-party search");

        // The JSF select plays badly with synthesized change events; picking
        // the option element directly is what the site itself reacts to.
        let option = format!(
            "#{} option[value='{}']",
            selectors::JURISDICTION_SELECT.replace(':', "\\:"),
            request.jurisdiction
        );
        let option = self
            .wait_for(By::Css(option.as_str()), "jurisdiction option")
            .await?;
        option
            .click()
            .await
            .context("Failed to select jurisdiction")?;
        info!(code = %request.jurisdiction, "jurisdiction selected");

        let input = self
            .wait_for(By::Id(selectors::SEARCH_INPUT), "search input")
            .await?;
        input
            .send_keys(request.term.as_str())
            .await
            .context("Failed to type search term")?;
        info!(term = %request.term, "search term entered");

        Ok(())
    }

    /// Blocks until the operator confirms the CAPTCHA is solved, submits the
    /// search and waits for page 1 of results. Returning `Ok` is the
    /// "session ready" signal the extractor's preconditions require.
    pub async fn submit_after_captcha(&self) -> Result<()> {
        info!("Resolve the CAPTCHA in the browser window, then press Enter to continue.");
        let mut line = String::new();
        BufReader::new(stdin())
            .read_line(&mut line)
            .await
            .context("Failed to read confirmation from stdin")?;

        let submit = self
            .wait_for(By::Id(selectors::SUBMIT_BUTTON), "submit button")
            .await?;
        submit.click().await.context("Failed to submit search")?;

        match self.await_list().await {
            Ok(()) => {
                info!("search submitted, results table present");
                Ok(())
            }
            Err(PortalError::WaitTimeout { .. }) => Err(anyhow::anyhow!(
                "results table never appeared; was the CAPTCHA accepted?"
            )),
            Err(e) => Err(e.into()),
        }
    }
}
