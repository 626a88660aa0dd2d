use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Record Model
// ============================================================================

/// One judicial case as extracted from the portal's detail view.
///
/// Records are constructed from DOM state, persisted immediately and then
/// discarded; no in-memory accumulation happens beyond the current page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CaseRecord {
    /// Case identifier as shown on the portal (e.g. "COM 12345/2020").
    pub case_number: String,
    pub jurisdiction: String,
    /// Department / office currently handling the case.
    pub department: String,
    /// Current procedural status.
    pub status: String,
    /// Caption / title line of the case.
    pub caption: String,
    /// Movement entries in table order at extraction time.
    pub movements: Vec<Movement>,
    /// Actor party names, first-seen order, deduplicated.
    pub actors: Vec<String>,
    /// Defendant party names, first-seen order, deduplicated.
    pub defendants: Vec<String>,
    /// True when one or more expected detail fields could not be located.
    pub partial: bool,
}

/// One entry of a case's movement table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movement {
    /// `None` when the portal's date cell could not be parsed.
    pub date: Option<NaiveDate>,
    pub kind: String,
    pub detail: String,
}

// ============================================================================
// Field Normalization
// ============================================================================

/// Parses a movement date cell.
///
/// The portal sometimes prefixes the value with "Fecha:" and pads it with
/// whitespace. Anything that does not parse as dd/mm/yyyy afterwards yields
/// `None` rather than an error.
pub fn parse_movement_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.trim().trim_start_matches("Fecha:").trim();
    NaiveDate::parse_from_str(cleaned, "%d/%m/%Y").ok()
}
