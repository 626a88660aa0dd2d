//! Site markers for the PJN public case-lookup portal, collected in one
//! place. These are exactly the hooks the server-rendered JSF pages expose;
//! the generated `j_idt*` ids are stable per deployment but not meaningful.

/// Landing page of the public lookup.
pub const PORTAL_URL: &str = "http://scw.pjn.gov.ar/scw/home.seam";

// --- Search form -----------------------------------------------------------

/// Tab that switches the form to search-by-party.
pub const BY_PARTY_TAB: &str = "formPublica:porParte:header:inactive";
/// Jurisdiction `<select>` on the by-party form.
pub const JURISDICTION_SELECT: &str = "formPublica:camaraPartes";
/// Party-name text input.
pub const SEARCH_INPUT: &str = "formPublica:nomIntervParte";
/// Submit button for the by-party search.
pub const SUBMIT_BUTTON: &str = "formPublica:buscarPorParteButton";

// --- List view --------------------------------------------------------------

/// Class marking the results table root.
pub const LIST_TABLE: &str = "table-striped";
/// Class of the per-row "view" control (an eye icon).
pub const VIEW_CONTROL: &str = "fa-eye";
/// Next-page control at the foot of the results table.
pub const NEXT_PAGE_XPATH: &str = "//*[@id='j_idt118:j_idt208:j_idt215']";

// --- Detail view -------------------------------------------------------------

/// Container whose presence marks the detail view as loaded; its first span
/// holds the case number.
pub const DETAIL_ROOT: &str = "col-xs-10";
pub const DETAIL_JURISDICTION: &str = "expediente:j_idt90:detailCamera";
pub const DETAIL_DEPARTMENT: &str = "expediente:j_idt90:detailDependencia";
pub const DETAIL_STATUS: &str = "expediente:j_idt90:detailSituation";
pub const DETAIL_CAPTION: &str = "expediente:j_idt90:detailCover";
/// Movement table marker; the RichFaces table can render after the detail
/// root is already present.
pub const MOVEMENT_TABLE_CSS: &str = "#expediente\\:action-table";
/// Movement table rows (header row included).
pub const MOVEMENT_ROWS_CSS: &str = "#expediente\\:action-table tr";
/// Tab that reveals the participants table.
pub const PARTIES_TAB_XPATH: &str = "//span[text()='Intervinientes']";
/// Participants table marker.
pub const PARTIES_TABLE_CSS: &str = "#expediente\\:participantsTable";
/// Participant data rows.
pub const PARTY_ROWS_CSS: &str = "#expediente\\:participantsTable .rf-dt-r";
/// Class of the detail view's "back to results" button.
pub const BACK_CONTROL: &str = "btn-default";

/// Role markers in the participants table.
pub const ROLE_ACTOR: &str = "ACTOR";
pub const ROLE_DEFENDANT: &str = "DEMANDADO";
