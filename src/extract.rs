//! Conversion from raw detail-view captures to [`CaseRecord`]s.
//!
//! The canonical policy is empty-field-tolerant: a detail page missing an
//! expected field yields an empty value for that field and the record is
//! marked partial, but it still counts as extracted.

use crate::model::{parse_movement_date, CaseRecord, Movement};
use crate::portal::CaseDetail;
use crate::selectors::{ROLE_ACTOR, ROLE_DEFENDANT};

/// Builds a record from a raw detail capture. Returns the record together
/// with whether any core field was missing.
pub fn build_record(detail: CaseDetail) -> CaseRecord {
    let mut partial = false;
    let mut field = |value: Option<String>| -> String {
        match value {
            Some(v) => v,
            None => {
                partial = true;
                String::new()
            }
        }
    };

    let case_number = field(detail.case_number);
    let jurisdiction = field(detail.jurisdiction);
    let department = field(detail.department);
    let status = field(detail.status);
    let caption = field(detail.caption);

    let movements = detail
        .movements
        .into_iter()
        .map(|(date, kind, text)| Movement {
            date: parse_movement_date(&date),
            kind: kind.trim().to_string(),
            detail: text.trim().to_string(),
        })
        .collect();

    let (actors, defendants) = classify_parties(&detail.parties);

    CaseRecord {
        case_number,
        jurisdiction,
        department,
        status,
        caption,
        movements,
        actors,
        defendants,
        partial,
    }
}

/// Splits participant rows into actor and defendant name sets, preserving
/// first-seen order. Rows with any other role text are ignored.
fn classify_parties(parties: &[(String, String)]) -> (Vec<String>, Vec<String>) {
    let mut actors: Vec<String> = Vec::new();
    let mut defendants: Vec<String> = Vec::new();

    for (role, name) in parties {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if role.contains(ROLE_ACTOR) && !actors.iter().any(|n| n == name) {
            actors.push(name.to_string());
        } else if role.contains(ROLE_DEFENDANT) && !defendants.iter().any(|n| n == name) {
            defendants.push(name.to_string());
        }
    }

    (actors, defendants)
}
