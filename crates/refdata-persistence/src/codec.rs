//! ---
//! refdata_section: "03-persistence"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Column decoding helpers."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{PersistenceError, Result};

pub(crate) fn uuid(row: &SqliteRow, column: &'static str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    parse_uuid(column, &raw)
}

pub(crate) fn opt_uuid(row: &SqliteRow, column: &'static str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| parse_uuid(column, &raw)).transpose()
}

pub(crate) fn parse_uuid(column: &'static str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| PersistenceError::Corrupt {
        column,
        value: raw.to_owned(),
    })
}

pub(crate) fn opt_date(row: &SqliteRow, column: &'static str) -> Result<Option<NaiveDate>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| {
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| PersistenceError::Corrupt {
            column,
            value: raw,
        })
    })
    .transpose()
}

pub(crate) fn opt_string(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}

pub(crate) fn date_string(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}
