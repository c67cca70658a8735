//! Parsing of list-endpoint query parameters.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppError;

/// `"2,1"` -> `[2, 1]`. Empty input means "no filter".
pub fn id_list(field: &str, raw: Option<&str>) -> Result<Option<Vec<i64>>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| AppError::field(field, format!("\"{part}\" is not a valid id.")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

pub fn id(field: &str, raw: Option<&str>) -> Result<Option<i64>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::field(field, format!("\"{value}\" is not a valid id."))),
    }
}

/// Half-open UTC range covering the calendar day given as `YYYY-MM-DD`.
pub fn day_range(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError> {
    let Some(value) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let invalid = || AppError::field(field, "Date has wrong format. Use YYYY-MM-DD.");
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())?;
    let start = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc();
    let end = date
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(invalid)?
        .and_utc();
    Ok(Some((start, end)))
}

/// ILIKE pattern for a case-insensitive substring search.
pub fn search_pattern(raw: Option<&str>) -> Option<String> {
    let term = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}
