//! Filename date codec.
//!
//! Acquisition dumps are named `data-YYYY-MM-DD_HH-MM-SS.json`; the date in
//! the name is the only index into the on-disk layout. Every user-supplied
//! name goes through [`validate_filename`] before a path is built from it.
//!
//! An older month-level scheme (`xxx-YYYY-MM-xxx.json`) is still parsed by
//! [`parse_year_month`] for browsing archived months.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

use crate::error::{StoreError, StoreResult};
use crate::models::{AcquisitionFilename, DateKey};

static ACQUISITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data-(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})-(\d{2})\.json$")
        .expect("static regex")
});

/// Rejects names that could escape the data root or that are not `.json`.
///
/// Runs independently of date parsing, so `../data-2025-05-14_10-30-00.json`
/// fails here even though it carries a valid date.
pub fn validate_filename(filename: &str) -> StoreResult<()> {
    if !filename.ends_with(".json") {
        return Err(StoreError::InvalidFilename(format!(
            "{}: expected a .json file",
            filename
        )));
    }
    reject_traversal(filename)
}

/// Validates an image name from an image route and returns the acquisition
/// filename it refers to. Both `.png` and `.json` spellings are accepted.
pub fn validate_image_name(name: &str) -> StoreResult<String> {
    reject_traversal(name)?;
    let json_name = match name.strip_suffix(".png") {
        Some(stem) => format!("{}.json", stem),
        None => name.to_string(),
    };
    validate_filename(&json_name)?;
    Ok(json_name)
}

fn reject_traversal(name: &str) -> StoreResult<()> {
    if name.contains("..") || name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(StoreError::InvalidFilename(format!(
            "{}: path segments are not allowed",
            name
        )));
    }
    Ok(())
}

/// Validates `filename` and parses its full timestamp.
pub fn parse_acquisition(filename: &str) -> StoreResult<AcquisitionFilename> {
    validate_filename(filename)?;
    parse_stamp(filename)
}

/// Day-level date of an acquisition filename. Anything that does not match
/// `data-YYYY-MM-DD_HH-MM-SS.json` is an `InvalidFormat`.
pub fn parse_date(filename: &str) -> StoreResult<DateKey> {
    parse_stamp(filename).map(|f| f.date_key())
}

/// Pattern and calendar check only; the anchored pattern admits no path
/// separators.
fn parse_stamp(filename: &str) -> StoreResult<AcquisitionFilename> {
    let caps = ACQUISITION_RE.captures(filename).ok_or_else(|| {
        StoreError::InvalidFormat(format!(
            "{}: expected data-YYYY-MM-DD_HH-MM-SS.json",
            filename
        ))
    })?;

    let num = |i: usize| -> u32 { caps[i].parse().unwrap_or(u32::MAX) };
    let date = NaiveDate::from_ymd_opt(num(1) as i32, num(2), num(3));
    let time = NaiveTime::from_hms_opt(num(4), num(5), num(6));
    match (date, time) {
        (Some(date), Some(time)) => Ok(AcquisitionFilename {
            name: filename.to_string(),
            stamp: NaiveDateTime::new(date, time),
        }),
        _ => Err(StoreError::InvalidFormat(format!(
            "{}: timestamp is not a real date/time",
            filename
        ))),
    }
}

/// Legacy month-level parse of `xxx-YYYY-MM-xxx.json`.
pub fn parse_year_month(filename: &str) -> StoreResult<DateKey> {
    validate_filename(filename)?;
    let parts: Vec<&str> = filename.split('-').collect();
    if parts.len() < 3 {
        return Err(StoreError::InvalidFormat(format!(
            "{}: year and month not found",
            filename
        )));
    }
    let (year, month) = (parts[1], parts[2]);
    let four = year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit());
    let two = month.len() == 2 && month.bytes().all(|b| b.is_ascii_digit());
    if !four || !two {
        return Err(StoreError::InvalidFormat(format!(
            "{}: invalid year or month",
            filename
        )));
    }
    DateKey::from_segments(year, month, None)
}

/// Zero-pads to at least two characters; longer values pass through.
///
/// ```
/// use burritos::codec::pad_to_two_digits;
/// assert_eq!(pad_to_two_digits(5), "05");
/// assert_eq!(pad_to_two_digits("7"), "07");
/// assert_eq!(pad_to_two_digits(123), "123");
/// ```
pub fn pad_to_two_digits(n: impl Display) -> String {
    format!("{:0>2}", n.to_string())
}

/// Human-readable `YYYY-MM-DD HH:MM:SS` for an acquisition filename, or
/// `None` if the name does not follow the day-level scheme.
pub fn parse_timestamp(filename: &str) -> Option<String> {
    parse_acquisition(filename)
        .ok()
        .map(|f| f.timestamp().format("%Y-%m-%d %H:%M:%S").to_string())
}
