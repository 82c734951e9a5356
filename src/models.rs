//! Core data types shared by the codec, the path resolver and the stores.
//!
//! Nothing here touches the filesystem. Names arriving from HTTP requests are
//! turned into these types by [`crate::codec`] before any path is built.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codec::pad_to_two_digits;
use crate::error::{StoreError, StoreResult};

/// Calendar key locating an acquisition directory.
///
/// `day` is `None` only for the legacy month-level layout
/// (`root/YYYY/MM/...`); everything current is day-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey {
    pub year: i32,
    pub month: u32,
    pub day: Option<u32>,
}

impl DateKey {
    /// Day-level key. Fails with `InvalidFormat` for impossible dates.
    pub fn new(year: i32, month: u32, day: u32) -> StoreResult<Self> {
        if !(1000..=9999).contains(&year) || NaiveDate::from_ymd_opt(year, month, day).is_none() {
            return Err(StoreError::InvalidFormat(format!(
                "{}-{}-{} is not a calendar date",
                year, month, day
            )));
        }
        Ok(Self {
            year,
            month,
            day: Some(day),
        })
    }

    /// Month-level key for the legacy layout.
    pub fn month_level(year: i32, month: u32) -> StoreResult<Self> {
        if !(1000..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(StoreError::InvalidFormat(format!(
                "{}-{} is not a valid year/month",
                year, month
            )));
        }
        Ok(Self {
            year,
            month,
            day: None,
        })
    }

    /// Builds a key from URL segments such as `("2025", "5", Some("14"))`.
    ///
    /// Date pickers send unpadded numbers, so `"5"` and `"05"` are equivalent.
    pub fn from_segments(year: &str, month: &str, day: Option<&str>) -> StoreResult<Self> {
        let bad = || {
            StoreError::InvalidFormat(format!(
                "invalid date segments: {}/{}/{}",
                year,
                month,
                day.unwrap_or("-")
            ))
        };
        let y: i32 = parse_digits(year).ok_or_else(bad)?;
        let m: u32 = parse_digits(month).ok_or_else(bad)?;
        match day {
            Some(d) => {
                let d: u32 = parse_digits(d).ok_or_else(bad)?;
                Self::new(y, m, d)
            }
            None => Self::month_level(y, m),
        }
    }

    /// Directory components below the data root: `["2025", "05", "14"]`.
    pub fn segments(&self) -> Vec<String> {
        let mut parts = vec![self.year.to_string(), pad_to_two_digits(self.month)];
        if let Some(day) = self.day {
            parts.push(pad_to_two_digits(day));
        }
        parts
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join("-"))
    }
}

fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A validated acquisition filename, e.g. `data-2025-05-14_10-30-00.json`.
///
/// Produced only by [`crate::codec::parse_acquisition`]; holding one means the
/// name passed the traversal check and encodes a real timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AcquisitionFilename {
    pub(crate) name: String,
    pub(crate) stamp: NaiveDateTime,
}

/// Literal prefix every current acquisition filename starts with.
pub const ACQUISITION_PREFIX: &str = "data";

impl AcquisitionFilename {
    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.stamp
    }

    pub fn date_key(&self) -> DateKey {
        use chrono::Datelike;
        let d = self.stamp.date();
        DateKey {
            year: d.year(),
            month: d.month(),
            day: Some(d.day()),
        }
    }

    /// The name with `.json` swapped for `ext` (given without the dot).
    pub fn with_extension(&self, ext: &str) -> String {
        format!("{}.{}", self.stem(), ext)
    }

    /// The name with the leading `data` replaced by `prefix` and the
    /// extension swapped: `Together-2025-05-14_10-30-00.png`.
    pub fn with_prefix(&self, prefix: &str, ext: &str) -> String {
        let stem = self.stem();
        let rest = stem.strip_prefix(ACQUISITION_PREFIX).unwrap_or(stem);
        format!("{}{}.{}", prefix, rest, ext)
    }

    fn stem(&self) -> &str {
        self.name.strip_suffix(".json").unwrap_or(&self.name)
    }
}

impl fmt::Display for AcquisitionFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A detector subdirectory holding per-detector signals and plots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Detector {
    Pds,
    Bds,
    Dsat,
    Usat,
    Pmt11,
    /// Any other channel name found in acquisition JSON keys.
    Other(String),
}

impl Detector {
    /// Detectors shown in the parameter table, in display order.
    pub const KNOWN: [Detector; 5] = [
        Detector::Pds,
        Detector::Bds,
        Detector::Dsat,
        Detector::Usat,
        Detector::Pmt11,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Detector::Pds => "PDS",
            Detector::Bds => "BDS",
            Detector::Dsat => "DSAT",
            Detector::Usat => "USAT",
            Detector::Pmt11 => "PMT11",
            Detector::Other(name) => name,
        }
    }
}

impl FromStr for Detector {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PDS" => Detector::Pds,
            "BDS" => Detector::Bds,
            "DSAT" => Detector::Dsat,
            "USAT" => Detector::Usat,
            "PMT11" => Detector::Pmt11,
            other => {
                let reserved = matches!(other, "JSON" | "Together" | "Same");
                if other.is_empty()
                    || reserved
                    || !other
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(StoreError::InvalidFilename(format!(
                        "invalid detector name: {}",
                        other
                    )));
                }
                Detector::Other(other.to_string())
            }
        })
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subdirectory of a date directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// Acquisition JSON files and `comments.json`.
    Json,
    Detector(Detector),
    /// Combined plot with one subplot per detector.
    Together,
    /// Combined plot with all signals on the same axes.
    Same,
}

impl Category {
    pub fn as_dir(&self) -> &str {
        match self {
            Category::Json => "JSON",
            Category::Detector(d) => d.as_str(),
            Category::Together => "Together",
            Category::Same => "Same",
        }
    }
}

/// Per-day comment map: acquisition filename → comment.
///
/// Values are kept as raw JSON so entries written by other tools survive a
/// read-modify-write cycle untouched.
pub type CommentRecord = serde_json::Map<String, serde_json::Value>;

/// Particle species the analysis pipeline is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Particle {
    Positrons,
    Antiprotons,
}

impl Particle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Particle::Positrons => "positrons",
            Particle::Antiprotons => "antiprotons",
        }
    }
}

impl FromStr for Particle {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positrons" => Ok(Particle::Positrons),
            "antiprotons" => Ok(Particle::Antiprotons),
            other => Err(StoreError::InvalidConfiguration(format!(
                "config has to be positrons or antiprotons, got '{}'",
                other
            ))),
        }
    }
}

/// The three configuration documents returned together by
/// `GET /api/configuration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationBundle {
    #[serde(rename = "configData")]
    pub config_data: serde_json::Value,
    #[serde(rename = "configPos")]
    pub config_pos: serde_json::Value,
    #[serde(rename = "configPbar")]
    pub config_pbar: serde_json::Value,
}

/// Freshness marker written by the pipeline after each dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestMarker {
    pub latest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_key_segments_are_padded() {
        let key = DateKey::new(2025, 5, 4).unwrap();
        assert_eq!(key.segments(), vec!["2025", "05", "04"]);
        assert_eq!(key.to_string(), "2025-05-04");
    }

    #[test]
    fn test_date_key_rejects_impossible_dates() {
        assert!(DateKey::new(2025, 2, 30).is_err());
        assert!(DateKey::new(2025, 13, 1).is_err());
        assert!(DateKey::month_level(2025, 0).is_err());
    }

    #[test]
    fn test_from_segments_accepts_unpadded() {
        let a = DateKey::from_segments("2025", "5", Some("14")).unwrap();
        let b = DateKey::from_segments("2025", "05", Some("14")).unwrap();
        assert_eq!(a, b);
        assert!(DateKey::from_segments("2025", "..", Some("14")).is_err());
        assert!(DateKey::from_segments("2025", "-5", None).is_err());
    }

    #[test]
    fn test_month_level_has_two_segments() {
        let key = DateKey::from_segments("2024", "11", None).unwrap();
        assert_eq!(key.segments(), vec!["2024", "11"]);
    }

    #[test]
    fn test_detector_parse() {
        assert_eq!("PDS".parse::<Detector>().unwrap(), Detector::Pds);
        assert_eq!(
            "PMT12".parse::<Detector>().unwrap(),
            Detector::Other("PMT12".to_string())
        );
        assert!("..".parse::<Detector>().is_err());
        assert!("a/b".parse::<Detector>().is_err());
        assert!("JSON".parse::<Detector>().is_err());
    }

    #[test]
    fn test_particle_parse() {
        assert_eq!("antiprotons".parse::<Particle>().unwrap(), Particle::Antiprotons);
        assert!("electrons".parse::<Particle>().is_err());
    }
}
