//! Skim report: one row per acquisition of a day, one column per fitted
//! parameter of a single detector. Tab-separated so it pastes straight into a
//! spreadsheet or logbook.

use serde_json::Value;

use crate::acquisition::{list_json_files, read_acquisition};
use crate::codec::{self, parse_timestamp};
use crate::error::{StoreError, StoreResult};
use crate::models::Detector;
use crate::paths::PathResolver;

/// Fitted parameters and their column labels, in display order.
pub const PARAMETERS: [(&str, &str); 5] = [
    ("area", "Area [V·ns]"),
    ("fwhm", "FWHM [ns]"),
    ("peak", "Peak [V]"),
    ("rise", "Rise [ns]"),
    ("time peak", "Time Peak [ns]"),
];

/// Builds the report for every acquisition of `from`'s day whose name sorts
/// between `from` and `to` inclusive. The two bounds may be given in either
/// order but must fall on the same day.
pub async fn skim_report(
    resolver: &PathResolver,
    detector: &Detector,
    from: &str,
    to: &str,
) -> StoreResult<String> {
    let start = codec::parse_acquisition(from)?;
    let end = codec::parse_acquisition(to)?;
    if start.date_key() != end.date_key() {
        return Err(StoreError::InvalidFormat(format!(
            "{} and {} are not on the same day",
            from, to
        )));
    }
    let (lo, hi) = if start <= end {
        (start.as_str(), end.as_str())
    } else {
        (end.as_str(), start.as_str())
    };

    let files: Vec<String> = list_json_files(resolver, &start.date_key())
        .await?
        .into_iter()
        .filter(|f| f.starts_with("data-") && f.as_str() >= lo && f.as_str() <= hi)
        .collect();

    let mut rows = Vec::with_capacity(files.len());
    for file in &files {
        let data = read_acquisition(resolver, file).await?;
        rows.push((file.as_str(), data));
    }
    Ok(render(detector, &rows))
}

fn render(detector: &Detector, rows: &[(&str, Value)]) -> String {
    let mut text = String::from("Timestamp\t\t");
    for (_, label) in PARAMETERS {
        text.push_str(label);
        text.push('\t');
    }
    text.push('\n');

    for (file, data) in rows {
        let stamp = parse_timestamp(file).unwrap_or_else(|| file.to_string());
        text.push_str(&stamp);
        text.push('\t');
        for (key, _) in PARAMETERS {
            match data[detector.as_str()][key].as_f64() {
                Some(v) => {
                    text.push_str(&to_precision(v, 5));
                    text.push('\t');
                }
                None => text.push_str("N/A\t"),
            }
        }
        text.push('\n');
    }
    text
}

/// `value` rounded to `digits` significant digits, switching to exponent
/// notation for very large or very small magnitudes (`1.2346e+5`).
pub fn to_precision(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return format!("{:.*}", digits.saturating_sub(1), 0.0);
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let sci = format!("{:.*e}", digits.saturating_sub(1), value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if exp < -6 || exp >= digits as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{}", mantissa, sign, exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_to_precision() {
        assert_eq!(to_precision(1.234567, 5), "1.2346");
        assert_eq!(to_precision(0.000123456, 5), "0.00012346");
        assert_eq!(to_precision(123456.0, 5), "1.2346e+5");
        assert_eq!(to_precision(-42.0, 5), "-42.000");
        assert_eq!(to_precision(0.0, 5), "0.0000");
        assert_eq!(to_precision(1.5e-9, 5), "1.5000e-9");
    }

    #[tokio::test]
    async fn test_skim_report_range() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("2025/05/14/JSON");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("data-2025-05-14_10-00-00.json"),
            r#"{"PMT11": {"area": 1.0, "fwhm": 2.0, "peak": 0.5, "rise": 3.0, "time peak": 10.0}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("data-2025-05-14_11-00-00.json"),
            r#"{"PMT11": {"area": NaN, "peak": 0.25}}"#,
        )
        .unwrap();
        std::fs::write(dir.join("data-2025-05-14_12-00-00.json"), "{}").unwrap();
        std::fs::write(dir.join("comments.json"), "{}").unwrap();

        let r = PathResolver::new(tmp.path());
        let text = skim_report(
            &r,
            &Detector::Pmt11,
            "data-2025-05-14_11-00-00.json",
            "data-2025-05-14_10-00-00.json",
        )
        .await
        .unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Timestamp\t\tArea [V·ns]\t"));
        assert_eq!(
            lines[1],
            "2025-05-14 10:00:00\t1.0000\t2.0000\t0.50000\t3.0000\t10.000\t"
        );
        assert_eq!(
            lines[2],
            "2025-05-14 11:00:00\tN/A\tN/A\t0.25000\tN/A\tN/A\t"
        );
    }

    #[tokio::test]
    async fn test_skim_rejects_cross_day_range() {
        let tmp = TempDir::new().unwrap();
        let r = PathResolver::new(tmp.path());
        assert!(matches!(
            skim_report(
                &r,
                &Detector::Pds,
                "data-2025-05-14_10-00-00.json",
                "data-2025-05-15_10-00-00.json"
            )
            .await,
            Err(StoreError::InvalidFormat(_))
        ));
    }
}
