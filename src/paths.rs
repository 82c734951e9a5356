//! Date-routed path resolution under the data root.
//!
//! ```text
//! root/YYYY/MM/DD/JSON/data-YYYY-MM-DD_HH-MM-SS.json
//! root/YYYY/MM/DD/JSON/comments.json
//! root/YYYY/MM/DD/<detector>/data-YYYY-MM-DD_HH-MM-SS.{txt,png}
//! root/YYYY/MM/DD/Together/Together-YYYY-MM-DD_HH-MM-SS.png
//! root/YYYY/MM/DD/Same/Same-YYYY-MM-DD_HH-MM-SS.png
//! ```
//!
//! Resolution is pure: nothing here checks existence. Callers decide whether
//! a missing directory is created (listings, comments) or reported as
//! not found (file fetches).

use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::StoreResult;
use crate::models::{AcquisitionFilename, Category, DateKey, Detector};

/// Name of the per-day comment file inside the `JSON` directory.
pub const COMMENTS_FILE: &str = "comments.json";

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root/year/MM[/DD]/category`.
    pub fn resolve_directory(&self, date: &DateKey, category: &Category) -> PathBuf {
        let mut path = self.root.clone();
        for segment in date.segments() {
            path.push(segment);
        }
        path.push(category.as_dir());
        path
    }

    /// [`resolve_directory`](Self::resolve_directory) plus a final file name.
    pub fn resolve_file_path(
        &self,
        date: &DateKey,
        category: &Category,
        base_name: &str,
    ) -> PathBuf {
        self.resolve_directory(date, category).join(base_name)
    }

    pub fn json_dir(&self, date: &DateKey) -> PathBuf {
        self.resolve_directory(date, &Category::Json)
    }

    /// Day directory itself (`root/YYYY/MM/DD`), handed to the analysis script.
    pub fn day_dir(&self, date: &DateKey) -> PathBuf {
        let mut path = self.root.clone();
        for segment in date.segments() {
            path.push(segment);
        }
        path
    }

    /// Location of the acquisition JSON. Validates and parses `filename`.
    pub fn acquisition_path(&self, filename: &str) -> StoreResult<(AcquisitionFilename, PathBuf)> {
        let acq = codec::parse_acquisition(filename)?;
        let path = self.resolve_file_path(&acq.date_key(), &Category::Json, acq.as_str());
        Ok((acq, path))
    }

    /// `comments.json` of the day `filename` belongs to.
    pub fn comments_path(&self, filename: &str) -> StoreResult<(AcquisitionFilename, PathBuf)> {
        let acq = codec::parse_acquisition(filename)?;
        let path = self.resolve_file_path(&acq.date_key(), &Category::Json, COMMENTS_FILE);
        Ok((acq, path))
    }

    /// Raw signal text of one detector: `.json` swapped for `.txt`.
    pub fn signal_path(&self, filename: &str, detector: &Detector) -> StoreResult<PathBuf> {
        let acq = codec::parse_acquisition(filename)?;
        Ok(self.resolve_file_path(
            &acq.date_key(),
            &Category::Detector(detector.clone()),
            &acq.with_extension("txt"),
        ))
    }

    /// Per-detector plot: `.json` swapped for `.png`.
    pub fn image_path(&self, filename: &str, detector: &Detector) -> StoreResult<PathBuf> {
        let acq = codec::parse_acquisition(filename)?;
        Ok(self.resolve_file_path(
            &acq.date_key(),
            &Category::Detector(detector.clone()),
            &acq.with_extension("png"),
        ))
    }

    /// Combined-view plot. The `data` prefix of the name is replaced by the
    /// view's directory name, so `Together/Together-<stamp>.png`.
    pub fn combined_image_path(&self, filename: &str, view: &Category) -> StoreResult<PathBuf> {
        let acq = codec::parse_acquisition(filename)?;
        Ok(self.resolve_file_path(
            &acq.date_key(),
            view,
            &acq.with_prefix(view.as_dir(), "png"),
        ))
    }
}

/// Download name offered for a signal: `<detector>-<stamp>.<ext>`.
pub fn signal_download_name(acq: &AcquisitionFilename, detector: &Detector, ext: &str) -> String {
    acq.with_prefix(detector.as_str(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    const FILE: &str = "data-2025-05-14_10-30-00.json";

    #[test]
    fn test_resolve_directory_day_level() {
        let r = PathResolver::new("/srv/eos");
        let key = DateKey::new(2025, 5, 14).unwrap();
        assert_eq!(
            r.resolve_directory(&key, &Category::Json),
            PathBuf::from("/srv/eos/2025/05/14/JSON")
        );
    }

    #[test]
    fn test_resolve_directory_month_level() {
        let r = PathResolver::new("/srv/eos");
        let key = DateKey::month_level(2024, 3).unwrap();
        assert_eq!(
            r.resolve_directory(&key, &Category::Detector(Detector::Bds)),
            PathBuf::from("/srv/eos/2024/03/BDS")
        );
    }

    #[test]
    fn test_signal_path() {
        let r = PathResolver::new("/srv/eos");
        assert_eq!(
            r.signal_path(FILE, &Detector::Pds).unwrap(),
            PathBuf::from("/srv/eos/2025/05/14/PDS/data-2025-05-14_10-30-00.txt")
        );
    }

    #[test]
    fn test_image_paths() {
        let r = PathResolver::new("/srv/eos");
        assert_eq!(
            r.image_path(FILE, &Detector::Pmt11).unwrap(),
            PathBuf::from("/srv/eos/2025/05/14/PMT11/data-2025-05-14_10-30-00.png")
        );
        assert_eq!(
            r.combined_image_path(FILE, &Category::Together).unwrap(),
            PathBuf::from("/srv/eos/2025/05/14/Together/Together-2025-05-14_10-30-00.png")
        );
        assert_eq!(
            r.combined_image_path(FILE, &Category::Same).unwrap(),
            PathBuf::from("/srv/eos/2025/05/14/Same/Same-2025-05-14_10-30-00.png")
        );
    }

    #[test]
    fn test_comments_path() {
        let r = PathResolver::new("/srv/eos");
        let (_, path) = r.comments_path(FILE).unwrap();
        assert_eq!(path, PathBuf::from("/srv/eos/2025/05/14/JSON/comments.json"));
    }

    #[test]
    fn test_invalid_names_fail_before_join() {
        let r = PathResolver::new("/srv/eos");
        assert!(matches!(
            r.signal_path("../../etc/passwd.json", &Detector::Pds),
            Err(StoreError::InvalidFilename(_))
        ));
        assert!(matches!(
            r.acquisition_path("data-2025-05.json"),
            Err(StoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_signal_download_name() {
        let acq = crate::codec::parse_acquisition(FILE).unwrap();
        assert_eq!(
            signal_download_name(&acq, &Detector::Usat, "csv"),
            "USAT-2025-05-14_10-30-00.csv"
        );
    }
}
