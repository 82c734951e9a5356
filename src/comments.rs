//! Per-day comment store.
//!
//! Each day directory holds one `JSON/comments.json` object mapping
//! acquisition filenames to free-text comments. Reads create the file lazily
//! so the first write always has a target. Writes are whole-object
//! read-modify-write: two writers racing on the same day lose one update
//! (last writer wins). There is no locking.

use serde_json::Value;
use tracing::debug;

use crate::error::StoreResult;
use crate::json_io::{create_json_if_absent, read_json, write_json};
use crate::models::CommentRecord;
use crate::paths::PathResolver;

#[derive(Debug, Clone)]
pub struct CommentStore {
    resolver: PathResolver,
}

impl CommentStore {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Comment attached to `filename`, or `None` when there is none yet.
    ///
    /// A missing `comments.json` is not an error: an empty `{}` is written
    /// (with its directory) and `None` returned.
    pub async fn get_comment(&self, filename: &str) -> StoreResult<Option<String>> {
        let (acq, path) = self.resolver.comments_path(filename)?;

        let record: CommentRecord = match read_json(&path).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                if create_json_if_absent(&path, &CommentRecord::new()).await? {
                    debug!(path = %path.display(), "created empty comments file");
                    CommentRecord::new()
                } else {
                    read_json(&path).await?
                }
            }
            Err(e) => return Err(e),
        };

        let comment = match record.get(acq.as_str()) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };
        debug!(filename = %acq, found = comment.is_some(), "comment lookup");
        Ok(comment)
    }

    /// Sets the comment of `filename`, leaving every other key untouched.
    pub async fn set_comment(&self, filename: &str, comment: &str) -> StoreResult<()> {
        let (acq, path) = self.resolver.comments_path(filename)?;

        let mut record: CommentRecord = match read_json(&path).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => CommentRecord::new(),
            Err(e) => return Err(e),
        };
        record.insert(acq.as_str().to_string(), Value::String(comment.to_string()));

        write_json(&path, &record, true).await?;
        debug!(filename = %acq, path = %path.display(), "comment updated");
        Ok(())
    }

    /// Every comment of the day `filename` belongs to.
    pub async fn day_comments(&self, filename: &str) -> StoreResult<CommentRecord> {
        let (_, path) = self.resolver.comments_path(filename)?;
        match read_json(&path).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => Ok(CommentRecord::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use tempfile::TempDir;

    const FILE: &str = "data-2025-05-14_10-30-00.json";
    const OTHER: &str = "data-2025-05-14_11-00-00.json";

    fn store(tmp: &TempDir) -> CommentStore {
        CommentStore::new(PathResolver::new(tmp.path()))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        s.set_comment(FILE, "hello").await.unwrap();
        assert_eq!(s.get_comment(FILE).await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_get_missing_creates_empty_file() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        assert_eq!(s.get_comment(FILE).await.unwrap(), None);

        let path = tmp.path().join("2025/05/14/JSON/comments.json");
        assert_eq!(std::fs::read_to_string(path).unwrap().trim(), "{}");
    }

    #[tokio::test]
    async fn test_first_read_never_erases_concurrent_write() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        for day in 1..=20 {
            let reader = format!("data-2025-06-{:02}_09-00-00.json", day);
            let writer = format!("data-2025-06-{:02}_10-00-00.json", day);
            let (got, set) = tokio::join!(
                s.get_comment(&reader),
                s.set_comment(&writer, "beam dump")
            );
            assert_eq!(got.unwrap(), None);
            set.unwrap();
            assert_eq!(
                s.get_comment(&writer).await.unwrap().as_deref(),
                Some("beam dump"),
                "day {}",
                day
            );
        }
    }

    #[tokio::test]
    async fn test_get_is_idempotent_and_preserves_other_keys() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        s.set_comment(OTHER, "noisy run").await.unwrap();

        assert_eq!(s.get_comment(FILE).await.unwrap(), None);
        assert_eq!(s.get_comment(FILE).await.unwrap(), None);

        let all = s.day_comments(FILE).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[OTHER], "noisy run");
    }

    #[tokio::test]
    async fn test_overwrite_keeps_neighbours() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        s.set_comment(FILE, "first").await.unwrap();
        s.set_comment(OTHER, "other").await.unwrap();
        s.set_comment(FILE, "second").await.unwrap();

        assert_eq!(s.get_comment(FILE).await.unwrap().as_deref(), Some("second"));
        assert_eq!(s.get_comment(OTHER).await.unwrap().as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn test_non_string_values_read_as_none() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("2025/05/14/JSON");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("comments.json"), format!(r#"{{"{}": null}}"#, FILE)).unwrap();

        let s = store(&tmp);
        assert_eq!(s.get_comment(FILE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported_not_truncated() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("2025/05/14/JSON");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("comments.json"), "{oops").unwrap();

        let s = store(&tmp);
        assert!(matches!(
            s.set_comment(FILE, "x").await,
            Err(StoreError::Corrupt { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(dir.join("comments.json")).unwrap(),
            "{oops"
        );
    }

    #[tokio::test]
    async fn test_invalid_filename_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        assert!(matches!(
            s.get_comment("../comments.json").await,
            Err(StoreError::InvalidFilename(_))
        ));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
