//! Polling support for "follow the newest dump" views.
//!
//! A [`ListingCache`] remembers how many files the previous poll saw and only
//! reports a listing when that number changes. Each poller owns its own
//! cache, so two watchers (or two tests) never share state.

use std::time::Duration;
use tracing::{info, warn};

use crate::acquisition::{list_json_files, newest_first};
use crate::models::DateKey;
use crate::paths::PathResolver;

#[derive(Debug, Default, Clone)]
pub struct ListingCache {
    last_count: Option<usize>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the acquisitions newest-first if the raw listing size differs
    /// from the previous observation, `None` otherwise.
    pub fn observe(&mut self, files: &[String]) -> Option<Vec<String>> {
        if self.last_count == Some(files.len()) {
            return None;
        }
        self.last_count = Some(files.len());
        Some(newest_first(files))
    }

    pub fn reset(&mut self) {
        self.last_count = None;
    }
}

/// Polls the day directory every `interval` and calls `on_change` with the
/// newest-first listing whenever it changes. Runs until `on_change` returns
/// `false`.
pub async fn watch_day<F>(
    resolver: &PathResolver,
    date: &DateKey,
    interval: Duration,
    mut on_change: F,
) -> anyhow::Result<()>
where
    F: FnMut(&[String]) -> bool,
{
    let mut cache = ListingCache::new();
    let mut ticker = tokio::time::interval(interval);
    info!(date = %date, "watching for new acquisitions");
    loop {
        ticker.tick().await;
        let files = match list_json_files(resolver, date).await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "listing failed");
                continue;
            }
        };
        if let Some(changed) = cache.observe(&files) {
            if !on_change(&changed) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_observation_always_reports() {
        let mut cache = ListingCache::new();
        assert_eq!(cache.observe(&[]), Some(vec![]));
        assert_eq!(cache.observe(&[]), None);
    }

    #[test]
    fn test_reports_only_on_count_change() {
        let mut cache = ListingCache::new();
        let one = names(&["data-2025-05-14_10-00-00.json"]);
        let two = names(&["data-2025-05-14_10-00-00.json", "data-2025-05-14_10-05-00.json"]);

        assert!(cache.observe(&one).is_some());
        assert!(cache.observe(&one).is_none());
        assert_eq!(
            cache.observe(&two).unwrap()[0],
            "data-2025-05-14_10-05-00.json"
        );
        cache.reset();
        assert!(cache.observe(&two).is_some());
    }

    #[test]
    fn test_caches_are_independent() {
        let mut a = ListingCache::new();
        let mut b = ListingCache::new();
        let files = names(&["data-2025-05-14_10-00-00.json"]);
        assert!(a.observe(&files).is_some());
        assert!(b.observe(&files).is_some());
    }

    #[tokio::test]
    async fn test_watch_day_stops_when_callback_declines() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("2025/05/14/JSON");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("data-2025-05-14_10-00-00.json"), "{}").unwrap();

        let r = PathResolver::new(tmp.path());
        let key = DateKey::new(2025, 5, 14).unwrap();
        let mut seen = Vec::new();
        watch_day(&r, &key, Duration::from_millis(5), |files| {
            seen.push(files.to_vec());
            false
        })
        .await
        .unwrap();
        assert_eq!(seen, vec![names(&["data-2025-05-14_10-00-00.json"])]);
    }
}
