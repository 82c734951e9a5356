//! Analysis configuration store.
//!
//! A fixed set of JSON documents under `<analysis_dir>/configurations/`:
//!
//! | Document | File |
//! |----------|------|
//! | active configuration | `configuration.json` |
//! | positron defaults | `default_config_positrons.json` |
//! | antiproton defaults | `default_config_antiprotons.json` |
//! | freshness marker | `latest.json` |
//!
//! Documents are read and replaced whole. Merging fields (e.g. keeping `fit`
//! while switching `config`) is the caller's job.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::json_io::{read_json, write_json};
use crate::models::{ConfigurationBundle, LatestMarker, Particle};

pub const CONFIGURATIONS_DIR: &str = "configurations";

/// The named documents of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigDocument {
    Active,
    PositronDefaults,
    AntiprotonDefaults,
    Latest,
}

impl ConfigDocument {
    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigDocument::Active => "configuration.json",
            ConfigDocument::PositronDefaults => "default_config_positrons.json",
            ConfigDocument::AntiprotonDefaults => "default_config_antiprotons.json",
            ConfigDocument::Latest => "latest.json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    analysis_dir: PathBuf,
}

impl ConfigurationStore {
    pub fn new(analysis_dir: impl Into<PathBuf>) -> Self {
        Self {
            analysis_dir: analysis_dir.into(),
        }
    }

    pub fn document_path(&self, doc: ConfigDocument) -> PathBuf {
        self.analysis_dir
            .join(CONFIGURATIONS_DIR)
            .join(doc.file_name())
    }

    /// Active configuration plus both defaults. Any missing or invalid
    /// document fails the whole call with `ConfigUnavailable`.
    pub async fn get_configuration(&self) -> StoreResult<ConfigurationBundle> {
        let config_data = self.read_document(ConfigDocument::Active).await?;
        validate_document(&config_data).map_err(|e| StoreError::ConfigUnavailable {
            name: ConfigDocument::Active.file_name().to_string(),
            reason: e.to_string(),
        })?;
        let config_pos = self.read_document(ConfigDocument::PositronDefaults).await?;
        let config_pbar = self.read_document(ConfigDocument::AntiprotonDefaults).await?;

        Ok(ConfigurationBundle {
            config_data,
            config_pos,
            config_pbar,
        })
    }

    /// Replaces the active configuration with `document`.
    ///
    /// `document` must be a JSON object; a present `config` field must be
    /// `"positrons"` or `"antiprotons"`.
    pub async fn post_configuration(&self, document: &Value) -> StoreResult<()> {
        validate_document(document)?;
        let path = self.document_path(ConfigDocument::Active);
        write_json(&path, document, true).await?;
        debug!(path = %path.display(), "configuration replaced");
        Ok(())
    }

    /// Active configuration with only the `config` field switched.
    pub async fn switch_particle(&self, particle: Particle) -> StoreResult<Value> {
        let mut doc = self.read_document(ConfigDocument::Active).await?;
        if let Value::Object(map) = &mut doc {
            map.insert(
                "config".to_string(),
                Value::String(particle.as_str().to_string()),
            );
        }
        self.post_configuration(&doc).await?;
        Ok(doc)
    }

    /// Timestamp (and particle, if recorded) of the most recent dump.
    pub async fn get_latest(&self) -> StoreResult<LatestMarker> {
        let path = self.document_path(ConfigDocument::Latest);
        read_json(&path).await.map_err(|e| match e {
            StoreError::NotFound(p) => StoreError::NotFound(p),
            other => StoreError::ConfigUnavailable {
                name: ConfigDocument::Latest.file_name().to_string(),
                reason: other.to_string(),
            },
        })
    }

    async fn read_document(&self, doc: ConfigDocument) -> StoreResult<Value> {
        let path = self.document_path(doc);
        read_json(&path)
            .await
            .map_err(|e| unavailable(doc, &path, e))
    }
}

fn unavailable(doc: ConfigDocument, path: &Path, err: StoreError) -> StoreError {
    let reason = match err {
        StoreError::NotFound(_) => format!("{} does not exist", path.display()),
        other => other.to_string(),
    };
    StoreError::ConfigUnavailable {
        name: doc.file_name().to_string(),
        reason,
    }
}

fn validate_document(document: &Value) -> StoreResult<()> {
    let map = document.as_object().ok_or_else(|| {
        StoreError::InvalidConfiguration("configuration must be a JSON object".to_string())
    })?;
    match map.get("config") {
        None => Ok(()),
        Some(Value::String(s)) => s.parse::<Particle>().map(|_| ()),
        Some(other) => Err(StoreError::InvalidConfiguration(format!(
            "config has to be positrons or antiprotons, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded() -> (TempDir, ConfigurationStore) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(CONFIGURATIONS_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("configuration.json"),
            r#"{"config": "positrons", "fit": true}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("default_config_positrons.json"),
            r#"{"config": "positrons", "fit": false, "channels": {"PDS": 1}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("default_config_antiprotons.json"),
            r#"{"config": "antiprotons", "fit": false}"#,
        )
        .unwrap();
        let store = ConfigurationStore::new(tmp.path());
        (tmp, store)
    }

    #[tokio::test]
    async fn test_get_configuration_combines_three_documents() {
        let (_tmp, store) = seeded();
        let bundle = store.get_configuration().await.unwrap();
        assert_eq!(bundle.config_data["fit"], json!(true));
        assert_eq!(bundle.config_pos["channels"]["PDS"], json!(1));
        assert_eq!(bundle.config_pbar["config"], json!("antiprotons"));
    }

    #[tokio::test]
    async fn test_post_then_get_round_trip() {
        let (_tmp, store) = seeded();
        let doc = json!({"config": "antiprotons", "fit": false, "gain": 2.5});
        store.post_configuration(&doc).await.unwrap();

        let bundle = store.get_configuration().await.unwrap();
        assert_eq!(bundle.config_data, doc);
        assert_eq!(bundle.config_pos["config"], json!("positrons"));
    }

    #[tokio::test]
    async fn test_missing_default_fails_whole_call() {
        let (tmp, store) = seeded();
        std::fs::remove_file(
            tmp.path()
                .join(CONFIGURATIONS_DIR)
                .join("default_config_antiprotons.json"),
        )
        .unwrap();
        let err = store.get_configuration().await.unwrap_err();
        match err {
            StoreError::ConfigUnavailable { name, .. } => {
                assert_eq!(name, "default_config_antiprotons.json")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_active_fails() {
        let (tmp, store) = seeded();
        std::fs::write(
            tmp.path().join(CONFIGURATIONS_DIR).join("configuration.json"),
            "{",
        )
        .unwrap();
        assert!(matches!(
            store.get_configuration().await,
            Err(StoreError::ConfigUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_post_rejects_bad_particle() {
        let (tmp, store) = seeded();
        let err = store
            .post_configuration(&json!({"config": "electrons"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfiguration(_)));
        assert!(store.post_configuration(&json!([1, 2])).await.is_err());

        // Previous document untouched.
        let text = std::fs::read_to_string(
            tmp.path().join(CONFIGURATIONS_DIR).join("configuration.json"),
        )
        .unwrap();
        assert!(text.contains("positrons"));
    }

    #[tokio::test]
    async fn test_post_is_pretty_printed() {
        let (tmp, store) = seeded();
        store.post_configuration(&json!({"fit": true})).await.unwrap();
        let text = std::fs::read_to_string(
            tmp.path().join(CONFIGURATIONS_DIR).join("configuration.json"),
        )
        .unwrap();
        assert_eq!(text, "{\n  \"fit\": true\n}\n");
    }

    #[tokio::test]
    async fn test_switch_particle_preserves_fit() {
        let (_tmp, store) = seeded();
        let doc = store.switch_particle(Particle::Antiprotons).await.unwrap();
        assert_eq!(doc, json!({"config": "antiprotons", "fit": true}));
        let bundle = store.get_configuration().await.unwrap();
        assert_eq!(bundle.config_data, doc);
    }

    #[tokio::test]
    async fn test_latest_marker() {
        let (tmp, store) = seeded();
        assert!(store.get_latest().await.unwrap_err().is_not_found());

        std::fs::write(
            tmp.path().join(CONFIGURATIONS_DIR).join("latest.json"),
            r#"{"latest": "2025-05-14_10-30-00", "particle": "positrons"}"#,
        )
        .unwrap();
        let marker = store.get_latest().await.unwrap();
        assert_eq!(marker.latest, "2025-05-14_10-30-00");
        assert_eq!(marker.particle.as_deref(), Some("positrons"));
    }
}
