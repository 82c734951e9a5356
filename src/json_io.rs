//! JSON file primitives used by every store.
//!
//! Documents are always written pretty-printed with 2-space indentation so
//! they stay diffable by hand. A write serialises the whole document into a
//! buffer, writes it to a sibling temp file and renames it over the target;
//! a failed write leaves the previous contents in place.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{StoreError, StoreResult};

/// Reads and deserialises a JSON file.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::from_io(path, e))?;
    serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`read_json`], but first turns bare `NaN` / `Infinity` /
/// `-Infinity` tokens into `null`. The analysis pipeline emits these for
/// failed fits.
pub async fn read_json_lenient<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::from_io(path, e))?;
    serde_json::from_str(&normalize_non_finite(&text)).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialises `value` and atomically replaces `path` with it.
///
/// With `create_dirs`, missing parent directories are created first.
pub async fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    create_dirs: bool,
) -> StoreResult<()> {
    let mut buf = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    buf.push(b'\n');

    if create_dirs {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(parent, e))?;
        }
    }

    let tmp = temp_sibling(path);
    if let Err(e) = tokio::fs::write(&tmp, &buf).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::from_io(path, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::from_io(path, e));
    }
    Ok(())
}

/// Writes `value` to `path` only if nothing exists there yet. Returns
/// `false`, leaving the file untouched, when another writer got there first.
pub async fn create_json_if_absent<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> StoreResult<bool> {
    let mut buf = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    buf.push(b'\n');

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::from_io(parent, e))?;
    }

    // The link appears with its full contents, and fails if the target exists.
    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, &buf)
        .await
        .map_err(|e| StoreError::from_io(&tmp, e))?;
    let linked = tokio::fs::hard_link(&tmp, path).await;
    let _ = tokio::fs::remove_file(&tmp).await;
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StoreError::from_io(path, e)),
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique per write, so concurrent requests never share a temp file.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
}

/// Replaces `NaN`, `Infinity` and `-Infinity` outside string literals with
/// `null`. Text without such tokens is returned borrowed.
pub fn normalize_non_finite(text: &str) -> Cow<'_, str> {
    if !text.contains("NaN") && !text.contains("Infinity") {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if let Some(len) = non_finite_token_len(&bytes[i..]) {
            let boundary_before = i == 0 || !is_ident_byte(bytes[i - 1]);
            let boundary_after = bytes.get(i + len).map_or(true, |&c| !is_ident_byte(c));
            if boundary_before && boundary_after {
                out.push_str("null");
                i += len;
                continue;
            }
        }
        // Push the whole UTF-8 sequence starting here.
        let ch_len = utf8_len(b);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }

    Cow::Owned(out)
}

fn non_finite_token_len(rest: &[u8]) -> Option<usize> {
    for token in [&b"-Infinity"[..], b"Infinity", b"NaN"] {
        if rest.starts_with(token) {
            return Some(token.len());
        }
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_normalize_replaces_bare_tokens() {
        let text = r#"{"a": NaN, "b": [Infinity, -Infinity, 1.5]}"#;
        let v: Value = serde_json::from_str(&normalize_non_finite(text)).unwrap();
        assert_eq!(v, json!({"a": null, "b": [null, null, 1.5]}));
    }

    #[test]
    fn test_normalize_leaves_strings_alone() {
        let text = r#"{"note": "fit gave NaN \" Infinity", "x": NaN}"#;
        let v: Value = serde_json::from_str(&normalize_non_finite(text)).unwrap();
        assert_eq!(v["note"], "fit gave NaN \" Infinity");
        assert_eq!(v["x"], Value::Null);
    }

    #[test]
    fn test_normalize_borrowed_when_clean() {
        let text = r#"{"peak": 0.25}"#;
        assert!(matches!(normalize_non_finite(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_keeps_non_ascii() {
        let text = r#"{"unit": "V·ns", "v": NaN}"#;
        assert_eq!(normalize_non_finite(text), r#"{"unit": "V·ns", "v": null}"#);
    }

    #[tokio::test]
    async fn test_create_if_absent_never_replaces() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("day/JSON/comments.json");
        assert!(create_json_if_absent(&path, &json!({})).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");

        std::fs::write(&path, r#"{"data-2025-05-14_10-30-00.json": "kept"}"#).unwrap();
        assert!(!create_json_if_absent(&path, &json!({})).await.unwrap());
        let v: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["data-2025-05-14_10-30-00.json"], "kept");
    }

    #[tokio::test]
    async fn test_write_is_pretty_and_creates_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/doc.json");
        write_json(&path, &json!({"k": {"n": 1}}), true).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"k\": {\n    \"n\": 1\n  }\n}\n");

        let back: Value = read_json(&path).await.unwrap();
        assert_eq!(back, json!({"k": {"n": 1}}));
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_write_without_dirs_fails_and_reports() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing/doc.json");
        let err = write_json(&path, &json!({}), false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json::<Value>(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
