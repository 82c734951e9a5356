//! Re-analysis trigger.
//!
//! Runs the external analysis script on one acquisition:
//!
//! ```text
//! <python> <script> --json <filename> --dir <root/YYYY/MM/DD> --verbose
//! ```
//!
//! The call waits for the process to exit. Exit code 0 is success; anything
//! else (or a failure to spawn) is an `UpstreamProcessFailure` carrying the
//! tail of stderr.

use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::paths::PathResolver;

/// Keep at most this many bytes of stderr in the error.
const STDERR_TAIL: usize = 2048;

#[derive(Debug, Clone)]
pub struct Reanalyser {
    python: PathBuf,
    script: PathBuf,
}

impl Reanalyser {
    pub fn new(python: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script: script.into(),
        }
    }

    /// Command line for `filename`, without spawning it.
    pub fn command_args(&self, resolver: &PathResolver, filename: &str) -> StoreResult<Vec<String>> {
        let acq = codec::parse_acquisition(filename)?;
        let dir = resolver.day_dir(&acq.date_key());
        Ok(vec![
            self.script.to_string_lossy().to_string(),
            "--json".to_string(),
            acq.as_str().to_string(),
            "--dir".to_string(),
            dir.to_string_lossy().to_string(),
            "--verbose".to_string(),
        ])
    }

    pub async fn run(&self, resolver: &PathResolver, filename: &str) -> StoreResult<()> {
        let args = self.command_args(resolver, filename)?;
        info!(python = %self.python.display(), ?args, "starting re-analysis");

        let output = Command::new(&self.python)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StoreError::UpstreamProcessFailure {
                status: "spawn failed".to_string(),
                stderr: format!("{}: {}", self.python.display(), e),
            })?;

        debug!(stdout = %String::from_utf8_lossy(&output.stdout), "re-analysis output");
        if output.status.success() {
            info!(filename, "re-analysis finished");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = tail_chars(stderr.trim(), STDERR_TAIL);
        warn!(filename, status = %output.status, "re-analysis failed");
        Err(StoreError::UpstreamProcessFailure {
            status: output.status.to_string(),
            stderr: tail.to_string(),
        })
    }
}

fn tail_chars(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut start = s.len() - max_bytes;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
