use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Polls one script file and hands back its text whenever the content
/// changes. Change detection is by SHA-256 of the bytes, so touching a file
/// without editing it does not reload.
#[derive(Debug)]
pub struct ScriptWatcher {
    path: PathBuf,
    interval: Duration,
    last_poll: Option<Instant>,
    fingerprint: Option<String>,
}

impl ScriptWatcher {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            last_poll: None,
            fingerprint: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Reads the file unconditionally and records its fingerprint.
    pub fn read_now(&mut self) -> Result<String, WatchError> {
        let text = self.read()?;
        self.fingerprint = Some(fingerprint(&text));
        Ok(text)
    }

    /// `Some(text)` when at least `interval` has passed since the last poll
    /// and the content differs from what was last seen.
    pub fn poll(&mut self, now: Instant) -> Result<Option<String>, WatchError> {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.interval {
                return Ok(None);
            }
        }
        self.last_poll = Some(now);

        let text = self.read()?;
        let next = fingerprint(&text);
        if self.fingerprint.as_deref() == Some(next.as_str()) {
            return Ok(None);
        }
        self.fingerprint = Some(next);
        Ok(Some(text))
    }

    fn read(&self) -> Result<String, WatchError> {
        fs::read_to_string(&self.path).map_err(|source| WatchError::Read {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn fingerprint(text: &str) -> String {
    to_hex_lower(&Sha256::digest(text.as_bytes()))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
