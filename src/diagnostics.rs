//! Build diagnostic log
//!
//! Every stage's output is appended, in stage order, to one text file that
//! is truncated when the build starts. After a failure the log is scanned
//! for known failure signatures to produce targeted remediation advice.

use crate::error::{KilnError, KilnResult};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only diagnostic log for one build
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl DiagnosticLog {
    /// Create the log, truncating any previous build's contents
    pub async fn create(path: &Path) -> KilnResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KilnError::io(format!("creating {}", parent.display()), e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| KilnError::io(format!("opening log {}", path.display()), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line
    pub async fn line(&self, text: &str) -> KilnResult<()> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| KilnError::io(format!("writing log {}", self.path.display()), e))
    }

    /// Append a stage header
    pub async fn section(&self, title: &str) -> KilnResult<()> {
        self.line(&format!("-----> {}", title)).await
    }

    /// Flush buffered output to disk
    pub async fn flush(&self) -> KilnResult<()> {
        let mut file = self.file.lock().await;
        file.flush()
            .await
            .map_err(|e| KilnError::io(format!("flushing log {}", self.path.display()), e))
    }

    /// Read back everything written so far
    pub async fn contents(&self) -> KilnResult<String> {
        self.flush().await?;
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| KilnError::io(format!("reading log {}", self.path.display()), e))
    }
}

/// Marker written when a dependency directory was submitted with the source
pub const CHECKED_IN_MARKER: &str = "dependency directory checked into source control";

/// A known failure signature and its advice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remedy {
    /// Short name of the failure class
    pub title: &'static str,
    /// What the user should do
    pub advice: &'static str,
}

struct FailureSignature {
    needles: &'static [&'static str],
    remedy: Remedy,
}

const FAILURE_SIGNATURES: &[FailureSignature] = &[
    FailureSignature {
        needles: &[CHECKED_IN_MARKER],
        remedy: Remedy {
            title: "Dependencies checked into source control",
            advice: "Add the dependency directory to .gitignore and remove it from the \
                     repository so dependencies are installed for the build platform",
        },
    },
    FailureSignature {
        needles: &["No matching version found for node", "Unsupported engine", "EBADENGINE"],
        remedy: Remedy {
            title: "Unsatisfiable engines range",
            advice: "Declare a released toolchain version in package.json engines, \
                     e.g. \"node\": \"20.x\"",
        },
    },
    FailureSignature {
        needles: &["ETARGET", "404 Not Found"],
        remedy: Remedy {
            title: "Missing dependency version",
            advice: "A dependency version in package.json does not exist in the registry; \
                     check for typos or unpublished packages",
        },
    },
];

/// Scan a log for known failure signatures
pub fn diagnose(log: &str) -> Vec<Remedy> {
    FAILURE_SIGNATURES
        .iter()
        .filter(|sig| sig.needles.iter().any(|n| log.contains(n)))
        .map(|sig| sig.remedy)
        .collect()
}
