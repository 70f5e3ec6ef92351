pub mod patch;
pub mod push;
pub mod reconcile;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SyncConfig;
use crate::document::parser::{self, ParsedDocument};
use crate::document::{self, Layout};

/// One parsed file of the local corpus.
#[derive(Debug, Clone)]
pub struct LocalDocument {
    pub path: PathBuf,
    pub parsed: ParsedDocument,
}

/// Reads and parses every document of the configured format under the root.
pub fn load_corpus(config: &SyncConfig) -> Result<Vec<LocalDocument>> {
    let root = config.root();
    let layout = Layout::from_config(config);
    let files = document::scan_corpus(&root, layout.kind)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    files
        .into_iter()
        .map(|path| {
            let text = read_document(&path)?;
            let parsed = parser::parse(&text, &layout);
            Ok(LocalDocument { path, parsed })
        })
        .collect()
}

pub(crate) fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    pub started_at: DateTime<Utc>,
    pub catalog_size: usize,
    pub local_size: usize,
    pub pulled: Vec<u64>,
    pub failed: Vec<u64>,
    /// Set when the output document was written.
    pub written: Option<PathBuf>,
}

impl PullReport {
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            catalog_size: 0,
            local_size: 0,
            pulled: Vec::new(),
            failed: Vec::new(),
            written: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub started_at: DateTime<Utc>,
    pub patched: Vec<u64>,
    pub ignored: usize,
    /// Records without a usable id or title.
    pub skipped: usize,
    pub failed: Vec<u64>,
}

impl PushReport {
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            patched: Vec::new(),
            ignored: 0,
            skipped: 0,
            failed: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentKind;

    #[test]
    fn corpus_only_reads_the_configured_format() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.robot"),
            "*** Test Cases ***\nTitle: One\n    [tags]    TestCase 1\n    Log    x\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.feature"),
            "Feature: B\n  Scenario: Two\n    Given x\n",
        )
        .unwrap();

        let config = SyncConfig::for_tests(dir.path(), DocumentKind::Robot);
        let corpus = load_corpus(&config).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].path, dir.path().join("a.robot"));
        assert_eq!(corpus[0].parsed.records[0].title, "One");
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::for_tests(&dir.path().join("gone"), DocumentKind::Robot);
        let err = load_corpus(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to scan"));
    }
}
