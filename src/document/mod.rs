pub mod parser;
pub mod render;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::tags::{TagStyle, TagVocabulary};

/// Local test-authoring format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Tabular test scripts with `*** Settings ***` / `*** Test Cases ***`.
    #[default]
    Robot,
    /// Gherkin feature files with `@` tag lines.
    Feature,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Robot, DocumentKind::Feature];

    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Robot => "robot",
            DocumentKind::Feature => "feature",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL.into_iter().find(|k| k.extension() == ext)
    }

    pub fn tag_style(self) -> TagStyle {
        match self {
            DocumentKind::Robot => TagStyle::Spaced,
            DocumentKind::Feature => TagStyle::Colon,
        }
    }

    pub fn default_settings_section(self) -> &'static str {
        match self {
            DocumentKind::Robot => "*** Settings ***\n",
            DocumentKind::Feature => "# language: en\n",
        }
    }

    pub fn default_test_cases_section(self) -> &'static str {
        match self {
            DocumentKind::Robot => "*** Test Cases ***\n",
            DocumentKind::Feature => "Feature: Synchronized test cases\n",
        }
    }
}

/// Everything needed to read or write one kind of local document.
#[derive(Debug, Clone)]
pub struct Layout {
    pub kind: DocumentKind,
    pub title_marker: String,
    pub outline_marker: String,
    pub settings_section: String,
    pub test_cases_section: String,
    pub iteration_root: String,
    pub vocabulary: TagVocabulary,
}

impl Layout {
    pub fn from_config(config: &SyncConfig) -> Self {
        let kind = config.format;
        Self {
            kind,
            title_marker: config.tag_config.title.clone(),
            outline_marker: config.tag_config.outline_title.clone(),
            settings_section: config.settings_section().to_string(),
            test_cases_section: config.test_cases_section().to_string(),
            iteration_root: config.constants.iteration_root.clone(),
            vocabulary: config.vocabulary(),
        }
    }

    pub fn structural_header(&self) -> String {
        format!("{}{}", self.settings_section, self.test_cases_section)
    }
}

/// All documents of `kind` under `root`, sorted for a stable walk order.
pub fn scan_corpus(root: &Path, kind: DocumentKind) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if DocumentKind::from_path(&path) == Some(kind) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}
