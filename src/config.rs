use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::DocumentKind;
use crate::error::ConfigError;
use crate::tags::{TagCategory, TagVocabulary};

pub const CONFIG_FILE_NAME: &str = "sync_config.toml";
pub const CONFIG_ENV: &str = "TESTSYNC_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root folder of the local test corpus.
    pub path: String,
    #[serde(default)]
    pub format: DocumentKind,
    /// File (relative to `path`) that pulled test cases are appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    pub credentials: Credentials,
    #[serde(default)]
    pub tag_config: TagConfig,
    #[serde(default)]
    pub constants: Constants,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub personal_access_token: String,
    pub organization_name: String,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Credentials {
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://dev.azure.com/{}/{}",
                self.organization_name, self.project_name
            ),
        }
    }
}

/// Literal prefixes used in local tag lines for each tag category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub test_case: String,
    pub user_story: String,
    pub bug: String,
    pub title: String,
    pub outline_title: String,
    pub automation_status: String,
    pub iteration_path: String,
    pub priority: String,
    pub system_tags: String,
    pub ignore_sync: String,
    pub tested_by_reverse: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            test_case: "TestCase".into(),
            user_story: "UserStory".into(),
            bug: "Bug".into(),
            title: "Title".into(),
            outline_title: "Scenario Outline".into(),
            automation_status: "Automation_Status".into(),
            iteration_path: "Sprint".into(),
            priority: "Priority".into(),
            system_tags: "Tag".into(),
            ignore_sync: "Ignore_Sync".into(),
            tested_by_reverse: "Microsoft.VSTS.Common.TestedBy-Reverse".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    /// Prefix joined with iteration-path tag values on push, stripped on pull.
    pub iteration_root: String,
    /// Area path scoping the WIQL catalog query when no test plan is set.
    pub area_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_plan_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_cases_section: Option<String>,
    /// Wrap pushed step text in bold markup.
    pub bold_steps: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: "robot".into(),
            args: vec!["--include".into(), "Automation_Status Automated".into()],
        }
    }
}

impl SyncConfig {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    pub fn output_path(&self) -> PathBuf {
        let name = self
            .output_file
            .clone()
            .unwrap_or_else(|| format!("todo_organize.{}", self.format.extension()));
        self.root().join(name)
    }

    pub fn settings_section(&self) -> &str {
        self.constants
            .settings_section
            .as_deref()
            .unwrap_or_else(|| self.format.default_settings_section())
    }

    pub fn test_cases_section(&self) -> &str {
        self.constants
            .test_cases_section
            .as_deref()
            .unwrap_or_else(|| self.format.default_test_cases_section())
    }

    pub fn vocabulary(&self) -> TagVocabulary {
        let t = &self.tag_config;
        TagVocabulary::new(vec![
            (TagCategory::TestCase, t.test_case.clone()),
            (TagCategory::AutomationStatus, t.automation_status.clone()),
            (TagCategory::Priority, t.priority.clone()),
            (TagCategory::IterationPath, t.iteration_path.clone()),
            (TagCategory::SystemTag, t.system_tags.clone()),
            (TagCategory::UserStory, t.user_story.clone()),
            (TagCategory::Bug, t.bug.clone()),
            (TagCategory::IgnoreSync, t.ignore_sync.clone()),
        ])
        .with_style(self.format.tag_style())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.trim().is_empty() {
            return Err(ConfigError::Invalid("`path` must not be empty".into()));
        }
        if self.tag_config.test_case.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "`tag_config.test_case` must not be empty".into(),
            ));
        }
        if self.tag_config.title.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "`tag_config.title` must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
impl SyncConfig {
    /// Config rooted at `path`. Feature configs use gherkin-style prefixes.
    pub(crate) fn for_tests(path: &Path, format: DocumentKind) -> Self {
        let mut tag_config = TagConfig::default();
        if format == DocumentKind::Feature {
            tag_config.test_case = "@tc".into();
            tag_config.user_story = "@story".into();
            tag_config.bug = "@bug".into();
            tag_config.title = "Scenario".into();
            tag_config.automation_status = "@automation".into();
            tag_config.priority = "@priority".into();
            tag_config.iteration_path = "@sprint".into();
            tag_config.system_tags = "@tag".into();
            tag_config.ignore_sync = "@ignore".into();
        }
        Self {
            path: path.display().to_string(),
            format,
            output_file: None,
            credentials: Credentials {
                personal_access_token: "pat".into(),
                organization_name: "acme".into(),
                project_name: "Shop".into(),
                base_url: None,
            },
            tag_config,
            constants: Constants {
                iteration_root: "Shop\\".into(),
                ..Constants::default()
            },
            runner: RunnerConfig::default(),
        }
    }
}

fn global_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".testsync")
        .join("config.toml")
}

/// Candidate config locations, most specific first.
pub fn config_candidates() -> Vec<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return vec![PathBuf::from(trimmed)];
        }
    }
    vec![PathBuf::from(CONFIG_FILE_NAME), global_config_path()]
}

pub fn find_config() -> Option<PathBuf> {
    config_candidates().into_iter().find(|p| p.is_file())
}

pub fn load_config() -> Result<SyncConfig, ConfigError> {
    let Some(path) = find_config() else {
        let looked = config_candidates()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ConfigError::Missing(looked));
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: SyncConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &SyncConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
