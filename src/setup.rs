use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::config::{Constants, Credentials, RunnerConfig, SyncConfig, TagConfig};
use crate::document::DocumentKind;

struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read answer")?;
        Ok((read > 0).then(|| line.trim().to_string()))
    }

    /// Prompts once; an empty answer takes `default`.
    fn ask(&mut self, label: &str, default: &str) -> Result<String> {
        if default.is_empty() {
            write!(self.output, "{label}: ")?;
        } else {
            write!(self.output, "{label} [{default}]: ")?;
        }
        self.output.flush()?;
        let answer = self.read_line()?.unwrap_or_default();
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    /// Prompts until a non-empty answer is given.
    fn ask_required(&mut self, label: &str) -> Result<String> {
        loop {
            write!(self.output, "{label}: ")?;
            self.output.flush()?;
            match self.read_line()? {
                Some(answer) if !answer.is_empty() => return Ok(answer),
                Some(_) => writeln!(self.output, "  a value is required")?,
                None => bail!("Setup aborted: no answer for '{label}'"),
            }
        }
    }
}

/// Asks for every configuration value and returns the resulting config.
pub fn run_setup<R: BufRead, W: Write>(input: R, output: W) -> Result<SyncConfig> {
    let mut p = Prompter { input, output };
    writeln!(p.output, "No configuration found, let's create one.\n")?;

    let format = match p.ask("Test format (robot/feature)", "robot")?.to_lowercase().as_str() {
        "robot" => DocumentKind::Robot,
        "feature" | "gherkin" => DocumentKind::Feature,
        other => bail!("Unknown test format '{other}', expected robot or feature"),
    };
    let path = p.ask("Folder with the tests to synchronize", "tests")?;

    let personal_access_token = p.ask_required("Personal access token with work item read/write")?;
    let organization_name = p.ask_required("Organization (after https://dev.azure.com/)")?;
    let project_name = p.ask_required(&format!(
        "Project (after https://dev.azure.com/{organization_name}/)"
    ))?;

    let defaults = TagConfig::default();
    let (tc, story, title) = match format {
        DocumentKind::Robot => (
            defaults.test_case.as_str(),
            defaults.user_story.as_str(),
            defaults.title.as_str(),
        ),
        DocumentKind::Feature => ("@tc", "@story", "Scenario"),
    };
    let tag_config = TagConfig {
        test_case: p.ask("Tag prefix for the test case id", tc)?,
        user_story: p.ask("Tag prefix for linked user stories", story)?,
        bug: p.ask("Tag prefix for linked bugs", &defaults.bug)?,
        title: p.ask("Marker that starts a test case", title)?,
        outline_title: defaults.outline_title.clone(),
        automation_status: p.ask("Tag prefix for automation status", &defaults.automation_status)?,
        iteration_path: p.ask("Tag prefix for the iteration path", &defaults.iteration_path)?,
        priority: p.ask("Tag prefix for priority", &defaults.priority)?,
        system_tags: p.ask("Tag prefix for work item tags", &defaults.system_tags)?,
        ignore_sync: p.ask("Tag that excludes a test case from sync", &defaults.ignore_sync)?,
        tested_by_reverse: p.ask("Relation type for linked items", &defaults.tested_by_reverse)?,
    };

    let test_plan_id = p.ask("Test plan id (empty to query by area path)", "")?;
    let test_plan_id = if test_plan_id.is_empty() {
        None
    } else {
        Some(
            test_plan_id
                .parse()
                .with_context(|| format!("Test plan id '{test_plan_id}' is not a number"))?,
        )
    };
    let area_path = if test_plan_id.is_none() {
        p.ask("Area path of the test cases", &project_name)?
    } else {
        String::new()
    };
    let iteration_root = p.ask("Iteration path root", &format!("{project_name}\\"))?;

    writeln!(p.output)?;
    Ok(SyncConfig {
        path,
        format,
        output_file: None,
        credentials: Credentials {
            personal_access_token,
            organization_name,
            project_name,
            base_url: None,
        },
        tag_config,
        constants: Constants {
            iteration_root,
            area_path,
            test_plan_id,
            ..Constants::default()
        },
        runner: RunnerConfig::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answers(lines: &[&str]) -> Cursor<Vec<u8>> {
        Cursor::new(format!("{}\n", lines.join("\n")).into_bytes())
    }

    #[test]
    fn defaults_fill_blank_answers() {
        let mut out = Vec::new();
        // format, path, pat, org, project, 10 tag prompts, plan, area, root
        let mut input = vec!["", "", "secret", "acme", "Shop"];
        input.extend([""; 10]);
        input.extend(["", "", ""]);

        let config = run_setup(answers(&input), &mut out).unwrap();

        assert_eq!(config.format, DocumentKind::Robot);
        assert_eq!(config.path, "tests");
        assert_eq!(config.credentials.personal_access_token, "secret");
        assert_eq!(config.tag_config.test_case, "TestCase");
        assert_eq!(config.constants.test_plan_id, None);
        assert_eq!(config.constants.area_path, "Shop");
        assert_eq!(config.constants.iteration_root, "Shop\\");

        let prompts = String::from_utf8(out).unwrap();
        assert!(prompts.contains("Project (after https://dev.azure.com/acme/)"));
        assert!(prompts.contains("Tag prefix for priority [Priority]: "));
    }

    #[test]
    fn feature_format_uses_gherkin_defaults() {
        let mut input = vec!["feature", "specs", "secret", "acme", "Shop"];
        input.extend([""; 10]);
        input.extend(["12", "Shop\\"]);

        let config = run_setup(answers(&input), Vec::new()).unwrap();
        assert_eq!(config.format, DocumentKind::Feature);
        assert_eq!(config.tag_config.test_case, "@tc");
        assert_eq!(config.tag_config.title, "Scenario");
        assert_eq!(config.constants.test_plan_id, Some(12));
        assert_eq!(config.constants.area_path, "");
    }

    #[test]
    fn required_value_is_asked_again() {
        let mut input = vec!["", "", "", "secret", "acme", "Shop"];
        input.extend([""; 13]);
        let mut out = Vec::new();
        let config = run_setup(answers(&input), &mut out).unwrap();
        assert_eq!(config.credentials.personal_access_token, "secret");
        assert!(String::from_utf8(out).unwrap().contains("a value is required"));
    }

    #[test]
    fn eof_on_required_value_aborts() {
        let err = run_setup(answers(&["", ""]), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Setup aborted"));
    }

    #[test]
    fn bad_plan_id_is_rejected() {
        let mut input = vec!["", "", "secret", "acme", "Shop"];
        input.extend([""; 10]);
        input.push("plan-one");
        let err = run_setup(answers(&input), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }
}
