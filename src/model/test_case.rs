use serde::{Deserialize, Serialize};

/// One test case as written in a local document. Built by the document
/// parser and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseRecord {
    pub title: String,
    /// Raw, unparsed tag text.
    #[serde(default)]
    pub tag_line: String,
    /// Plain-text action lines in execution order.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Gherkin `Examples:` table rows (`| a | b |`), header first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl TestCaseRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Cells of each examples row, header row first.
    pub fn example_rows(&self) -> Vec<Vec<String>> {
        self.examples
            .iter()
            .map(|row| row.trim())
            .filter(|row| row.starts_with('|'))
            .map(|row| {
                row.trim_matches('|')
                    .split('|')
                    .map(|cell| cell.trim().to_string())
                    .collect()
            })
            .collect()
    }
}

/// One step decoded from the service's rich-text steps field. The local
/// formats only carry the action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPair {
    pub action: String,
    pub expected_result: String,
}

impl StepPair {
    pub fn new(action: impl Into<String>, expected_result: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            expected_result: expected_result.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_rows_split_cells() {
        let mut record = TestCaseRecord::new("Login");
        record.examples = vec![
            "Examples:".into(),
            "| user | password |".into(),
            "| ana  | secret   |".into(),
            "| bob  |          |".into(),
        ];
        assert_eq!(
            record.example_rows(),
            vec![
                vec!["user".to_string(), "password".to_string()],
                vec!["ana".to_string(), "secret".to_string()],
                vec!["bob".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn record_without_examples_has_no_rows() {
        assert!(TestCaseRecord::new("x").example_rows().is_empty());
    }
}
