use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field reference names used by the tracking service.
pub mod fields {
    pub const TITLE: &str = "System.Title";
    pub const STEPS: &str = "Microsoft.VSTS.TCM.Steps";
    pub const PRIORITY: &str = "Microsoft.VSTS.Common.Priority";
    pub const AUTOMATION_STATUS: &str = "Custom.AutomationStatus";
    pub const ITERATION_PATH: &str = "System.IterationPath";
    pub const TAGS: &str = "System.Tags";
    pub const PARAMETERS: &str = "Microsoft.VSTS.TCM.Parameters";
    pub const LOCAL_DATA_SOURCE: &str = "Microsoft.VSTS.TCM.LocalDataSource";
}

static WORK_ITEM_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)_apis/wit/workItems/(\d+)$").expect("work item url regex")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub rel: String,
    pub url: String,
}

/// A test case as fetched from the tracking service. Read-only input to
/// rendering; never cached across runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteWorkItem {
    pub id: u64,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl RemoteWorkItem {
    /// String view of a field; numbers are stringified, blanks are `None`.
    pub fn field_str(&self, name: &str) -> Option<String> {
        let value = match self.fields.get(name)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    pub fn title(&self) -> Option<String> {
        self.field_str(fields::TITLE)
    }

    pub fn steps_blob(&self) -> Option<String> {
        self.field_str(fields::STEPS)
    }

    pub fn priority(&self) -> Option<String> {
        self.field_str(fields::PRIORITY)
    }

    pub fn automation_status(&self) -> Option<String> {
        self.field_str(fields::AUTOMATION_STATUS)
    }

    pub fn iteration_path(&self) -> Option<String> {
        self.field_str(fields::ITERATION_PATH)
    }

    pub fn parameters(&self) -> Option<String> {
        self.field_str(fields::PARAMETERS)
    }

    pub fn data_source(&self) -> Option<String> {
        self.field_str(fields::LOCAL_DATA_SOURCE)
    }

    /// `System.Tags` is a `; `-separated list.
    pub fn system_tags(&self) -> Vec<String> {
        self.field_str(fields::TAGS)
            .map(|tags| {
                tags.split(';')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of related work items, taken from the trailing segment of each
    /// work-item relation URL. Attachments and hyperlinks are ignored.
    pub fn related_ids(&self) -> Vec<u64> {
        self.relations
            .iter()
            .filter_map(|r| WORK_ITEM_URL.captures(&r.url))
            .filter_map(|c| c[1].parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(fields: Value, relations: Vec<Relation>) -> RemoteWorkItem {
        RemoteWorkItem {
            id: 1,
            fields: fields.as_object().cloned().unwrap(),
            relations,
        }
    }

    #[test]
    fn field_str_stringifies_numbers_and_drops_blanks() {
        let wi = item(
            json!({"Microsoft.VSTS.Common.Priority": 2, "System.Title": "  "}),
            vec![],
        );
        assert_eq!(wi.priority().as_deref(), Some("2"));
        assert_eq!(wi.title(), None);
        assert_eq!(wi.steps_blob(), None);
    }

    #[test]
    fn system_tags_split_on_semicolons() {
        let wi = item(json!({"System.Tags": "smoke; regression;; api"}), vec![]);
        assert_eq!(wi.system_tags(), vec!["smoke", "regression", "api"]);
    }

    #[test]
    fn related_ids_only_from_work_item_urls() {
        let wi = item(
            json!({}),
            vec![
                Relation {
                    rel: "Microsoft.VSTS.Common.TestedBy-Reverse".into(),
                    url: "https://dev.azure.com/o/_apis/wit/workItems/321".into(),
                },
                Relation {
                    rel: "Hyperlink".into(),
                    url: "https://example.com/docs/12".into(),
                },
                Relation {
                    rel: "System.LinkTypes.Related".into(),
                    url: "https://dev.azure.com/o/p/_apis/wit/workitems/9".into(),
                },
            ],
        );
        assert_eq!(wi.related_ids(), vec![321, 9]);
    }

    #[test]
    fn deserializes_service_payload() {
        let payload = json!({
            "id": 42,
            "rev": 3,
            "fields": {"System.Title": "Checkout"},
            "relations": [{"rel": "Related", "url": "x/_apis/wit/workItems/7", "attributes": {}}]
        });
        let wi: RemoteWorkItem = serde_json::from_value(payload).unwrap();
        assert_eq!(wi.id, 42);
        assert_eq!(wi.title().as_deref(), Some("Checkout"));
        assert_eq!(wi.related_ids(), vec![7]);
    }
}
