use serde::Serialize;
use serde_json::{json, Value};

use crate::document::DocumentKind;
use crate::error::PatchError;
use crate::model::test_case::TestCaseRecord;
use crate::model::work_item::fields;
use crate::tags::{from_tag_value, TagCategory, TagSet, TagVocabulary};
use crate::util::{data_source, rich_text};

const RELATION_COMMENT: &str = "Associated test case with work item";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Replace,
    Add,
}

/// One JSON-patch operation against a work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOp {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl FieldOp {
    pub fn replace(field: &str, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: format!("/fields/{field}"),
            value: value.into(),
        }
    }

    pub fn add_relation(rel: &str, url: String) -> Self {
        Self {
            op: PatchOp::Add,
            path: "/relations/-".into(),
            value: json!({
                "rel": rel,
                "url": url,
                "attributes": { "comment": RELATION_COMMENT },
            }),
        }
    }
}

/// Inputs shared by every record of a push run.
#[derive(Debug, Clone, Copy)]
pub struct PatchContext<'a> {
    pub vocabulary: &'a TagVocabulary,
    pub kind: DocumentKind,
    /// Suite-level tags of the record's document, `; `-joined.
    pub suite_tags: Option<&'a str>,
    pub iteration_root: &'a str,
    /// Project base URL used to build relation targets.
    pub base_url: &'a str,
    pub relation_kind: &'a str,
    pub bold_steps: bool,
}

/// Story and bug ids referenced by a record's tags, in tag order.
pub fn linked_ids(tags: &TagSet, vocabulary: &TagVocabulary) -> Vec<u64> {
    let mut ids = Vec::new();
    let stories = vocabulary.ids(tags, TagCategory::UserStory);
    let bugs = vocabulary.ids(tags, TagCategory::Bug);
    for id in stories.into_iter().chain(bugs) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn join_iteration(root: &str, value: &str) -> String {
    let value = from_tag_value(value);
    if root.is_empty() || root.ends_with('\\') {
        format!("{root}{value}")
    } else {
        format!("{root}\\{value}")
    }
}

fn system_tags(tags: &TagSet, ctx: &PatchContext<'_>) -> String {
    let mut all: Vec<String> = Vec::new();
    let suite = ctx
        .suite_tags
        .into_iter()
        .flat_map(|s| s.split(';'))
        .map(|t| t.trim().to_string());
    let own = ctx
        .vocabulary
        .values(tags, TagCategory::SystemTag)
        .iter()
        .map(|t| from_tag_value(t));
    for tag in suite.chain(own) {
        if !tag.is_empty() && !all.contains(&tag) {
            all.push(tag);
        }
    }
    all.join("; ")
}

/// Builds the update for one record. Empty values are left out entirely so
/// the service never receives a replace-to-empty.
pub fn build(
    record: &TestCaseRecord,
    linked_ids: &[u64],
    ctx: &PatchContext<'_>,
) -> Result<Vec<FieldOp>, PatchError> {
    let title = record.title.trim();
    if title.is_empty() {
        return Err(PatchError::MissingTitle);
    }
    let vocab = ctx.vocabulary;
    let tags = vocab.parse(&record.tag_line);
    let mut ops = vec![FieldOp::replace(fields::TITLE, title)];

    if !record.steps.is_empty() {
        let steps: Vec<String> = match ctx.kind {
            DocumentKind::Feature => record
                .steps
                .iter()
                .map(|s| data_source::placeholders_to_params(s))
                .collect(),
            DocumentKind::Robot => record.steps.clone(),
        };
        ops.push(FieldOp::replace(
            fields::STEPS,
            rich_text::encode(&steps, ctx.bold_steps),
        ));
    }

    let system = system_tags(&tags, ctx);
    if !system.is_empty() {
        ops.push(FieldOp::replace(fields::TAGS, system));
    }

    if let Some(status) = vocab.first_value(&tags, TagCategory::AutomationStatus) {
        ops.push(FieldOp::replace(
            fields::AUTOMATION_STATUS,
            from_tag_value(&status),
        ));
    }

    if let Some(priority) = vocab.first_value(&tags, TagCategory::Priority) {
        let value = match priority.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(priority),
        };
        ops.push(FieldOp::replace(fields::PRIORITY, value));
    }

    if let Some(sprint) = vocab.first_value(&tags, TagCategory::IterationPath) {
        ops.push(FieldOp::replace(
            fields::ITERATION_PATH,
            join_iteration(ctx.iteration_root, &sprint),
        ));
    }

    let rows = record.example_rows();
    if let Some((header, data)) = rows.split_first() {
        if !header.is_empty() {
            ops.push(FieldOp::replace(
                fields::PARAMETERS,
                data_source::encode_parameters(header),
            ));
            ops.push(FieldOp::replace(
                fields::LOCAL_DATA_SOURCE,
                data_source::encode_data_source(header, data),
            ));
        }
    }

    for id in linked_ids {
        ops.push(FieldOp::add_relation(
            ctx.relation_kind,
            format!("{}/_apis/wit/workitems/{id}", ctx.base_url),
        ));
    }

    Ok(ops)
}
