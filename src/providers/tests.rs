use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use super::{CatalogScope, TestCaseService};
use crate::config::SyncConfig;
use crate::document::DocumentKind;
use crate::error::TransportError;
use crate::model::work_item::{Relation, RemoteWorkItem};
use crate::sync::patch::{FieldOp, PatchOp};
use crate::sync::{push, reconcile};
use crate::util::rich_text;

/// A mock service that records fetch and patch calls for testing.
#[derive(Default)]
struct MockService {
    catalog: BTreeSet<u64>,
    items: HashMap<u64, RemoteWorkItem>,
    failing: HashSet<u64>,
    catalog_fails: bool,
    fetched: Arc<Mutex<Vec<Vec<u64>>>>,
    patched: Arc<Mutex<Vec<(u64, Vec<FieldOp>)>>>,
}

impl MockService {
    fn with_catalog(mut self, ids: &[u64]) -> Self {
        self.catalog = ids.iter().copied().collect();
        self
    }

    fn with_item(mut self, item: RemoteWorkItem) -> Self {
        self.items.insert(item.id, item);
        self
    }

    fn failing_on(mut self, id: u64) -> Self {
        self.failing.insert(id);
        self
    }

    fn status_error(id: u64) -> TransportError {
        TransportError::Status {
            url: format!("mock/{id}"),
            status: 500,
            body: "boom".into(),
        }
    }
}

#[async_trait]
impl TestCaseService for MockService {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn list_catalog(&self, _scope: &CatalogScope) -> Result<BTreeSet<u64>, TransportError> {
        if self.catalog_fails {
            return Err(TransportError::Shape {
                url: "mock/catalog".into(),
                reason: "no workItems".into(),
            });
        }
        Ok(self.catalog.clone())
    }

    async fn fetch(&self, ids: &[u64]) -> Result<Vec<RemoteWorkItem>, TransportError> {
        self.fetched.lock().unwrap().push(ids.to_vec());
        if let Some(id) = ids.iter().find(|id| self.failing.contains(id)) {
            return Err(Self::status_error(*id));
        }
        Ok(ids.iter().filter_map(|id| self.items.get(id).cloned()).collect())
    }

    async fn patch(&self, id: u64, ops: &[FieldOp]) -> Result<(), TransportError> {
        if self.failing.contains(&id) {
            return Err(Self::status_error(id));
        }
        self.patched.lock().unwrap().push((id, ops.to_vec()));
        Ok(())
    }
}

fn work_item(id: u64, fields: Value) -> RemoteWorkItem {
    RemoteWorkItem {
        id,
        fields: fields.as_object().cloned().unwrap(),
        relations: vec![],
    }
}

fn refund_item() -> RemoteWorkItem {
    work_item(
        99,
        json!({
            "System.Title": "Refund",
            "Microsoft.VSTS.TCM.Steps": rich_text::encode(&["Open Orders".into(), "Click    Refund".into()], false),
        }),
    )
}

const OUTPUT_DOC: &str = "\
*** Settings ***
*** Test Cases ***
Title: Pay
    [tags]    TestCase 42
    Log    paid
";

fn robot_config(root: &Path) -> SyncConfig {
    SyncConfig::for_tests(root, DocumentKind::Robot)
}

#[tokio::test]
async fn pull_fetches_only_missing_ids_and_keeps_existing_content() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    std::fs::write(config.output_path(), OUTPUT_DOC).unwrap();

    let service = MockService::default()
        .with_catalog(&[42, 99])
        .with_item(refund_item());
    let fetched = service.fetched.clone();

    let report = reconcile::pull(&service, &config).await.unwrap();

    assert_eq!(fetched.lock().unwrap().as_slice(), &[vec![99]]);
    assert_eq!(report.pulled, vec![99]);
    assert_eq!(report.catalog_size, 2);
    assert_eq!(report.local_size, 1);

    let written = std::fs::read_to_string(config.output_path()).unwrap();
    assert_eq!(
        written,
        format!(
            "{OUTPUT_DOC}Title: Refund\n    [tags]    TestCase 99\n    Open Orders\n    Click    Refund\n\n"
        )
    );
}

#[tokio::test]
async fn second_pull_leaves_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    let service = MockService::default()
        .with_catalog(&[42, 99])
        .with_item(work_item(42, json!({"System.Title": "Pay"})))
        .with_item(refund_item());

    reconcile::pull(&service, &config).await.unwrap();
    let first = std::fs::read(config.output_path()).unwrap();
    assert!(String::from_utf8_lossy(&first).starts_with("*** Settings ***\n*** Test Cases ***\n"));

    let report = reconcile::pull(&service, &config).await.unwrap();
    assert!(report.pulled.is_empty());
    assert!(report.written.is_none());
    assert_eq!(std::fs::read(config.output_path()).unwrap(), first);
    assert_eq!(service.fetched.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn compact_section_header_keeps_existing_records_visible() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    let existing = "***Test Cases***\n Title: Pay\n    [tags]    TestCase 42\n";
    std::fs::write(config.output_path(), existing).unwrap();
    let service = MockService::default()
        .with_catalog(&[42, 99])
        .with_item(refund_item());

    let report = reconcile::pull(&service, &config).await.unwrap();
    assert_eq!(report.pulled, vec![99]);
    let first = std::fs::read_to_string(config.output_path()).unwrap();
    assert!(first.starts_with(existing));
    assert_eq!(first.matches("Test Cases").count(), 1);

    let again = reconcile::pull(&service, &config).await.unwrap();
    assert!(again.pulled.is_empty());
    assert_eq!(std::fs::read_to_string(config.output_path()).unwrap(), first);
}

#[tokio::test]
async fn pull_with_nothing_new_does_not_create_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    let service = MockService::default();

    let report = reconcile::pull(&service, &config).await.unwrap();
    assert!(report.written.is_none());
    assert!(!config.output_path().exists());
}

#[tokio::test]
async fn failed_fetch_skips_only_that_id() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    let service = MockService::default()
        .with_catalog(&[7, 99])
        .with_item(refund_item())
        .failing_on(7);

    let report = reconcile::pull(&service, &config).await.unwrap();
    assert_eq!(report.failed, vec![7]);
    assert_eq!(report.pulled, vec![99]);
    let written = std::fs::read_to_string(config.output_path()).unwrap();
    assert!(written.contains("TestCase 99"));
    assert!(!written.contains("TestCase 7"));
}

#[tokio::test]
async fn catalog_failure_aborts_pull() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    let service = MockService {
        catalog_fails: true,
        ..MockService::default()
    };

    let err = reconcile::pull(&service, &config).await.unwrap_err();
    assert!(err.to_string().contains("Failed to list test cases from Mock"));
}

#[tokio::test]
async fn feature_pull_writes_gherkin() {
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig::for_tests(dir.path(), DocumentKind::Feature);
    let service = MockService::default()
        .with_catalog(&[5])
        .with_item(work_item(
            5,
            json!({
                "System.Title": "Browse",
                "Microsoft.VSTS.TCM.Steps": rich_text::encode(&["Given the home page".into()], false),
            }),
        ));

    reconcile::pull(&service, &config).await.unwrap();
    let written = std::fs::read_to_string(config.output_path()).unwrap();
    assert_eq!(
        written,
        "# language: en\nFeature: Synchronized test cases\n  @tc:5\n  Scenario: Browse\n    Given the home page\n\n"
    );
}

const SUITE_DOC: &str = "\
*** Settings ***
Test Tags    web

*** Test Cases ***
Title: Pay by card
    [tags]    TestCase 42    Priority 1    UserStory 120    Bug 130
    Open Browser    https://shop
    Click    Pay

Title: Flaky one
    [tags]    TestCase 43    Ignore_Sync
    Log    skip me

Title: Draft
    [tags]    Priority 2
    Log    not in the service yet
";

#[tokio::test]
async fn push_patches_tagged_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    std::fs::write(dir.path().join("checkout.robot"), SUITE_DOC).unwrap();
    std::fs::write(config.output_path(), OUTPUT_DOC).unwrap();

    let mut existing = work_item(42, json!({"System.Title": "Pay"}));
    existing.relations.push(Relation {
        rel: "Microsoft.VSTS.Common.TestedBy-Reverse".into(),
        url: "https://dev.azure.com/acme/_apis/wit/workItems/130".into(),
    });
    let service = MockService::default().with_item(existing);
    let patched = service.patched.clone();

    let report = push::push(&service, &config).await.unwrap();

    assert_eq!(report.patched, vec![42]);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.skipped, 1);
    assert!(report.failed.is_empty());

    let calls = patched.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (id, ops) = &calls[0];
    assert_eq!(*id, 42);
    let paths: Vec<&str> = ops.iter().map(|o| o.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/fields/System.Title",
            "/fields/Microsoft.VSTS.TCM.Steps",
            "/fields/System.Tags",
            "/fields/Microsoft.VSTS.Common.Priority",
            "/relations/-",
        ]
    );
    assert_eq!(ops[2].value, json!("web"));
    // bug 130 is already linked, only the story is added
    assert_eq!(ops[4].op, PatchOp::Add);
    assert_eq!(
        ops[4].value["url"],
        json!("https://dev.azure.com/acme/Shop/_apis/wit/workitems/120")
    );
}

#[tokio::test]
async fn push_failure_is_isolated_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = robot_config(dir.path());
    std::fs::write(
        dir.path().join("a.robot"),
        "*** Test Cases ***\nTitle: A\n    [tags]    TestCase 1\nTitle: B\n    [tags]    TestCase 2\n",
    )
    .unwrap();
    let service = MockService::default().failing_on(1);

    let report = push::push(&service, &config).await.unwrap();
    assert_eq!(report.failed, vec![1]);
    assert_eq!(report.patched, vec![2]);
}

#[tokio::test]
async fn bold_steps_setting_reaches_pushed_steps() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = robot_config(dir.path());
    config.constants.bold_steps = true;
    std::fs::write(
        dir.path().join("a.robot"),
        "*** Test Cases ***\nTitle: A\n    [tags]    TestCase 1\n    Click    Save\n",
    )
    .unwrap();
    let service = MockService::default();
    let patched = service.patched.clone();

    push::push(&service, &config).await.unwrap();

    let calls = patched.lock().unwrap();
    let steps = calls[0]
        .1
        .iter()
        .find(|o| o.path == "/fields/Microsoft.VSTS.TCM.Steps")
        .unwrap();
    assert!(steps.value.as_str().unwrap().contains("&lt;B&gt;Click    Save&lt;/B&gt;"));
}
