use anyhow::Result;
use tracing::{debug, info, warn};

use super::patch::{self, PatchContext};
use super::reconcile::record_id;
use super::{load_corpus, PushReport};
use crate::config::SyncConfig;
use crate::error::PatchError;
use crate::model::test_case::TestCaseRecord;
use crate::providers::TestCaseService;
use crate::tags::TagCategory;

enum Outcome {
    Patched(u64),
    Ignored,
    Skipped,
    Failed(u64),
}

/// Sends every tagged local test case to the service. The pull output file
/// is left out; it only holds cases that have not been organized yet.
pub async fn push(service: &dyn TestCaseService, config: &SyncConfig) -> Result<PushReport> {
    let mut report = PushReport::new();
    let vocabulary = config.vocabulary();
    let base_url = config.credentials.base_url();
    let output = config.output_path();

    for document in load_corpus(config)? {
        if document.path == output {
            debug!(file = %document.path.display(), "skipping pull output");
            continue;
        }
        let ctx = PatchContext {
            vocabulary: &vocabulary,
            kind: config.format,
            suite_tags: document.parsed.suite_tags.as_deref(),
            iteration_root: &config.constants.iteration_root,
            base_url: &base_url,
            relation_kind: &config.tag_config.tested_by_reverse,
            bold_steps: config.constants.bold_steps,
        };
        for record in &document.parsed.records {
            match push_record(service, record, &ctx).await {
                Outcome::Patched(id) => report.patched.push(id),
                Outcome::Ignored => report.ignored += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed(id) => report.failed.push(id),
            }
        }
    }

    info!(
        patched = report.patched.len(),
        ignored = report.ignored,
        skipped = report.skipped,
        failed = report.failed.len(),
        elapsed_ms = report.elapsed_ms(),
        "push finished"
    );
    Ok(report)
}

async fn push_record(
    service: &dyn TestCaseService,
    record: &TestCaseRecord,
    ctx: &PatchContext<'_>,
) -> Outcome {
    let tags = ctx.vocabulary.parse(&record.tag_line);
    if ctx.vocabulary.has(&tags, TagCategory::IgnoreSync) {
        debug!(title = %record.title, "ignored by tag");
        return Outcome::Ignored;
    }
    let Some(id) = record_id(&tags, ctx.vocabulary) else {
        let err = PatchError::MissingId(record.title.clone());
        warn!(error = %err, "skipping");
        return Outcome::Skipped;
    };

    // Relations the work item already has are not added again.
    let existing = match service.fetch(&[id]).await {
        Ok(items) => items
            .into_iter()
            .find(|i| i.id == id)
            .map(|i| i.related_ids())
            .unwrap_or_default(),
        Err(e) => {
            warn!(id, error = %e, "failed to read test case before update, skipping");
            return Outcome::Failed(id);
        }
    };
    let linked: Vec<u64> = patch::linked_ids(&tags, ctx.vocabulary)
        .into_iter()
        .filter(|l| !existing.contains(l))
        .collect();

    let ops = match patch::build(record, &linked, ctx) {
        Ok(ops) => ops,
        Err(e) => {
            warn!(id, error = %e, "skipping");
            return Outcome::Skipped;
        }
    };

    match service.patch(id, &ops).await {
        Ok(()) => {
            info!(id, ops = ops.len(), "updated test case");
            Outcome::Patched(id)
        }
        Err(e) => {
            warn!(id, error = %e, "failed to update test case");
            Outcome::Failed(id)
        }
    }
}
