use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{load_corpus, read_document, PullReport};
use crate::config::SyncConfig;
use crate::document::{parser, render, Layout};
use crate::model::test_case::TestCaseRecord;
use crate::providers::{CatalogScope, TestCaseService};
use crate::tags::{TagCategory, TagSet, TagVocabulary};

/// Test-case id of a tag line. Only the first id tag counts.
pub fn record_id(tags: &TagSet, vocabulary: &TagVocabulary) -> Option<u64> {
    vocabulary
        .first_value(tags, TagCategory::TestCase)
        .and_then(|v| v.parse().ok())
}

pub fn ids_in_local_corpus<'a>(
    records: impl IntoIterator<Item = &'a TestCaseRecord>,
    vocabulary: &TagVocabulary,
) -> BTreeSet<u64> {
    records
        .into_iter()
        .filter_map(|r| record_id(&vocabulary.parse(&r.tag_line), vocabulary))
        .collect()
}

pub fn new_remote_ids(catalog: &BTreeSet<u64>, local: &BTreeSet<u64>) -> BTreeSet<u64> {
    catalog.difference(local).copied().collect()
}

/// True when `document` carries none of the header's marker lines.
fn lacks_header(document: &str, header: &str) -> bool {
    if document.trim().is_empty() {
        return true;
    }
    !header
        .lines()
        .any(|marker| parser::has_header_line(document, marker))
}

/// Appends rendered blocks to the output document, putting the structural
/// header in front once when the document does not have one yet.
pub fn append_to_output_document(existing: &str, rendered: &str, header: &str) -> String {
    let mut doc = String::with_capacity(header.len() + existing.len() + rendered.len() + 1);
    if lacks_header(existing, header) {
        doc.push_str(header);
    }
    doc.push_str(existing);
    if !rendered.is_empty() {
        if !doc.is_empty() && !doc.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str(rendered);
    }
    doc
}

/// Fetches remote test cases missing from the local corpus and appends them
/// to the output document. A failed fetch skips that id only.
pub async fn pull(service: &dyn TestCaseService, config: &SyncConfig) -> Result<PullReport> {
    let mut report = PullReport::new();
    let layout = Layout::from_config(config);

    let corpus = load_corpus(config)?;
    let local = ids_in_local_corpus(
        corpus.iter().flat_map(|d| d.parsed.records.iter()),
        &layout.vocabulary,
    );
    report.local_size = local.len();

    let scope = CatalogScope::from_config(config);
    let catalog = service
        .list_catalog(&scope)
        .await
        .with_context(|| format!("Failed to list test cases from {}", service.name()))?;
    report.catalog_size = catalog.len();

    let new_ids = new_remote_ids(&catalog, &local);
    info!(
        catalog = catalog.len(),
        local = local.len(),
        new = new_ids.len(),
        "compared remote catalog with local corpus"
    );

    let mut rendered = String::new();
    for id in new_ids {
        match service.fetch(&[id]).await {
            Ok(items) => match items.into_iter().find(|i| i.id == id) {
                Some(item) => {
                    debug!(id, "rendering test case");
                    rendered.push_str(&render::render_case(&item, &layout));
                    report.pulled.push(id);
                }
                None => {
                    warn!(id, "service returned no work item");
                    report.failed.push(id);
                }
            },
            Err(e) => {
                warn!(id, error = %e, "failed to fetch test case, skipping");
                report.failed.push(id);
            }
        }
    }

    if rendered.is_empty() {
        debug!(elapsed_ms = report.elapsed_ms(), "nothing to append");
        return Ok(report);
    }

    let output = config.output_path();
    let existing = if output.exists() {
        read_document(&output)?
    } else {
        String::new()
    };
    let updated = append_to_output_document(&existing, &rendered, &layout.structural_header());
    std::fs::write(&output, updated)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        file = %output.display(),
        count = report.pulled.len(),
        elapsed_ms = report.elapsed_ms(),
        "appended new test cases"
    );
    report.written = Some(output);

    Ok(report)
}
