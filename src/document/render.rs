use tracing::warn;

use super::{DocumentKind, Layout};
use crate::model::work_item::RemoteWorkItem;
use crate::tags::render_case_tag_line;
use crate::util::{data_source, rich_text};

/// Renders a fetched work item as a block for the output document. The
/// block ends with a blank line so consecutive blocks stay separated.
pub fn render_case(item: &RemoteWorkItem, layout: &Layout) -> String {
    let title = item
        .title()
        .unwrap_or_else(|| format!("Work item {}", item.id));
    let tag_line = render_case_tag_line(item, &layout.vocabulary, &layout.iteration_root);
    let steps = decoded_steps(item);
    match layout.kind {
        DocumentKind::Robot => render_robot(&title, &tag_line, &steps, layout),
        DocumentKind::Feature => render_feature(item, &title, &tag_line, &steps, layout),
    }
}

fn decoded_steps(item: &RemoteWorkItem) -> Vec<String> {
    let Some(blob) = item.steps_blob() else {
        return Vec::new();
    };
    match rich_text::decode(&blob) {
        Ok(pairs) => pairs.into_iter().map(|p| p.action).collect(),
        Err(e) => {
            warn!(id = item.id, error = %e, "steps could not be decoded, rendering none");
            Vec::new()
        }
    }
}

fn render_robot(title: &str, tag_line: &str, steps: &[String], layout: &Layout) -> String {
    let mut out = format!("{}: {title}\n", layout.title_marker.trim_end_matches(':'));
    out.push_str(&format!("    [tags]    {tag_line}\n"));
    for step in steps {
        out.push_str(&format!("    {step}\n"));
    }
    out.push('\n');
    out
}

/// Gherkin tags always carry a leading `@`.
fn gherkin_tags(tag_line: &str) -> String {
    tag_line
        .split_whitespace()
        .map(|t| {
            if t.starts_with('@') {
                t.to_string()
            } else {
                format!("@{t}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_feature(
    item: &RemoteWorkItem,
    title: &str,
    tag_line: &str,
    steps: &[String],
    layout: &Layout,
) -> String {
    let names = item
        .parameters()
        .map(|xml| data_source::parameter_names(&xml))
        .unwrap_or_default();

    let mut out = String::new();
    let tags = gherkin_tags(tag_line);
    if !tags.is_empty() {
        out.push_str(&format!("  {tags}\n"));
    }
    let marker = if names.is_empty() {
        &layout.title_marker
    } else {
        &layout.outline_marker
    };
    out.push_str(&format!("  {}: {title}\n", marker.trim_end_matches(':')));
    for step in steps {
        let step = if names.is_empty() {
            step.clone()
        } else {
            data_source::params_to_placeholders(step)
        };
        out.push_str(&format!("    {step}\n"));
    }
    if !names.is_empty() {
        let rows = item
            .data_source()
            .map(|xml| data_source::data_rows(&xml, &names))
            .unwrap_or_default();
        out.push_str("\n    Examples:\n");
        out.push_str(&examples_table(&names, &rows));
    }
    out.push('\n');
    out
}

/// Pipe table with columns padded to their widest cell.
fn examples_table(header: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!(" {cell:<w$} ")
            })
            .collect();
        format!("      |{}|\n", padded.join("|"))
    };

    let mut out = line(header);
    for row in rows {
        out.push_str(&line(row));
    }
    out
}
