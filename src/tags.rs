use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::model::work_item::RemoteWorkItem;

static CELL_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t|\s{2,}").expect("cell separator regex"));

/// Semantic tag categories the sync understands. Anything else found in a
/// tag line is kept under its literal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    TestCase,
    AutomationStatus,
    Priority,
    IterationPath,
    SystemTag,
    UserStory,
    Bug,
    IgnoreSync,
}

/// How a tag line separates a category from its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagStyle {
    /// `TestCase 42    Priority 2` (robot `[tags]` lines).
    #[default]
    Spaced,
    /// `@tc:42 @priority:2` (gherkin tag lines).
    Colon,
}

/// Ordered `(category, prefix)` table driving both extraction and rendering.
#[derive(Debug, Clone)]
pub struct TagVocabulary {
    entries: Vec<(TagCategory, String)>,
    style: TagStyle,
}

impl TagVocabulary {
    pub fn new(entries: Vec<(TagCategory, String)>) -> Self {
        Self {
            entries,
            style: TagStyle::default(),
        }
    }

    pub fn with_style(mut self, style: TagStyle) -> Self {
        self.style = style;
        self
    }

    pub fn prefix(&self, category: TagCategory) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, p)| *c == category && !p.trim().is_empty())
            .map(|(_, p)| p.as_str())
    }

    /// Maps a literal key from a tag line to the configured prefix, ignoring
    /// case, a leading `@` and a trailing `:`.
    fn canonical_key(&self, key: &str) -> Option<&str> {
        let wanted = normalize_key(key);
        self.entries
            .iter()
            .map(|(_, p)| p.as_str())
            .find(|p| !p.trim().is_empty() && normalize_key(p) == wanted)
    }

    pub fn parse(&self, tag_line: &str) -> TagSet {
        let mut set = TagSet::default();
        for (key, value) in tokenize(tag_line, self.style) {
            let key = self.canonical_key(&key).map(str::to_string).unwrap_or(key);
            match value {
                Some(value) => set.push(key, value),
                None => set.insert_flag(key),
            }
        }
        set
    }

    pub fn values<'a>(&self, set: &'a TagSet, category: TagCategory) -> &'a [String] {
        self.prefix(category)
            .map(|p| set.values(p))
            .unwrap_or_default()
    }

    /// First value of `category`, or `None` when the tag is absent.
    pub fn first_value(&self, set: &TagSet, category: TagCategory) -> Option<String> {
        self.values(set, category).first().cloned()
    }

    pub fn has(&self, set: &TagSet, category: TagCategory) -> bool {
        self.prefix(category).is_some_and(|p| set.contains(p))
    }

    /// Numeric values of `category`, skipping anything that is not an id.
    pub fn ids(&self, set: &TagSet, category: TagCategory) -> Vec<u64> {
        self.values(set, category)
            .iter()
            .filter_map(|v| v.parse().ok())
            .collect()
    }

    pub fn render(&self, set: &TagSet) -> String {
        set.render(self.style)
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .trim_start_matches('@')
        .trim_end_matches(':')
        .to_lowercase()
}

fn split_word(word: &str) -> Option<(String, String)> {
    match word.find(':') {
        Some(idx) if idx > 0 && idx + 1 < word.len() => {
            Some((word[..idx].to_string(), word[idx + 1..].to_string()))
        }
        _ => None,
    }
}

fn tokenize(line: &str, style: TagStyle) -> Vec<(String, Option<String>)> {
    let mut tokens = Vec::new();
    match style {
        TagStyle::Colon => {
            for word in line.split_whitespace() {
                match split_word(word) {
                    Some((k, v)) => tokens.push((k, Some(v))),
                    None => tokens.push((flag_key(word), None)),
                }
            }
        }
        TagStyle::Spaced => {
            for cell in CELL_SPLIT.split(line.trim()) {
                let words: Vec<&str> = cell.split_whitespace().collect();
                let mut i = 0;
                while i < words.len() {
                    let word = words[i];
                    if word.starts_with('@') || (word.contains(':') && !word.ends_with(':')) {
                        match split_word(word) {
                            Some((k, v)) => tokens.push((k, Some(v))),
                            None => tokens.push((word.to_string(), None)),
                        }
                        i += 1;
                    } else if let Some(next) = words.get(i + 1) {
                        tokens.push((flag_key(word), Some((*next).to_string())));
                        i += 2;
                    } else {
                        tokens.push((flag_key(word), None));
                        i += 1;
                    }
                }
            }
        }
    }
    tokens
}

fn flag_key(word: &str) -> String {
    match word.trim_end_matches(':') {
        "" => word.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Parsed view of a tag line: category key to its values, in first-seen order.
/// A category with no values is a bare flag such as `@ignore`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    groups: IndexMap<String, Vec<String>>,
}

impl TagSet {
    pub fn push(&mut self, category: impl Into<String>, value: impl Into<String>) {
        self.groups
            .entry(category.into())
            .or_default()
            .push(value.into());
    }

    pub fn insert_flag(&mut self, category: impl Into<String>) {
        self.groups.entry(category.into()).or_default();
    }

    pub fn values(&self, category: &str) -> &[String] {
        self.groups
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.groups.contains_key(category)
    }

    pub fn render(&self, style: TagStyle) -> String {
        let mut cells = Vec::new();
        for (category, values) in &self.groups {
            if values.is_empty() {
                cells.push(category.clone());
                continue;
            }
            for value in values {
                let cell = if style == TagStyle::Colon || category.starts_with('@') {
                    format!("{category}:{value}")
                } else {
                    format!("{category} {value}")
                };
                cells.push(cell);
            }
        }
        let sep = match style {
            TagStyle::Spaced => "    ",
            TagStyle::Colon => " ",
        };
        cells.join(sep)
    }
}

/// Tag values are single words; whitespace runs become underscores.
pub fn to_tag_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("_")
}

pub fn from_tag_value(value: &str) -> String {
    value.replace('_', " ")
}

/// Renders the tag line for a pulled work item: id, automation status,
/// priority and iteration path first, then system tags and one tag per
/// related work item.
pub fn render_case_tag_line(
    item: &RemoteWorkItem,
    vocabulary: &TagVocabulary,
    iteration_root: &str,
) -> String {
    let mut set = TagSet::default();
    let mut put = |category: TagCategory, value: Option<String>| {
        if let (Some(prefix), Some(value)) = (vocabulary.prefix(category), value) {
            let value = to_tag_value(&value);
            if !value.is_empty() {
                set.push(prefix, value);
            }
        }
    };

    put(TagCategory::TestCase, Some(item.id.to_string()));
    put(TagCategory::AutomationStatus, item.automation_status());
    put(TagCategory::Priority, item.priority());
    put(
        TagCategory::IterationPath,
        item.iteration_path().map(|path| {
            path.strip_prefix(iteration_root)
                .filter(|_| !iteration_root.is_empty())
                .unwrap_or(path.as_str())
                .trim_start_matches('\\')
                .to_string()
        }),
    );
    for tag in item.system_tags() {
        put(TagCategory::SystemTag, Some(tag));
    }
    for id in item.related_ids() {
        put(TagCategory::UserStory, Some(id.to_string()));
    }

    vocabulary.render(&set)
}
