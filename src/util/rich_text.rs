//! Conversion between the service's steps field and plain action lines.
//!
//! The field is an XML document whose `parameterizedString` elements hold
//! HTML that has itself been entity-escaped:
//!
//! ```text
//! <steps id="0" last="2"><step id="2" type="ActionStep">
//!   <parameterizedString isformatted="true">&lt;P&gt;Open login&lt;BR/&gt;&lt;/P&gt;</parameterizedString>
//!   <parameterizedString isformatted="true">&lt;DIV&gt;&lt;P&gt;&lt;BR/&gt;&lt;/P&gt;&lt;/DIV&gt;</parameterizedString>
//!   <description/></step></steps>
//! ```

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

use crate::error::DecodeError;
use crate::model::test_case::StepPair;

static STEPS_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<steps\b[^>]*>").expect("steps regex"));
static STEP_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<step\b[^>]*>").expect("step regex"));
static PARAMETERIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<parameterizedString\b[^>]*?(?:/>|>(.*?)</parameterizedString>)")
        .expect("parameterizedString regex")
});

const STEP_CLOSE: &str = "</step>";
const EMPTY_EXPECTED: &str = "<DIV><P><BR/></P></DIV>";

/// First id handed to a step; the service reserves 1.
pub const FIRST_STEP_ID: u32 = 2;

/// Decodes a steps blob into action/expected pairs. Steps whose action is
/// empty once markup is stripped are dropped.
pub fn decode(blob: &str) -> Result<Vec<StepPair>, DecodeError> {
    let blob = blob.trim();
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    let open = STEPS_OPEN.find(blob).ok_or(DecodeError::MissingEnvelope)?;
    if open.as_str().ends_with("/>") {
        return Ok(Vec::new());
    }

    let body_start = open.end();
    let body = match blob[body_start..].rfind("</steps>") {
        Some(end) => &blob[body_start..body_start + end],
        None => return Err(DecodeError::MissingEnvelope),
    };

    let mut pairs = Vec::new();
    let mut offset = 0;
    while let Some(m) = STEP_OPEN.find(&body[offset..]) {
        let tag_end = offset + m.end();
        if m.as_str().ends_with("/>") {
            offset = tag_end;
            continue;
        }
        let close = body[tag_end..]
            .find(STEP_CLOSE)
            .ok_or(DecodeError::UnclosedStep(body_start + offset + m.start()))?;
        let inner = &body[tag_end..tag_end + close];
        offset = tag_end + close + STEP_CLOSE.len();

        let mut strings = PARAMETERIZED
            .captures_iter(inner)
            .map(|c| c.get(1).map(|m| plain_text(m.as_str())).unwrap_or_default());
        let action = strings.next().unwrap_or_default();
        let expected_result = strings.next().unwrap_or_default();
        if action.is_empty() {
            continue;
        }
        pairs.push(StepPair::new(action, expected_result));
    }
    Ok(pairs)
}

/// Plain text of one `parameterizedString` body: entities are decoded and
/// markup stripped twice, once for the XML escaping and once for the HTML.
/// Inline markup adds no spacing since robot cells are separated by runs of
/// spaces; only block elements break the text.
pub fn plain_text(raw: &str) -> String {
    let html = fragment_text(raw);
    let mut text = String::with_capacity(html.len());
    block_text(Html::parse_fragment(&html).root_element(), &mut text);
    text.replace('\u{a0}', " ")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text content of an HTML fragment with entities decoded.
pub fn fragment_text(raw: &str) -> String {
    Html::parse_fragment(raw)
        .root_element()
        .text()
        .collect()
}

const BLOCK_ELEMENTS: [&str; 3] = ["p", "div", "br"];

fn block_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let block = BLOCK_ELEMENTS.contains(&child.value().name());
            if block {
                out.push('\n');
            }
            block_text(child, out);
            if block {
                out.push('\n');
            }
        }
    }
}

pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Debug, Clone)]
struct StepNode {
    id: u32,
    action: String,
}

/// Builds a steps blob from action lines, assigning ids from
/// [`FIRST_STEP_ID`] upwards.
#[derive(Debug, Clone, Default)]
pub struct StepsBuilder {
    nodes: Vec<StepNode>,
    bold: bool,
}

impl StepsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn step(mut self, action: impl Into<String>) -> Self {
        let id = FIRST_STEP_ID + self.nodes.len() as u32;
        self.nodes.push(StepNode {
            id,
            action: action.into(),
        });
        self
    }

    /// Id of the last step, or `FIRST_STEP_ID - 1` for an empty list.
    pub fn last_id(&self) -> u32 {
        self.nodes
            .last()
            .map(|n| n.id)
            .unwrap_or(FIRST_STEP_ID - 1)
    }

    fn render_action(&self, action: &str) -> String {
        let text = escape_markup(action);
        let text = if self.bold {
            format!("<B>{text}</B>")
        } else {
            text
        };
        format!("<P>{text}<BR/></P>")
    }

    pub fn render(&self) -> String {
        let mut xml = format!(r#"<steps id="0" last="{}">"#, self.last_id());
        for node in &self.nodes {
            xml.push_str(&format!(
                r#"<step id="{}" type="ActionStep"><parameterizedString isformatted="true">{}</parameterizedString><parameterizedString isformatted="true">{}</parameterizedString><description/></step>"#,
                node.id,
                escape_markup(&self.render_action(&node.action)),
                escape_markup(EMPTY_EXPECTED),
            ));
        }
        xml.push_str("</steps>");
        xml
    }
}

pub fn encode(steps: &[String], with_bold: bool) -> String {
    steps
        .iter()
        .fold(StepsBuilder::new().bold(with_bold), |b, s| b.step(s.as_str()))
        .render()
}
