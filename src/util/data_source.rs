//! Parameter names and data rows of parameterized test cases
//! (`Microsoft.VSTS.TCM.Parameters` / `Microsoft.VSTS.TCM.LocalDataSource`),
//! which map onto a gherkin `Examples:` table.

use std::sync::LazyLock;

use regex::Regex;

use super::rich_text::{escape_markup, fragment_text};

static PARAM_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<param\b[^>]*?\bname="([^"]*)""#).expect("param regex"));
static TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Table1>(.*?)</Table1>").expect("row regex"));
static PARAM_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w@])@(\w+)").expect("param ref regex"));
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(\w+)>").expect("placeholder regex"));

pub fn parameter_names(xml: &str) -> Vec<String> {
    PARAM_NAME
        .captures_iter(xml)
        .map(|c| c[1].to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Rows of the data source, one cell per parameter name in `names` order.
/// Missing cells are empty strings.
pub fn data_rows(xml: &str, names: &[String]) -> Vec<Vec<String>> {
    let columns: Vec<Option<Regex>> = names
        .iter()
        .map(|name| {
            let name = regex::escape(&column_element(name));
            Regex::new(&format!(r"(?s)<{name}>(.*?)</{name}>")).ok()
        })
        .collect();
    TABLE_ROW
        .captures_iter(xml)
        .map(|row| {
            let row = &row[1];
            columns.iter().map(|column| cell(row, column.as_ref())).collect()
        })
        .collect()
}

fn cell(row: &str, column: Option<&Regex>) -> String {
    column
        .and_then(|re| re.captures(row))
        .map(|c| fragment_text(&c[1]).trim().to_string())
        .unwrap_or_default()
}

/// Element name a data-set column is stored under. Characters that are not
/// valid in an XML name become `_`, and a leading digit gets a `_` prefix.
fn column_element(name: &str) -> String {
    let mut element: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !element.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        element.insert(0, '_');
    }
    element
}

pub fn encode_parameters(names: &[String]) -> String {
    let params: String = names
        .iter()
        .map(|n| format!(r#"<param name="{}" bind="default"/>"#, escape_markup(n)))
        .collect();
    format!("<parameters>{params}</parameters>")
}

pub fn encode_data_source(names: &[String], rows: &[Vec<String>]) -> String {
    let columns: String = names
        .iter()
        .map(|n| {
            format!(
                "<xs:element name='{}' type='xs:string' minOccurs='0' />",
                column_element(n)
            )
        })
        .collect();
    let schema = format!(
        "<xs:schema id='NewDataSet' xmlns:xs='http://www.w3.org/2001/XMLSchema' \
         xmlns:msdata='urn:schemas-microsoft-com:xml-msdata'>\
         <xs:element name='NewDataSet' msdata:IsDataSet='true' msdata:Locale=''>\
         <xs:complexType><xs:choice minOccurs='0' maxOccurs='unbounded'>\
         <xs:element name='Table1'><xs:complexType><xs:sequence>{columns}\
         </xs:sequence></xs:complexType></xs:element>\
         </xs:choice></xs:complexType></xs:element></xs:schema>"
    );
    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = names
                .iter()
                .zip(row.iter().map(String::as_str).chain(std::iter::repeat("")))
                .map(|(n, v)| {
                    let n = column_element(n);
                    format!("<{n}>{}</{n}>", escape_markup(v))
                })
                .collect();
            format!("<Table1>{cells}</Table1>")
        })
        .collect();
    format!("<NewDataSet>{schema}{body}</NewDataSet>")
}

/// `Login as @user` -> `Login as <user>`
pub fn params_to_placeholders(step: &str) -> String {
    PARAM_REF.replace_all(step, "${1}<$2>").into_owned()
}

/// `Login as <user>` -> `Login as @user`
pub fn placeholders_to_params(step: &str) -> String {
    PLACEHOLDER.replace_all(step, "@$1").into_owned()
}
