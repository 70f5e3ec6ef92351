pub mod data_source;
pub mod rich_text;
