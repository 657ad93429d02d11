//! Per-type document parsers.
//!
//! [`parse_document`] dispatches on the manifest's declared type. Structured
//! TOML front matter is preferred; heading patterns in the body fill in
//! whatever it leaves out. Column documents are never parsed from a file:
//! [`synthesize_columns`] derives them from a parsed table.

pub mod column;
pub mod domain;
pub mod markdown;
pub mod relationship;
pub mod table;

pub use column::synthesize_columns;

use crate::error::ParseError;
use crate::models::{DocType, ParsedDocument};

/// Parse one source file of the given type.
///
/// `default_database` is used when the document does not name its own
/// database, normally the manifest's database.
pub fn parse_document(
    doc_type: DocType,
    text: &str,
    default_database: &str,
) -> Result<ParsedDocument, ParseError> {
    match doc_type {
        DocType::Table => table::parse_table(text, default_database).map(ParsedDocument::Table),
        DocType::Domain => domain::parse_domain(text, default_database).map(ParsedDocument::Domain),
        DocType::Relationship => relationship::parse_relationship(text, default_database)
            .map(ParsedDocument::Relationship),
        DocType::Overview => {
            domain::parse_overview(text, default_database).map(ParsedDocument::Overview)
        }
        DocType::Column => Err(ParseError::MissingField("table")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_type() {
        let doc = parse_document(DocType::Table, "# Table: orders\n", "shop").unwrap();
        assert_eq!(doc.doc_type(), DocType::Table);
        assert_eq!(doc.database(), "shop");

        let doc = parse_document(DocType::Overview, "# Shop\n", "shop").unwrap();
        assert_eq!(doc.doc_type(), DocType::Overview);

        assert!(parse_document(DocType::Column, "anything", "shop").is_err());
    }
}
