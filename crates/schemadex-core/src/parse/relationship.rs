//! Relationship documents.
//!
//! Endpoints come from front matter or a `# Relationship: a -> b` heading.
//! When the column lists are missing they are read back out of the join
//! predicate (`a.x = b.y AND ...`).

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use super::markdown::{self, split_list};
use crate::error::ParseError;
use crate::models::{DocCommon, RelationshipDoc, TableRef};

#[derive(Debug, Default, Deserialize)]
struct RelationshipFront {
    database: Option<String>,
    source: Option<String>,
    #[serde(default)]
    source_columns: Vec<String>,
    target: Option<String>,
    #[serde(default)]
    target_columns: Vec<String>,
    join_condition: Option<String>,
    summary: Option<String>,
    description: Option<String>,
}

pub fn parse_relationship(
    text: &str,
    default_database: &str,
) -> Result<RelationshipDoc, ParseError> {
    let (front_raw, body) = markdown::split_front_matter(text)?;
    let front: RelationshipFront = markdown::parse_front(front_raw)?;
    let sections = markdown::sections(body);

    let heading = markdown::prefixed_title(body, "relationship").and_then(|t| {
        let (a, b) = t.split_once("->").or_else(|| t.split_once('→'))?;
        Some((a.trim().to_string(), b.trim().to_string()))
    });
    let source_raw = front
        .source
        .clone()
        .or_else(|| markdown::bold_field(body, "source").map(str::to_string))
        .or_else(|| heading.as_ref().map(|h| h.0.clone()))
        .ok_or(ParseError::MissingField("source"))?;
    let target_raw = front
        .target
        .clone()
        .or_else(|| markdown::bold_field(body, "target").map(str::to_string))
        .or_else(|| heading.as_ref().map(|h| h.1.clone()))
        .ok_or(ParseError::MissingField("target"))?;
    let source = TableRef::parse(&source_raw).ok_or(ParseError::BadTableRef(source_raw))?;
    let target = TableRef::parse(&target_raw).ok_or(ParseError::BadTableRef(target_raw))?;

    let join_condition = front
        .join_condition
        .clone()
        .or_else(|| markdown::bold_field(body, "join").map(str::to_string))
        .map(|j| j.trim().trim_matches('`').trim().to_string())
        .filter(|j| !j.is_empty());

    let mut source_columns = front.source_columns;
    let mut target_columns = front.target_columns;
    if source_columns.is_empty() {
        source_columns = markdown::bold_field(body, "source columns")
            .map(split_list)
            .unwrap_or_default();
    }
    if target_columns.is_empty() {
        target_columns = markdown::bold_field(body, "target columns")
            .map(split_list)
            .unwrap_or_default();
    }
    if source_columns.is_empty() && target_columns.is_empty() {
        if let Some(join) = &join_condition {
            (source_columns, target_columns) = columns_from_join(join);
        }
    }

    let description = front
        .description
        .clone()
        .or_else(|| markdown::section(&sections, "description").map(|s| s.body.clone()))
        .or_else(|| markdown::first_paragraph(body))
        .unwrap_or_default();

    let database = front
        .database
        .clone()
        .or_else(|| markdown::bold_field(body, "database").map(str::to_string))
        .unwrap_or_else(|| default_database.to_string());

    Ok(RelationshipDoc {
        common: DocCommon {
            database,
            summary: markdown::summary(front.summary.as_deref(), body),
            content: body.trim().to_string(),
            sections,
        },
        source,
        source_columns,
        target,
        target_columns,
        join_condition,
        description: description.trim().to_string(),
    })
}

/// `orders.customer_id = customers.id AND ...` -> (`[customer_id]`, `[id]`).
/// Predicates that are not plain column equalities are ignored.
pub fn columns_from_join(join: &str) -> (Vec<String>, Vec<String>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for predicate in split_and(join) {
        let Some((a, b)) = predicate.split_once('=') else {
            continue;
        };
        let column = |side: &str| {
            side.trim()
                .rsplit('.')
                .next()
                .map(|c| c.trim_matches(|ch| ch == '"' || ch == '`').to_string())
                .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_alphanumeric() || ch == '_'))
        };
        if let (Some(a), Some(b)) = (column(a), column(b)) {
            left.push(a);
            right.push(b);
        }
    }
    (left, right)
}

fn split_and(join: &str) -> Vec<&str> {
    static AND: OnceLock<Regex> = OnceLock::new();
    let re = AND.get_or_init(|| Regex::new(r"(?i)\s+and\s+").expect("static regex"));
    re.split(join).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_and_join_line() {
        let text = "# Relationship: public.orders -> public.customers\n\
**Join:** `public.orders.customer_id = public.customers.id`\n\
\n\
Each order belongs to one customer.\n";
        let doc = parse_relationship(text, "shop").unwrap();
        assert_eq!(doc.common.database, "shop");
        assert_eq!(doc.source.qualified(), "public.orders");
        assert_eq!(doc.target.qualified(), "public.customers");
        assert_eq!(doc.source_columns, vec!["customer_id".to_string()]);
        assert_eq!(doc.target_columns, vec!["id".to_string()]);
        assert_eq!(doc.description, "Each order belongs to one customer.");
    }

    #[test]
    fn front_matter_columns() {
        let text = r#"+++
source = "sales.order_lines"
source_columns = ["order_id"]
target = "sales.orders"
target_columns = ["id"]
+++
"#;
        let doc = parse_relationship(text, "shop").unwrap();
        assert_eq!(doc.source.schema.as_deref(), Some("sales"));
        assert_eq!(doc.target.table, "orders");
        assert!(doc.join_condition.is_none());
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let err = parse_relationship("# Relationship: orders\n", "shop").unwrap_err();
        assert_eq!(err, ParseError::MissingField("source"));
    }

    #[test]
    fn composite_join_columns() {
        let (l, r) = columns_from_join("a.x = b.y AND a.z = b.w and lower(a.n) = b.n");
        assert_eq!(l, vec!["x", "z"]);
        assert_eq!(r, vec!["y", "w"]);
    }
}
