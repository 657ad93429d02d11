//! Table documents.

use serde::Deserialize;

use super::markdown::{self, split_list};
use crate::error::ParseError;
use crate::models::{ColumnSpec, DocCommon, ForeignKeySpec, TableDoc, TableRef};

#[derive(Debug, Default, Deserialize)]
struct TableFront {
    database: Option<String>,
    schema: Option<String>,
    table: Option<String>,
    domain: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnSpec>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeySpec>,
}

pub fn parse_table(text: &str, default_database: &str) -> Result<TableDoc, ParseError> {
    let (front_raw, body) = markdown::split_front_matter(text)?;
    let front: TableFront = markdown::parse_front(front_raw)?;
    let sections = markdown::sections(body);

    let heading_ref = markdown::prefixed_title(body, "table").and_then(TableRef::parse);
    let front_ref = front.table.as_deref().and_then(TableRef::parse);
    let table_ref = front_ref
        .or(heading_ref)
        .ok_or(ParseError::MissingField("table"))?;
    let schema = front
        .schema
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or(table_ref.schema.clone());

    let database = front
        .database
        .clone()
        .or_else(|| markdown::bold_field(body, "database").map(str::to_string))
        .unwrap_or_else(|| default_database.to_string());
    let domain = front
        .domain
        .clone()
        .or_else(|| markdown::bold_field(body, "domain").map(str::to_string));

    let description = front
        .description
        .clone()
        .or_else(|| markdown::section(&sections, "description").map(|s| s.body.clone()))
        .or_else(|| markdown::first_paragraph(body))
        .unwrap_or_default();

    let mut columns = if front.columns.is_empty() {
        markdown::section(&sections, "columns")
            .map(|s| columns_from_table(&s.body))
            .unwrap_or_default()
    } else {
        front.columns
    };
    for column in columns.iter_mut() {
        if column.primary_key {
            column.nullable = false;
        }
    }
    check_unique_columns(&columns)?;

    let foreign_keys = if front.foreign_keys.is_empty() {
        match markdown::section(&sections, "foreign keys") {
            Some(s) => markdown::bullets(&s.body)
                .iter()
                .map(|line| parse_foreign_key(line))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        }
    } else {
        front.foreign_keys
    };

    Ok(TableDoc {
        common: DocCommon {
            database,
            summary: markdown::summary(front.summary.as_deref(), body),
            content: body.trim().to_string(),
            sections,
        },
        schema,
        table: table_ref.table,
        domain,
        description: description.trim().to_string(),
        columns,
        foreign_keys,
    })
}

fn check_unique_columns(columns: &[ColumnSpec]) -> Result<(), ParseError> {
    let mut seen = std::collections::HashSet::new();
    for column in columns {
        if !seen.insert(column.name.to_lowercase()) {
            return Err(ParseError::DuplicateColumn {
                column: column.name.clone(),
            });
        }
    }
    Ok(())
}

/// Read `| Column | Type | Nullable | Key | Description |` rows. Header
/// names pick the cells; a `PK`/`UNIQUE` marker may sit in the Type or
/// Key cell.
fn columns_from_table(text: &str) -> Vec<ColumnSpec> {
    let rows = markdown::table_rows(text);
    let Some((header, rows)) = rows.split_first() else {
        return Vec::new();
    };
    let find = |names: &[&str]| {
        header
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let name_idx = find(&["column", "name", "column name"]).unwrap_or(0);
    let type_idx = find(&["type", "data type"]);
    let null_idx = find(&["nullable", "null", "null?"]);
    let key_idx = find(&["key", "keys", "constraints", "constraint"]);
    let desc_idx = find(&["description", "notes", "comment"]);

    let cell = |row: &Vec<String>, idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
    };

    rows.iter()
        .filter_map(|row| {
            let name = cell(row, Some(name_idx));
            if name.is_empty() {
                return None;
            }
            let (data_type, type_markers) = split_type_markers(&cell(row, type_idx));
            let key = cell(row, key_idx).to_uppercase();
            let markers = format!("{} {}", type_markers, key);
            let primary_key = has_marker(&markers, &["PK", "PRIMARY"]);
            let unique = has_marker(&markers, &["UNIQUE", "UQ"]);
            let nullable = match cell(row, null_idx).to_lowercase().as_str() {
                "no" | "false" | "n" | "not null" => false,
                "" => !markers.contains("NOT NULL"),
                _ => true,
            };
            Some(ColumnSpec {
                name,
                data_type,
                nullable,
                primary_key,
                unique,
                description: cell(row, desc_idx),
            })
        })
        .collect()
}

/// `bigint PK NOT NULL` -> (`bigint`, `PK NOT NULL`).
fn split_type_markers(raw: &str) -> (String, String) {
    let mut base = Vec::new();
    let mut markers = Vec::new();
    for word in raw.split_whitespace() {
        let upper = word.to_uppercase();
        let is_marker = matches!(
            upper.as_str(),
            "PK" | "PRIMARY" | "KEY" | "UNIQUE" | "UQ" | "NOT" | "NULL" | "FK"
        );
        if is_marker {
            markers.push(upper);
        } else {
            base.push(word);
        }
    }
    (base.join(" "), markers.join(" "))
}

fn has_marker(markers: &str, wanted: &[&str]) -> bool {
    markers
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|w| wanted.contains(&w))
}

/// Parse `col[, col] -> schema.table(col[, col])`.
pub fn parse_foreign_key(line: &str) -> Result<ForeignKeySpec, ParseError> {
    let bad = || ParseError::BadForeignKey(line.to_string());
    let (left, right) = line
        .split_once("->")
        .or_else(|| line.split_once('→'))
        .ok_or_else(bad)?;
    let columns = split_list(left);
    let open = right.find('(').ok_or_else(bad)?;
    let close = right.rfind(')').ok_or_else(bad)?;
    if close < open {
        return Err(bad());
    }
    let target = TableRef::parse(&right[..open]).ok_or_else(bad)?;
    let ref_columns = split_list(&right[open + 1..close]);
    if columns.is_empty() || columns.len() != ref_columns.len() {
        return Err(bad());
    }
    Ok(ForeignKeySpec {
        columns,
        ref_schema: target.schema,
        ref_table: target.table,
        ref_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: &str = "# Table: public.orders\n\
**Database:** shop\n\
**Domain:** sales\n\
\n\
Orders placed by customers through the storefront.\n\
\n\
## Columns\n\
| Column | Type | Nullable | Description |\n\
|--------|------|----------|-------------|\n\
| id | bigint PK | no | Order identifier |\n\
| customer_id | bigint | no | Buyer |\n\
| note | text | yes | Free text |\n\
\n\
## Foreign Keys\n\
- customer_id -> public.customers(id)\n";

    #[test]
    fn parses_heading_fallbacks() {
        let doc = parse_table(ORDERS, "fallback").unwrap();
        assert_eq!(doc.common.database, "shop");
        assert_eq!(doc.schema.as_deref(), Some("public"));
        assert_eq!(doc.table, "orders");
        assert_eq!(doc.domain.as_deref(), Some("sales"));
        assert_eq!(
            doc.common.summary,
            "Orders placed by customers through the storefront."
        );
        assert_eq!(doc.columns.len(), 3);
        assert!(doc.columns[0].primary_key);
        assert!(!doc.columns[0].nullable);
        assert_eq!(doc.columns[0].data_type, "bigint");
        assert!(doc.columns[2].nullable);
        assert_eq!(doc.foreign_keys.len(), 1);
        assert_eq!(doc.foreign_keys[0].ref_table, "customers");
        assert_eq!(doc.foreign_keys[0].ref_columns, vec!["id".to_string()]);
    }

    #[test]
    fn front_matter_wins_over_body() {
        let text = r#"+++
database = "warehouse"
schema = "archive"
table = "orders"
summary = "Archived orders."

[[columns]]
name = "id"
type = "bigint"
primary_key = true

[[foreign_keys]]
columns = ["id"]
ref_schema = "public"
ref_table = "orders"
ref_columns = ["id"]
+++
# Table: public.orders
"#;
        let doc = parse_table(text, "shop").unwrap();
        assert_eq!(doc.common.database, "warehouse");
        assert_eq!(doc.schema.as_deref(), Some("archive"));
        assert_eq!(doc.common.summary, "Archived orders.");
        assert_eq!(doc.columns.len(), 1);
        assert!(!doc.columns[0].nullable);
        assert_eq!(doc.foreign_keys[0].target().qualified(), "public.orders");
    }

    #[test]
    fn missing_table_name_is_an_error() {
        let err = parse_table("Just prose.", "shop").unwrap_err();
        assert_eq!(err, ParseError::MissingField("table"));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let text = "# Table: t\n## Columns\n| Column | Type |\n|-|-|\n| a | int |\n| A | int |\n";
        assert!(matches!(
            parse_table(text, "db").unwrap_err(),
            ParseError::DuplicateColumn { .. }
        ));
    }

    #[test]
    fn composite_foreign_keys() {
        let fk = parse_foreign_key("order_id, line_no -> sales.order_lines(order_id, line_no)")
            .unwrap();
        assert_eq!(fk.columns.len(), 2);
        assert_eq!(fk.ref_schema.as_deref(), Some("sales"));
        assert!(parse_foreign_key("a, b -> t(x)").is_err());
        assert!(parse_foreign_key("no arrow here").is_err());
    }
}
