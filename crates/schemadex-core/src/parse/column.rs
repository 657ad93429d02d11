//! Column documents, synthesized from a parsed table.
//!
//! Columns have no source file of their own. Each one inherits the
//! table's database, schema and domain, and carries a composed text body
//! that is enough to regenerate its embedding input without the table.

use crate::keywords::TableKeywords;
use crate::models::{ColumnDoc, ColumnSpec, DocCommon, TableDoc};

pub fn synthesize_columns(table: &TableDoc, keywords: &TableKeywords) -> Vec<ColumnDoc> {
    table
        .columns
        .iter()
        .map(|column| ColumnDoc {
            common: DocCommon {
                database: table.common.database.clone(),
                summary: column_summary(table, column),
                content: column_content(table, column),
                sections: Vec::new(),
            },
            schema: table.schema.clone(),
            table: table.table.clone(),
            domain: table.domain.clone(),
            column: column.clone(),
            keywords: keywords.column(&column.name).to_vec(),
        })
        .collect()
}

fn column_summary(table: &TableDoc, column: &ColumnSpec) -> String {
    if column.description.trim().is_empty() {
        format!("{} column of {}", display_type(column), table.table_ref())
    } else {
        column.description.trim().to_string()
    }
}

fn display_type(column: &ColumnSpec) -> &str {
    if column.data_type.is_empty() {
        "untyped"
    } else {
        &column.data_type
    }
}

fn column_content(table: &TableDoc, column: &ColumnSpec) -> String {
    let mut lines = vec![
        format!("Column {}.{}", table.table_ref(), column.name),
        format!("Type: {}", display_type(column)),
        format!("Nullable: {}", if column.nullable { "yes" } else { "no" }),
    ];
    if column.primary_key {
        lines.push("Primary key".to_string());
    }
    if column.unique {
        lines.push("Unique".to_string());
    }
    for fk in table.foreign_keys_for(&column.name) {
        lines.push(format!(
            "References {}({})",
            fk.target(),
            fk.ref_columns.join(", ")
        ));
    }
    if !column.description.trim().is_empty() {
        lines.push(String::new());
        lines.push(column.description.trim().to_string());
    }
    if !table.description.is_empty() {
        lines.push(String::new());
        lines.push(format!("Table {}: {}", table.table_ref(), table.description));
    }
    lines.join("\n")
}
