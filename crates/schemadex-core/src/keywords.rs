//! Keyword and synonym extraction for lexical recall.
//!
//! Output is always lowercase, deduplicated and in first-seen order, so
//! the same document yields the same keyword list on every run.

use std::collections::HashSet;

use crate::models::{
    ColumnSpec, DomainDoc, OverviewDoc, ParsedDocument, RelationshipDoc, TableDoc,
};

const MIN_TERM_LEN: usize = 2;

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("id", "identifier"),
    ("pk", "primary key"),
    ("fk", "foreign key"),
    ("qty", "quantity"),
    ("amt", "amount"),
    ("cust", "customer"),
    ("txn", "transaction"),
    ("tx", "transaction"),
    ("ts", "timestamp"),
    ("dt", "date"),
    ("addr", "address"),
    ("desc", "description"),
    ("num", "number"),
    ("no", "number"),
    ("cnt", "count"),
    ("avg", "average"),
    ("pct", "percent"),
    ("acct", "account"),
    ("org", "organization"),
    ("dept", "department"),
    ("emp", "employee"),
    ("mgr", "manager"),
    ("prod", "product"),
    ("inv", "invoice"),
    ("ord", "order"),
    ("usr", "user"),
    ("msg", "message"),
    ("cfg", "configuration"),
    ("ref", "reference"),
    ("src", "source"),
    ("dst", "destination"),
    ("tgt", "target"),
    ("cat", "category"),
    ("img", "image"),
    ("ccy", "currency"),
    ("curr", "currency"),
];

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "into", "each", "are", "was", "were",
    "has", "have", "had", "not", "but", "all", "any", "can", "may", "will", "one", "its", "per",
    "via", "when", "where", "which", "who", "what", "there", "their", "other", "under", "over",
    "after", "before", "never", "ever", "however", "whether", "rather",
    "either", "neither", "together", "further", "otherwise", "another", "whatever", "later",
];

const NOUN_SUFFIXES: &[&str] = &[
    "tion", "ment", "ness", "ity", "ship", "ance", "ence", "er", "or",
];

/// Ordered, deduplicated lowercase term list.
#[derive(Debug, Default, Clone)]
struct Terms {
    seen: HashSet<String>,
    list: Vec<String>,
}

impl Terms {
    fn push(&mut self, term: &str) {
        let term = term.trim().to_lowercase();
        if term.chars().count() < MIN_TERM_LEN {
            return;
        }
        if self.seen.insert(term.clone()) {
            self.list.push(term);
        }
    }

    /// Identifier parts plus their dictionary expansions.
    fn identifier(&mut self, ident: &str) {
        for part in split_identifier(ident) {
            self.push(&part);
            if let Some(expansion) = expand_abbreviation(&part) {
                self.push(expansion);
            }
        }
    }

    fn description(&mut self, text: &str) {
        for term in description_terms(text) {
            self.push(&term);
        }
    }

    fn extend(&mut self, terms: &[String]) {
        for t in terms {
            self.push(t);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.list
    }
}

/// Keywords for a table and for each of its columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableKeywords {
    pub table: Vec<String>,
    pub columns: Vec<(String, Vec<String>)>,
}

impl TableKeywords {
    pub fn column(&self, name: &str) -> &[String] {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, terms)| terms.as_slice())
            .unwrap_or(&[])
    }
}

/// Split on `_`, `-`, `.`, whitespace and lower-to-upper camelCase
/// boundaries.
pub fn split_identifier(ident: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for chunk in ident.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace()) {
        let mut current = String::new();
        let mut prev_lower = false;
        for ch in chunk.chars() {
            if !ch.is_alphanumeric() {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                prev_lower = false;
                continue;
            }
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            current.push(ch);
        }
        if !current.is_empty() {
            parts.push(current);
        }
    }
    parts.into_iter().map(|p| p.to_lowercase()).collect()
}

pub fn expand_abbreviation(term: &str) -> Option<&'static str> {
    let lower = term.to_lowercase();
    ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == lower)
        .map(|(_, full)| *full)
}

/// Capitalized and noun-like words from free text.
pub fn description_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if word.chars().count() < 3 {
            continue;
        }
        let lower = word.to_lowercase();
        if STOP_WORDS.contains(&lower.as_str()) || word.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        let noun_like = NOUN_SUFFIXES
            .iter()
            .any(|s| lower.len() > s.len() + 2 && lower.ends_with(s));
        if capitalized || noun_like {
            terms.push(lower);
        }
    }
    terms
}

/// Broad family of a SQL type name, if recognised.
pub fn type_family(data_type: &str) -> Option<&'static str> {
    let t = data_type.to_lowercase();
    let base = t.split(['(', ' ']).next().unwrap_or_default();
    if base.is_empty() {
        return None;
    }
    let family = if base.contains("json") {
        "json"
    } else if base.contains("uuid") || base == "uniqueidentifier" {
        "uuid"
    } else if base.starts_with("bool") || base == "bit" {
        "boolean"
    } else if base.contains("date") || base.contains("time") || base == "interval" {
        "temporal"
    } else if base.contains("char") || base.contains("text") || base.contains("string") || base == "clob"
    {
        "text"
    } else if base.contains("int")
        || base.contains("serial")
        || base.starts_with("dec")
        || base.starts_with("num")
        || base.contains("float")
        || base.contains("double")
        || base == "real"
        || base == "money"
    {
        "numeric"
    } else {
        return None;
    };
    Some(family)
}

fn column_terms(table: &TableDoc, column: &ColumnSpec) -> Vec<String> {
    let mut terms = Terms::default();
    terms.identifier(&column.name);
    terms.identifier(&table.table);
    if let Some(family) = type_family(&column.data_type) {
        terms.push(family);
    }
    if column.primary_key {
        terms.push("identifier");
    }
    if column.unique {
        terms.push("unique");
    }
    for fk in table.foreign_keys_for(&column.name) {
        terms.push("reference");
        terms.identifier(&fk.ref_table);
    }
    terms.description(&column.description);
    terms.into_vec()
}

/// Keywords for a table and, computed alongside, for each column.
pub fn extract_table(table: &TableDoc) -> TableKeywords {
    let mut terms = Terms::default();
    terms.identifier(&table.table);
    if let Some(schema) = &table.schema {
        terms.identifier(schema);
    }
    if let Some(domain) = &table.domain {
        terms.identifier(domain);
    }
    for column in &table.columns {
        terms.identifier(&column.name);
    }
    if !table.primary_key().is_empty() {
        terms.push("identifier");
    }
    if !table.foreign_keys.is_empty() {
        terms.push("reference");
    }
    if table.columns.iter().any(|c| c.unique) {
        terms.push("unique");
    }
    for fk in &table.foreign_keys {
        terms.identifier(&fk.ref_table);
    }
    terms.description(&table.description);

    TableKeywords {
        table: terms.into_vec(),
        columns: table
            .columns
            .iter()
            .map(|c| (c.name.clone(), column_terms(table, c)))
            .collect(),
    }
}

fn extract_domain(doc: &DomainDoc) -> Vec<String> {
    let mut terms = Terms::default();
    terms.identifier(&doc.domain);
    for table in &doc.tables {
        terms.identifier(&table.table);
    }
    terms.description(&doc.common.summary);
    terms.description(&doc.common.content);
    terms.into_vec()
}

fn extract_relationship(doc: &RelationshipDoc) -> Vec<String> {
    let mut terms = Terms::default();
    terms.identifier(&doc.source.table);
    terms.identifier(&doc.target.table);
    for column in doc.source_columns.iter().chain(&doc.target_columns) {
        terms.identifier(column);
    }
    terms.push("reference");
    terms.push("join");
    terms.description(&doc.description);
    terms.into_vec()
}

fn extract_overview(doc: &OverviewDoc) -> Vec<String> {
    let mut terms = Terms::default();
    terms.identifier(&doc.title);
    for section in &doc.common.sections {
        terms.identifier(&section.heading);
    }
    terms.description(&doc.common.summary);
    terms.into_vec()
}

/// Keywords for any parsed document. Column documents return the terms
/// computed for them during table extraction, unchanged.
pub fn extract(doc: &ParsedDocument) -> Vec<String> {
    match doc {
        ParsedDocument::Table(t) => extract_table(t).table,
        ParsedDocument::Column(c) => {
            let mut terms = Terms::default();
            terms.extend(&c.keywords);
            terms.into_vec()
        }
        ParsedDocument::Domain(d) => extract_domain(d),
        ParsedDocument::Relationship(r) => extract_relationship(r),
        ParsedDocument::Overview(o) => extract_overview(o),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::table::parse_table;

    #[test]
    fn splits_snake_camel_and_dots() {
        assert_eq!(split_identifier("customer_id"), vec!["customer", "id"]);
        assert_eq!(split_identifier("orderLineItem"), vec!["order", "line", "item"]);
        assert_eq!(split_identifier("public.order-lines"), vec!["public", "order", "lines"]);
        assert_eq!(split_identifier("HTTPStatus"), vec!["httpstatus"]);
        assert_eq!(split_identifier("v2Total"), vec!["v2", "total"]);
    }

    #[test]
    fn expands_abbreviations_alongside_originals() {
        let table = parse_table(
            "# Table: txn_log\n## Columns\n| Column | Type |\n|-|-|\n| qty | int |\n",
            "db",
        )
        .unwrap();
        let kw = extract_table(&table);
        let pos = |t: &str| kw.table.iter().position(|k| k == t);
        assert!(pos("txn").unwrap() < pos("transaction").unwrap());
        assert!(pos("qty").is_some() && pos("quantity").is_some());
    }

    #[test]
    fn constraint_and_type_terms() {
        let table = parse_table(
            "# Table: orders\n## Columns\n| Column | Type |\n|-|-|\n\
| id | bigint PK |\n| placed_at | timestamptz |\n| email | varchar(255) UNIQUE |\n\
## Foreign Keys\n- email -> users(email)\n",
            "db",
        )
        .unwrap();
        let kw = extract_table(&table);
        assert!(kw.table.contains(&"identifier".to_string()));
        assert!(kw.table.contains(&"reference".to_string()));
        assert!(kw.table.contains(&"unique".to_string()));

        let placed = kw.column("placed_at");
        assert!(placed.contains(&"temporal".to_string()));
        let email = kw.column("email");
        assert!(email.contains(&"text".to_string()));
        assert!(email.contains(&"unique".to_string()));
        assert!(email.contains(&"reference".to_string()));
        assert!(email.contains(&"users".to_string()));
        assert!(kw.column("missing").is_empty());
    }

    #[test]
    fn output_is_lowercase_deduplicated_and_stable() {
        let text = "# Table: Orders\nOrders from the Storefront with Orders fulfillment.\n";
        let table = parse_table(text, "db").unwrap();
        let a = extract_table(&table).table;
        let b = extract_table(&table).table;
        assert_eq!(a, b);
        assert!(a.iter().all(|t| t == &t.to_lowercase()));
        let unique: HashSet<_> = a.iter().collect();
        assert_eq!(unique.len(), a.len());
        assert!(a.contains(&"storefront".to_string()));
        assert!(a.contains(&"fulfillment".to_string()));
    }

    #[test]
    fn type_families() {
        assert_eq!(type_family("BIGINT"), Some("numeric"));
        assert_eq!(type_family("numeric(10,2)"), Some("numeric"));
        assert_eq!(type_family("interval"), Some("temporal"));
        assert_eq!(type_family("jsonb"), Some("json"));
        assert_eq!(type_family("boolean"), Some("boolean"));
        assert_eq!(type_family("geometry"), None);
        assert_eq!(type_family(""), None);
    }
}
