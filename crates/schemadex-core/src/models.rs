//! Core data models used throughout schemadex.
//!
//! Parsed documents are a closed set of variants, one per document kind,
//! so every stage dispatches on [`ParsedDocument`] instead of probing
//! optional fields. [`Document`] is the persisted record shape shared by
//! every store implementation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Current persisted schema version, recorded in index metadata.
pub const SCHEMA_VERSION: u32 = 1;

/// The five document kinds the index understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Table,
    Column,
    Domain,
    Relationship,
    Overview,
}

impl DocType {
    pub const ALL: [DocType; 5] = [
        DocType::Table,
        DocType::Column,
        DocType::Domain,
        DocType::Relationship,
        DocType::Overview,
    ];

    /// Write order within a run. Columns and relationships need their
    /// tables to exist first.
    pub const PROCESSING_ORDER: [DocType; 5] = [
        DocType::Table,
        DocType::Domain,
        DocType::Overview,
        DocType::Relationship,
        DocType::Column,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Table => "table",
            DocType::Column => "column",
            DocType::Domain => "domain",
            DocType::Relationship => "relationship",
            DocType::Overview => "overview",
        }
    }

    /// Whether a change to a document of this kind can alter join paths.
    pub fn is_table_scoped(&self) -> bool {
        matches!(
            self,
            DocType::Table | DocType::Column | DocType::Relationship
        )
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "table" => Ok(DocType::Table),
            "column" => Ok(DocType::Column),
            "domain" => Ok(DocType::Domain),
            "relationship" => Ok(DocType::Relationship),
            "overview" => Ok(DocType::Overview),
            other => Err(format!("unknown document type: {}", other)),
        }
    }
}

/// A possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, table: &str) -> Self {
        Self {
            schema: schema
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            table: table.trim().to_string(),
        }
    }

    /// Parse `table`, `schema.table`, or `database.schema.table` (the
    /// database part is dropped). Quotes and backticks are stripped.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
            .collect();
        let parts: Vec<&str> = cleaned
            .split('.')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [] => None,
            [table] => Some(Self::new(None, table)),
            [.., schema, table] => Some(Self::new(Some(schema), table)),
        }
    }

    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

/// A heading and the text beneath it, up to the next heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub level: u8,
    pub heading: String,
    pub body: String,
}

/// One column as described in a table document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub description: String,
}

fn default_nullable() -> bool {
    true
}

/// A foreign key declared in a table document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_schema: Option<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
}

impl ForeignKeySpec {
    pub fn target(&self) -> TableRef {
        TableRef::new(self.ref_schema.as_deref(), &self.ref_table)
    }
}

/// Fields every parsed document carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocCommon {
    pub database: String,
    pub summary: String,
    pub content: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDoc {
    pub common: DocCommon,
    pub schema: Option<String>,
    pub table: String,
    pub domain: Option<String>,
    pub description: String,
    pub columns: Vec<ColumnSpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl TableDoc {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.schema.as_deref(), &self.table)
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Foreign keys that include `column`.
    pub fn foreign_keys_for(&self, column: &str) -> Vec<&ForeignKeySpec> {
        self.foreign_keys
            .iter()
            .filter(|fk| fk.columns.iter().any(|c| c == column))
            .collect()
    }

    pub fn metadata(&self) -> TableMetadata {
        TableMetadata {
            columns: self.columns.clone(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }
}

/// A column document, synthesized from its owning table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDoc {
    pub common: DocCommon,
    pub schema: Option<String>,
    pub table: String,
    pub domain: Option<String>,
    pub column: ColumnSpec,
    /// Terms computed during table-level keyword extraction.
    pub keywords: Vec<String>,
}

impl ColumnDoc {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.schema.as_deref(), &self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDoc {
    pub common: DocCommon,
    pub domain: String,
    pub tables: Vec<TableRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDoc {
    pub common: DocCommon,
    pub source: TableRef,
    pub source_columns: Vec<String>,
    pub target: TableRef,
    pub target_columns: Vec<String>,
    pub join_condition: Option<String>,
    pub description: String,
}

impl RelationshipDoc {
    pub fn metadata(&self) -> RelationshipMetadata {
        RelationshipMetadata {
            source: self.source.clone(),
            source_columns: self.source_columns.clone(),
            target: self.target.clone(),
            target_columns: self.target_columns.clone(),
            join_condition: self.join_condition.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewDoc {
    pub common: DocCommon,
    pub title: String,
}

/// A document after parsing, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDocument {
    Table(TableDoc),
    Column(ColumnDoc),
    Domain(DomainDoc),
    Relationship(RelationshipDoc),
    Overview(OverviewDoc),
}

impl ParsedDocument {
    pub fn doc_type(&self) -> DocType {
        match self {
            ParsedDocument::Table(_) => DocType::Table,
            ParsedDocument::Column(_) => DocType::Column,
            ParsedDocument::Domain(_) => DocType::Domain,
            ParsedDocument::Relationship(_) => DocType::Relationship,
            ParsedDocument::Overview(_) => DocType::Overview,
        }
    }

    pub fn common(&self) -> &DocCommon {
        match self {
            ParsedDocument::Table(d) => &d.common,
            ParsedDocument::Column(d) => &d.common,
            ParsedDocument::Domain(d) => &d.common,
            ParsedDocument::Relationship(d) => &d.common,
            ParsedDocument::Overview(d) => &d.common,
        }
    }

    pub fn database(&self) -> &str {
        &self.common().database
    }

    pub fn schema(&self) -> Option<&str> {
        match self {
            ParsedDocument::Table(d) => d.schema.as_deref(),
            ParsedDocument::Column(d) => d.schema.as_deref(),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            ParsedDocument::Table(d) => Some(&d.table),
            ParsedDocument::Column(d) => Some(&d.table),
            _ => None,
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            ParsedDocument::Column(d) => Some(&d.column.name),
            _ => None,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            ParsedDocument::Table(d) => d.domain.as_deref(),
            ParsedDocument::Column(d) => d.domain.as_deref(),
            ParsedDocument::Domain(d) => Some(&d.domain),
            _ => None,
        }
    }

    /// Short display title, also indexed by the lexical projection.
    pub fn title(&self) -> String {
        match self {
            ParsedDocument::Table(d) => d.table_ref().qualified(),
            ParsedDocument::Column(d) => format!("{}.{}", d.table_ref(), d.column.name),
            ParsedDocument::Domain(d) => d.domain.clone(),
            ParsedDocument::Relationship(d) => format!("{} -> {}", d.source, d.target),
            ParsedDocument::Overview(d) => d.title.clone(),
        }
    }

    /// Structured fields persisted alongside the content, so later runs can
    /// rebuild the relationship graph without reparsing unchanged files.
    pub fn metadata_json(&self) -> String {
        let value = match self {
            ParsedDocument::Table(d) => serde_json::to_value(d.metadata()),
            ParsedDocument::Column(d) => serde_json::to_value(&d.column),
            ParsedDocument::Domain(d) => Ok(serde_json::json!({ "tables": d.tables })),
            ParsedDocument::Relationship(d) => serde_json::to_value(d.metadata()),
            ParsedDocument::Overview(_) => Ok(serde_json::json!({})),
        };
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "{}".to_string())
    }
}

/// Structured part of a table document, stored as `metadata_json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySpec>,
}

/// Structured part of a relationship document, stored as `metadata_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    pub source: TableRef,
    pub source_columns: Vec<String>,
    pub target: TableRef,
    pub target_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_condition: Option<String>,
}

/// Persisted document record.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub doc_type: DocType,
    pub database: String,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub domain: Option<String>,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub source_path: String,
    pub content_hash: String,
    pub source_mtime: Option<i64>,
    pub parent_id: Option<String>,
    pub orphaned: bool,
    pub metadata_json: String,
    pub indexed_at: i64,
}

impl Document {
    /// Build the record for a parsed document at its resolved path.
    ///
    /// `parent_id` and `orphaned` are left unset; the store fills them in
    /// the same transaction as the write.
    pub fn from_parsed(
        parsed: &ParsedDocument,
        source_path: &str,
        content_hash: &str,
        keywords: Vec<String>,
        source_mtime: Option<i64>,
    ) -> Self {
        Self {
            id: document_id(source_path),
            doc_type: parsed.doc_type(),
            database: parsed.database().to_string(),
            schema: parsed.schema().map(str::to_string),
            table: parsed.table().map(str::to_string),
            column: parsed.column().map(str::to_string),
            domain: parsed.domain().map(str::to_string),
            title: parsed.title(),
            content: parsed.common().content.clone(),
            summary: parsed.common().summary.clone(),
            keywords,
            source_path: source_path.to_string(),
            content_hash: content_hash.to_string(),
            source_mtime,
            parent_id: None,
            orphaned: false,
            metadata_json: parsed.metadata_json(),
            indexed_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn table_ref(&self) -> Option<TableRef> {
        self.table
            .as_deref()
            .map(|t| TableRef::new(self.schema.as_deref(), t))
    }
}

/// Deterministic document id derived from the source path.
pub fn document_id(source_path: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, source_path.as_bytes()).to_string()
}

/// Lowercase SHA-256 hex digest of a document's source text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    ForeignKey,
    Documented,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::ForeignKey => "foreign_key",
            RelationshipKind::Documented => "documented",
        }
    }
}

impl FromStr for RelationshipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foreign_key" => Ok(RelationshipKind::ForeignKey),
            "documented" => Ok(RelationshipKind::Documented),
            other => Err(format!("unknown relationship kind: {}", other)),
        }
    }
}

/// One edge between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub database: String,
    pub source_path: String,
    pub source_table: TableRef,
    pub source_columns: Vec<String>,
    pub target_path: String,
    pub target_table: TableRef,
    pub target_columns: Vec<String>,
    pub kind: RelationshipKind,
    pub join_clause: String,
    /// Document the edge was extracted from (a table or relationship doc).
    pub origin_path: String,
}

/// Process-wide index state for one database.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexMetadata {
    pub database: String,
    pub schema_version: Option<u32>,
    pub last_run_at: Option<String>,
    pub last_run_mode: Option<String>,
    pub manifest_hash: Option<String>,
    pub plan_hash: Option<String>,
    pub counts: BTreeMap<DocType, i64>,
    pub relationship_count: Option<i64>,
    pub embedding_model: Option<String>,
    pub embedding_dims: Option<usize>,
    pub embeddings_complete: Option<bool>,
    pub embeddings_missing: Option<i64>,
}

impl IndexMetadata {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..Default::default()
        }
    }

    /// Flatten to key/value rows.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut put = |k: &str, v: Option<String>| {
            if let Some(v) = v {
                pairs.push((k.to_string(), v));
            }
        };
        put("schema_version", self.schema_version.map(|v| v.to_string()));
        put("last_run_at", self.last_run_at.clone());
        put("last_run_mode", self.last_run_mode.clone());
        put("manifest_hash", self.manifest_hash.clone());
        put("plan_hash", self.plan_hash.clone());
        put(
            "relationship_count",
            self.relationship_count.map(|v| v.to_string()),
        );
        put("embedding_model", self.embedding_model.clone());
        put("embedding_dims", self.embedding_dims.map(|v| v.to_string()));
        put(
            "embeddings_complete",
            self.embeddings_complete.map(|v| v.to_string()),
        );
        put(
            "embeddings_missing",
            self.embeddings_missing.map(|v| v.to_string()),
        );
        for (doc_type, count) in &self.counts {
            pairs.push((format!("count.{}", doc_type), count.to_string()));
        }
        pairs
    }

    /// Rebuild from key/value rows; unknown keys are ignored.
    pub fn from_pairs<I>(database: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut meta = Self::new(database);
        for (key, value) in pairs {
            match key.as_str() {
                "schema_version" => meta.schema_version = value.parse().ok(),
                "last_run_at" => meta.last_run_at = Some(value),
                "last_run_mode" => meta.last_run_mode = Some(value),
                "manifest_hash" => meta.manifest_hash = Some(value),
                "plan_hash" => meta.plan_hash = Some(value),
                "relationship_count" => meta.relationship_count = value.parse().ok(),
                "embedding_model" => meta.embedding_model = Some(value),
                "embedding_dims" => meta.embedding_dims = value.parse().ok(),
                "embeddings_complete" => meta.embeddings_complete = value.parse().ok(),
                "embeddings_missing" => meta.embeddings_missing = value.parse().ok(),
                other => {
                    if let Some(t) = other.strip_prefix("count.") {
                        if let (Ok(doc_type), Ok(n)) = (t.parse::<DocType>(), value.parse()) {
                            meta.counts.insert(doc_type, n);
                        }
                    }
                }
            }
        }
        meta
    }
}
