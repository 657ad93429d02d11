//! Identity resolution: mapping documents to their canonical source path.
//!
//! Matching is always on exact identifying fields. A bare table name (no
//! schema) only resolves when it names exactly one registered table in the
//! database; there is no prefix or substring matching, so `orders` never
//! matches `orders_archive` and `public.orders` never matches
//! `archive.orders`.

use std::collections::HashMap;

use crate::models::{DocType, Document, ParsedDocument, TableRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Table {
        database: String,
        table: TableRef,
    },
    Domain {
        database: String,
        domain: String,
    },
    Relationship {
        database: String,
        source: TableRef,
        target: TableRef,
    },
    Overview {
        database: String,
        title: String,
    },
}

impl IdentityKey {
    /// Key of a parsed document. Columns have none; their identity is
    /// their table's path plus the column name.
    pub fn of(doc: &ParsedDocument) -> Option<Self> {
        let database = doc.database().to_string();
        match doc {
            ParsedDocument::Table(t) => Some(IdentityKey::Table {
                database,
                table: t.table_ref(),
            }),
            ParsedDocument::Domain(d) => Some(IdentityKey::Domain {
                database,
                domain: d.domain.clone(),
            }),
            ParsedDocument::Relationship(r) => Some(IdentityKey::Relationship {
                database,
                source: r.source.clone(),
                target: r.target.clone(),
            }),
            ParsedDocument::Overview(o) => Some(IdentityKey::Overview {
                database,
                title: o.title.clone(),
            }),
            ParsedDocument::Column(_) => None,
        }
    }

    /// Key of a stored document, for seeding a resolver from the store.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let database = doc.database.clone();
        match doc.doc_type {
            DocType::Table => Some(IdentityKey::Table {
                database,
                table: doc.table_ref()?,
            }),
            DocType::Domain => Some(IdentityKey::Domain {
                database,
                domain: doc.domain.clone()?,
            }),
            DocType::Relationship => {
                let meta: crate::models::RelationshipMetadata =
                    serde_json::from_str(&doc.metadata_json).ok()?;
                Some(IdentityKey::Relationship {
                    database,
                    source: meta.source,
                    target: meta.target,
                })
            }
            DocType::Overview => Some(IdentityKey::Overview {
                database,
                title: doc.title.clone(),
            }),
            DocType::Column => None,
        }
    }

    pub fn doc_type(&self) -> DocType {
        match self {
            IdentityKey::Table { .. } => DocType::Table,
            IdentityKey::Domain { .. } => DocType::Domain,
            IdentityKey::Relationship { .. } => DocType::Relationship,
            IdentityKey::Overview { .. } => DocType::Overview,
        }
    }

    /// Deterministic path built only from the identifying fields.
    pub fn fallback_path(&self) -> String {
        let fields = match self {
            IdentityKey::Table { database, table } => vec![database.clone(), table.qualified()],
            IdentityKey::Domain { database, domain } => vec![database.clone(), domain.clone()],
            IdentityKey::Relationship {
                database,
                source,
                target,
            } => vec![
                database.clone(),
                format!("{}--{}", source.qualified(), target.qualified()),
            ],
            IdentityKey::Overview { database, title } => vec![database.clone(), title.clone()],
        };
        let slugged: Vec<String> = fields.iter().map(|f| slug(f)).collect();
        format!("generated/{}/{}", self.doc_type(), slugged.join("/"))
    }
}

fn slug(field: &str) -> String {
    field
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Synthetic path of a column document.
pub fn column_path(table_path: &str, column: &str) -> String {
    format!("{}#{}", table_path, column)
}

/// Split a synthetic column path into table path and column name.
pub fn split_column_path(path: &str) -> Option<(&str, &str)> {
    path.split_once('#')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The same path registered the same identity before.
    AlreadyKnown,
    /// Another path already owns this identity.
    Duplicate { existing: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableResolution {
    Found { table: TableRef, path: String },
    Ambiguous(Vec<TableRef>),
    Missing,
}

/// Registry of identities seen so far, in registration order.
#[derive(Debug, Default, Clone)]
pub struct IdentityResolver {
    paths: HashMap<IdentityKey, String>,
    by_path: HashMap<String, IdentityKey>,
    /// (database, bare table name) -> schema-qualified refs.
    tables_by_name: HashMap<(String, String), Vec<TableRef>>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under `path`. The first registration of a key wins.
    pub fn register(&mut self, key: IdentityKey, path: &str) -> Registration {
        if let Some(existing) = self.paths.get(&key) {
            if existing == path {
                return Registration::AlreadyKnown;
            }
            return Registration::Duplicate {
                existing: existing.clone(),
            };
        }
        // A path that changed identity (e.g. a renamed table) drops its old key.
        if let Some(old) = self.by_path.remove(path) {
            self.forget_key(&old);
        }
        if let IdentityKey::Table { database, table } = &key {
            self.tables_by_name
                .entry((database.clone(), table.table.clone()))
                .or_default()
                .push(table.clone());
        }
        self.paths.insert(key.clone(), path.to_string());
        self.by_path.insert(path.to_string(), key);
        Registration::Registered
    }

    /// Remove whatever identity `path` owns.
    pub fn unregister_path(&mut self, path: &str) {
        if let Some(key) = self.by_path.remove(path) {
            self.forget_key(&key);
        }
    }

    fn forget_key(&mut self, key: &IdentityKey) {
        self.paths.remove(key);
        if let IdentityKey::Table { database, table } = key {
            let name_key = (database.clone(), table.table.clone());
            if let Some(refs) = self.tables_by_name.get_mut(&name_key) {
                refs.retain(|r| r != table);
                if refs.is_empty() {
                    self.tables_by_name.remove(&name_key);
                }
            }
        }
    }

    pub fn path_of(&self, key: &IdentityKey) -> Option<&str> {
        self.paths.get(key).map(String::as_str)
    }

    /// Registered path for a document, or its deterministic fallback.
    pub fn resolve_or_fallback(&self, key: &IdentityKey) -> String {
        self.path_of(key)
            .map(str::to_string)
            .unwrap_or_else(|| key.fallback_path())
    }

    /// Resolve a table reference within a database.
    ///
    /// A qualified reference must match exactly. A bare reference matches
    /// a table registered without a schema, or else the single schema that
    /// has a table of that name.
    pub fn resolve_table(&self, database: &str, table: &TableRef) -> TableResolution {
        let candidates = match self
            .tables_by_name
            .get(&(database.to_string(), table.table.clone()))
        {
            Some(c) => c,
            None => return TableResolution::Missing,
        };
        let found = |r: &TableRef| {
            let key = IdentityKey::Table {
                database: database.to_string(),
                table: r.clone(),
            };
            match self.paths.get(&key) {
                Some(path) => TableResolution::Found {
                    table: r.clone(),
                    path: path.clone(),
                },
                None => TableResolution::Missing,
            }
        };
        if table.schema.is_some() {
            return match candidates.iter().find(|r| *r == table) {
                Some(r) => found(r),
                None => TableResolution::Missing,
            };
        }
        if let Some(bare) = candidates.iter().find(|r| r.schema.is_none()) {
            return found(bare);
        }
        match candidates.as_slice() {
            [only] => found(only),
            [] => TableResolution::Missing,
            many => TableResolution::Ambiguous(many.to_vec()),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_key(db: &str, schema: Option<&str>, table: &str) -> IdentityKey {
        IdentityKey::Table {
            database: db.to_string(),
            table: TableRef::new(schema, table),
        }
    }

    #[test]
    fn same_name_in_two_schemas_stays_distinct() {
        let mut r = IdentityResolver::new();
        assert_eq!(
            r.register(table_key("shop", Some("public"), "orders"), "t/public.orders.md"),
            Registration::Registered
        );
        assert_eq!(
            r.register(table_key("shop", Some("archive"), "orders"), "t/archive.orders.md"),
            Registration::Registered
        );
        assert_eq!(
            r.resolve_table("shop", &TableRef::new(Some("archive"), "orders")),
            TableResolution::Found {
                table: TableRef::new(Some("archive"), "orders"),
                path: "t/archive.orders.md".to_string()
            }
        );
        assert!(matches!(
            r.resolve_table("shop", &TableRef::new(None, "orders")),
            TableResolution::Ambiguous(refs) if refs.len() == 2
        ));
    }

    #[test]
    fn no_prefix_matching() {
        let mut r = IdentityResolver::new();
        r.register(table_key("shop", Some("public"), "orders_archive"), "a.md");
        assert_eq!(
            r.resolve_table("shop", &TableRef::new(None, "orders")),
            TableResolution::Missing
        );
        assert_eq!(
            r.resolve_table("other", &TableRef::new(None, "orders_archive")),
            TableResolution::Missing
        );
    }

    #[test]
    fn bare_name_resolves_when_unique() {
        let mut r = IdentityResolver::new();
        r.register(table_key("shop", Some("public"), "customers"), "c.md");
        assert!(matches!(
            r.resolve_table("shop", &TableRef::new(None, "customers")),
            TableResolution::Found { path, .. } if path == "c.md"
        ));
    }

    #[test]
    fn first_registration_wins() {
        let mut r = IdentityResolver::new();
        let key = table_key("shop", None, "orders");
        r.register(key.clone(), "first.md");
        assert_eq!(r.register(key.clone(), "first.md"), Registration::AlreadyKnown);
        assert_eq!(
            r.register(key.clone(), "second.md"),
            Registration::Duplicate {
                existing: "first.md".to_string()
            }
        );
        assert_eq!(r.path_of(&key), Some("first.md"));
    }

    #[test]
    fn path_changing_identity_drops_old_key() {
        let mut r = IdentityResolver::new();
        r.register(table_key("shop", None, "orders"), "t.md");
        r.register(table_key("shop", None, "purchases"), "t.md");
        assert_eq!(r.len(), 1);
        assert_eq!(
            r.resolve_table("shop", &TableRef::new(None, "orders")),
            TableResolution::Missing
        );
        r.unregister_path("t.md");
        assert!(r.is_empty());
    }

    #[test]
    fn fallback_paths_are_deterministic() {
        let key = IdentityKey::Relationship {
            database: "Shop".to_string(),
            source: TableRef::new(Some("public"), "orders"),
            target: TableRef::new(Some("public"), "customers"),
        };
        assert_eq!(
            key.fallback_path(),
            "generated/relationship/shop/public.orders--public.customers"
        );
        assert_eq!(key.fallback_path(), key.clone().fallback_path());
        assert_eq!(
            IdentityResolver::new().resolve_or_fallback(&table_key("db", None, "My Table")),
            "generated/table/db/my_table"
        );
    }

    #[test]
    fn column_paths() {
        let p = column_path("tables/orders.md", "id");
        assert_eq!(p, "tables/orders.md#id");
        assert_eq!(split_column_path(&p), Some(("tables/orders.md", "id")));
        assert_eq!(split_column_path("tables/orders.md"), None);
    }
}
