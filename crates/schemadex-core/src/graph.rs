//! Relationship graph and join-path search.
//!
//! Edges come from two places: foreign keys declared in table documents
//! and explicit relationship documents. Paths are computed on demand with
//! a breadth-first search, so the first path found has the fewest hops;
//! among equally short paths the one discovered first wins, following
//! edge insertion order.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use uuid::Uuid;

use crate::error::RunIssue;
use crate::identity::{IdentityKey, IdentityResolver, TableResolution};
use crate::models::{Relationship, RelationshipKind, RelationshipMetadata, TableMetadata, TableRef};

pub const DEFAULT_MAX_HOPS: usize = 3;
pub const DEFAULT_CONFIDENCE_BASE: f64 = 0.9;

/// A table document's structured metadata, as input to edge extraction.
#[derive(Debug, Clone)]
pub struct TableSource {
    pub path: String,
    pub table: TableRef,
    pub metadata: TableMetadata,
}

/// A relationship document's structured metadata.
#[derive(Debug, Clone)]
pub struct RelationshipSource {
    pub path: String,
    pub metadata: RelationshipMetadata,
}

/// Column-equality predicates, `a.x = b.y AND ...`.
pub fn join_predicates(
    from: &TableRef,
    from_columns: &[String],
    to: &TableRef,
    to_columns: &[String],
) -> String {
    from_columns
        .iter()
        .zip(to_columns)
        .map(|(a, b)| format!("{}.{} = {}.{}", from, a, to, b))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn edge_id(
    database: &str,
    source: &TableRef,
    source_columns: &[String],
    target: &TableRef,
    target_columns: &[String],
    kind: RelationshipKind,
) -> String {
    let name = format!(
        "{}|{}({})|{}({})|{}",
        database,
        source,
        source_columns.join(","),
        target,
        target_columns.join(","),
        kind.as_str()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

struct EdgeCollector<'a> {
    database: &'a str,
    resolver: &'a IdentityResolver,
    seen: HashSet<(TableRef, Vec<String>, TableRef, Vec<String>)>,
    edges: Vec<Relationship>,
    issues: Vec<RunIssue>,
}

impl EdgeCollector<'_> {
    /// Resolve an endpoint to its canonical ref and path. Unknown tables
    /// get their fallback path; ambiguous bare names are rejected.
    fn endpoint(&mut self, origin: &str, table: &TableRef) -> Option<(TableRef, String)> {
        match self.resolver.resolve_table(self.database, table) {
            TableResolution::Found { table, path } => Some((table, path)),
            TableResolution::Missing => {
                let key = IdentityKey::Table {
                    database: self.database.to_string(),
                    table: table.clone(),
                };
                self.issues.push(RunIssue::warning(
                    Some(origin),
                    format!("table {} is not documented; using a generated path", table),
                ));
                Some((table.clone(), key.fallback_path()))
            }
            TableResolution::Ambiguous(candidates) => {
                let names: Vec<String> = candidates.iter().map(TableRef::qualified).collect();
                self.issues.push(RunIssue::warning(
                    Some(origin),
                    format!(
                        "table reference {} is ambiguous ({}); edge skipped",
                        table,
                        names.join(", ")
                    ),
                ));
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add(
        &mut self,
        origin: &str,
        source: (TableRef, String),
        source_columns: &[String],
        target: (TableRef, String),
        target_columns: &[String],
        kind: RelationshipKind,
        join_condition: Option<&str>,
    ) {
        let join_clause = if !source_columns.is_empty() && source_columns.len() == target_columns.len()
        {
            join_predicates(&source.0, source_columns, &target.0, target_columns)
        } else if let Some(condition) = join_condition {
            condition.to_string()
        } else {
            self.issues.push(RunIssue::warning(
                Some(origin),
                format!(
                    "relationship {} -> {} has no usable join columns; edge skipped",
                    source.0, target.0
                ),
            ));
            return;
        };

        let dedup_key = (
            source.0.clone(),
            source_columns.to_vec(),
            target.0.clone(),
            target_columns.to_vec(),
        );
        if !self.seen.insert(dedup_key) {
            return;
        }
        self.edges.push(Relationship {
            id: edge_id(
                self.database,
                &source.0,
                source_columns,
                &target.0,
                target_columns,
                kind,
            ),
            database: self.database.to_string(),
            source_path: source.1,
            source_table: source.0,
            source_columns: source_columns.to_vec(),
            target_path: target.1,
            target_table: target.0,
            target_columns: target_columns.to_vec(),
            kind,
            join_clause,
            origin_path: origin.to_string(),
        });
    }
}

/// Collect every edge for one database: foreign keys first, then
/// relationship documents. Exact duplicates keep the first edge.
pub fn extract_edges(
    database: &str,
    tables: &[TableSource],
    relationships: &[RelationshipSource],
    resolver: &IdentityResolver,
) -> (Vec<Relationship>, Vec<RunIssue>) {
    let mut collector = EdgeCollector {
        database,
        resolver,
        seen: HashSet::new(),
        edges: Vec::new(),
        issues: Vec::new(),
    };

    for table in tables {
        for fk in &table.metadata.foreign_keys {
            let source = (table.table.clone(), table.path.clone());
            let Some(target) = collector.endpoint(&table.path, &fk.target()) else {
                continue;
            };
            collector.add(
                &table.path,
                source,
                &fk.columns,
                target,
                &fk.ref_columns,
                RelationshipKind::ForeignKey,
                None,
            );
        }
    }

    for rel in relationships {
        let meta = &rel.metadata;
        let Some(source) = collector.endpoint(&rel.path, &meta.source) else {
            continue;
        };
        let Some(target) = collector.endpoint(&rel.path, &meta.target) else {
            continue;
        };
        collector.add(
            &rel.path,
            source,
            &meta.source_columns,
            target,
            &meta.target_columns,
            RelationshipKind::Documented,
            meta.join_condition.as_deref(),
        );
    }

    (collector.edges, collector.issues)
}

/// One traversed edge, oriented in traversal order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinHop {
    pub from: TableRef,
    pub from_columns: Vec<String>,
    pub to: TableRef,
    pub to_columns: Vec<String>,
    pub kind: RelationshipKind,
    pub predicate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPath {
    pub from: TableRef,
    pub to: TableRef,
    pub hops: Vec<JoinHop>,
    pub confidence: f64,
    pub join_clause: String,
}

impl JoinPath {
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }
}

/// Outcome of a path query. `NotFound` is distinct from a zero-hop path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    Found(JoinPath),
    NotFound,
}

impl PathResult {
    pub fn found(&self) -> Option<&JoinPath> {
        match self {
            PathResult::Found(p) => Some(p),
            PathResult::NotFound => None,
        }
    }
}

pub fn confidence(hops: usize, base: f64) -> f64 {
    base.powi(hops as i32)
}

/// Undirected multigraph keyed by table.
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    edges: Vec<Relationship>,
    /// node -> (edge index, traversed source-to-target)
    adjacency: HashMap<TableRef, Vec<(usize, bool)>>,
}

impl RelationshipGraph {
    pub fn new(edges: Vec<Relationship>) -> Self {
        let mut adjacency: HashMap<TableRef, Vec<(usize, bool)>> = HashMap::new();
        for (idx, edge) in edges.iter().enumerate() {
            adjacency
                .entry(edge.source_table.clone())
                .or_default()
                .push((idx, true));
            if edge.target_table != edge.source_table {
                adjacency
                    .entry(edge.target_table.clone())
                    .or_default()
                    .push((idx, false));
            }
        }
        Self { edges, adjacency }
    }

    pub fn edges(&self) -> &[Relationship] {
        &self.edges
    }

    pub fn contains(&self, table: &TableRef) -> bool {
        self.adjacency.contains_key(table)
    }

    /// Match a user-supplied reference to a graph node: exactly, or by
    /// bare name when only one node has that name.
    pub fn resolve_node(&self, table: &TableRef) -> Option<TableRef> {
        if self.contains(table) {
            return Some(table.clone());
        }
        if table.schema.is_some() {
            return None;
        }
        let mut matches = self.adjacency.keys().filter(|n| n.table == table.table);
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }

    /// Shortest join path of at most `max_hops` edges.
    pub fn find_path(
        &self,
        from: &TableRef,
        to: &TableRef,
        max_hops: usize,
        confidence_base: f64,
    ) -> PathResult {
        if from == to {
            return PathResult::Found(JoinPath {
                from: from.clone(),
                to: to.clone(),
                hops: Vec::new(),
                confidence: confidence(0, confidence_base),
                join_clause: String::new(),
            });
        }
        if !self.contains(from) || !self.contains(to) {
            return PathResult::NotFound;
        }

        let mut came_from: HashMap<&TableRef, (&TableRef, usize, bool)> = HashMap::new();
        let mut visited: HashSet<&TableRef> = HashSet::from([from]);
        let mut queue: VecDeque<(&TableRef, usize)> = VecDeque::from([(from, 0)]);

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_hops {
                continue;
            }
            let Some(neighbors) = self.adjacency.get(node) else {
                continue;
            };
            for &(idx, forward) in neighbors {
                let edge = &self.edges[idx];
                let next = if forward {
                    &edge.target_table
                } else {
                    &edge.source_table
                };
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, (node, idx, forward));
                if next == to {
                    return PathResult::Found(self.build_path(from, to, &came_from, confidence_base));
                }
                queue.push_back((next, depth + 1));
            }
        }
        PathResult::NotFound
    }

    fn build_path(
        &self,
        from: &TableRef,
        to: &TableRef,
        came_from: &HashMap<&TableRef, (&TableRef, usize, bool)>,
        confidence_base: f64,
    ) -> JoinPath {
        let mut hops = Vec::new();
        let mut current = to;
        while current != from {
            let Some(&(prev, idx, forward)) = came_from.get(current) else {
                break;
            };
            let edge = &self.edges[idx];
            let (from_columns, to_columns) = if forward {
                (edge.source_columns.clone(), edge.target_columns.clone())
            } else {
                (edge.target_columns.clone(), edge.source_columns.clone())
            };
            let predicate = if from_columns.is_empty() {
                edge.join_clause.clone()
            } else {
                join_predicates(prev, &from_columns, current, &to_columns)
            };
            hops.push(JoinHop {
                from: prev.clone(),
                from_columns,
                to: current.clone(),
                to_columns,
                kind: edge.kind,
                predicate,
            });
            current = prev;
        }
        hops.reverse();
        let join_clause = hops
            .iter()
            .map(|h| h.predicate.as_str())
            .collect::<Vec<_>>()
            .join(" AND ");
        JoinPath {
            from: from.clone(),
            to: to.clone(),
            confidence: confidence(hops.len(), confidence_base),
            hops,
            join_clause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForeignKeySpec;

    fn t(name: &str) -> TableRef {
        TableRef::new(Some("public"), name)
    }

    fn fk_table(name: &str, refs: &[&str]) -> TableSource {
        TableSource {
            path: format!("tables/{}.md", name),
            table: t(name),
            metadata: TableMetadata {
                columns: Vec::new(),
                foreign_keys: refs
                    .iter()
                    .map(|r| ForeignKeySpec {
                        columns: vec![format!("{}_id", r)],
                        ref_schema: Some("public".to_string()),
                        ref_table: r.to_string(),
                        ref_columns: vec!["id".to_string()],
                    })
                    .collect(),
            },
        }
    }

    fn resolver_for(names: &[&str]) -> IdentityResolver {
        let mut r = IdentityResolver::new();
        for n in names {
            r.register(
                IdentityKey::Table {
                    database: "db".to_string(),
                    table: t(n),
                },
                &format!("tables/{}.md", n),
            );
        }
        r
    }

    /// a - b - c - d - e - f, each linked by a foreign key, plus isolated g.
    fn chain() -> RelationshipGraph {
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        let tables = vec![
            fk_table("a", &[]),
            fk_table("b", &["a"]),
            fk_table("c", &["b"]),
            fk_table("d", &["c"]),
            fk_table("e", &["d"]),
            fk_table("f", &["e"]),
            fk_table("g", &[]),
        ];
        let (edges, issues) = extract_edges("db", &tables, &[], &resolver_for(&names));
        assert!(issues.is_empty());
        RelationshipGraph::new(edges)
    }

    #[test]
    fn chain_hop_counts_and_confidence() {
        let g = chain();
        let af = g.find_path(&t("a"), &t("f"), 5, DEFAULT_CONFIDENCE_BASE);
        let ae = g.find_path(&t("a"), &t("e"), 5, DEFAULT_CONFIDENCE_BASE);
        let af = af.found().unwrap();
        let ae = ae.found().unwrap();
        assert_eq!(af.hop_count(), 5);
        assert_eq!(ae.hop_count(), 4);
        assert!(af.confidence < ae.confidence);

        let ab = g.find_path(&t("a"), &t("b"), 5, DEFAULT_CONFIDENCE_BASE);
        assert_eq!(ab.found().unwrap().hop_count(), 1);
        assert!(ab.found().unwrap().confidence > ae.confidence);
    }

    #[test]
    fn hop_bound_is_enforced() {
        let g = chain();
        assert_eq!(
            g.find_path(&t("a"), &t("f"), DEFAULT_MAX_HOPS, DEFAULT_CONFIDENCE_BASE),
            PathResult::NotFound
        );
        assert!(g
            .find_path(&t("a"), &t("d"), DEFAULT_MAX_HOPS, DEFAULT_CONFIDENCE_BASE)
            .found()
            .is_some());
    }

    #[test]
    fn disconnected_table_is_not_found_but_self_is_zero_hops() {
        let g = chain();
        assert_eq!(
            g.find_path(&t("a"), &t("g"), 8, DEFAULT_CONFIDENCE_BASE),
            PathResult::NotFound
        );
        let same = g.find_path(&t("g"), &t("g"), 3, DEFAULT_CONFIDENCE_BASE);
        let same = same.found().unwrap();
        assert_eq!(same.hop_count(), 0);
        assert_eq!(same.confidence, 1.0);
        assert!(same.join_clause.is_empty());
    }

    #[test]
    fn join_clause_follows_traversal_order() {
        let g = chain();
        let path = g.find_path(&t("a"), &t("c"), 3, 0.5);
        let path = path.found().unwrap();
        assert_eq!(
            path.join_clause,
            "public.a.id = public.b.a_id AND public.b.id = public.c.b_id"
        );
        assert_eq!(path.confidence, 0.25);
        let back = g.find_path(&t("c"), &t("a"), 3, 0.5);
        assert_eq!(
            back.found().unwrap().join_clause,
            "public.c.b_id = public.b.id AND public.b.a_id = public.a.id"
        );
    }

    #[test]
    fn ties_break_by_insertion_order() {
        // a -> x -> d and a -> y -> d are both two hops; x was inserted first.
        let names = ["a", "x", "y", "d"];
        let tables = vec![
            fk_table("x", &["a"]),
            fk_table("y", &["a"]),
            fk_table("d", &["x", "y"]),
        ];
        let (edges, _) = extract_edges("db", &tables, &[], &resolver_for(&names));
        let g = RelationshipGraph::new(edges);
        let path = g.find_path(&t("a"), &t("d"), 3, 0.9);
        assert_eq!(path.found().unwrap().hops[0].to, t("x"));
    }

    #[test]
    fn documented_duplicates_of_foreign_keys_are_dropped() {
        let tables = vec![fk_table("b", &["a"])];
        let rels = vec![
            RelationshipSource {
                path: "rels/b-a.md".to_string(),
                metadata: RelationshipMetadata {
                    source: t("b"),
                    source_columns: vec!["a_id".to_string()],
                    target: t("a"),
                    target_columns: vec!["id".to_string()],
                    join_condition: None,
                },
            },
            RelationshipSource {
                path: "rels/b-a-alt.md".to_string(),
                metadata: RelationshipMetadata {
                    source: t("b"),
                    source_columns: vec![],
                    target: t("a"),
                    target_columns: vec![],
                    join_condition: Some("b.created_by = a.owner".to_string()),
                },
            },
        ];
        let (edges, issues) = extract_edges("db", &tables, &rels, &resolver_for(&["a", "b"]));
        assert!(issues.is_empty());
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].kind, RelationshipKind::ForeignKey);
        assert_eq!(edges[1].kind, RelationshipKind::Documented);
        assert_eq!(edges[1].join_clause, "b.created_by = a.owner");
    }

    #[test]
    fn same_bare_name_in_two_schemas_gives_distinct_edges() {
        let mut resolver = IdentityResolver::new();
        for (schema, path) in [("public", "p.md"), ("archive", "a.md"), ("public", "c.md")] {
            let name = if path == "c.md" { "customers" } else { "orders" };
            resolver.register(
                IdentityKey::Table {
                    database: "db".to_string(),
                    table: TableRef::new(Some(schema), name),
                },
                path,
            );
        }
        let fk = |schema: &str, path: &str| TableSource {
            path: path.to_string(),
            table: TableRef::new(Some(schema), "orders"),
            metadata: TableMetadata {
                columns: vec![],
                foreign_keys: vec![ForeignKeySpec {
                    columns: vec!["customer_id".to_string()],
                    ref_schema: None,
                    ref_table: "customers".to_string(),
                    ref_columns: vec!["id".to_string()],
                }],
            },
        };
        let (edges, issues) = extract_edges(
            "db",
            &[fk("public", "p.md"), fk("archive", "a.md")],
            &[],
            &resolver,
        );
        assert!(issues.is_empty());
        assert_eq!(edges.len(), 2);
        assert_ne!(edges[0].id, edges[1].id);
        assert_eq!(edges[0].source_path, "p.md");
        assert_eq!(edges[1].source_path, "a.md");
        assert_eq!(edges[0].target_path, "c.md");
    }

    #[test]
    fn unresolved_targets_use_fallback_paths_and_warn() {
        let tables = vec![fk_table("b", &["ghost"])];
        let (edges, issues) = extract_edges("db", &tables, &[], &resolver_for(&["b"]));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_path, "generated/table/db/public.ghost");
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn resolve_node_by_bare_name() {
        let g = chain();
        assert_eq!(g.resolve_node(&TableRef::new(None, "c")), Some(t("c")));
        assert_eq!(g.resolve_node(&TableRef::new(Some("other"), "c")), None);
        assert_eq!(g.resolve_node(&TableRef::new(None, "zzz")), None);
    }
}
