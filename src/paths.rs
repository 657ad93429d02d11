//! Join-path queries over the stored relationship graph.
//!
//! Paths are computed per request from the stored edge set; nothing is
//! materialized for all table pairs.

use anyhow::{anyhow, bail, Result};

use schemadex_core::graph::{PathResult, RelationshipGraph};
use schemadex_core::models::TableRef;
use schemadex_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// CLI entry point for `schemadex path`. `max_hops` falls back to
/// `indexer.max_hops`.
pub async fn run_path(
    config: &Config,
    database: &str,
    from: &str,
    to: &str,
    max_hops: Option<usize>,
) -> Result<()> {
    let max_hops = max_hops.unwrap_or(config.indexer.max_hops);
    if max_hops == 0 {
        bail!("--max-hops must be at least 1");
    }
    let store = SqliteStore::open(config).await?;
    let result = find_join_path(
        &store,
        database,
        from,
        to,
        max_hops,
        config.indexer.confidence_base,
    )
    .await;
    store.close().await;
    print_path(from, to, max_hops, &result?);
    Ok(())
}

/// Find the shortest join path between two tables of `database`.
///
/// Bare table names are matched against graph nodes when they are
/// unambiguous.
pub async fn find_join_path(
    store: &dyn Store,
    database: &str,
    from: &str,
    to: &str,
    max_hops: usize,
    confidence_base: f64,
) -> Result<PathResult> {
    let from = TableRef::parse(from).ok_or_else(|| anyhow!("invalid table reference: {}", from))?;
    let to = TableRef::parse(to).ok_or_else(|| anyhow!("invalid table reference: {}", to))?;

    let graph = RelationshipGraph::new(store.list_relationships(database).await?);
    let from = graph.resolve_node(&from).unwrap_or(from);
    let to = graph.resolve_node(&to).unwrap_or(to);
    Ok(graph.find_path(&from, &to, max_hops, confidence_base))
}

pub fn print_path(from: &str, to: &str, max_hops: usize, result: &PathResult) {
    println!("path {} -> {}", from, to);
    match result {
        PathResult::Found(path) => {
            println!("  hops: {}", path.hop_count());
            println!("  confidence: {:.3}", path.confidence);
            for (i, hop) in path.hops.iter().enumerate() {
                println!(
                    "  {}. {} -> {} ({})",
                    i + 1,
                    hop.from,
                    hop.to,
                    hop.kind.as_str()
                );
            }
            if !path.join_clause.is_empty() {
                println!("  join: {}", path.join_clause);
            }
            println!("ok");
        }
        PathResult::NotFound => {
            println!("  not found within {} hops", max_hops);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemadex_core::models::{Relationship, RelationshipKind};
    use schemadex_core::store::memory::InMemoryStore;

    fn edge(id: &str, from: &str, to: &str) -> Relationship {
        let source = TableRef::parse(from).unwrap();
        let target = TableRef::parse(to).unwrap();
        Relationship {
            id: id.to_string(),
            database: "shop".to_string(),
            source_path: format!("{}.md", from),
            source_columns: vec![format!("{}_id", target.table)],
            target_path: format!("{}.md", to),
            target_columns: vec!["id".to_string()],
            kind: RelationshipKind::ForeignKey,
            join_clause: String::new(),
            origin_path: format!("{}.md", from),
            source_table: source,
            target_table: target,
        }
    }

    #[tokio::test]
    async fn resolves_bare_names_and_reports_not_found() {
        let store = InMemoryStore::new();
        store
            .replace_relationships(
                "shop",
                &[
                    edge("e1", "sales.orders", "sales.customers"),
                    edge("e2", "sales.customers", "geo.regions"),
                ],
            )
            .await
            .unwrap();

        let result = find_join_path(&store, "shop", "orders", "regions", 3, 0.9)
            .await
            .unwrap();
        let path = result.found().unwrap();
        assert_eq!(path.hop_count(), 2);
        assert_eq!(
            path.join_clause,
            "sales.orders.customers_id = sales.customers.id AND sales.customers.regions_id = geo.regions.id"
        );

        let capped = find_join_path(&store, "shop", "orders", "regions", 1, 0.9)
            .await
            .unwrap();
        assert_eq!(capped, PathResult::NotFound);

        assert!(find_join_path(&store, "shop", "", "orders", 3, 0.9).await.is_err());
    }
}
