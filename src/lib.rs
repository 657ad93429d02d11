//! # schemadex
//!
//! Indexes database schema documentation and makes it searchable.
//!
//! schemadex reads a manifest of documentation files (tables, domains,
//! relationships, overviews) produced upstream, parses them, synthesizes
//! per-column documents, extracts keywords, embeds them through an external
//! service, and stores everything in SQLite with an FTS5 lexical projection
//! and a vector table. Foreign keys and documented relationships form a
//! graph that answers multi-hop join-path queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │ Manifest │──▶│ Parse, resolve,      │──▶│   SQLite     │
//! │  + docs  │   │ keywords, embed      │   │ FTS5 + Vec   │
//! └──────────┘   └──────────────────────┘   │ + edges      │
//!                                           └──────┬───────┘
//!                                                  ▼
//!                                   search / path / get / status
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! schemadex init
//! schemadex index docs/manifest.json
//! schemadex index docs/manifest.json --incremental
//! schemadex search "customer orders"
//! schemadex path orders regions --database shop
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the store trait |
//! | [`embedding`] | HTTP embedding providers and the batching generator |
//! | [`loader`] | Manifest and source file loading |
//! | [`indexer`] | Index pipeline orchestration |
//! | [`status`] | Dry-run preview |
//! | [`search`] | Lexical search |
//! | [`paths`] | Join-path queries |
//! | [`get`] | Document retrieval |
//! | [`progress`] | Progress reporting |

pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod indexer;
pub mod loader;
pub mod migrate;
pub mod paths;
pub mod progress;
pub mod search;
pub mod sqlite_store;
pub mod status;
