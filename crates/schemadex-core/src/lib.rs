//! # schemadex core
//!
//! Shared, runtime-free logic for schemadex: document models, manifest
//! validation, per-type parsers, identity resolution, keyword extraction,
//! the relationship graph, change classification, checkpoint snapshots,
//! the embedding provider trait, and the store abstraction.
//!
//! This crate contains no tokio runtime, sqlx, or filesystem I/O. The
//! `schemadex` app crate supplies the SQLite store, HTTP embedding
//! providers, and the pipeline that drives these pieces.

pub mod change;
pub mod checkpoint;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod identity;
pub mod keywords;
pub mod manifest;
pub mod models;
pub mod parse;
pub mod store;
