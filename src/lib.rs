//! # Codenav - Tiered Code Navigation Aggregation
//!
//! A Rust library that answers editor-style code navigation requests
//! (go-to-definition, find-references, hover, document highlights) by
//! aggregating three result tiers of decreasing precision and increasing
//! availability.
//!
//! ## Overview
//!
//! Codenav sits between a host (an editor or code browser) and a set of
//! pluggable backends. Every request fans out across the configured tiers
//! in strict precedence order and streams incrementally refined results
//! back to the host, each tagged with its provenance.
//!
//! ## Key Features
//!
//! - **Tiered Resolution**: precise index data beats live analysis beats
//!   heuristic search; lower tiers are consulted only on abstention
//! - **Streaming Results**: reference results render progressively as
//!   pages and cross-repository contributions arrive
//! - **Window Cache**: nearby precise queries fold into one bulk request
//!   per window of lines, with LRU eviction across open documents
//! - **Latency Racing**: cached-window lookups race a delayed
//!   single-position fallback so a cold cache never blocks a hover
//! - **Cross-Repository References**: dependent repositories are
//!   discovered and queried concurrently, with results translated back
//!   into the caller's URI scheme
//! - **Provenance Tags**: every emission says which tier produced it, and
//!   blended locations carry per-location badges
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │      Host       │  (editor, code browser)
//! └────────┬────────┘
//!          │ streams
//! ┌────────▼────────┐
//! │    NavEngine    │  (precedence, blending, memoization)
//! └────────┬────────┘
//!          │
//!    ┌─────┴─────┬──────────────┐
//!    │           │              │
//! ┌──▼───────┐ ┌─▼──────────┐ ┌─▼───────────┐
//! │ Precise  │ │    Live    │ │ Approximate │
//! │ (window  │ │ (language  │ │ (identifier │
//! │  cache,  │ │  analysis  │ │  search)    │
//! │  pages)  │ │  service)  │ │             │
//! └──────────┘ └────────────┘ └─────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use codenav::config::Config;
//! use codenav::engine::NavEngine;
//! use codenav::types::{Document, DocumentUri, Position};
//! use futures::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(
//! #     precise: Arc<dyn codenav::backends::PreciseBackend>,
//! #     search: Arc<dyn codenav::backends::SearchBackend>,
//! # ) -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let engine = NavEngine::from_backends(config, Some(precise), None, search);
//!
//! let doc = Document {
//!     uri: DocumentUri::new("acme/api", "deadbeef", "src/server.go"),
//!     language: "go".to_string(),
//!     text: String::new(),
//! };
//! let mut results = engine.definition(&doc, Position::new(41, 8), CancellationToken::new());
//! while let Some(result) = results.next().await {
//!     println!("{:?}", result?);
//! }
//! # Ok(())
//! # }
//! ```

/// Backend traits the host implements to connect real data sources
pub mod backends;

/// Configuration management with environment variable overrides
pub mod config;

/// Dependent-repository discovery and cross-repository reference fan-out
pub mod discovery;

/// The aggregation engine: tier precedence, blending, and memoization
pub mod engine;

/// Error types and utilities
pub mod error;

/// Cursor-based reference pagination with cumulative snapshots
pub mod paginator;

/// Precise, live, and approximate result-source adapters
pub mod sources;

/// Streaming primitives and the latency race helper
pub mod stream;

/// Positions, ranges, URIs, results, and provenance types
pub mod types;

/// Spatial window cache for bulk precise queries
pub mod window;
