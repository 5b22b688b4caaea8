//! Backend seams the navigation core depends on but does not implement
//!
//! Each backend is injected as an `Arc<dyn …>` at construction time. The
//! wire formats behind these traits (GraphQL, LSP-style messages, search
//! APIs) are the host's problem; the core only sees these contracts.
//!
//! Error classification is part of the contract. Network and connection
//! failures must be returned as [`Transport`](crate::error::NavError)
//! errors (and unresolvable names as `Unresolvable` ones) so
//! [`is_abstention`](crate::error::is_abstention) recognizes them and the
//! engine falls through to the next tier. Any error the engine cannot
//! classify is treated as a contract violation and propagates to the
//! caller as fatal.

use crate::types::{
    CodeIntelRange, Document, DocumentUri, Hover, Location, PackageDescriptor, Position, Range,
    ReferenceContext, ReferencePage, RemoteLocation, SymbolInfo,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Optional features discovered through backend introspection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the backend answers bulk windowed range queries
    #[serde(default)]
    pub windowed_queries: bool,
}

/// The precomputed-index backend
///
/// Positions and ranges are addressed as `(repository, revision, path,
/// line, character)`; this trait carries them inside [`DocumentUri`].
/// Connection failures must come back as transport-class
/// [`crate::error::NavError`] values, or the engine will fail the whole
/// request instead of treating this tier as abstaining.
#[async_trait::async_trait]
pub trait PreciseBackend: Send + Sync {
    /// One-time introspection call for optional capabilities
    async fn capabilities(&self) -> Result<Capabilities>;

    /// Bulk query: all per-symbol intelligence overlapping
    /// `[start_line, end_line)` of one document
    async fn window_ranges(
        &self,
        doc: &DocumentUri,
        start_line: u32,
        end_line: u32,
    ) -> Result<Vec<CodeIntelRange>>;

    /// Single-position definition query
    async fn definitions(&self, doc: &DocumentUri, pos: Position) -> Result<Option<Vec<Location>>>;

    /// Single-position hover query
    async fn hover(&self, doc: &DocumentUri, pos: Position) -> Result<Option<Hover>>;

    /// One page of a cursor-paginated reference query
    async fn references_page(
        &self,
        doc: &DocumentUri,
        pos: Position,
        ctx: ReferenceContext,
        cursor: Option<String>,
    ) -> Result<ReferencePage>;

    /// The symbol (and its defining package) at a position, when indexed
    async fn symbol_at(&self, doc: &DocumentUri, pos: Position) -> Result<Option<SymbolInfo>>;

    /// Resolve a repository name to its head revision
    async fn resolve_revision(&self, repository: &str) -> Result<String>;

    /// Reference query for an exact symbol against another repository,
    /// answered in the remote connection's local URI scheme
    async fn remote_references(
        &self,
        repository: &str,
        revision: &str,
        symbol: &SymbolInfo,
    ) -> Result<Vec<RemoteLocation>>;
}

/// The live language-analysis backend
///
/// One persistent bidirectional connection per workspace root; the core
/// only issues request/response calls against it. Every operation is one
/// shot: the service computes the answer on demand. A dropped or refused
/// connection must surface as a transport-class [`crate::error::NavError`]
/// so lower tiers still get their turn; `Ok(None)` means the service
/// answered and the answer is "nothing", which is authoritative.
#[async_trait::async_trait]
pub trait LiveBackend: Send + Sync {
    async fn definition(&self, doc: &Document, pos: Position) -> Result<Option<Vec<Location>>>;

    async fn references(
        &self,
        doc: &Document,
        pos: Position,
        ctx: ReferenceContext,
    ) -> Result<Option<Vec<Location>>>;

    async fn hover(&self, doc: &Document, pos: Position) -> Result<Option<Hover>>;

    async fn implementation(&self, doc: &Document, pos: Position) -> Result<Option<Vec<Location>>>;

    async fn document_highlights(&self, doc: &Document, pos: Position)
    -> Result<Option<Vec<Range>>>;

    /// The symbol at a position as the analysis service understands it,
    /// used to fan cross-repository queries out
    async fn symbol_at(&self, doc: &Document, pos: Position) -> Result<Option<SymbolInfo>>;
}

/// The text-search and package-discovery backend
///
/// The same error classification applies: transport-class
/// [`crate::error::NavError`] values make the search tier abstain, any
/// other error fails the request.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    /// Heuristic definition search for an identifier
    async fn search_definitions(&self, identifier: &str, language: &str) -> Result<Vec<Location>>;

    /// Heuristic reference search for an identifier
    async fn search_references(&self, identifier: &str, language: &str) -> Result<Vec<Location>>;

    /// Repositories whose files mention the package, as unresolved
    /// candidate names
    async fn search_repositories(&self, package: &PackageDescriptor) -> Result<Vec<String>>;

    /// Repositories that depend on the package according to the
    /// package-importer index, as unresolved candidate names
    async fn package_dependents(&self, package: &PackageDescriptor) -> Result<Vec<String>>;

    /// Resolve a candidate name to a known repository; `None` means the
    /// candidate does not exist and should be dropped silently
    async fn resolve_repository(&self, name: &str) -> Result<Option<String>>;
}
