//! Cross-repository reference discovery
//!
//! Given the package a symbol is defined in, find other repositories that
//! depend on it and query each for references to the symbol. Candidates
//! come from one of two interchangeable strategies: a code search for the
//! package name, or the package-importer index. Candidate resolution is
//! fault tolerant; a name that cannot be resolved is dropped, never
//! surfaced. Per-repository queries run under a bounded concurrency pool
//! and each repository's results are flushed into the cumulative output as
//! soon as it finishes.

use crate::backends::{PreciseBackend, SearchBackend};
use crate::types::{DocumentUri, Location, PackageDescriptor, SymbolInfo};
use anyhow::Result;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::Arc;

/// Produces candidate repository names for a package, already resolved to
/// known repositories and capped
#[async_trait::async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    async fn candidate_repositories(
        &self,
        package: &PackageDescriptor,
        limit: usize,
    ) -> Result<Vec<String>>;
}

/// Candidates from a code search for files referencing the package name
pub struct SearchDiscovery {
    search: Arc<dyn SearchBackend>,
}

impl SearchDiscovery {
    pub fn new(search: Arc<dyn SearchBackend>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl DiscoveryStrategy for SearchDiscovery {
    async fn candidate_repositories(
        &self,
        package: &PackageDescriptor,
        limit: usize,
    ) -> Result<Vec<String>> {
        let raw = self.search.search_repositories(package).await?;
        Ok(resolve_candidates(&self.search, raw, limit).await)
    }
}

/// Candidates from the package-importer index: repositories that declare a
/// dependency on the package
pub struct ImportGraphDiscovery {
    search: Arc<dyn SearchBackend>,
}

impl ImportGraphDiscovery {
    pub fn new(search: Arc<dyn SearchBackend>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl DiscoveryStrategy for ImportGraphDiscovery {
    async fn candidate_repositories(
        &self,
        package: &PackageDescriptor,
        limit: usize,
    ) -> Result<Vec<String>> {
        let raw = self.search.package_dependents(package).await?;
        Ok(resolve_candidates(&self.search, raw, limit).await)
    }
}

/// Sequentially resolve raw candidate names to known repositories
///
/// The cap counts resolved repositories: resolution keeps consuming raw
/// candidates until `limit` names have resolved or the input runs out.
/// Unknown and failing candidates are dropped silently.
async fn resolve_candidates(
    search: &Arc<dyn SearchBackend>,
    raw: Vec<String>,
    limit: usize,
) -> Vec<String> {
    let mut resolved = Vec::new();
    for name in raw {
        if resolved.len() >= limit {
            break;
        }
        match search.resolve_repository(&name).await {
            Ok(Some(repo)) => {
                if !resolved.contains(&repo) {
                    resolved.push(repo);
                }
            }
            Ok(None) => tracing::debug!("dropping unknown repository candidate {}", name),
            Err(e) => tracing::debug!("failed to resolve candidate {}: {:#}", name, e),
        }
    }
    resolved
}

/// Fans reference queries out across repositories that depend on a symbol's
/// defining package
pub struct ExternalReferenceDiscoverer {
    strategy: Arc<dyn DiscoveryStrategy>,
    precise: Arc<dyn PreciseBackend>,
    max_repositories: usize,
}

impl ExternalReferenceDiscoverer {
    pub fn new(
        strategy: Arc<dyn DiscoveryStrategy>,
        precise: Arc<dyn PreciseBackend>,
        max_repositories: usize,
    ) -> Self {
        Self {
            strategy,
            precise,
            max_repositories,
        }
    }

    /// Stream cumulative cross-repository references for `symbol`
    ///
    /// The requesting document's own repository and the symbol's defining
    /// package are never queried; same-repository results are the local
    /// providers' job. Result order across repositories follows completion
    /// order, but each repository's own contribution stays ordered.
    pub fn references(
        &self,
        requesting_repository: &str,
        symbol: &SymbolInfo,
        concurrency: usize,
    ) -> BoxStream<'static, Result<Vec<Location>>> {
        let strategy = Arc::clone(&self.strategy);
        let precise = Arc::clone(&self.precise);
        let limit = self.max_repositories;
        let requesting_repository = requesting_repository.to_string();
        let symbol = symbol.clone();

        stream::once(async move {
            let candidates = match strategy.candidate_repositories(&symbol.package, limit).await {
                Ok(repos) => repos,
                Err(e) => {
                    tracing::warn!("candidate repository discovery failed: {:#}", e);
                    Vec::new()
                }
            };
            let repos: Vec<String> = candidates
                .into_iter()
                .filter(|r| *r != requesting_repository && *r != symbol.package.name)
                .collect();
            tracing::debug!(
                "querying {} repositories for references to {}",
                repos.len(),
                symbol.name
            );
            (precise, symbol, repos)
        })
        .flat_map(move |(precise, symbol, repos)| {
            stream::iter(repos.into_iter().map(move |repo| {
                let precise = Arc::clone(&precise);
                let symbol = symbol.clone();
                async move { query_repository(precise, repo, symbol).await }
            }))
            .buffer_unordered(concurrency.max(1))
            .scan(Vec::new(), |acc: &mut Vec<Location>, batch: Vec<Location>| {
                if batch.is_empty() {
                    return futures::future::ready(Some(None));
                }
                acc.extend(batch);
                futures::future::ready(Some(Some(acc.clone())))
            })
            .filter_map(|snapshot| async move { snapshot.map(Ok) })
        })
        .boxed()
    }
}

/// Reference query against one repository; any failure degrades to an
/// empty contribution
async fn query_repository(
    precise: Arc<dyn PreciseBackend>,
    repo: String,
    symbol: SymbolInfo,
) -> Vec<Location> {
    let revision = match precise.resolve_revision(&repo).await {
        Ok(rev) => rev,
        Err(e) => {
            tracing::warn!("failed to resolve head revision of {}: {:#}", repo, e);
            return Vec::new();
        }
    };

    let remote = match precise.remote_references(&repo, &revision, &symbol).await {
        Ok(locations) => locations,
        Err(e) => {
            tracing::warn!("reference query against {} failed: {:#}", repo, e);
            return Vec::new();
        }
    };

    remote
        .into_iter()
        .filter_map(|loc| {
            // Translate from the connection's local scheme and drop
            // anything a stale or misbehaving connection maps elsewhere.
            let repository = loc.repository.unwrap_or_else(|| repo.clone());
            if repository != repo {
                tracing::debug!(
                    "discarding location outside {}: reported {}",
                    repo,
                    repository
                );
                return None;
            }
            Some(Location::new(
                DocumentUri::new(repository, revision.clone(), loc.path),
                loc.range,
            ))
        })
        .collect()
}
