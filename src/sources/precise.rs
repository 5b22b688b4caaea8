//! The precise tier: a precomputed index, decorated by the window cache,
//! the reference paginator, and optionally the external discoverer

use super::{HoverStream, LocationStream, RangeStream, SourceAdapter, one_shot};
use crate::backends::PreciseBackend;
use crate::discovery::ExternalReferenceDiscoverer;
use crate::paginator::paginated_references;
use crate::stream::{race_with_fallback, spawn_stream};
use crate::types::{Document, Hover, Location, Position, Range, ReferenceContext};
use crate::window::WindowCache;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct PreciseAdapter {
    backend: Arc<dyn PreciseBackend>,
    cache: Arc<WindowCache>,
    discoverer: Option<Arc<ExternalReferenceDiscoverer>>,
    fallback_delay: Duration,
    max_page_requests: usize,
    xref_concurrency: usize,
}

impl PreciseAdapter {
    pub fn new(
        backend: Arc<dyn PreciseBackend>,
        cache: Arc<WindowCache>,
        fallback_delay: Duration,
        max_page_requests: usize,
        xref_concurrency: usize,
    ) -> Self {
        Self {
            backend,
            cache,
            discoverer: None,
            fallback_delay,
            max_page_requests,
            xref_concurrency,
        }
    }

    /// Attach cross-repository reference discovery
    pub fn with_discoverer(mut self, discoverer: Arc<ExternalReferenceDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }
}

/// Append `incoming` to `cumulative`, skipping exact duplicates, so every
/// emission stays a superset of the previous one
fn merge_union(cumulative: &mut Vec<Location>, incoming: Vec<Location>) {
    let seen: HashSet<Location> = cumulative.iter().cloned().collect();
    for loc in incoming {
        if !seen.contains(&loc) {
            cumulative.push(loc);
        }
    }
}

fn non_empty_locations(v: &Option<Vec<Location>>) -> bool {
    v.as_ref().is_some_and(|locs| !locs.is_empty())
}

impl SourceAdapter for PreciseAdapter {
    fn definition(&self, doc: &Document, pos: Position) -> LocationStream {
        let cache = Arc::clone(&self.cache);
        let backend = Arc::clone(&self.backend);
        let uri = doc.uri.clone();
        let delay = self.fallback_delay;

        one_shot(async move {
            let cached_uri = uri.clone();
            let cached_cache = Arc::clone(&cache);
            race_with_fallback(
                async move {
                    let hit = cached_cache.range_at(&cached_uri, pos).await?;
                    Ok(hit.and_then(|r| r.definitions))
                },
                || async move { backend.definitions(&uri, pos).await },
                delay,
                non_empty_locations,
            )
            .await
        })
    }

    fn references(&self, doc: &Document, pos: Position, ctx: ReferenceContext) -> LocationStream {
        let cache = Arc::clone(&self.cache);
        let backend = Arc::clone(&self.backend);
        let discoverer = self.discoverer.clone();
        let uri = doc.uri.clone();
        let max_pages = self.max_page_requests;
        let concurrency = self.xref_concurrency;

        spawn_stream(move |tx| async move {
            let mut cumulative: Vec<Location> = Vec::new();

            // Fast first paint from the cached window, when warm
            match cache.range_at(&uri, pos).await {
                Ok(Some(hit)) => {
                    if let Some(refs) = hit.references {
                        if !refs.is_empty() {
                            cumulative = refs;
                            if tx.send(Ok(Some(cumulative.clone()))).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("window lookup failed, continuing with pages: {:#}", e);
                }
            }

            // The full paginated result set
            let mut pages =
                paginated_references(Arc::clone(&backend), uri.clone(), pos, ctx, max_pages);
            while let Some(item) = pages.next().await {
                match item {
                    Ok(locations) => {
                        merge_union(&mut cumulative, locations);
                        if tx.send(Ok(Some(cumulative.clone()))).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            // Cross-repository references, appended as repositories finish
            let Some(discoverer) = discoverer else {
                return;
            };
            let symbol = match backend.symbol_at(&uri, pos).await {
                Ok(Some(symbol)) => symbol,
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!("symbol lookup for external references failed: {:#}", e);
                    return;
                }
            };
            let mut external = discoverer.references(&uri.repository, &symbol, concurrency);
            while let Some(item) = external.next().await {
                match item {
                    Ok(locations) => {
                        merge_union(&mut cumulative, locations);
                        if tx.send(Ok(Some(cumulative.clone()))).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("external reference discovery failed: {:#}", e);
                        return;
                    }
                }
            }
        })
        .boxed()
    }

    fn hover(&self, doc: &Document, pos: Position) -> HoverStream {
        let cache = Arc::clone(&self.cache);
        let backend = Arc::clone(&self.backend);
        let uri = doc.uri.clone();
        let delay = self.fallback_delay;

        one_shot(async move {
            let cached_uri = uri.clone();
            let cached_cache = Arc::clone(&cache);
            race_with_fallback(
                async move {
                    let hit = cached_cache.range_at(&cached_uri, pos).await?;
                    Ok(hit.and_then(|r| r.hover))
                },
                || async move { backend.hover(&uri, pos).await },
                delay,
                Option::<Hover>::is_some,
            )
            .await
        })
    }

    fn document_highlights(&self, doc: &Document, pos: Position) -> RangeStream {
        let cache = Arc::clone(&self.cache);
        let backend = Arc::clone(&self.backend);
        let uri = doc.uri.clone();

        one_shot(async move {
            // Same-file references double as highlights
            match cache.range_at(&uri, pos).await {
                Ok(Some(hit)) => {
                    if let Some(refs) = hit.references {
                        let ranges: Vec<Range> = refs
                            .iter()
                            .filter(|l| l.uri == uri)
                            .map(|l| l.range)
                            .collect();
                        if !ranges.is_empty() {
                            return Ok(Some(ranges));
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("window lookup failed for highlights: {:#}", e);
                }
            }

            let page = backend
                .references_page(
                    &uri,
                    pos,
                    ReferenceContext {
                        include_declaration: true,
                    },
                    None,
                )
                .await?;
            let ranges: Vec<Range> = page
                .locations
                .into_iter()
                .filter(|l| l.uri == uri)
                .map(|l| l.range)
                .collect();
            Ok((!ranges.is_empty()).then_some(ranges))
        })
    }
}
