//! The live tier: a running language-analysis service queried on demand
//!
//! Every operation is one shot against the persistent connection the host
//! owns. References can additionally fan out across dependent repositories
//! through the external discoverer, under the live path's own concurrency
//! bound.

use super::{HoverStream, LocationStream, RangeStream, SourceAdapter, one_shot};
use crate::backends::LiveBackend;
use crate::discovery::ExternalReferenceDiscoverer;
use crate::stream::spawn_stream;
use crate::types::{Document, Location, Position, ReferenceContext};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;

pub struct LiveAdapter {
    backend: Arc<dyn LiveBackend>,
    discoverer: Option<Arc<ExternalReferenceDiscoverer>>,
    xref_concurrency: usize,
}

impl LiveAdapter {
    pub fn new(backend: Arc<dyn LiveBackend>, xref_concurrency: usize) -> Self {
        Self {
            backend,
            discoverer: None,
            xref_concurrency,
        }
    }

    /// Attach cross-repository reference discovery
    pub fn with_discoverer(mut self, discoverer: Arc<ExternalReferenceDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }
}

impl SourceAdapter for LiveAdapter {
    fn definition(&self, doc: &Document, pos: Position) -> LocationStream {
        let backend = Arc::clone(&self.backend);
        let doc = doc.clone();
        one_shot(async move { backend.definition(&doc, pos).await })
    }

    fn references(&self, doc: &Document, pos: Position, ctx: ReferenceContext) -> LocationStream {
        let backend = Arc::clone(&self.backend);
        let discoverer = self.discoverer.clone();
        let doc = doc.clone();
        let concurrency = self.xref_concurrency;

        spawn_stream(move |tx| async move {
            let mut cumulative: Vec<Location> = Vec::new();
            match backend.references(&doc, pos, ctx).await {
                Ok(Some(locations)) => {
                    cumulative = locations;
                    if tx.send(Ok(Some(cumulative.clone()))).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    if tx.send(Ok(None)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }

            let Some(discoverer) = discoverer else {
                return;
            };
            let symbol = match backend.symbol_at(&doc, pos).await {
                Ok(Some(symbol)) => symbol,
                Ok(None) => return,
                Err(e) => {
                    tracing::debug!("live symbol lookup failed: {:#}", e);
                    return;
                }
            };

            let mut seen: HashSet<Location> = cumulative.iter().cloned().collect();
            let mut external =
                discoverer.references(&doc.uri.repository, &symbol, concurrency);
            while let Some(item) = external.next().await {
                match item {
                    Ok(locations) => {
                        for loc in locations {
                            if seen.insert(loc.clone()) {
                                cumulative.push(loc);
                            }
                        }
                        if tx.send(Ok(Some(cumulative.clone()))).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("live cross-repository discovery failed: {:#}", e);
                        return;
                    }
                }
            }
        })
        .boxed()
    }

    fn hover(&self, doc: &Document, pos: Position) -> HoverStream {
        let backend = Arc::clone(&self.backend);
        let doc = doc.clone();
        one_shot(async move { backend.hover(&doc, pos).await })
    }

    fn document_highlights(&self, doc: &Document, pos: Position) -> RangeStream {
        let backend = Arc::clone(&self.backend);
        let doc = doc.clone();
        one_shot(async move { backend.document_highlights(&doc, pos).await })
    }

    fn implementation(&self, doc: &Document, pos: Position) -> LocationStream {
        let backend = Arc::clone(&self.backend);
        let doc = doc.clone();
        one_shot(async move { backend.implementation(&doc, pos).await })
    }
}
