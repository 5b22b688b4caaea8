//! The aggregation engine
//!
//! Composes the three result tiers per navigation operation and streams
//! one merged, provenance-tagged, incrementally refined result sequence
//! per request. Tier precedence is strict: precise beats live beats
//! approximate. The one exception is reference blending, where approximate
//! results may be appended to precise ones when no live tier is configured
//! and the `mix_references` policy is on.

use crate::backends::{LiveBackend, PreciseBackend, SearchBackend};
use crate::config::{Config, DiscoveryStrategyKind};
use crate::discovery::{
    DiscoveryStrategy, ExternalReferenceDiscoverer, ImportGraphDiscovery, SearchDiscovery,
};
use crate::error::is_abstention;
use crate::sources::approximate::ApproximateAdapter;
use crate::sources::live::LiveAdapter;
use crate::sources::precise::PreciseAdapter;
use crate::sources::SourceAdapter;
use crate::stream::spawn_stream;
use crate::types::{
    Alert, DefinitionResult, Document, DocumentUri, FileKey, HighlightsResult, Hover, HoverResult,
    Location, Position, Provenance, Range, ReferenceContext, ReferencesResult, TaggedLocation,
    indexing_support,
};
use crate::window::WindowCache;
use anyhow::Result;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;

pub type DefinitionStream = BoxStream<'static, Result<DefinitionResult>>;
pub type ReferencesStream = BoxStream<'static, Result<ReferencesResult>>;
pub type HoverResultStream = BoxStream<'static, Result<HoverResult>>;
pub type HighlightsStream = BoxStream<'static, Result<HighlightsResult>>;

/// Identity of a navigation request for memoization purposes
#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoKey {
    uri: DocumentUri,
    pos: Position,
    include_declaration: bool,
}

impl MemoKey {
    fn new(doc: &Document, pos: Position) -> Self {
        Self {
            uri: doc.uri.clone(),
            pos,
            include_declaration: false,
        }
    }
}

/// Last completed result per operation
///
/// One slot per operation kind: rapid repeated calls for the same
/// `(document, position)`, such as a definition immediately followed by a
/// hover reusing the position, replay the finished result instead of
/// re-issuing identical backend queries. The slot is replaced as soon as
/// the key changes. `None` inside a slot records a completed request that
/// produced nothing.
#[derive(Default)]
struct MemoStore {
    definition: Option<(MemoKey, Option<DefinitionResult>)>,
    references: Option<(MemoKey, Option<ReferencesResult>)>,
    hover: Option<(MemoKey, Option<HoverResult>)>,
    highlights: Option<(MemoKey, Option<HighlightsResult>)>,
    implementation: Option<(MemoKey, Option<DefinitionResult>)>,
}

/// The outcome of draining one tier's stream
enum TierRun<T> {
    /// At least one yield was forwarded; holds the last forwarded value
    Produced(T),
    /// The stream completed without producing anything
    Silent,
    /// A transport-class failure; the tier is treated as having abstained
    TransportFailed,
    /// A fatal error was forwarded to the consumer
    Fatal,
    /// The consumer went away
    Disconnected,
}

/// Shared tier bundle cloned into each request task
#[derive(Clone)]
struct Tiers {
    precise: Option<Arc<dyn SourceAdapter>>,
    live: Option<Arc<dyn SourceAdapter>>,
    approximate: Arc<dyn SourceAdapter>,
}

/// Aggregates precise, live, and approximate navigation results
pub struct NavEngine {
    config: Config,
    tiers: Tiers,
    memo: Arc<Mutex<MemoStore>>,
}

impl NavEngine {
    /// Build an engine over already-constructed adapters
    ///
    /// The precise adapter is ignored when the configuration disables the
    /// precise tier.
    pub fn new(
        config: Config,
        precise: Option<Arc<dyn SourceAdapter>>,
        live: Option<Arc<dyn SourceAdapter>>,
        approximate: Arc<dyn SourceAdapter>,
    ) -> Self {
        let precise = if config.tiers.precise_enabled {
            precise
        } else {
            tracing::info!("precise tier disabled by configuration");
            None
        };
        Self {
            config,
            tiers: Tiers {
                precise,
                live,
                approximate,
            },
            memo: Arc::new(Mutex::new(MemoStore::default())),
        }
    }

    /// Compose the standard adapter stack over raw backends
    ///
    /// Wires the window cache and reference paginator around the precise
    /// backend and shares one external discoverer between the precise and
    /// live reference paths.
    pub fn from_backends(
        config: Config,
        precise: Option<Arc<dyn PreciseBackend>>,
        live: Option<Arc<dyn LiveBackend>>,
        search: Arc<dyn SearchBackend>,
    ) -> Self {
        let strategy: Arc<dyn DiscoveryStrategy> = match config.external.strategy {
            DiscoveryStrategyKind::ImportGraph => {
                Arc::new(ImportGraphDiscovery::new(Arc::clone(&search)))
            }
            DiscoveryStrategyKind::Search => Arc::new(SearchDiscovery::new(Arc::clone(&search))),
        };
        let discoverer = precise.as_ref().map(|backend| {
            Arc::new(ExternalReferenceDiscoverer::new(
                strategy,
                Arc::clone(backend),
                config.external.max_repositories,
            ))
        });

        let precise_adapter = precise.map(|backend| {
            let cache = Arc::new(WindowCache::new(Arc::clone(&backend), &config.window));
            let mut adapter = PreciseAdapter::new(
                backend,
                cache,
                config.fallback_delay(),
                config.references.max_page_requests,
                config.external.concurrency,
            );
            if let Some(discoverer) = &discoverer {
                adapter = adapter.with_discoverer(Arc::clone(discoverer));
            }
            Arc::new(adapter) as Arc<dyn SourceAdapter>
        });

        let live_adapter = live.map(|backend| {
            let mut adapter = LiveAdapter::new(backend, config.external.live_xref_concurrency);
            if let Some(discoverer) = &discoverer {
                adapter = adapter.with_discoverer(Arc::clone(discoverer));
            }
            Arc::new(adapter) as Arc<dyn SourceAdapter>
        });

        let approximate =
            Arc::new(ApproximateAdapter::new(search, config.search_timeout()))
                as Arc<dyn SourceAdapter>;

        Self::new(config, precise_adapter, live_adapter, approximate)
    }

    pub fn definition(
        &self,
        doc: &Document,
        pos: Position,
        cancel: CancellationToken,
    ) -> DefinitionStream {
        let key = MemoKey::new(doc, pos);
        if let Some(hit) = memo_lookup(&self.memo, |m| &m.definition, &key) {
            return replay(hit);
        }

        let tiers = self.tiers.clone();
        let doc = doc.clone();
        let memo = Arc::clone(&self.memo);
        spawn_stream(move |tx| async move {
            let uri = doc.uri.clone();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("definition request cancelled for {}", uri);
                }
                _ = run_definition(tiers, doc, pos, key, memo, tx) => {}
            }
        })
        .boxed()
    }

    pub fn references(
        &self,
        doc: &Document,
        pos: Position,
        ctx: ReferenceContext,
        cancel: CancellationToken,
    ) -> ReferencesStream {
        let mut key = MemoKey::new(doc, pos);
        key.include_declaration = ctx.include_declaration;
        if let Some(hit) = memo_lookup(&self.memo, |m| &m.references, &key) {
            return replay(hit);
        }

        let tiers = self.tiers.clone();
        let doc = doc.clone();
        let memo = Arc::clone(&self.memo);
        let mix = self.config.tiers.mix_references;
        spawn_stream(move |tx| async move {
            let uri = doc.uri.clone();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("references request cancelled for {}", uri);
                }
                _ = run_references(tiers, doc, pos, ctx, mix, key, memo, tx) => {}
            }
        })
        .boxed()
    }

    pub fn hover(
        &self,
        doc: &Document,
        pos: Position,
        cancel: CancellationToken,
    ) -> HoverResultStream {
        let key = MemoKey::new(doc, pos);
        if let Some(hit) = memo_lookup(&self.memo, |m| &m.hover, &key) {
            return replay(hit);
        }

        let tiers = self.tiers.clone();
        let doc = doc.clone();
        let memo = Arc::clone(&self.memo);
        spawn_stream(move |tx| async move {
            let uri = doc.uri.clone();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("hover request cancelled for {}", uri);
                }
                _ = run_hover(tiers, doc, pos, key, memo, tx) => {}
            }
        })
        .boxed()
    }

    pub fn document_highlights(
        &self,
        doc: &Document,
        pos: Position,
        cancel: CancellationToken,
    ) -> HighlightsStream {
        let key = MemoKey::new(doc, pos);
        if let Some(hit) = memo_lookup(&self.memo, |m| &m.highlights, &key) {
            return replay(hit);
        }

        let tiers = self.tiers.clone();
        let doc = doc.clone();
        let memo = Arc::clone(&self.memo);
        spawn_stream(move |tx| async move {
            let uri = doc.uri.clone();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("highlights request cancelled for {}", uri);
                }
                _ = run_highlights(tiers, doc, pos, key, memo, tx) => {}
            }
        })
        .boxed()
    }

    /// Go-to-implementation, answered by the live tier only
    pub fn implementation(
        &self,
        doc: &Document,
        pos: Position,
        cancel: CancellationToken,
    ) -> DefinitionStream {
        let key = MemoKey::new(doc, pos);
        if let Some(hit) = memo_lookup(&self.memo, |m| &m.implementation, &key) {
            return replay(hit);
        }

        let Some(live) = self.tiers.live.clone() else {
            return stream::empty().boxed();
        };
        let doc = doc.clone();
        let memo = Arc::clone(&self.memo);
        spawn_stream(move |tx| async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("implementation request cancelled for {}", doc.uri);
                }
                _ = async {
                    let alert = Provenance::LiveAnalysis.alert();
                    let run = drain_replace(
                        live.implementation(&doc, pos),
                        alert.clone(),
                        true,
                        |locs: &Vec<Location>| locs.is_empty(),
                        |locations, alert| DefinitionResult { locations, alert },
                        &tx,
                    )
                    .await;
                    match run {
                        TierRun::Produced(locations) => memo_store(
                            &memo,
                            |m| &mut m.implementation,
                            key,
                            Some(DefinitionResult {
                                locations,
                                alert: Some(alert),
                            }),
                        ),
                        TierRun::Silent | TierRun::TransportFailed => {
                            memo_store(&memo, |m| &mut m.implementation, key, None)
                        }
                        TierRun::Fatal | TierRun::Disconnected => {}
                    }
                } => {}
            }
        })
        .boxed()
    }
}

fn memo_lookup<T: Clone>(
    memo: &Arc<Mutex<MemoStore>>,
    slot: fn(&MemoStore) -> &Option<(MemoKey, Option<T>)>,
    key: &MemoKey,
) -> Option<Option<T>> {
    let store = memo.lock().unwrap_or_else(|e| e.into_inner());
    slot(&store)
        .as_ref()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

fn memo_store<T>(
    memo: &Arc<Mutex<MemoStore>>,
    slot: fn(&mut MemoStore) -> &mut Option<(MemoKey, Option<T>)>,
    key: MemoKey,
    value: Option<T>,
) {
    let mut store = memo.lock().unwrap_or_else(|e| e.into_inner());
    *slot(&mut store) = Some((key, value));
}

/// Replay a memoized final result as a short stream
fn replay<T: Send + 'static>(hit: Option<T>) -> BoxStream<'static, Result<T>> {
    match hit {
        Some(value) => stream::once(async move { Ok(value) }).boxed(),
        None => stream::empty().boxed(),
    }
}

/// Drain one tier's replace-semantics stream, forwarding yields
///
/// The first forwarded yield carries the tier's provenance alert; later
/// yields are forwarded untagged. With `forward_empty` unset, empty and
/// null yields are swallowed (the tier abstains through them); with it
/// set, every non-null yield is forwarded, which is how the live tier says
/// "there is definitively nothing".
async fn drain_replace<T, Out>(
    mut stream: BoxStream<'static, Result<Option<T>>>,
    alert: Alert,
    forward_empty: bool,
    is_empty: impl Fn(&T) -> bool,
    wrap: impl Fn(T, Option<Alert>) -> Out,
    tx: &mpsc::Sender<Result<Out>>,
) -> TierRun<T>
where
    T: Clone,
{
    let mut last: Option<T> = None;
    let mut tagged = false;
    while let Some(item) = stream.next().await {
        match item {
            Ok(Some(value)) if forward_empty || !is_empty(&value) => {
                let emission_alert = if tagged { None } else { Some(alert.clone()) };
                tagged = true;
                last = Some(value.clone());
                if tx.send(Ok(wrap(value, emission_alert))).await.is_err() {
                    return TierRun::Disconnected;
                }
            }
            Ok(_) => {}
            Err(e) if is_abstention(&e) => {
                tracing::warn!("tier failed, treating as abstention: {:#}", e);
                return match last {
                    Some(value) => TierRun::Produced(value),
                    None => TierRun::TransportFailed,
                };
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return TierRun::Fatal;
            }
        }
    }
    match last {
        Some(value) => TierRun::Produced(value),
        None => TierRun::Silent,
    }
}

async fn run_definition(
    tiers: Tiers,
    doc: Document,
    pos: Position,
    key: MemoKey,
    memo: Arc<Mutex<MemoStore>>,
    tx: mpsc::Sender<Result<DefinitionResult>>,
) {
    let wrap = |locations: Vec<Location>, alert| DefinitionResult { locations, alert };
    let is_empty = |locs: &Vec<Location>| locs.is_empty();

    if let Some(precise) = &tiers.precise {
        let alert = Provenance::Semantic.alert();
        match drain_replace(precise.definition(&doc, pos), alert.clone(), false, is_empty, wrap, &tx)
            .await
        {
            TierRun::Produced(locations) => {
                let result = DefinitionResult {
                    locations,
                    alert: Some(alert),
                };
                memo_store(&memo, |m| &mut m.definition, key, Some(result));
                return;
            }
            TierRun::Fatal | TierRun::Disconnected => return,
            TierRun::Silent | TierRun::TransportFailed => {}
        }
    }

    if let Some(live) = &tiers.live {
        let alert = Provenance::LiveAnalysis.alert();
        match drain_replace(live.definition(&doc, pos), alert.clone(), true, is_empty, wrap, &tx)
            .await
        {
            TierRun::Produced(locations) => {
                let result = DefinitionResult {
                    locations,
                    alert: Some(alert),
                };
                memo_store(&memo, |m| &mut m.definition, key, Some(result));
                return;
            }
            TierRun::Silent => {
                // Live silence is authoritative; no further fallback
                memo_store(&memo, |m| &mut m.definition, key, None);
                return;
            }
            TierRun::Fatal | TierRun::Disconnected => return,
            TierRun::TransportFailed => {}
        }
    }

    let alert = Provenance::SearchBased {
        support: indexing_support(&doc.language),
    }
    .alert();
    match drain_replace(
        tiers.approximate.definition(&doc, pos),
        alert.clone(),
        false,
        is_empty,
        wrap,
        &tx,
    )
    .await
    {
        TierRun::Produced(locations) => {
            let result = DefinitionResult {
                locations,
                alert: Some(alert),
            };
            memo_store(&memo, |m| &mut m.definition, key, Some(result));
        }
        TierRun::Silent | TierRun::TransportFailed => {
            memo_store(&memo, |m| &mut m.definition, key, None);
        }
        TierRun::Fatal | TierRun::Disconnected => {}
    }
}

async fn run_hover(
    tiers: Tiers,
    doc: Document,
    pos: Position,
    key: MemoKey,
    memo: Arc<Mutex<MemoStore>>,
    tx: mpsc::Sender<Result<HoverResult>>,
) {
    let wrap = |hover: Hover, alert| HoverResult { hover, alert };
    let is_empty = |hover: &Hover| hover.contents.is_empty();

    if let Some(precise) = &tiers.precise {
        let alert = Provenance::Semantic.alert();
        match drain_replace(precise.hover(&doc, pos), alert.clone(), false, is_empty, wrap, &tx)
            .await
        {
            TierRun::Produced(hover) => {
                let result = HoverResult {
                    hover,
                    alert: Some(alert),
                };
                memo_store(&memo, |m| &mut m.hover, key, Some(result));
                return;
            }
            TierRun::Fatal | TierRun::Disconnected => return,
            TierRun::Silent | TierRun::TransportFailed => {}
        }
    }

    if let Some(live) = &tiers.live {
        let alert = Provenance::LiveAnalysis.alert();
        match drain_replace(live.hover(&doc, pos), alert.clone(), true, is_empty, wrap, &tx).await {
            TierRun::Produced(hover) => {
                let result = HoverResult {
                    hover,
                    alert: Some(alert),
                };
                memo_store(&memo, |m| &mut m.hover, key, Some(result));
                return;
            }
            TierRun::Silent => {
                memo_store(&memo, |m| &mut m.hover, key, None);
                return;
            }
            TierRun::Fatal | TierRun::Disconnected => return,
            TierRun::TransportFailed => {}
        }
    }

    let alert = Provenance::SearchBased {
        support: indexing_support(&doc.language),
    }
    .alert();
    match drain_replace(
        tiers.approximate.hover(&doc, pos),
        alert.clone(),
        false,
        is_empty,
        wrap,
        &tx,
    )
    .await
    {
        TierRun::Produced(hover) => {
            let result = HoverResult {
                hover,
                alert: Some(alert),
            };
            memo_store(&memo, |m| &mut m.hover, key, Some(result));
        }
        TierRun::Silent | TierRun::TransportFailed => {
            memo_store(&memo, |m| &mut m.hover, key, None);
        }
        TierRun::Fatal | TierRun::Disconnected => {}
    }
}

async fn run_highlights(
    tiers: Tiers,
    doc: Document,
    pos: Position,
    key: MemoKey,
    memo: Arc<Mutex<MemoStore>>,
    tx: mpsc::Sender<Result<HighlightsResult>>,
) {
    let wrap = |ranges: Vec<Range>, alert| HighlightsResult { ranges, alert };
    let is_empty = |ranges: &Vec<Range>| ranges.is_empty();

    if let Some(precise) = &tiers.precise {
        let alert = Provenance::Semantic.alert();
        match drain_replace(
            precise.document_highlights(&doc, pos),
            alert.clone(),
            false,
            is_empty,
            wrap,
            &tx,
        )
        .await
        {
            TierRun::Produced(ranges) => {
                let result = HighlightsResult {
                    ranges,
                    alert: Some(alert),
                };
                memo_store(&memo, |m| &mut m.highlights, key, Some(result));
                return;
            }
            TierRun::Fatal | TierRun::Disconnected => return,
            TierRun::Silent | TierRun::TransportFailed => {}
        }
    }

    if let Some(live) = &tiers.live {
        let alert = Provenance::LiveAnalysis.alert();
        match drain_replace(
            live.document_highlights(&doc, pos),
            alert.clone(),
            true,
            is_empty,
            wrap,
            &tx,
        )
        .await
        {
            TierRun::Produced(ranges) => {
                let result = HighlightsResult {
                    ranges,
                    alert: Some(alert),
                };
                memo_store(&memo, |m| &mut m.highlights, key, Some(result));
                return;
            }
            TierRun::Silent => {
                memo_store(&memo, |m| &mut m.highlights, key, None);
                return;
            }
            TierRun::Fatal | TierRun::Disconnected => return,
            TierRun::TransportFailed => {}
        }
    }

    let alert = Provenance::SearchBased {
        support: indexing_support(&doc.language),
    }
    .alert();
    match drain_replace(
        tiers.approximate.document_highlights(&doc, pos),
        alert.clone(),
        false,
        is_empty,
        wrap,
        &tx,
    )
    .await
    {
        TierRun::Produced(ranges) => {
            let result = HighlightsResult {
                ranges,
                alert: Some(alert),
            };
            memo_store(&memo, |m| &mut m.highlights, key, Some(result));
        }
        TierRun::Silent | TierRun::TransportFailed => {
            memo_store(&memo, |m| &mut m.highlights, key, None);
        }
        TierRun::Fatal | TierRun::Disconnected => {}
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_references(
    tiers: Tiers,
    doc: Document,
    pos: Position,
    ctx: ReferenceContext,
    mix_references: bool,
    key: MemoKey,
    memo: Arc<Mutex<MemoStore>>,
    tx: mpsc::Sender<Result<ReferencesResult>>,
) {
    // Tier 1: precise, cumulative yields
    let mut base: Vec<TaggedLocation> = Vec::new();
    let mut covered: HashSet<FileKey> = HashSet::new();
    let mut produced = false;

    if let Some(precise) = &tiers.precise {
        let alert = Provenance::Semantic.alert();
        let mut tagged = false;
        let mut stream = precise.references(&doc, pos, ctx);
        while let Some(item) = stream.next().await {
            match item {
                Ok(Some(locations)) if !locations.is_empty() => {
                    base = locations
                        .iter()
                        .cloned()
                        .map(TaggedLocation::untagged)
                        .collect();
                    covered = locations.iter().map(Location::file_key).collect();
                    let emission_alert = if tagged { None } else { Some(alert.clone()) };
                    tagged = true;
                    produced = true;
                    let result = ReferencesResult {
                        locations: base.clone(),
                        alert: emission_alert,
                    };
                    if tx.send(Ok(result)).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) if is_abstention(&e) => {
                    tracing::warn!("precise references failed, falling through: {:#}", e);
                    break;
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    }

    if produced {
        let mut last = ReferencesResult {
            locations: base.clone(),
            alert: Some(Provenance::Semantic.alert()),
        };

        // Blend approximate results in when no live tier exists and the
        // policy allows it; precise-covered files are dropped first.
        if tiers.live.is_none() && mix_references {
            let mut stream = tiers.approximate.references(&doc, pos, ctx);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Some(locations)) => {
                        let extra: Vec<TaggedLocation> = locations
                            .into_iter()
                            .filter(|loc| !covered.contains(&loc.file_key()))
                            .map(TaggedLocation::approximate)
                            .collect();
                        if extra.is_empty() {
                            continue;
                        }
                        let mut merged = base.clone();
                        merged.extend(extra);
                        last.locations = merged.clone();
                        let result = ReferencesResult {
                            locations: merged,
                            alert: None,
                        };
                        if tx.send(Ok(result)).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!("approximate blend failed, keeping precise: {:#}", e);
                        break;
                    }
                }
            }
        }

        memo_store(&memo, |m| &mut m.references, key, Some(last));
        return;
    }

    // Tier 2: live, authoritative even when empty
    if let Some(live) = &tiers.live {
        let alert = Provenance::LiveAnalysis.alert();
        let run = drain_replace(
            live.references(&doc, pos, ctx),
            alert.clone(),
            true,
            |locs: &Vec<Location>| locs.is_empty(),
            |locations: Vec<Location>, emission_alert| ReferencesResult {
                locations: locations
                    .into_iter()
                    .map(TaggedLocation::untagged)
                    .collect(),
                alert: emission_alert,
            },
            &tx,
        )
        .await;
        match run {
            TierRun::Produced(locations) => {
                let result = ReferencesResult {
                    locations: locations
                        .into_iter()
                        .map(TaggedLocation::untagged)
                        .collect(),
                    alert: Some(alert),
                };
                memo_store(&memo, |m| &mut m.references, key, Some(result));
                return;
            }
            TierRun::Silent => {
                memo_store(&memo, |m| &mut m.references, key, None);
                return;
            }
            TierRun::Fatal | TierRun::Disconnected => return,
            TierRun::TransportFailed => {}
        }
    }

    // Tier 3: approximate alone
    let alert = Provenance::SearchBased {
        support: indexing_support(&doc.language),
    }
    .alert();
    let run = drain_replace(
        tiers.approximate.references(&doc, pos, ctx),
        alert.clone(),
        false,
        |locs: &Vec<Location>| locs.is_empty(),
        |locations: Vec<Location>, emission_alert| ReferencesResult {
            locations: locations
                .into_iter()
                .map(TaggedLocation::untagged)
                .collect(),
            alert: emission_alert,
        },
        &tx,
    )
    .await;
    match run {
        TierRun::Produced(locations) => {
            let result = ReferencesResult {
                locations: locations
                    .into_iter()
                    .map(TaggedLocation::untagged)
                    .collect(),
                alert: Some(alert),
            };
            memo_store(&memo, |m| &mut m.references, key, Some(result));
        }
        TierRun::Silent | TierRun::TransportFailed => {
            memo_store(&memo, |m| &mut m.references, key, None);
        }
        TierRun::Fatal | TierRun::Disconnected => {}
    }
}
