//! Spatial window cache for bulk precise queries
//!
//! Individual precise queries for nearby positions are folded into one bulk
//! request per window of lines. Windows for one document stay sorted by
//! start line and pairwise disjoint; window lists for all open documents
//! live in a small LRU map. A window whose bulk query fails is rolled back
//! before the error surfaces, so a retry is never poisoned by a cached
//! failure.

pub mod lru;

use crate::backends::PreciseBackend;
use crate::config::WindowConfig;
use crate::types::{CodeIntelRange, DocumentUri, Position};
use anyhow::{Result, anyhow};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;


/// Clone-able wrapper so a failed bulk query can fan out to every waiter
#[derive(Debug, Clone)]
struct SharedFailure(Arc<anyhow::Error>);

type SharedRanges = Shared<BoxFuture<'static, Result<Arc<Vec<CodeIntelRange>>, SharedFailure>>>;

/// One cached line interval of a document
///
/// `ranges` resolves to all precise per-symbol data overlapping
/// `[start_line, end_line)`. It is shared: concurrent lookups hitting the
/// same window await one bulk query.
struct Window {
    id: u64,
    start_line: u32,
    end_line: u32,
    ranges: SharedRanges,
}

impl Window {
    fn covers(&self, line: u32) -> bool {
        self.start_line <= line && line < self.end_line
    }
}

/// Caches windows of precise intelligence per open document
pub struct WindowCache {
    backend: Arc<dyn PreciseBackend>,
    size: u32,
    state: Mutex<LruMap<DocumentUri, Vec<Window>>>,
    /// Result of the one-time capability introspection; unset until the
    /// first successful introspection call
    windowed: OnceCell<bool>,
    next_id: AtomicU64,
}

impl WindowCache {
    pub fn new(backend: Arc<dyn PreciseBackend>, config: &WindowConfig) -> Self {
        Self {
            backend,
            size: config.size,
            state: Mutex::new(LruMap::new(config.max_documents)),
            windowed: OnceCell::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// The innermost cached range containing `pos`, or `None` when the
    /// cache cannot serve the document (capability absent or no data)
    pub async fn range_at(
        &self,
        doc: &DocumentUri,
        pos: Position,
    ) -> Result<Option<CodeIntelRange>> {
        match self.window_ranges(doc, pos.line).await? {
            Some(ranges) => Ok(innermost_range(&ranges, pos).cloned()),
            None => Ok(None),
        }
    }

    /// All cached ranges of the window covering `line`, issuing one bulk
    /// query if the window does not exist yet
    ///
    /// Returns `Ok(None)` when the backend lacks the windowed-query
    /// capability; the caller falls through to single-position queries.
    pub async fn window_ranges(
        &self,
        doc: &DocumentUri,
        line: u32,
    ) -> Result<Option<Arc<Vec<CodeIntelRange>>>> {
        if !self.windowed_queries_supported().await? {
            return Ok(None);
        }

        let (window_id, shared, created) = self.find_or_insert(doc, line);
        match shared.await {
            Ok(ranges) => Ok(Some(ranges)),
            Err(SharedFailure(err)) => {
                // Roll the window back before the error propagates so a
                // later retry re-issues the bulk query.
                if created {
                    self.remove_window(doc, window_id);
                }
                Err(anyhow!("windowed range query failed: {:#}", err))
            }
        }
    }

    async fn windowed_queries_supported(&self) -> Result<bool> {
        let supported = self
            .windowed
            .get_or_try_init(|| async {
                let caps = self.backend.capabilities().await?;
                if !caps.windowed_queries {
                    tracing::info!("backend lacks windowed queries, window cache disabled");
                }
                Ok::<_, anyhow::Error>(caps.windowed_queries)
            })
            .await?;
        Ok(*supported)
    }

    /// Find the window covering `line` or insert a freshly computed one,
    /// preserving the sorted/disjoint invariant
    fn find_or_insert(&self, doc: &DocumentUri, line: u32) -> (u64, SharedRanges, bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (windows, evicted) = state.get_or_insert_with(doc, Vec::new);
        if let Some((evicted_doc, _)) = &evicted {
            tracing::debug!("evicted window list for {}", evicted_doc);
        }

        if let Some(w) = windows.iter().find(|w| w.covers(line)) {
            return (w.id, w.ranges.clone(), false);
        }

        // The insertion point also determines the clamping bounds: the new
        // window may not overlap its neighbors.
        let idx = windows.partition_point(|w| w.start_line <= line);
        let lower_bound = if idx > 0 { windows[idx - 1].end_line } else { 0 };
        let upper_bound = windows.get(idx).map(|w| w.start_line);
        let (start_line, end_line) = calculate_window(line, lower_bound, upper_bound, self.size);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let backend = Arc::clone(&self.backend);
        let query_doc = doc.clone();
        let shared: SharedRanges = async move {
            backend
                .window_ranges(&query_doc, start_line, end_line)
                .await
                .map(Arc::new)
                .map_err(|e| SharedFailure(Arc::new(e)))
        }
        .boxed()
        .shared();

        tracing::debug!(
            "inserting window [{}, {}) for {} at slot {}",
            start_line,
            end_line,
            doc,
            idx
        );
        windows.insert(
            idx,
            Window {
                id,
                start_line,
                end_line,
                ranges: shared.clone(),
            },
        );
        (id, shared, true)
    }

    fn remove_window(&self, doc: &DocumentUri, id: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(windows) = state.get_mut(doc) {
            windows.retain(|w| w.id != id);
        }
    }

    #[cfg(test)]
    fn window_bounds(&self, doc: &DocumentUri) -> Vec<(u32, u32)> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .get_mut(doc)
            .map(|ws| ws.iter().map(|w| (w.start_line, w.end_line)).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn cached_documents(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Compute the `[start, end)` bounds of a new window centered on `line`
///
/// The window covers `size` lines when space allows. It may not cross
/// `lower_bound` (the previous window's end) or `upper_bound` (the next
/// window's start); space lost to one clamp is donated to the other side,
/// so the window stays as large as its neighbors permit.
pub fn calculate_window(
    line: u32,
    lower_bound: u32,
    upper_bound: Option<u32>,
    size: u32,
) -> (u32, u32) {
    let half = i64::from(size / 2);
    let lower = i64::from(lower_bound);
    let mut start = i64::from(line) - half;
    let mut end = start + i64::from(size);

    if start < lower {
        // Donate the clipped lower slack upward
        end += lower - start;
        start = lower;
    }
    if let Some(ub) = upper_bound {
        let upper = i64::from(ub);
        if end > upper {
            // Donate the clipped upper slack downward, but never past the
            // lower bound
            start = (start - (end - upper)).max(lower);
            end = upper;
        }
    }

    let start = start.clamp(0, i64::from(u32::MAX)) as u32;
    let end = end.clamp(i64::from(start), i64::from(u32::MAX)) as u32;
    (start, end)
}

/// The innermost range containing `pos`
///
/// Precise ranges nest (expression inside statement inside function); every
/// candidate is inspected and the most specific one wins, not merely the
/// first hit.
pub fn innermost_range(ranges: &[CodeIntelRange], pos: Position) -> Option<&CodeIntelRange> {
    let mut best: Option<&CodeIntelRange> = None;
    for candidate in ranges {
        if !candidate.range.contains(pos) {
            continue;
        }
        match best {
            Some(b) if !candidate.range.is_inside(&b.range) => {}
            _ => best = Some(candidate),
        }
    }
    best
}
