//! Incremental retrieval of paged precise reference results
//!
//! Each yield is the cumulative union of all pages seen so far, so the
//! consumer can render every emission as the complete current result set.
//! The page budget defends against a backend that returns continuation
//! cursors forever.

use crate::backends::PreciseBackend;
use crate::types::{DocumentUri, Location, Position, ReferenceContext};
use anyhow::Result;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::Arc;

struct PageState {
    cursor: Option<String>,
    seen: Vec<Location>,
    pages_issued: usize,
    done: bool,
}

/// Stream cumulative reference results, one yield per retrieved page
///
/// Stops on the first page without a cursor, or once `max_page_requests`
/// pages have been issued. A failing page query terminates the stream with
/// that error.
pub fn paginated_references(
    backend: Arc<dyn PreciseBackend>,
    doc: DocumentUri,
    pos: Position,
    ctx: ReferenceContext,
    max_page_requests: usize,
) -> BoxStream<'static, Result<Vec<Location>>> {
    let state = PageState {
        cursor: None,
        seen: Vec::new(),
        pages_issued: 0,
        done: false,
    };

    stream::try_unfold(state, move |mut state| {
        let backend = Arc::clone(&backend);
        let doc = doc.clone();
        async move {
            if state.done {
                return Ok(None);
            }
            if state.pages_issued >= max_page_requests {
                tracing::debug!(
                    "reference pagination stopped after {} pages for {}",
                    state.pages_issued,
                    doc
                );
                return Ok(None);
            }

            let page = backend
                .references_page(&doc, pos, ctx, state.cursor.take())
                .await?;
            state.pages_issued += 1;
            state.seen.extend(page.locations);
            state.done = page.cursor.is_none();
            state.cursor = page.cursor;

            let snapshot = state.seen.clone();
            Ok(Some((snapshot, state)))
        }
    })
    .boxed()
}
