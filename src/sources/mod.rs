//! Result-source adapters
//!
//! Precise, live, and approximate providers all satisfy one contract: four
//! navigation operations over a `(document, position)` pair, each returning
//! a finite stream. Stream semantics are part of the contract:
//!
//! - `definition`, `hover`, and `document_highlights` yields **replace**
//!   the previous yield;
//! - `references` yields are **cumulative supersets** of the previous
//!   yield, enabling progressive rendering;
//! - `None` means the source abstained, which is different from an empty
//!   result and lets the engine consult the next tier.

pub mod approximate;
pub mod live;
pub mod precise;

use crate::types::{Document, Hover, Location, Position, Range, ReferenceContext};
use anyhow::Result;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::future::Future;

pub type LocationStream = BoxStream<'static, Result<Option<Vec<Location>>>>;
pub type HoverStream = BoxStream<'static, Result<Option<Hover>>>;
pub type RangeStream = BoxStream<'static, Result<Option<Vec<Range>>>>;

/// The common contract of the three result tiers
pub trait SourceAdapter: Send + Sync {
    fn definition(&self, doc: &Document, pos: Position) -> LocationStream;

    fn references(&self, doc: &Document, pos: Position, ctx: ReferenceContext) -> LocationStream;

    fn hover(&self, doc: &Document, pos: Position) -> HoverStream;

    fn document_highlights(&self, doc: &Document, pos: Position) -> RangeStream;

    /// Go-to-implementation; only the live tier can answer this, so the
    /// default abstains
    fn implementation(&self, _doc: &Document, _pos: Position) -> LocationStream {
        abstain()
    }
}

/// A stream with exactly one yield
pub(crate) fn one_shot<T, F>(fut: F) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    stream::once(fut).boxed()
}

/// A stream that abstains immediately
pub(crate) fn abstain<T: Send + 'static>() -> BoxStream<'static, Result<Option<T>>> {
    stream::once(async { Ok(None) }).boxed()
}
