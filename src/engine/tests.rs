use super::*;
use crate::config::Config;
use crate::error::NavError;
use crate::sources::{HoverStream, LocationStream, RangeStream};
use crate::types::{Badge, IndexingSupport};
use anyhow::anyhow;
use std::sync::atomic::{AtomicUsize, Ordering};

fn doc() -> Document {
    Document {
        uri: DocumentUri::new("acme/api", "rev1", "src/server.go"),
        language: "go".to_string(),
        text: "package server\n".to_string(),
    }
}

fn loc(repo: &str, path: &str, line: u32) -> Location {
    Location::new(
        DocumentUri::new(repo, "rev1", path),
        Range::new(line, 0, line, 6),
    )
}

async fn collect<T>(mut stream: BoxStream<'static, Result<T>>) -> Vec<Result<T>> {
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        out.push(item);
    }
    out
}

#[derive(Default)]
struct Calls {
    definition: AtomicUsize,
    references: AtomicUsize,
    hover: AtomicUsize,
    highlights: AtomicUsize,
    implementation: AtomicUsize,
}

/// One scripted yield of a mock location stream
#[derive(Clone)]
enum Step {
    Yield(Vec<Location>),
    Abstain,
    Transport,
    Fatal,
}

fn steps_stream(steps: Vec<Step>) -> LocationStream {
    stream::iter(steps.into_iter().map(|step| match step {
        Step::Yield(locations) => Ok(Some(locations)),
        Step::Abstain => Ok(None),
        Step::Transport => Err(anyhow::Error::new(NavError::Transport(
            "connection reset".to_string(),
        ))),
        Step::Fatal => Err(anyhow!("malformed payload")),
    }))
    .boxed()
}

/// A tier adapter that replays scripted yields and counts invocations
struct ScriptedAdapter {
    calls: Arc<Calls>,
    definition_steps: Vec<Step>,
    references_steps: Vec<Step>,
    implementation_steps: Vec<Step>,
    hover_reply: Option<Hover>,
    highlight_ranges: Option<Vec<Range>>,
}

impl ScriptedAdapter {
    fn silent() -> Self {
        Self {
            calls: Arc::new(Calls::default()),
            definition_steps: Vec::new(),
            references_steps: Vec::new(),
            implementation_steps: Vec::new(),
            hover_reply: None,
            highlight_ranges: None,
        }
    }

    fn with_definition(mut self, steps: Vec<Step>) -> Self {
        self.definition_steps = steps;
        self
    }

    fn with_references(mut self, steps: Vec<Step>) -> Self {
        self.references_steps = steps;
        self
    }

    fn with_implementation(mut self, steps: Vec<Step>) -> Self {
        self.implementation_steps = steps;
        self
    }

    fn with_hover(mut self, hover: Hover) -> Self {
        self.hover_reply = Some(hover);
        self
    }

    fn with_highlights(mut self, ranges: Vec<Range>) -> Self {
        self.highlight_ranges = Some(ranges);
        self
    }
}

impl SourceAdapter for ScriptedAdapter {
    fn definition(&self, _doc: &Document, _pos: Position) -> LocationStream {
        self.calls.definition.fetch_add(1, Ordering::SeqCst);
        steps_stream(self.definition_steps.clone())
    }

    fn references(&self, _doc: &Document, _pos: Position, _ctx: ReferenceContext) -> LocationStream {
        self.calls.references.fetch_add(1, Ordering::SeqCst);
        steps_stream(self.references_steps.clone())
    }

    fn hover(&self, _doc: &Document, _pos: Position) -> HoverStream {
        self.calls.hover.fetch_add(1, Ordering::SeqCst);
        let reply = self.hover_reply.clone();
        stream::once(async move { Ok(reply) }).boxed()
    }

    fn document_highlights(&self, _doc: &Document, _pos: Position) -> RangeStream {
        self.calls.highlights.fetch_add(1, Ordering::SeqCst);
        let reply = self.highlight_ranges.clone();
        stream::once(async move { Ok(reply) }).boxed()
    }

    fn implementation(&self, _doc: &Document, _pos: Position) -> LocationStream {
        self.calls.implementation.fetch_add(1, Ordering::SeqCst);
        steps_stream(self.implementation_steps.clone())
    }
}

/// A tier whose streams never yield; used to prove cancellation wins
struct PendingAdapter;

impl SourceAdapter for PendingAdapter {
    fn definition(&self, _doc: &Document, _pos: Position) -> LocationStream {
        stream::pending().boxed()
    }

    fn references(&self, _doc: &Document, _pos: Position, _ctx: ReferenceContext) -> LocationStream {
        stream::pending().boxed()
    }

    fn hover(&self, _doc: &Document, _pos: Position) -> HoverStream {
        stream::pending().boxed()
    }

    fn document_highlights(&self, _doc: &Document, _pos: Position) -> RangeStream {
        stream::pending().boxed()
    }
}

fn engine_with(
    config: Config,
    precise: Option<ScriptedAdapter>,
    live: Option<ScriptedAdapter>,
    approximate: ScriptedAdapter,
) -> NavEngine {
    NavEngine::new(
        config,
        precise.map(|a| Arc::new(a) as Arc<dyn SourceAdapter>),
        live.map(|a| Arc::new(a) as Arc<dyn SourceAdapter>),
        Arc::new(approximate),
    )
}

#[tokio::test]
async fn test_precise_definition_short_circuits_lower_tiers() {
    let target = loc("acme/api", "src/handler.go", 10);
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![target.clone()])]);
    let live = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![loc(
        "acme/api",
        "wrong.go",
        1,
    )])]);
    let approximate = ScriptedAdapter::silent();
    let live_calls = live.calls.clone();
    let approx_calls = approximate.calls.clone();

    let engine = engine_with(Config::default(), Some(precise), Some(live), approximate);
    let results = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;

    assert_eq!(results.len(), 1);
    let result = results[0].as_ref().unwrap();
    assert_eq!(result.locations, vec![target]);
    assert_eq!(
        result.alert.as_ref().unwrap().provenance,
        Provenance::Semantic
    );
    assert_eq!(live_calls.definition.load(Ordering::SeqCst), 0);
    assert_eq!(approx_calls.definition.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_precise_abstention_falls_through_to_live() {
    let target = loc("acme/api", "src/handler.go", 20);
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Abstain]);
    let live = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![target.clone()])]);
    let approximate = ScriptedAdapter::silent();
    let approx_calls = approximate.calls.clone();

    let engine = engine_with(Config::default(), Some(precise), Some(live), approximate);
    let results = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;

    assert_eq!(results.len(), 1);
    let result = results[0].as_ref().unwrap();
    assert_eq!(result.locations, vec![target]);
    assert_eq!(
        result.alert.as_ref().unwrap().provenance,
        Provenance::LiveAnalysis
    );
    assert_eq!(approx_calls.definition.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_live_empty_answer_is_authoritative() {
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Abstain]);
    let live = ScriptedAdapter::silent().with_definition(vec![Step::Yield(Vec::new())]);
    let approximate = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![loc(
        "acme/api",
        "noise.go",
        1,
    )])]);
    let approx_calls = approximate.calls.clone();

    let engine = engine_with(Config::default(), Some(precise), Some(live), approximate);
    let results = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;

    // The live tier said "definitively nothing"; the search tier must not
    // get a chance to contradict it.
    assert_eq!(results.len(), 1);
    let result = results[0].as_ref().unwrap();
    assert!(result.locations.is_empty());
    assert_eq!(
        result.alert.as_ref().unwrap().provenance,
        Provenance::LiveAnalysis
    );
    assert_eq!(approx_calls.definition.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_failure_falls_through_to_search() {
    let target = loc("acme/api", "src/found.go", 8);
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Transport]);
    let approximate =
        ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![target.clone()])]);

    let engine = engine_with(Config::default(), Some(precise), None, approximate);
    let results = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;

    assert_eq!(results.len(), 1);
    let result = results[0].as_ref().unwrap();
    assert_eq!(result.locations, vec![target]);
    assert_eq!(
        result.alert.as_ref().unwrap().provenance,
        Provenance::SearchBased {
            support: IndexingSupport::Robust
        }
    );
}

#[tokio::test]
async fn test_fatal_error_surfaces_and_stops_aggregation() {
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Fatal]);
    let approximate = ScriptedAdapter::silent();
    let approx_calls = approximate.calls.clone();

    let engine = engine_with(Config::default(), Some(precise), None, approximate);
    let results = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
    assert_eq!(approx_calls.definition.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_precise_tier_is_never_consulted() {
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![loc(
        "acme/api",
        "src/handler.go",
        10,
    )])]);
    let target = loc("acme/api", "src/live.go", 2);
    let live = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![target.clone()])]);
    let precise_calls = precise.calls.clone();

    let mut config = Config::default();
    config.tiers.precise_enabled = false;
    let engine = engine_with(config, Some(precise), Some(live), ScriptedAdapter::silent());
    let results = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;

    assert_eq!(results[0].as_ref().unwrap().locations, vec![target]);
    assert_eq!(precise_calls.definition.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hover_falls_through_tiers() {
    let hover = Hover {
        contents: "func Serve()".to_string(),
        range: None,
    };
    let precise = ScriptedAdapter::silent();
    let live = ScriptedAdapter::silent().with_hover(hover.clone());

    let engine = engine_with(
        Config::default(),
        Some(precise),
        Some(live),
        ScriptedAdapter::silent(),
    );
    let results =
        collect(engine.hover(&doc(), Position::new(3, 4), CancellationToken::new())).await;

    assert_eq!(results.len(), 1);
    let result = results[0].as_ref().unwrap();
    assert_eq!(result.hover, hover);
    assert_eq!(
        result.alert.as_ref().unwrap().provenance,
        Provenance::LiveAnalysis
    );
}

#[tokio::test]
async fn test_highlights_prefer_precise() {
    let ranges = vec![Range::new(1, 0, 1, 5), Range::new(4, 2, 4, 7)];
    let precise = ScriptedAdapter::silent().with_highlights(ranges.clone());
    let live = ScriptedAdapter::silent().with_highlights(vec![Range::new(9, 0, 9, 1)]);
    let live_calls = live.calls.clone();

    let engine = engine_with(
        Config::default(),
        Some(precise),
        Some(live),
        ScriptedAdapter::silent(),
    );
    let results = collect(engine.document_highlights(
        &doc(),
        Position::new(1, 2),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(results[0].as_ref().unwrap().ranges, ranges);
    assert_eq!(live_calls.highlights.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_references_blend_appends_only_uncovered_files() {
    let in_a = loc("acme/api", "a.go", 1);
    let in_b = loc("acme/api", "b.go", 2);
    let search_in_a = loc("acme/api", "a.go", 30);
    let in_c = loc("acme/api", "c.go", 3);

    let precise = ScriptedAdapter::silent()
        .with_references(vec![Step::Yield(vec![in_a.clone(), in_b.clone()])]);
    let approximate = ScriptedAdapter::silent()
        .with_references(vec![Step::Yield(vec![search_in_a, in_c.clone()])]);

    let mut config = Config::default();
    config.tiers.mix_references = true;
    let engine = engine_with(config, Some(precise), None, approximate);
    let results = collect(engine.references(
        &doc(),
        Position::new(3, 4),
        ReferenceContext::default(),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(results.len(), 2);
    let first = results[0].as_ref().unwrap();
    assert_eq!(
        first.locations,
        vec![
            TaggedLocation::untagged(in_a.clone()),
            TaggedLocation::untagged(in_b.clone())
        ]
    );
    assert_eq!(
        first.alert.as_ref().unwrap().provenance,
        Provenance::Semantic
    );

    // The search hit in a.go is dropped (a.go already has precise results);
    // the hit in c.go is appended with a badge.
    let second = results[1].as_ref().unwrap();
    assert_eq!(second.locations.len(), 3);
    assert_eq!(second.locations[..2], first.locations[..]);
    assert_eq!(second.locations[2].location, in_c);
    assert_eq!(second.locations[2].badge, Some(Badge::Approximate));
}

#[tokio::test]
async fn test_references_blend_off_by_default() {
    let precise =
        ScriptedAdapter::silent().with_references(vec![Step::Yield(vec![loc("acme/api", "a.go", 1)])]);
    let approximate = ScriptedAdapter::silent()
        .with_references(vec![Step::Yield(vec![loc("acme/api", "c.go", 3)])]);
    let approx_calls = approximate.calls.clone();

    let engine = engine_with(Config::default(), Some(precise), None, approximate);
    let results = collect(engine.references(
        &doc(),
        Position::new(3, 4),
        ReferenceContext::default(),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(results.len(), 1);
    assert_eq!(approx_calls.references.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_references_blend_skipped_when_live_configured() {
    let precise =
        ScriptedAdapter::silent().with_references(vec![Step::Yield(vec![loc("acme/api", "a.go", 1)])]);
    let approximate = ScriptedAdapter::silent()
        .with_references(vec![Step::Yield(vec![loc("acme/api", "c.go", 3)])]);
    let approx_calls = approximate.calls.clone();

    let mut config = Config::default();
    config.tiers.mix_references = true;
    let engine = engine_with(
        config,
        Some(precise),
        Some(ScriptedAdapter::silent()),
        approximate,
    );
    let results = collect(engine.references(
        &doc(),
        Position::new(3, 4),
        ReferenceContext::default(),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(results.len(), 1);
    assert_eq!(approx_calls.references.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cumulative_precise_reference_yields_forwarded() {
    let in_a = loc("acme/api", "a.go", 1);
    let in_b = loc("acme/api", "b.go", 2);
    let precise = ScriptedAdapter::silent().with_references(vec![
        Step::Yield(vec![in_a.clone()]),
        Step::Yield(vec![in_a.clone(), in_b.clone()]),
    ]);

    let engine = engine_with(
        Config::default(),
        Some(precise),
        None,
        ScriptedAdapter::silent(),
    );
    let results = collect(engine.references(
        &doc(),
        Position::new(3, 4),
        ReferenceContext::default(),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().locations.len(), 1);
    assert_eq!(results[1].as_ref().unwrap().locations.len(), 2);
    // Only the first emission carries the alert
    assert!(results[0].as_ref().unwrap().alert.is_some());
    assert!(results[1].as_ref().unwrap().alert.is_none());
}

#[tokio::test]
async fn test_repeated_definition_replays_without_new_backend_calls() {
    let target = loc("acme/api", "src/handler.go", 10);
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![target.clone()])]);
    let precise_calls = precise.calls.clone();

    let engine = engine_with(
        Config::default(),
        Some(precise),
        None,
        ScriptedAdapter::silent(),
    );
    let first = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;
    let second = collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new()))
        .await;

    assert_eq!(precise_calls.definition.load(Ordering::SeqCst), 1);
    assert_eq!(
        first[0].as_ref().unwrap().locations,
        second[0].as_ref().unwrap().locations
    );
}

#[tokio::test]
async fn test_memo_is_per_position() {
    let precise = ScriptedAdapter::silent().with_definition(vec![Step::Yield(vec![loc(
        "acme/api",
        "src/handler.go",
        10,
    )])]);
    let precise_calls = precise.calls.clone();

    let engine = engine_with(
        Config::default(),
        Some(precise),
        None,
        ScriptedAdapter::silent(),
    );
    collect(engine.definition(&doc(), Position::new(3, 4), CancellationToken::new())).await;
    collect(engine.definition(&doc(), Position::new(7, 1), CancellationToken::new())).await;

    assert_eq!(precise_calls.definition.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_implementation_requires_live_tier() {
    let engine = engine_with(
        Config::default(),
        Some(ScriptedAdapter::silent()),
        None,
        ScriptedAdapter::silent(),
    );
    let results = collect(engine.implementation(
        &doc(),
        Position::new(3, 4),
        CancellationToken::new(),
    ))
    .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_implementation_answered_by_live_tier() {
    let target = loc("acme/api", "src/impl.go", 12);
    let live =
        ScriptedAdapter::silent().with_implementation(vec![Step::Yield(vec![target.clone()])]);

    let engine = engine_with(Config::default(), None, Some(live), ScriptedAdapter::silent());
    let results = collect(engine.implementation(
        &doc(),
        Position::new(3, 4),
        CancellationToken::new(),
    ))
    .await;

    assert_eq!(results.len(), 1);
    let result = results[0].as_ref().unwrap();
    assert_eq!(result.locations, vec![target]);
    assert_eq!(
        result.alert.as_ref().unwrap().provenance,
        Provenance::LiveAnalysis
    );
}

#[tokio::test]
async fn test_cancellation_ends_stream_without_results() {
    let engine = NavEngine::new(
        Config::default(),
        Some(Arc::new(PendingAdapter)),
        None,
        Arc::new(ScriptedAdapter::silent()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = collect(engine.definition(&doc(), Position::new(3, 4), cancel)).await;
    assert!(results.is_empty());
}
