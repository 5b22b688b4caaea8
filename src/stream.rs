//! Streaming primitives shared by the adapters and the aggregation engine
//!
//! All result streams in this crate are finite. The per-operation semantics
//! (definition yields replace, reference yields are cumulative supersets)
//! are a documented contract on the adapter trait, not a property enforced
//! here.

use anyhow::Result;
use futures::future::{Either, select};
use futures::pin_mut;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A stream fed by a spawned producer task
///
/// Dropping the stream aborts the producer, so an abandoned consumer does
/// not leave backend calls running to completion for nobody.
pub struct ProducerStream<T> {
    rx: mpsc::Receiver<T>,
    handle: JoinHandle<()>,
}

impl<T> futures::Stream for ProducerStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> Drop for ProducerStream<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a producer task that feeds the returned stream through a channel
///
/// The producer receives the sender and should stop as soon as a send
/// fails, which means the consumer went away.
pub fn spawn_stream<T, F, Fut>(producer: F) -> ProducerStream<T>
where
    T: Send + 'static,
    F: FnOnce(mpsc::Sender<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(producer(tx));
    ProducerStream { rx, handle }
}

/// Race a primary computation against a delayed fallback
///
/// The primary runs alone for `delay`. If it finishes in time with a value
/// the `accept` predicate likes, the fallback is never created. Otherwise
/// the fallback is started and raced against the still-pending primary; the
/// first acceptable value wins. When neither value is acceptable the
/// fallback's value is returned, except that an `Ok` primary beats a
/// fallback error.
pub async fn race_with_fallback<T, P, FB, MkFb, A>(
    primary: P,
    fallback: MkFb,
    delay: Duration,
    accept: A,
) -> Result<T>
where
    P: Future<Output = Result<T>>,
    FB: Future<Output = Result<T>>,
    MkFb: FnOnce() -> FB,
    A: Fn(&T) -> bool,
{
    pin_mut!(primary);
    let timer = tokio::time::sleep(delay);
    pin_mut!(timer);

    match select(primary, timer).await {
        Either::Left((primary_res, _)) => {
            if accepted(&primary_res, &accept) {
                return primary_res;
            }
            tracing::debug!("primary finished without acceptable value, invoking fallback");
            let fallback_res = fallback().await;
            Ok(prefer_fallback(primary_res, fallback_res)?)
        }
        Either::Right(((), primary)) => {
            tracing::debug!("primary missed the {:?} budget, racing fallback", delay);
            let fb = fallback();
            pin_mut!(fb);
            match select(primary, fb).await {
                Either::Left((primary_res, fb)) => {
                    if accepted(&primary_res, &accept) {
                        return primary_res;
                    }
                    let fallback_res = fb.await;
                    Ok(prefer_fallback(primary_res, fallback_res)?)
                }
                Either::Right((fallback_res, primary)) => {
                    if accepted(&fallback_res, &accept) {
                        return fallback_res;
                    }
                    let primary_res = primary.await;
                    if accepted(&primary_res, &accept) {
                        return primary_res;
                    }
                    Ok(prefer_fallback(primary_res, fallback_res)?)
                }
            }
        }
    }
}

fn accepted<T>(res: &Result<T>, accept: impl Fn(&T) -> bool) -> bool {
    matches!(res, Ok(v) if accept(v))
}

/// Neither value was acceptable: hand back the fallback's, unless the
/// fallback failed and the primary at least produced something.
fn prefer_fallback<T>(primary: Result<T>, fallback: Result<T>) -> Result<T> {
    match (primary, fallback) {
        (_, Ok(v)) => Ok(v),
        (Ok(v), Err(_)) => Ok(v),
        (Err(_), Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn non_empty(v: &Vec<u32>) -> bool {
        !v.is_empty()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_acceptable_primary_skips_fallback() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let calls = fallback_calls.clone();

        let out = race_with_fallback(
            async { Ok(vec![1u32]) },
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec![2u32]) }
            },
            Duration::from_millis(25),
            non_empty,
        )
        .await
        .unwrap();

        assert_eq!(out, vec![1]);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_primary_loses_to_fallback() {
        let out = race_with_fallback(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(vec![1u32])
            },
            || async { Ok(vec![2u32]) },
            Duration::from_millis(25),
            non_empty,
        )
        .await
        .unwrap();

        assert_eq!(out, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_primary_falls_back() {
        let out = race_with_fallback(
            async { Ok(Vec::<u32>::new()) },
            || async { Ok(vec![2u32]) },
            Duration::from_millis(25),
            non_empty,
        )
        .await
        .unwrap();

        assert_eq!(out, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacceptable_fallback_waits_for_primary() {
        let out = race_with_fallback(
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(vec![1u32])
            },
            || async { Ok(Vec::<u32>::new()) },
            Duration::from_millis(25),
            non_empty,
        )
        .await
        .unwrap();

        assert_eq!(out, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_neither_acceptable_prefers_fallback_value() {
        let out = race_with_fallback(
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(vec![9u32])
            },
            || async { Ok(Vec::<u32>::new()) },
            Duration::from_millis(25),
            |_: &Vec<u32>| false,
        )
        .await
        .unwrap();

        assert_eq!(out, Vec::<u32>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_error_keeps_primary_value() {
        let out = race_with_fallback(
            async { Ok(Vec::<u32>::new()) },
            || async { Err(anyhow!("backend down")) },
            Duration::from_millis(25),
            non_empty,
        )
        .await
        .unwrap();

        assert_eq!(out, Vec::<u32>::new());
    }

    #[tokio::test]
    async fn test_spawn_stream_yields_in_order() {
        let mut stream = spawn_stream(|tx| async move {
            for i in 0..3u32 {
                if tx.send(i).await.is_err() {
                    return;
                }
            }
        });

        assert_eq!(stream.next().await, Some(0));
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_dropping_stream_aborts_producer() {
        let done = Arc::new(AtomicUsize::new(0));
        let done_in_task = done.clone();

        let stream = spawn_stream(move |tx: mpsc::Sender<u32>| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            done_in_task.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(1).await;
        });

        drop(stream);
        tokio::task::yield_now().await;
        assert_eq!(done.load(Ordering::SeqCst), 0);
    }
}
