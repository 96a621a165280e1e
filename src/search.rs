//! Background substring search over a snapshot of the timeline.
//!
//! A search runs on its own thread and streams matches back through a bounded
//! channel. The caller drains the [`Search`] either synchronously (it is an
//! `Iterator`) or asynchronously (`recv().await`, or as a `Stream` through
//! [`Search::into_stream`]). The channel closing is the end-of-stream signal.
//!
//! The scan works on the tweets that existed when the search started. Tweets
//! published while it runs may or may not be seen; nothing stronger is
//! promised between concurrent publishes and an in-flight search.
//!
//! Cancellation is cooperative through a shared `Arc<AtomicBool>`. Dropping
//! the `Search` also cancels it: the producer notices either the flag or the
//! closed channel and exits, so no thread is left behind.

use std::pin::Pin;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

use crate::tweet::Tweet;

pub const DEFAULT_SEARCH_BUFFER: usize = 64;

/// Cancellation token shared with the search thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);
impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

/// Handle to a running or completed search.
pub struct Search {
    query: String,
    cancel: CancelToken,
    results: Receiver<Arc<Tweet>>,
    worker: Option<JoinHandle<()>>,
}

impl Search {
    /// Starts scanning `snapshot` for bodies containing `query`. A buffer of
    /// zero is bumped to one, since the channel needs room for a single match.
    pub(crate) fn start(query: String, snapshot: Vec<Arc<Tweet>>, buffer: usize) -> Self {
        let (tx, results) = mpsc::channel(buffer.max(1));
        let cancel = CancelToken::new();
        let cancel_for_thread = cancel.clone();
        let needle = query.clone();
        let worker = std::thread::spawn(move || scan(&needle, snapshot, tx, cancel_for_thread));
        Self { query, cancel, results, worker: Some(worker) }
    }
    pub fn query(&self) -> &str {
        &self.query
    }
    /// Request cancellation. Matches already buffered can still be received.
    pub fn cancel(&self) { self.cancel.cancel(); }
    pub fn cancel_token(&self) -> CancelToken { self.cancel.clone() }
    /// Next match, blocking the current thread. Must not be called from
    /// inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<Arc<Tweet>> {
        self.results.blocking_recv()
    }
    pub async fn recv(&mut self) -> Option<Arc<Tweet>> {
        self.results.recv().await
    }
    /// Hands the channel over as a `Stream`. Dropping the stream cancels the
    /// search just like dropping the `Search` does.
    pub fn into_stream(mut self) -> SearchStream {
        let (_, placeholder) = mpsc::channel(1);
        let results = std::mem::replace(&mut self.results, placeholder);
        SearchStream {
            results: ReceiverStream::new(results),
            cancel: self.cancel.clone(),
            _worker: self.worker.take(),
        }
    }
}

/// Stream of matches produced by [`Search::into_stream`].
pub struct SearchStream {
    results: ReceiverStream<Arc<Tweet>>,
    cancel: CancelToken,
    // detached on drop, the producer exits on its own once cancelled
    _worker: Option<JoinHandle<()>>,
}

impl SearchStream {
    pub fn cancel_token(&self) -> CancelToken { self.cancel.clone() }
}

impl Stream for SearchStream {
    type Item = Arc<Tweet>;
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Arc<Tweet>>> {
        Pin::new(&mut self.results).poll_next(cx)
    }
}

impl Drop for SearchStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Iterator for Search {
    type Item = Arc<Tweet>;
    fn next(&mut self) -> Option<Arc<Tweet>> {
        self.blocking_recv()
    }
}

impl Drop for Search {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
        }
    }
}

fn scan(query: &str, snapshot: Vec<Arc<Tweet>>, tx: Sender<Arc<Tweet>>, cancel: CancelToken) {
    let mut matched = 0usize;
    for tweet in snapshot {
        if cancel.is_cancelled() {
            debug!(query, matched, "search cancelled");
            return;
        }
        if tweet.body().contains(query) {
            if tx.blocking_send(tweet).is_err() {
                debug!(query, matched, "search abandoned by consumer");
                return;
            }
            matched += 1;
        }
    }
    debug!(query, matched, "search complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bodies: &[&str]) -> Vec<Arc<Tweet>> {
        bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                let mut tweet = Tweet::text("grupoesfera", *body);
                tweet.assign_id(i as u64 + 1).unwrap();
                Arc::new(tweet)
            })
            .collect()
    }

    #[test]
    fn matches_come_out_in_id_order() {
        let search = Search::start("tweet".into(), snapshot(&["a tweet", "nothing", "another tweet"]), 1);
        let ids: Vec<_> = search.map(|t| t.id().unwrap()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn search_is_case_sensitive() {
        let search = Search::start("Tweet".into(), snapshot(&["a tweet"]), 4);
        assert_eq!(search.count(), 0);
    }

    #[test]
    fn empty_query_matches_everything() {
        let search = Search::start(String::new(), snapshot(&["a", "b", "c"]), 2);
        assert_eq!(search.count(), 3);
    }

    #[test]
    fn empty_snapshot_closes_immediately() {
        let mut search = Search::start("x".into(), Vec::new(), 4);
        assert!(search.blocking_recv().is_none());
    }

    #[test]
    fn cancelled_search_stops_producing() {
        let bodies: Vec<String> = (0..100).map(|i| format!("tweet {i}")).collect();
        let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
        let mut search = Search::start("tweet".into(), snapshot(&refs), 1);
        let first = search.blocking_recv().expect("first match");
        assert_eq!(first.id(), Some(1));
        search.cancel();
        // only the buffered match and the send already in flight can arrive
        let rest = search.count();
        assert!(rest <= 2, "got {rest} matches after cancelling");
    }

    #[test]
    fn cancel_token_stops_the_search_from_another_thread() {
        let bodies: Vec<String> = (0..100).map(|i| format!("tweet {i}")).collect();
        let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
        let mut search = Search::start("tweet".into(), snapshot(&refs), 1);
        let token = search.cancel_token();
        assert!(search.blocking_recv().is_some());
        std::thread::spawn(move || token.cancel()).join().unwrap();
        let rest = search.count();
        assert!(rest <= 2, "got {rest} matches after cancelling");
    }

    #[test]
    fn dropping_the_stream_cancels_the_search() {
        let bodies: Vec<String> = (0..100).map(|i| format!("tweet {i}")).collect();
        let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
        let stream = Search::start("tweet".into(), snapshot(&refs), 1).into_stream();
        let token = stream.cancel_token();
        assert!(!token.is_cancelled());
        drop(stream);
        assert!(token.is_cancelled());
    }

    #[test]
    fn dropping_the_search_releases_the_producer() {
        let bodies: Vec<String> = (0..100).map(|i| format!("tweet {i}")).collect();
        let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
        let mut search = Search::start("tweet".into(), snapshot(&refs), 1);
        let worker = search.worker.take().expect("worker");
        drop(search);
        worker.join().expect("producer exits once the consumer is gone");
    }
}
