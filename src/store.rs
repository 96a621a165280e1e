use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// the per-author index is keyed by plain strings, so a fast hasher is enough
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{Result, TweeterError};
use crate::persist::PersistenceSink;
use crate::search::{Search, DEFAULT_SEARCH_BUFFER};
use crate::tweet::{Tweet, TweetId};

pub type AuthorHasher = BuildHasherDefault<SeaHasher>;

// ------------- Timeline -------------
// Everything the store mutates lives here, behind one lock, so that appending,
// numbering and indexing a tweet happen as a single step.
#[derive(Debug, Default)]
struct Timeline {
    tweets: Vec<Arc<Tweet>>,
    by_author: HashMap<String, Vec<Arc<Tweet>>, AuthorHasher>,
}
impl Timeline {
    fn keep(&mut self, tweet: Arc<Tweet>) {
        self.by_author
            .entry(tweet.author().to_owned())
            .or_default()
            .push(Arc::clone(&tweet));
        self.tweets.push(tweet);
    }
    fn next_id(&self) -> TweetId {
        self.tweets.len() as TweetId + 1
    }
    // a quote may only point at a tweet this timeline holds
    fn check_quoted(&self, quoted: &Arc<Tweet>) -> Result<()> {
        let id = quoted.id().ok_or_else(|| {
            TweeterError::Invariant("a quote must point at a published tweet".into())
        })?;
        let held = id
            .checked_sub(1)
            .and_then(|position| usize::try_from(position).ok())
            .and_then(|position| self.tweets.get(position));
        match held {
            Some(held) if Arc::ptr_eq(held, quoted) => Ok(()),
            _ => Err(TweeterError::NotFound(id)),
        }
    }
}

// ------------- TweetStore -------------
/// The one collection of published tweets, shared by the shell, the HTTP
/// handlers and background searches.
pub struct TweetStore {
    timeline: Mutex<Timeline>,
    // responsible for the write-behind persistence
    sink: Arc<dyn PersistenceSink>,
    search_buffer: usize,
}

impl TweetStore {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self {
            timeline: Mutex::new(Timeline::default()),
            sink,
            search_buffer: DEFAULT_SEARCH_BUFFER,
        }
    }
    /// Builds a store primed with whatever the sink already holds, so ids
    /// continue where a previous process left off. Restored tweets are not
    /// saved again. A sink that cannot read its data back fails the restore.
    pub fn restore(sink: Arc<dyn PersistenceSink>) -> Result<Self> {
        let store = Self::new(sink);
        let kept = store.sink.load()?;
        {
            let mut timeline = store.timeline();
            for tweet in kept {
                let expected = timeline.next_id();
                if tweet.id() != Some(expected) {
                    return Err(TweeterError::DataCorruption {
                        message: format!(
                            "expected tweet {expected} while restoring, found {:?}",
                            tweet.id()
                        ),
                    });
                }
                timeline.keep(tweet);
            }
            if !timeline.tweets.is_empty() {
                info!(count = timeline.tweets.len(), "restored tweets");
            }
        }
        Ok(store)
    }
    /// Capacity of the channel each search streams through.
    pub fn with_search_buffer(mut self, search_buffer: usize) -> Self {
        self.search_buffer = search_buffer;
        self
    }
    fn timeline(&self) -> MutexGuard<'_, Timeline> {
        // every mutation completes before the guard is released
        self.timeline.lock().unwrap_or_else(PoisonError::into_inner)
    }
    pub fn sink(&self) -> Arc<dyn PersistenceSink> {
        Arc::clone(&self.sink)
    }
    pub fn publish(&self, mut tweet: Tweet) -> Result<TweetId> {
        if let Err(e) = tweet.validate() {
            debug!(error = %e, author = tweet.author(), "tweet rejected");
            return Err(e);
        }
        let mut timeline = self.timeline();
        if let Some(quoted) = tweet.quoted() {
            timeline.check_quoted(quoted)?;
        }
        let id = timeline.next_id();
        tweet.assign_id(id)?;
        let kept = Arc::new(tweet);
        timeline.keep(Arc::clone(&kept));
        self.sink.save(&kept);
        debug!(id, author = kept.author(), "tweet published");
        Ok(id)
    }
    pub fn get_last(&self) -> Result<Arc<Tweet>> {
        self.timeline()
            .tweets
            .last()
            .cloned()
            .ok_or(TweeterError::EmptyStore)
    }
    pub fn get_all(&self) -> Vec<Arc<Tweet>> {
        self.timeline().tweets.clone()
    }
    pub fn get_by_id(&self, id: TweetId) -> Result<Arc<Tweet>> {
        let timeline = self.timeline();
        id.checked_sub(1)
            .and_then(|position| usize::try_from(position).ok())
            .and_then(|position| timeline.tweets.get(position))
            .cloned()
            .ok_or(TweeterError::NotFound(id))
    }
    pub fn get_by_user(&self, author: &str) -> Vec<Arc<Tweet>> {
        self.timeline()
            .by_author
            .get(author)
            .cloned()
            .unwrap_or_default()
    }
    pub fn count_by_user(&self, author: &str) -> usize {
        self.timeline().by_author.get(author).map_or(0, Vec::len)
    }
    pub fn len(&self) -> usize {
        self.timeline().tweets.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Streams every tweet whose body contains `query`, in publish order.
    /// Only tweets published before this call are guaranteed to be scanned.
    pub fn search_containing(&self, query: impl Into<String>) -> Search {
        let snapshot = self.get_all();
        Search::start(query.into(), snapshot, self.search_buffer)
    }
}
