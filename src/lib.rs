//! Tweeter – a small tweet-publishing service.
//!
//! Tweeter keeps a single, in-memory timeline of published tweets:
//! * A [`tweet::Tweet`] is a plain text tweet, an image tweet (text plus a URL)
//!   or a quote of another, already published, tweet.
//! * The [`store::TweetStore`] validates and publishes tweets, numbering them
//!   1, 2, 3... in publish order, and indexes them by author.
//! * Searches run in the background over a snapshot of the timeline and
//!   stream their matches back (see [`search::Search`]).
//!
//! ## Modules
//! * [`tweet`] – The tweet variants and how they render.
//! * [`store`] – Publishing, lookups by id / author, substring search.
//! * [`search`] – The background search producer and its cancellable handle.
//! * [`persist`] – Write-behind sinks: memory mirror, append-only file, SQLite.
//! * [`settings`] – Layered configuration.
//! * [`server`] – HTTP JSON API on axum.
//! * [`shell`] – Line-oriented interactive shell.
//!
//! ## Persistence
//! Every successful publish notifies the store's [`persist::PersistenceSink`].
//! Sinks are best-effort: they never fail or delay a publish. The SQLite sink
//! can also restore a previous timeline through [`store::TweetStore::restore`].
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use tweeter::{persist::MemorySink, store::TweetStore, tweet::Tweet};
//! let store = TweetStore::new(Arc::new(MemorySink::new()));
//! let id = store.publish(Tweet::text("grupoesfera", "This is my first tweet")).unwrap();
//! assert_eq!(id, 1);
//! let found: Vec<_> = store.search_containing("first").collect();
//! assert_eq!(found[0].render(), "@grupoesfera: This is my first tweet");
//! ```

pub mod error;
pub mod persist;
pub mod search;
pub mod server;
pub mod settings;
pub mod shell;
pub mod store;
pub mod tweet;
