// used for persistence
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{Result, TweeterError};
use crate::tweet::{Tweet, TweetId, TweetKind};

/// Write-behind target notified by the store after every successful publish.
///
/// `save` is fire-and-forget: the store never waits for durability and a
/// failing sink must not affect the publish. Implementations are called from
/// inside the store's critical section, so they see tweets in id order and
/// must never call back into the store.
pub trait PersistenceSink: Send + Sync {
    fn save(&self, tweet: &Arc<Tweet>);
    /// Everything this sink holds, in id order.
    fn all(&self) -> Vec<Arc<Tweet>>;
    /// Like `all`, but a sink that can fail to read its data back reports
    /// that failure instead of handing out an empty timeline.
    fn load(&self) -> Result<Vec<Arc<Tweet>>> {
        Ok(self.all())
    }
    /// Blocks until previously saved tweets have been handled.
    fn flush(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(PathBuf),
    Sqlite(PathBuf),
}

pub fn open(mode: &PersistenceMode) -> Result<Arc<dyn PersistenceSink>> {
    let sink: Arc<dyn PersistenceSink> = match mode {
        PersistenceMode::InMemory => Arc::new(MemorySink::new()),
        PersistenceMode::File(path) => Arc::new(FileSink::create(path)?),
        PersistenceMode::Sqlite(path) => Arc::new(SqliteSink::open(path)?),
    };
    Ok(sink)
}

// ------------- Memory -------------
#[derive(Debug, Default)]
pub struct MemorySink {
    tweets: Mutex<Vec<Arc<Tweet>>>,
}
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}
impl PersistenceSink for MemorySink {
    fn save(&self, tweet: &Arc<Tweet>) {
        self.tweets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(tweet));
    }
    fn all(&self) -> Vec<Arc<Tweet>> {
        self.tweets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// ------------- File -------------
enum WriterMessage {
    Save(Arc<Tweet>),
    Flush(Sender<()>),
}

/// Appends the rendered form of every saved tweet to a file, one per line.
/// A single writer thread drains a queue, so lines land in save order.
pub struct FileSink {
    path: PathBuf,
    queue: Option<Sender<WriterMessage>>,
    written: Arc<Mutex<Vec<Arc<Tweet>>>>,
    writer: Option<JoinHandle<()>>,
}
impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&path)?;
        let (queue, messages) = mpsc::channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let written_by_writer = Arc::clone(&written);
        let writer = std::thread::spawn(move || write_behind(file, messages, written_by_writer));
        Ok(Self {
            path,
            queue: Some(queue),
            written,
            writer: Some(writer),
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_behind(file: File, messages: Receiver<WriterMessage>, written: Arc<Mutex<Vec<Arc<Tweet>>>>) {
    let mut out = BufWriter::new(file);
    for message in messages {
        match message {
            WriterMessage::Save(tweet) => match writeln!(out, "{}", tweet.render()) {
                Ok(()) => written
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(tweet),
                Err(e) => warn!(error = %e, id = ?tweet.id(), "could not write tweet to file"),
            },
            WriterMessage::Flush(done) => {
                if let Err(e) = out.flush() {
                    warn!(error = %e, "could not flush tweet file");
                }
                let _ = done.send(());
            }
        }
    }
    if let Err(e) = out.flush() {
        warn!(error = %e, "could not flush tweet file on close");
    }
}

impl PersistenceSink for FileSink {
    fn save(&self, tweet: &Arc<Tweet>) {
        let Some(queue) = &self.queue else { return };
        if queue.send(WriterMessage::Save(Arc::clone(tweet))).is_err() {
            warn!(path = %self.path.display(), "file writer has stopped, tweet not written");
        }
    }
    fn all(&self) -> Vec<Arc<Tweet>> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    fn flush(&self) {
        let Some(queue) = &self.queue else { return };
        let (done, wait) = mpsc::channel();
        if queue.send(WriterMessage::Flush(done)).is_ok() {
            let _ = wait.recv();
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // closing the queue lets the writer drain what is left and exit
        self.queue.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

// ------------- SQLite -------------
pub struct SqliteSink {
    connection: Mutex<Connection>,
}

struct StoredTweet {
    id: TweetId,
    kind: String,
    author: String,
    body: String,
    created: DateTime<Utc>,
    url: Option<String>,
    quoted: Option<TweetId>,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }
    fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists Tweet (
                Tweet_Identity integer not null,
                Kind text not null,
                Author text not null,
                Body text not null,
                Created text not null,
                Url text null,
                Quoted_Identity integer null,
                constraint referenceable_Tweet_Identity primary key (
                    Tweet_Identity
                ),
                constraint Quoted_is_Tweet foreign key (
                    Quoted_Identity
                ) references Tweet(Tweet_Identity)
            );
            ",
        )?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
    fn insert(&self, tweet: &Tweet) -> Result<()> {
        let id = tweet.id().ok_or_else(|| {
            TweeterError::Invariant("only published tweets can be persisted".into())
        })?;
        let quoted = match tweet.quoted() {
            Some(quoted) => Some(quoted.id().ok_or_else(|| {
                TweeterError::Invariant(format!("tweet {id} quotes an unpublished tweet"))
            })?),
            None => None,
        };
        let connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        let mut statement = connection.prepare_cached(
            "
            insert into Tweet (
                Tweet_Identity,
                Kind,
                Author,
                Body,
                Created,
                Url,
                Quoted_Identity
            ) values (?, ?, ?, ?, ?, ?, ?)
            ",
        )?;
        statement.execute(params![
            id,
            tweet.kind().name(),
            tweet.author(),
            tweet.body(),
            tweet.timestamp(),
            tweet.url(),
            quoted
        ])?;
        Ok(())
    }
}

impl PersistenceSink for SqliteSink {
    fn save(&self, tweet: &Arc<Tweet>) {
        if let Err(e) = self.insert(tweet) {
            warn!(error = %e, id = ?tweet.id(), "could not persist tweet");
        }
    }
    fn all(&self) -> Vec<Arc<Tweet>> {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "could not read persisted tweets");
            Vec::new()
        })
    }
    /// Reads every row back in id order. Quotes are resolved against rows
    /// that came before them, since a tweet can only quote an earlier one.
    fn load(&self) -> Result<Vec<Arc<Tweet>>> {
        let connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        let mut statement = connection.prepare_cached(
            "
            select Tweet_Identity,
                    Kind,
                    Author,
                    Body,
                    Created,
                    Url,
                    Quoted_Identity
                from Tweet
                order by Tweet_Identity
            ",
        )?;
        let rows = statement.query_map([], |row| {
            Ok(StoredTweet {
                id: row.get(0)?,
                kind: row.get(1)?,
                author: row.get(2)?,
                body: row.get(3)?,
                created: row.get(4)?,
                url: row.get(5)?,
                quoted: row.get(6)?,
            })
        })?;
        let mut loaded = Vec::new();
        let mut by_id: HashMap<TweetId, Arc<Tweet>> = HashMap::new();
        for row in rows {
            let row = row?;
            let kind = match (row.kind.as_str(), row.url, row.quoted) {
                ("text", _, _) => TweetKind::Text,
                ("image", Some(url), _) => TweetKind::Image { url },
                ("quote", _, Some(quoted)) => match by_id.get(&quoted) {
                    Some(quoted) => TweetKind::Quote { quoted: Arc::clone(quoted) },
                    None => {
                        return Err(TweeterError::DataCorruption {
                            message: format!("tweet {} quotes unknown tweet {quoted}", row.id),
                        })
                    }
                },
                (kind, _, _) => {
                    return Err(TweeterError::DataCorruption {
                        message: format!("tweet {} has incomplete '{kind}' data", row.id),
                    })
                }
            };
            let tweet = Arc::new(Tweet::restored(row.id, row.author, row.body, row.created, kind));
            by_id.insert(row.id, Arc::clone(&tweet));
            loaded.push(tweet);
        }
        debug!(count = loaded.len(), "loaded tweets from sqlite");
        Ok(loaded)
    }
}
