use std::fmt;
use std::sync::Arc;

// used for the creation timestamp of every tweet
use chrono::{DateTime, Utc};

use crate::error::{Result, TweeterError};

// ------------- TweetId -------------
// Ids are the 1-based position of a tweet in publish order.
pub type TweetId = u64;

pub const MAX_BODY_CHARS: usize = 140;

// ------------- TweetKind -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TweetKind {
    Text,
    Image { url: String },
    // the quoted tweet already lives in the store, so it is only shared here
    Quote { quoted: Arc<Tweet> },
}

impl TweetKind {
    pub fn name(&self) -> &'static str {
        match self {
            TweetKind::Text => "text",
            TweetKind::Image { .. } => "image",
            TweetKind::Quote { .. } => "quote",
        }
    }
}

// ------------- Tweet -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tweet {
    author: String,
    body: String,
    created: DateTime<Utc>,
    id: Option<TweetId>,
    kind: TweetKind,
}

impl Tweet {
    // None of the constructors validate; that happens when publishing.
    pub fn text(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_kind(author.into(), body.into(), TweetKind::Text)
    }
    pub fn image(
        author: impl Into<String>,
        body: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::with_kind(author.into(), body.into(), TweetKind::Image { url: url.into() })
    }
    pub fn quote(author: impl Into<String>, body: impl Into<String>, quoted: Arc<Tweet>) -> Self {
        Self::with_kind(author.into(), body.into(), TweetKind::Quote { quoted })
    }
    fn with_kind(author: String, body: String, kind: TweetKind) -> Self {
        Self {
            author,
            body,
            created: Utc::now(),
            id: None,
            kind,
        }
    }
    /// Rebuilds a tweet that was published before, keeping its original
    /// timestamp and id. Used when restoring from a durable sink.
    pub fn restored(
        id: TweetId,
        author: String,
        body: String,
        created: DateTime<Utc>,
        kind: TweetKind,
    ) -> Self {
        Self {
            author,
            body,
            created,
            id: Some(id),
            kind,
        }
    }
    pub fn author(&self) -> &str {
        &self.author
    }
    pub fn body(&self) -> &str {
        &self.body
    }
    /// `None` until the tweet has been published.
    pub fn id(&self) -> Option<TweetId> {
        self.id
    }
    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.created
    }
    pub fn kind(&self) -> &TweetKind {
        &self.kind
    }
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            TweetKind::Image { url } => Some(url),
            _ => None,
        }
    }
    pub fn quoted(&self) -> Option<&Arc<Tweet>> {
        match &self.kind {
            TweetKind::Quote { quoted } => Some(quoted),
            _ => None,
        }
    }
    /// An id can only be given once, by the store, when the tweet is published.
    pub fn assign_id(&mut self, id: TweetId) -> Result<()> {
        match self.id {
            Some(existing) => Err(TweeterError::Invariant(format!(
                "tweet already has id {existing}, refusing to reassign {id}"
            ))),
            None => {
                self.id = Some(id);
                Ok(())
            }
        }
    }
    /// Checks the publish rules in their fixed order: author, body, length.
    pub fn validate(&self) -> Result<()> {
        if self.author.is_empty() {
            return Err(TweeterError::EmptyAuthor);
        }
        if self.body.is_empty() {
            return Err(TweeterError::EmptyBody);
        }
        let length = self.body.chars().count();
        if length > MAX_BODY_CHARS {
            return Err(TweeterError::BodyTooLong { length });
        }
        Ok(())
    }
    pub fn render(&self) -> String {
        let own = format!("@{}: {}", self.author, self.body);
        match &self.kind {
            TweetKind::Text => own,
            TweetKind::Image { url } => format!("{own} - URL: {url}"),
            TweetKind::Quote { quoted } => format!("{own} - {}", quoted.render()),
        }
    }
}

impl fmt::Display for Tweet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_tweet_renders_author_and_body() {
        let tweet = Tweet::text("grupoesfera", "hi");
        assert_eq!(tweet.render(), "@grupoesfera: hi");
        assert_eq!(tweet.to_string(), "@grupoesfera: hi");
    }

    #[test]
    fn image_tweet_appends_url() {
        let tweet = Tweet::image("grupoesfera", "hi", "http://x");
        assert_eq!(tweet.render(), "@grupoesfera: hi - URL: http://x");
        assert_eq!(tweet.url(), Some("http://x"));
    }

    #[test]
    fn quote_of_a_quote_unwinds_fully() {
        let original = Arc::new(Tweet::image("nick", "look", "http://img"));
        let first = Arc::new(Tweet::quote("mery", "nice", Arc::clone(&original)));
        let second = Tweet::quote("grupoesfera", "agreed", first);
        assert_eq!(
            second.render(),
            "@grupoesfera: agreed - @mery: nice - @nick: look - URL: http://img"
        );
    }

    #[test]
    fn new_tweets_have_no_id_and_a_timestamp() {
        let before = Utc::now();
        let tweet = Tweet::text("", "");
        assert_eq!(tweet.id(), None);
        assert!(*tweet.timestamp() >= before);
        assert_eq!(tweet.kind().name(), "text");
    }

    #[test]
    fn id_is_assigned_only_once() {
        let mut tweet = Tweet::text("grupoesfera", "hi");
        tweet.assign_id(3).expect("first assignment");
        assert_eq!(tweet.id(), Some(3));
        let err = tweet.assign_id(4).unwrap_err();
        assert!(matches!(err, TweeterError::Invariant(_)));
        assert_eq!(tweet.id(), Some(3));
    }

    #[test]
    fn validation_order_is_author_then_body_then_length() {
        assert!(matches!(Tweet::text("", "").validate(), Err(TweeterError::EmptyAuthor)));
        assert!(matches!(Tweet::text("a", "").validate(), Err(TweeterError::EmptyBody)));
        let long = "x".repeat(MAX_BODY_CHARS + 1);
        assert!(matches!(
            Tweet::text("a", long).validate(),
            Err(TweeterError::BodyTooLong { length: 141 })
        ));
        assert!(Tweet::text("a", "x".repeat(MAX_BODY_CHARS)).validate().is_ok());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let body = "ñ".repeat(MAX_BODY_CHARS);
        assert!(body.len() > MAX_BODY_CHARS);
        assert!(Tweet::text("a", body).validate().is_ok());
    }
}
