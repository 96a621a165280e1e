use std::sync::Arc;

use tweeter::error::TweeterError;
use tweeter::persist::MemorySink;
use tweeter::store::TweetStore;
use tweeter::tweet::{Tweet, MAX_BODY_CHARS};

fn setup() -> TweetStore {
    TweetStore::new(Arc::new(MemorySink::new()))
}

#[test]
fn ids_follow_publish_order() {
    let store = setup();
    let bodies = ["first", "second", "third", "fourth"];
    for (i, body) in bodies.iter().enumerate() {
        let id = store.publish(Tweet::text("grupoesfera", *body)).expect("publish");
        assert_eq!(id, i as u64 + 1);
    }
    for (k, body) in (1..).zip(bodies.iter()) {
        let tweet = store.get_by_id(k).expect("published tweet");
        assert_eq!(tweet.body(), *body);
        assert_eq!(tweet.id(), Some(k));
    }
    assert_eq!(store.get_last().unwrap().body(), "fourth");
}

#[test]
fn tweet_without_user_is_not_published() {
    let store = setup();
    store.publish(Tweet::text("grupoesfera", "kept")).unwrap();
    let err = store.publish(Tweet::text("", "This is my first tweet")).unwrap_err();
    assert!(matches!(err, TweeterError::EmptyAuthor));
    assert_eq!(err.to_string(), "user is required");
    assert_eq!(store.len(), 1);
}

#[test]
fn tweet_without_text_is_not_published() {
    let store = setup();
    let err = store.publish(Tweet::text("grupoesfera", "")).unwrap_err();
    assert!(matches!(err, TweeterError::EmptyBody));
    assert!(store.is_empty());
}

#[test]
fn tweet_which_exceeds_140_characters_is_not_published() {
    let store = setup();
    let err = store
        .publish(Tweet::text("grupoesfera", "a".repeat(MAX_BODY_CHARS + 1)))
        .unwrap_err();
    assert!(matches!(err, TweeterError::BodyTooLong { length: 141 }));
    assert!(store.is_empty());
    let id = store.publish(Tweet::text("grupoesfera", "a".repeat(MAX_BODY_CHARS))).unwrap();
    assert_eq!(id, 1);
}

#[test]
fn empty_author_is_reported_before_empty_body() {
    let store = setup();
    let err = store.publish(Tweet::image("", "", "http://x")).unwrap_err();
    assert!(matches!(err, TweeterError::EmptyAuthor));
}

#[test]
fn tweets_by_user_keep_publish_order() {
    let store = setup();
    store.publish(Tweet::text("grupoesfera", "one")).unwrap();
    store.publish(Tweet::text("nick", "two")).unwrap();
    store.publish(Tweet::image("grupoesfera", "three", "http://x")).unwrap();
    let mine = store.get_by_user("grupoesfera");
    let bodies: Vec<_> = mine.iter().map(|t| t.body()).collect();
    assert_eq!(bodies, vec!["one", "three"]);
    let ids: Vec<_> = mine.iter().map(|t| t.id().unwrap()).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(store.count_by_user("grupoesfera"), 2);
    assert_eq!(store.count_by_user("nick"), 1);
}

#[test]
fn unknown_user_has_no_tweets() {
    let store = setup();
    store.publish(Tweet::text("grupoesfera", "one")).unwrap();
    assert!(store.get_by_user("nobody").is_empty());
    assert_eq!(store.count_by_user("nobody"), 0);
}

#[test]
fn quote_shares_the_published_tweet() {
    let store = setup();
    store.publish(Tweet::text("nick", "original")).unwrap();
    let quoted = store.get_by_id(1).unwrap();
    let id = store.publish(Tweet::quote("grupoesfera", "so true", Arc::clone(&quoted))).unwrap();
    let quote = store.get_by_id(id).unwrap();
    assert_eq!(quote.render(), "@grupoesfera: so true - @nick: original");
    assert!(Arc::ptr_eq(quote.quoted().unwrap(), &quoted));
    assert_eq!(quoted.id(), Some(1));
}

#[test]
fn all_tweets_is_a_snapshot() {
    let store = setup();
    store.publish(Tweet::text("grupoesfera", "one")).unwrap();
    let before = store.get_all();
    store.publish(Tweet::text("grupoesfera", "two")).unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(store.get_all().len(), 2);
}

#[test]
fn quote_of_an_unpublished_tweet_is_rejected() {
    let store = setup();
    store.publish(Tweet::text("nick", "original")).unwrap();
    let unpublished = Arc::new(Tweet::text("nick", "never sent"));
    let err = store
        .publish(Tweet::quote("grupoesfera", "so true", unpublished))
        .unwrap_err();
    assert!(matches!(err, TweeterError::Invariant(_)));
    assert_eq!(store.len(), 1);
    assert_eq!(store.count_by_user("grupoesfera"), 0);
    assert_eq!(store.publish(Tweet::text("grupoesfera", "next")).unwrap(), 2);
}

#[test]
fn quote_of_a_tweet_from_another_store_is_not_found() {
    let store = setup();
    let elsewhere = setup();
    elsewhere.publish(Tweet::text("nick", "one")).unwrap();
    elsewhere.publish(Tweet::text("nick", "two")).unwrap();
    let foreign = elsewhere.get_by_id(2).unwrap();
    let err = store
        .publish(Tweet::quote("grupoesfera", "so true", foreign))
        .unwrap_err();
    assert!(matches!(err, TweeterError::NotFound(2)));
    assert!(store.is_empty());
}
