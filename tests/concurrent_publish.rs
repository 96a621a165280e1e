use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use tweeter::persist::{MemorySink, PersistenceSink};
use tweeter::store::TweetStore;
use tweeter::tweet::Tweet;

#[test]
fn concurrent_publishers_get_every_id_exactly_once() {
    let sink = Arc::new(MemorySink::new());
    let store = Arc::new(TweetStore::new(sink.clone()));
    let publishers = 8;
    let per_publisher = 50;
    let handles: Vec<_> = (0..publishers)
        .map(|p| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..per_publisher)
                    .map(|i| store.publish(Tweet::text(format!("user{p}"), format!("tweet {i}"))).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let ids: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    let total = (publishers * per_publisher) as u64;
    let unique: BTreeSet<u64> = ids.iter().copied().collect();
    assert_eq!(ids.len() as u64, total);
    assert_eq!(unique, (1..=total).collect::<BTreeSet<_>>());

    // the sequence, the index and the sink all agree on the order
    for (position, tweet) in store.get_all().iter().enumerate() {
        assert_eq!(tweet.id(), Some(position as u64 + 1));
    }
    for p in 0..publishers {
        let mine = store.get_by_user(&format!("user{p}"));
        assert_eq!(mine.len(), per_publisher);
        assert!(mine.windows(2).all(|w| w[0].id() < w[1].id()));
    }
    let saved: Vec<_> = sink.all().iter().map(|t| t.id().unwrap()).collect();
    assert_eq!(saved, (1..=total).collect::<Vec<_>>());
}
