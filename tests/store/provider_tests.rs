//! StoreProvider interface tests.
//!
//! These tests verify the contract of the StoreProvider trait. Every test
//! works on fresh stream ids and on offsets above the log's current tail, so
//! the functions can share one store.

use futures::future::join_all;
use futures::StreamExt;
use uuid::Uuid;

use evstore::storage::{StoreError, StoreProvider};
use evstore::{Event, RecordedEvent, NO_VERSION_CHECK};

use super::{Audit, Moved, Opened};

pub fn opened(owner: &str) -> Event {
    Event::new(Opened {
        owner: owner.to_string(),
    })
}

pub fn moved(cents: i64) -> Event {
    Event::new(Moved { cents, memo: None })
}

/// Highest offset currently in the store, 0 when empty.
pub async fn tail<S: StoreProvider + ?Sized>(store: &S) -> i64 {
    let events = collect(store.read_from(0).await.expect("read_from should succeed")).await;
    events.last().map(|e| e.offset).unwrap_or(0)
}

pub async fn collect(stream: evstore::EventStream) -> Vec<RecordedEvent> {
    stream
        .try_collect()
        .await
        .expect("stream should yield events")
}

async fn read_stream<S: StoreProvider + ?Sized>(store: &S, stream: Uuid) -> Vec<RecordedEvent> {
    collect(store.read_by(stream).await.expect("read_by should succeed")).await
}

// =============================================================================
// write
// =============================================================================

pub async fn test_write_without_stream<S: StoreProvider + ?Sized>(store: &S) {
    let before = tail(store).await;

    store
        .write(&opened("nobody"))
        .await
        .expect("write should succeed");

    let events = collect(store.read_from(before).await.unwrap()).await;
    assert_eq!(events.len(), 1, "should have 1 new event");
    assert_eq!(events[0].event, opened("nobody"));
    assert_eq!(events[0].event.stream_id(), None);
    assert!(events[0].offset > before);
}

pub async fn test_unchecked_writes_never_conflict<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();

    for cents in 0..5 {
        store
            .write(&moved(cents).with_stream(stream).with_expected_version(NO_VERSION_CHECK))
            .await
            .expect("unchecked write should succeed");
    }

    assert_eq!(store.stream_version(stream).await.unwrap(), 5);
}

pub async fn test_write_with_current_version<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();

    for version in 0..3 {
        assert_eq!(store.stream_version(stream).await.unwrap(), version);
        store
            .write(&moved(version).with_stream(stream).with_expected_version(version))
            .await
            .expect("write at current version should succeed");
    }

    assert_eq!(store.stream_version(stream).await.unwrap(), 3);
}

pub async fn test_write_version_mismatch<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();

    store
        .write(&opened("a").with_stream(stream))
        .await
        .unwrap();
    store
        .write(&moved(10).with_stream(stream).with_expected_version(1))
        .await
        .expect("write at version 1 should succeed");
    assert_eq!(store.stream_version(stream).await.unwrap(), 2);

    for stale in [0, 1, 3, 100] {
        let result = store
            .write(&moved(20).with_stream(stream).with_expected_version(stale))
            .await;
        match result {
            Err(StoreError::VersionMismatch { expected, actual }) => {
                assert_eq!(expected, stale);
                assert_eq!(actual, 2);
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }

    let events = read_stream(store, stream).await;
    assert_eq!(events.len(), 2, "rejected writes must leave the stream unchanged");
}

pub async fn test_first_write_with_version_zero<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();

    store
        .write(&opened("new").with_stream(stream).with_expected_version(0))
        .await
        .expect("first write at version 0 should succeed");

    let result = store
        .write(&opened("dup").with_stream(stream).with_expected_version(0))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::VersionMismatch {
            expected: 0,
            actual: 1
        })
    ));
}

pub async fn test_concurrent_writers_one_wins<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();
    store
        .write(&opened("race").with_stream(stream))
        .await
        .unwrap();

    let events: Vec<Event> = (0..8)
        .map(|i| moved(i).with_stream(stream).with_expected_version(1))
        .collect();
    let results = join_all(events.iter().map(|e| store.write(e))).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one writer at version 1 should win");
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(
                result,
                Err(StoreError::VersionMismatch {
                    expected: 1,
                    actual: 2
                })
            ),
            "losers should see a conflict, got {result:?}"
        );
    }
    assert_eq!(store.stream_version(stream).await.unwrap(), 2);
}

pub async fn test_preserves_event_data<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();
    let checker = Uuid::new_v4();
    let written = vec![
        Event::new(Moved {
            cents: -4200,
            memo: Some("refund \"quoted\" \u{1f4b8}".to_string()),
        })
        .with_stream(stream)
        .with_expected_version(0),
        Event::new(Audit::Checked { by: checker }).with_stream(stream),
        Event::new(Audit::Flagged(String::new())).with_stream(stream),
    ];

    for event in &written {
        store.write(event).await.expect("write should succeed");
    }

    let read: Vec<Event> = read_stream(store, stream)
        .await
        .into_iter()
        .map(|r| r.event)
        .collect();
    assert_eq!(read, written);
    assert_eq!(
        read[1].payload_as::<Audit>(),
        Some(&Audit::Checked { by: checker })
    );
}

// =============================================================================
// read_from
// =============================================================================

pub async fn test_read_from_is_exclusive_and_ordered<S: StoreProvider + ?Sized>(store: &S) {
    let before = tail(store).await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    store.write(&moved(1).with_stream(a)).await.unwrap();
    store.write(&moved(2).with_stream(b)).await.unwrap();
    store.write(&moved(3)).await.unwrap();
    store.write(&moved(4).with_stream(a)).await.unwrap();

    let events = collect(store.read_from(before).await.unwrap()).await;
    assert_eq!(events.len(), 4);
    assert!(events.windows(2).all(|w| w[0].offset < w[1].offset));
    let cents: Vec<i64> = events
        .iter()
        .map(|e| e.event.payload_as::<Moved>().unwrap().cents)
        .collect();
    assert_eq!(cents, vec![1, 2, 3, 4]);

    let second = events[1].offset;
    let rest = collect(store.read_from(second).await.unwrap()).await;
    assert_eq!(rest.len(), 2);
    assert!(rest.iter().all(|e| e.offset > second));

    let last = events[3].offset;
    let none = collect(store.read_from(last).await.unwrap()).await;
    assert!(none.is_empty());
}

pub async fn test_read_from_negative_offset_reads_everything<S: StoreProvider + ?Sized>(store: &S) {
    store.write(&moved(1)).await.unwrap();

    let from_zero = collect(store.read_from(0).await.unwrap()).await;
    let from_negative = collect(store.read_from(-10).await.unwrap()).await;
    assert_eq!(from_zero.len(), from_negative.len());
}

// =============================================================================
// read_by
// =============================================================================

pub async fn test_read_by_insertion_order<S: StoreProvider + ?Sized>(store: &S) {
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    for cents in 0..4 {
        store.write(&moved(cents).with_stream(a)).await.unwrap();
        store.write(&moved(100 + cents).with_stream(b)).await.unwrap();
    }

    let events = read_stream(store, a).await;
    let cents: Vec<i64> = events
        .iter()
        .map(|e| e.event.payload_as::<Moved>().unwrap().cents)
        .collect();
    assert_eq!(cents, vec![0, 1, 2, 3]);
    assert!(events.iter().all(|e| e.event.stream_id() == Some(a)));
    assert!(events.windows(2).all(|w| w[0].offset < w[1].offset));
}

pub async fn test_read_by_unknown_stream_is_empty<S: StoreProvider + ?Sized>(store: &S) {
    let events = read_stream(store, Uuid::new_v4()).await;
    assert!(events.is_empty());
}

pub async fn test_read_by_skip<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();
    for cents in 0..5 {
        store.write(&moved(cents).with_stream(stream)).await.unwrap();
    }

    let tail_events = collect(store.read_by_skip(stream, 3).await.unwrap()).await;
    let cents: Vec<i64> = tail_events
        .iter()
        .map(|e| e.event.payload_as::<Moved>().unwrap().cents)
        .collect();
    assert_eq!(cents, vec![3, 4]);

    let all = collect(store.read_by_skip(stream, 0).await.unwrap()).await;
    assert_eq!(all.len(), 5);

    let past_end = collect(store.read_by_skip(stream, 10).await.unwrap()).await;
    assert!(past_end.is_empty());
}

pub async fn test_read_is_lazy_and_closable<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();
    for cents in 0..10 {
        store.write(&moved(cents).with_stream(stream)).await.unwrap();
    }

    let mut events = store.read_by(stream).await.unwrap();
    let first = events.next().await.expect("stream should not be empty").unwrap();
    assert_eq!(first.event.payload_as::<Moved>().unwrap().cents, 0);
    events.close().await;

    // Dropped mid-way without close.
    let mut events = store.read_by(stream).await.unwrap();
    let _ = events.next().await;
    drop(events);

    // Abandoned streams must not pin connections.
    for _ in 0..20 {
        let mut events = store.read_by(stream).await.unwrap();
        let _ = events.next().await;
    }

    assert_eq!(read_stream(store, stream).await.len(), 10);
}

// =============================================================================
// delete_by
// =============================================================================

pub async fn test_delete_by_removes_only_that_stream<S: StoreProvider + ?Sized>(store: &S) {
    let (doomed, kept) = (Uuid::new_v4(), Uuid::new_v4());
    for cents in 0..3 {
        store.write(&moved(cents).with_stream(doomed)).await.unwrap();
    }
    store.write(&moved(9).with_stream(kept)).await.unwrap();

    assert_eq!(store.delete_by(doomed).await.unwrap(), 3);

    assert!(read_stream(store, doomed).await.is_empty());
    assert_eq!(store.stream_version(doomed).await.unwrap(), 0);
    assert_eq!(read_stream(store, kept).await.len(), 1);

    assert_eq!(store.delete_by(doomed).await.unwrap(), 0);
}

pub async fn test_stream_restarts_after_delete<S: StoreProvider + ?Sized>(store: &S) {
    let stream = Uuid::new_v4();
    store.write(&opened("a").with_stream(stream)).await.unwrap();
    store.delete_by(stream).await.unwrap();

    store
        .write(&opened("b").with_stream(stream).with_expected_version(0))
        .await
        .expect("deleted stream should start again at version 0");

    let events = read_stream(store, stream).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.payload_as::<Opened>().unwrap().owner, "b");
}

// =============================================================================
// Scenario
// =============================================================================

pub async fn test_conflict_scenario<S: StoreProvider + ?Sized>(store: &S) {
    let a = Uuid::new_v4();

    store
        .write(&opened("e1").with_stream(a).with_expected_version(NO_VERSION_CHECK))
        .await
        .expect("E1 should succeed");
    store
        .write(&moved(2).with_stream(a).with_expected_version(1))
        .await
        .expect("E2 should succeed");
    assert_eq!(store.stream_version(a).await.unwrap(), 2);

    let result = store
        .write(&moved(3).with_stream(a).with_expected_version(0))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::VersionMismatch {
            expected: 0,
            actual: 2
        })
    ));
}

/// Run all StoreProvider contract tests against a store.
#[macro_export]
macro_rules! run_store_provider_tests {
    ($store:expr) => {
        use $crate::store::provider_tests::*;

        // write tests
        test_write_without_stream($store).await;
        println!("  test_write_without_stream: PASSED");

        test_unchecked_writes_never_conflict($store).await;
        println!("  test_unchecked_writes_never_conflict: PASSED");

        test_write_with_current_version($store).await;
        println!("  test_write_with_current_version: PASSED");

        test_write_version_mismatch($store).await;
        println!("  test_write_version_mismatch: PASSED");

        test_first_write_with_version_zero($store).await;
        println!("  test_first_write_with_version_zero: PASSED");

        test_concurrent_writers_one_wins($store).await;
        println!("  test_concurrent_writers_one_wins: PASSED");

        test_preserves_event_data($store).await;
        println!("  test_preserves_event_data: PASSED");

        // read_from tests
        test_read_from_is_exclusive_and_ordered($store).await;
        println!("  test_read_from_is_exclusive_and_ordered: PASSED");

        test_read_from_negative_offset_reads_everything($store).await;
        println!("  test_read_from_negative_offset_reads_everything: PASSED");

        // read_by tests
        test_read_by_insertion_order($store).await;
        println!("  test_read_by_insertion_order: PASSED");

        test_read_by_unknown_stream_is_empty($store).await;
        println!("  test_read_by_unknown_stream_is_empty: PASSED");

        test_read_by_skip($store).await;
        println!("  test_read_by_skip: PASSED");

        test_read_is_lazy_and_closable($store).await;
        println!("  test_read_is_lazy_and_closable: PASSED");

        // delete_by tests
        test_delete_by_removes_only_that_stream($store).await;
        println!("  test_delete_by_removes_only_that_stream: PASSED");

        test_stream_restarts_after_delete($store).await;
        println!("  test_stream_restarts_after_delete: PASSED");

        // scenario
        test_conflict_scenario($store).await;
        println!("  test_conflict_scenario: PASSED");
    };
}
