use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Noted {
    text: String,
}

fn noted(text: &str) -> Event {
    Event::new(Noted {
        text: text.to_string(),
    })
}

#[tokio::test]
async fn test_offsets_not_reused_after_delete() {
    let store = InMemoryStoreProvider::new();
    let stream = Uuid::new_v4();

    store.write(&noted("a").with_stream(stream)).await.unwrap();
    store.write(&noted("b").with_stream(stream)).await.unwrap();
    assert_eq!(store.delete_by(stream).await.unwrap(), 2);
    assert!(store.is_empty().await);

    store.write(&noted("c")).await.unwrap();
    let events = store.read_from(0).await.unwrap().try_collect().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].offset, 3);
}

#[tokio::test]
async fn test_fail_on_write() {
    let store = InMemoryStoreProvider::new();
    store.set_fail_on_write(true).await;

    let result = store.write(&noted("x")).await;
    assert!(matches!(result, Err(StoreError::Broken(_))));
    assert!(store.is_empty().await);

    store.set_fail_on_write(false).await;
    store.write(&noted("x")).await.unwrap();
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_fail_on_read() {
    let store = InMemoryStoreProvider::new();
    store.write(&noted("x")).await.unwrap();
    store.set_fail_on_read(true).await;

    assert!(store.read_from(0).await.is_err());
    assert!(store.read_by(Uuid::new_v4()).await.is_err());
    assert!(store.stream_version(Uuid::new_v4()).await.is_err());
}

#[tokio::test]
async fn test_mismatch_leaves_log_unchanged() {
    let store = InMemoryStoreProvider::new();
    let stream = Uuid::new_v4();
    store.write(&noted("a").with_stream(stream)).await.unwrap();

    let result = store
        .write(&noted("b").with_stream(stream).with_expected_version(5))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::VersionMismatch {
            expected: 5,
            actual: 1
        })
    ));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_negative_skip_reads_whole_stream() {
    let store = InMemoryStoreProvider::new();
    let stream = Uuid::new_v4();
    store.write(&noted("a").with_stream(stream)).await.unwrap();
    store.write(&noted("b").with_stream(stream)).await.unwrap();

    let events = store
        .read_by_skip(stream, -3)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
}
