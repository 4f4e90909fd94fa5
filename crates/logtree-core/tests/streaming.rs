//! Live streaming tests
//!
//! Backlog/stream handover, filter parity, overflow accounting and
//! cancellation.

use std::time::Duration;

use logtree_core::{Backlog, LogTree, ReadOption, Severity};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_backlog_then_stream() {
    let tree = LogTree::new();
    let logger = tree.leveled_for("s").unwrap();
    logger.info("one");
    logger.info("two");

    let mut reader = tree
        .read(
            "s",
            &[ReadOption::WithBacklog(Backlog::Count(1)), ReadOption::WithStream],
        )
        .unwrap();
    assert_eq!(reader.backlog.len(), 1);
    assert_eq!(reader.backlog[0].message(), "two");

    logger.info("three");
    let entry = timeout(RECV_TIMEOUT, reader.recv()).await.unwrap().unwrap();
    assert_eq!(entry.message(), "three");
    assert_eq!(reader.missed(), 0);
}

#[tokio::test]
async fn test_stream_applies_same_filters() {
    let tree = LogTree::new();
    let mut reader = tree
        .read(
            "app",
            &[
                ReadOption::WithChildren,
                ReadOption::WithStream,
                ReadOption::LeveledWithMinimumSeverity(Severity::Error),
            ],
        )
        .unwrap();

    tree.leveled_for("app.db").unwrap().info("skipped");
    tree.leveled_for("other").unwrap().error("elsewhere");
    tree.leveled_for("app.db").unwrap().error("delivered");

    let entry = timeout(RECV_TIMEOUT, reader.recv()).await.unwrap().unwrap();
    assert_eq!(entry.dn.as_str(), "app.db");
    assert_eq!(entry.message(), "delivered");
    assert!(reader.try_recv().is_none());
}

#[tokio::test]
async fn test_slow_reader_counts_missed() {
    let tree = LogTree::new();
    let logger = tree.leveled_for("flood").unwrap();
    let mut reader = tree
        .read("flood", &[ReadOption::WithStream, ReadOption::StreamBuffer(4)])
        .unwrap();

    for i in 0..10 {
        logger.info(i);
    }
    assert_eq!(reader.missed(), 6);

    let mut got = Vec::new();
    while let Some(entry) = reader.try_recv() {
        got.push(entry.message());
    }
    assert_eq!(got, vec!["0", "1", "2", "3"]);

    logger.info("10");
    assert_eq!(reader.try_recv().unwrap().message(), "10");
    assert_eq!(reader.missed(), 6);
}

#[tokio::test]
async fn test_close_ends_stream() {
    let tree = LogTree::new();
    let mut reader = tree.read("c", &[ReadOption::WithStream]).unwrap();
    reader.close();
    let next = timeout(RECV_TIMEOUT, reader.recv()).await.unwrap();
    assert!(next.is_none());

    tree.leveled_for("c").unwrap().info("after close");
    assert_eq!(tree.stats().subscribers, 0);
}

#[tokio::test]
async fn test_recv_without_stream() {
    let tree = LogTree::new();
    let mut reader = tree
        .read("c", &[ReadOption::WithBacklog(Backlog::All)])
        .unwrap();
    assert!(!reader.has_stream());
    assert!(reader.recv().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_gap_no_duplicate_under_concurrency() {
    const PER_PRODUCER: usize = 500;
    let tree = LogTree::new();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let logger = tree.leveled_for(format!("load.p{p}")).unwrap();
            tokio::task::spawn_blocking(move || {
                for i in 0..PER_PRODUCER {
                    logger.info(format_args!("{p}-{i}"));
                }
            })
        })
        .collect();

    // Attach while producers are running.
    tokio::task::yield_now().await;
    let mut reader = tree
        .read(
            "load",
            &[
                ReadOption::WithChildren,
                ReadOption::WithBacklog(Backlog::All),
                ReadOption::WithStream,
                ReadOption::StreamBuffer(4 * PER_PRODUCER),
            ],
        )
        .unwrap();

    for producer in producers {
        producer.await.unwrap();
    }

    let mut seen: Vec<String> = reader.backlog.iter().map(|e| e.message()).collect();
    while let Some(entry) = reader.try_recv() {
        seen.push(entry.message());
    }
    assert_eq!(reader.missed(), 0);
    assert_eq!(seen.len(), 4 * PER_PRODUCER);

    // Per producer, messages arrive exactly once and in order.
    for p in 0..4 {
        let mine: Vec<&String> = seen
            .iter()
            .filter(|m| m.starts_with(&format!("{p}-")))
            .collect();
        let want: Vec<String> = (0..PER_PRODUCER).map(|i| format!("{p}-{i}")).collect();
        assert_eq!(mine.len(), PER_PRODUCER);
        for (got, want) in mine.iter().zip(want.iter()) {
            assert_eq!(*got, want);
        }
    }
}

#[test]
fn test_blocking_recv_from_thread() {
    let tree = LogTree::new();
    let mut reader = tree.read("b", &[ReadOption::WithStream]).unwrap();
    let logger = tree.leveled_for("b").unwrap();
    let consumer = std::thread::spawn(move || reader.blocking_recv().map(|e| e.message()));
    logger.info("ping");
    assert_eq!(consumer.join().unwrap().as_deref(), Some("ping"));
}
