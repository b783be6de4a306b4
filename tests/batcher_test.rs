//! Integration tests for the batching loop.
//!
//! Tests:
//! - Concurrent producers never see a batch above either limit
//! - Every submitted message is dispatched exactly once, in order per producer
//! - Dispatch failures do not stall the loop

mod common;

use common::{wait_for, RecordingDispatcher};
use futures::future::join_all;
use muxbatch::observability::tracing::init_test_tracing;
use muxbatch::{Batcher, BatcherConfig, BufferLimits, Envelope, FlushReason, Measured};
use std::collections::HashSet;
use std::time::Duration;

fn config(max_elements: usize, max_size_bytes: usize) -> BatcherConfig {
    BatcherConfig {
        limits: BufferLimits::new(max_elements, max_size_bytes).unwrap(),
        flush_interval: Duration::from_secs(3600),
        channel_size: 64,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_all_messages_dispatched() {
    init_test_tracing();
    let dispatcher = RecordingDispatcher::new();
    let (handle, task) = Batcher::spawn(config(8, 4_096), dispatcher.clone());

    let producers = (0..4).map(|p| {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..50 {
                let envelope = Envelope::new(format!("producer-{p}-message-{i}"))
                    .with_topic(format!("producer-{p}"));
                ids.push(envelope.correlation_id().to_string());
                handle.submit(envelope).await.unwrap();
            }
            ids
        })
    });
    let submitted: Vec<Vec<String>> = join_all(producers)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    handle.shutdown().await.unwrap();
    let stats = task.join().await.unwrap();
    assert_eq!(stats.messages, 200);
    assert_eq!(stats.dispatch_failures, 0);

    let batches = dispatcher.batches();
    assert_eq!(batches.len() as u64, stats.batches);

    let mut seen = HashSet::new();
    for (i, batch) in batches.iter().enumerate() {
        assert_eq!(batch.sequence, i as u64 + 1);
        assert!(batch.len() <= 8);
        assert_eq!(
            batch.size_bytes,
            batch.messages.iter().map(Measured::size_bytes).sum::<usize>()
        );
        for envelope in &batch.messages {
            assert!(seen.insert(envelope.correlation_id().to_string()));
        }
    }
    assert_eq!(seen.len(), 200);

    // Per-producer order survives batching.
    let dispatched: Vec<&Envelope> = batches.iter().flat_map(|b| b.messages.iter()).collect();
    for (p, ids) in submitted.iter().enumerate() {
        let topic = format!("producer-{p}");
        let order: Vec<&str> = dispatched
            .iter()
            .filter(|e| e.topic() == Some(topic.as_str()))
            .map(|e| e.correlation_id())
            .collect();
        assert_eq!(order, ids.iter().map(String::as_str).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_size_limit_shapes_batches() {
    // 30 byte messages against a 100 byte gate: four fit (0, 30, 60, 90 < 100).
    let dispatcher = RecordingDispatcher::new();
    let (handle, task) = Batcher::spawn(config(100, 100), dispatcher.clone());

    for _ in 0..10 {
        handle.submit(Envelope::new(vec![7u8; 30])).await.unwrap();
    }
    handle.shutdown().await.unwrap();
    let stats = task.join().await.unwrap();

    let sizes: Vec<usize> = dispatcher.batches().iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    assert_eq!(stats.rejections, 2);

    let reasons: Vec<FlushReason> = dispatcher.batches().iter().map(|b| b.reason).collect();
    assert_eq!(
        reasons,
        vec![FlushReason::Full, FlushReason::Full, FlushReason::Shutdown]
    );
}

#[tokio::test]
async fn test_dispatch_failure_does_not_stall_loop() {
    init_test_tracing();
    let dispatcher = RecordingDispatcher::failing_on(vec![1]);
    let (handle, task) = Batcher::spawn(config(2, 1_000), dispatcher.clone());

    for i in 0..5 {
        handle.submit(format!("m{i}")).await.unwrap();
    }
    handle.shutdown().await.unwrap();
    let stats = task.join().await.unwrap();

    assert_eq!(stats.dispatch_failures, 1);
    assert_eq!(stats.batches, 3);
    let contents: Vec<Vec<String>> = dispatcher
        .batches()
        .into_iter()
        .map(|b| b.messages)
        .collect();
    assert_eq!(
        contents,
        vec![
            vec!["m0".to_string(), "m1".to_string()],
            vec!["m2".to_string(), "m3".to_string()],
            vec!["m4".to_string()],
        ]
    );
}

#[tokio::test]
async fn test_interval_flush_with_real_clock() {
    let dispatcher = RecordingDispatcher::new();
    let config = BatcherConfig {
        flush_interval: Duration::from_millis(20),
        ..config(100, 10_000)
    };
    let (handle, task) = Batcher::spawn(config, dispatcher.clone());

    handle.submit(Envelope::new("lonely")).await.unwrap();

    let probe = dispatcher.clone();
    assert!(wait_for(Duration::from_secs(2), || probe.batch_count() == 1).await);
    assert_eq!(dispatcher.batches()[0].reason, FlushReason::Interval);

    handle.shutdown().await.unwrap();
    task.join().await.unwrap();
}
