#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use missive_common::Signal;
use missive_queue::{
    DeliveryControl, Dispatcher, QueueEngine, QueueScheduler, RecordingTransport, Schedule,
};
use missive_spool::{MessageRecord, TestBackingStore};
use tokio::sync::broadcast;

struct Harness {
    store: TestBackingStore,
    transport: RecordingTransport,
    control: Arc<DeliveryControl>,
    scheduler: Arc<QueueScheduler>,
}

fn harness(limit: usize, interval: Duration) -> Harness {
    let store = TestBackingStore::new();
    let transport = RecordingTransport::new();
    let control = Arc::new(DeliveryControl::default());
    let dispatcher = Dispatcher::new(
        Arc::new(transport.clone()),
        Arc::clone(&control),
        Duration::from_secs(2),
    );
    let engine =
        QueueEngine::builder(Arc::new(store.clone()), dispatcher, control.clone()).build();
    let scheduler = QueueScheduler::new(
        Arc::new(engine),
        Schedule::new(limit, interval).expect("non-zero schedule"),
    );
    control.register_schedule(scheduler.handle());

    Harness {
        store,
        transport,
        control,
        scheduler: Arc::new(scheduler),
    }
}

async fn enqueue(harness: &Harness, count: usize) {
    for i in 0..count {
        assert!(
            harness
                .scheduler
                .engine()
                .enqueue(
                    MessageRecord::new("noreply@example.com", "user@example.com")
                        .subject(format!("#{i}"))
                )
                .await
        );
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Condition not met in time");
}

async fn wait_for_sent(harness: &Harness, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.transport.sent_count().await < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Notifications not sent in time");
}

fn serve(
    harness: &Harness,
) -> (
    broadcast::Sender<Signal>,
    tokio::task::JoinHandle<()>,
) {
    let (shutdown, receiver) = broadcast::channel(4);
    let scheduler = Arc::clone(&harness.scheduler);
    let task = tokio::spawn(async move { scheduler.serve(receiver).await });
    (shutdown, task)
}

#[tokio::test]
async fn test_scheduler_drains_periodically() {
    let harness = harness(20, Duration::from_millis(50));
    enqueue(&harness, 3).await;

    let (shutdown, task) = serve(&harness);

    wait_for_sent(&harness, 3).await;
    assert_eq!(harness.store.record_count(), 0);

    enqueue(&harness, 2).await;
    wait_for_sent(&harness, 5).await;

    shutdown.send(Signal::Shutdown).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_first_cycle_waits_one_interval() {
    let harness = harness(20, Duration::from_secs(3600));
    enqueue(&harness, 1).await;

    let (shutdown, task) = serve(&harness);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(harness.store.load_calls(), 0);

    shutdown.send(Signal::Shutdown).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_configure_rebuilds_the_schedule() {
    let harness = harness(2, Duration::from_secs(3600));
    enqueue(&harness, 5).await;

    let (shutdown, task) = serve(&harness);

    assert!(harness.scheduler.configure(5, Duration::from_millis(50)));
    wait_for_sent(&harness, 5).await;

    assert_eq!(harness.scheduler.engine().limit(), 5);
    assert_eq!(harness.control.mails_per_send(), Some(5));

    shutdown.send(Signal::Shutdown).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_zero_interval_is_ignored() {
    let harness = harness(20, Duration::from_secs(60));

    assert!(!harness.scheduler.configure(100, Duration::ZERO));
    assert_eq!(harness.control.mails_per_send(), Some(20));
    assert_eq!(harness.control.interval_secs(), Some(60));
}

#[tokio::test]
async fn test_reset_default_schedule_restores_configuration() {
    let harness = harness(20, Duration::from_secs(60));
    let (shutdown, task) = serve(&harness);

    assert!(harness.scheduler.configure(3, Duration::from_secs(5)));
    eventually(|| harness.scheduler.engine().limit() == 3).await;

    assert!(harness.control.reset_default_schedule());
    eventually(|| harness.scheduler.engine().limit() == 20).await;
    assert_eq!(harness.control.interval_secs(), Some(60));

    shutdown.send(Signal::Shutdown).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_cycle_finish() {
    let harness = harness(20, Duration::from_millis(20));
    enqueue(&harness, 1).await;
    harness.transport.delay(Duration::from_millis(300)).await;

    let (shutdown, task) = serve(&harness);

    eventually(|| harness.store.load_calls() > 0).await;
    shutdown.send(Signal::Shutdown).unwrap();
    task.await.unwrap();

    assert_eq!(harness.transport.sent_count().await, 1);
    assert_eq!(harness.store.record_count(), 0);
    assert_eq!(harness.store.overlapping_cycles(), 0);
}

#[tokio::test]
async fn test_manual_drain() {
    let harness = harness(20, Duration::from_secs(3600));
    enqueue(&harness, 4).await;

    let report = harness.scheduler.drain().await;

    assert_eq!(report.removed, 4);
    assert_eq!(harness.control.current_capacity(), 0);
}
