#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use missive::Missive;
use missive_common::Signal;
use missive_spool::MessageRecord;
use tokio::sync::broadcast;

fn notification(subject: &str) -> MessageRecord {
    MessageRecord::new("noreply@example.com", "user@example.com")
        .plugin_id("NewUserPlugin")
        .subject(subject)
        .body("<p>Welcome</p>")
}

fn memory_config(queue: &str) -> Missive {
    ron::from_str(&format!(
        "Missive(queue: {queue}, spool: Memory(capacity: None), transport: Log)"
    ))
    .expect("valid config")
}

#[test]
fn test_sample_config_parses() {
    let config = include_str!("../../missive.config.ron");
    let _: Missive = ron::from_str(config).expect("sample config parses");
}

#[test]
fn test_sections_are_optional() {
    let _: Missive = ron::from_str("Missive(spool: Memory(capacity: Some(10)))").unwrap();
}

#[tokio::test]
async fn test_build_wires_the_queue() {
    let service = memory_config("(number_of_mail_per_batch: 2)")
        .build()
        .await
        .unwrap();

    for i in 0..3 {
        assert!(service.engine.enqueue(notification(&format!("#{i}"))).await);
    }
    assert_eq!(service.control.current_capacity(), 3);
    assert_eq!(service.control.mails_per_send(), Some(2));
    assert!(service.statistics.is_none());

    let first = service.scheduler.drain().await;
    assert_eq!(first.removed, 2);

    let second = service.scheduler.drain().await;
    assert_eq!(second.removed, 1);
    assert_eq!(service.control.current_capacity(), 0);
}

#[tokio::test]
async fn test_disabled_delivery_discards() {
    let service = memory_config("(enabled: false, statistics: true)")
        .build()
        .await
        .unwrap();

    assert!(service.engine.enqueue(notification("dropped")).await);
    service.scheduler.drain().await;

    assert_eq!(service.control.discarded(), 1);
    let statistics = service.statistics.as_ref().expect("statistics enabled");
    assert_eq!(statistics.get("NewUserPlugin").polled, 1);
}

#[tokio::test]
async fn test_capacity_counts_spooled_records_on_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!(
        r#"Missive(spool: File(path: "{}"), transport: Log)"#,
        dir.path().display()
    );

    let service = ron::from_str::<Missive>(&config)
        .unwrap()
        .build()
        .await
        .unwrap();
    assert!(service.engine.enqueue(notification("a")).await);
    assert!(service.engine.enqueue(notification("b")).await);
    drop(service);

    let restarted = ron::from_str::<Missive>(&config)
        .unwrap()
        .build()
        .await
        .unwrap();
    assert_eq!(restarted.control.current_capacity(), 2);

    let report = restarted.scheduler.drain().await;
    assert_eq!(report.removed, 2);
    assert_eq!(restarted.control.current_capacity(), 0);
}

#[tokio::test]
async fn test_build_rejects_system_spool_directory() {
    let config: Missive =
        ron::from_str(r#"Missive(spool: File(path: "/etc/missive"), transport: Log)"#).unwrap();

    assert!(config.build().await.is_err());
}

#[tokio::test]
async fn test_service_stops_on_shutdown() {
    let service = memory_config("(period_secs: 1)").build().await.unwrap();
    let (shutdown, receiver) = broadcast::channel(4);

    let serve = service.serve(receiver);
    tokio::pin!(serve);

    tokio::select! {
        () = &mut serve => panic!("Scheduler stopped without a signal"),
        () = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    shutdown.send(Signal::Shutdown).unwrap();
    tokio::time::timeout(Duration::from_secs(2), serve)
        .await
        .expect("Scheduler did not stop");
}
