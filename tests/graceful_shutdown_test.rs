//! Integration tests for graceful shutdown
//!
//! These tests verify that:
//! - The shutdown signal reaches every receiver
//! - A signal before the run starts leaves no run record behind
//! - A signal during the export still records a terminal `Failed` status
//! - Local chunk files are released when an export is interrupted

mod common;

use common::*;
use harbor::domain::run::RunStatus;
use harbor::domain::ErrorKind;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

#[tokio::test]
async fn test_signal_before_start_creates_no_run() {
    let h = HarnessBuilder::new(FakeSource::with_rows(event_rows(5))).build();
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let driver = h.driver.with_cancellation(rx);
    let err = driver.run(inputs()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(h.store.all_runs().is_empty());
    assert!(h.source.streams_opened().is_empty());
    assert!(h.audit.event_types().is_empty());
}

#[tokio::test]
async fn test_dropped_sender_does_not_cancel() {
    let h = HarnessBuilder::new(FakeSource::with_rows(event_rows(5))).build();
    let (tx, rx) = watch::channel(false);
    drop(tx);

    let driver = h.driver.with_cancellation(rx);
    let outcome = driver.run(inputs()).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(h.store.only_run().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_interrupted_export_is_recorded_and_cleaned_up() {
    let chunks = TempDir::new().unwrap();
    let mut options = export_options(1024);
    options.staging_dir = Some(chunks.path().to_path_buf());

    let source = FakeSource::with_rows(event_rows(40)).slow(Duration::from_millis(50));
    let h = HarnessBuilder::new(source).options(options).build();

    let (tx, rx) = watch::channel(false);
    let driver = h.driver.with_cancellation(rx);

    let signal = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        tx.send(true).unwrap();
        tx
    });

    let err = driver.run(inputs()).await.unwrap_err();
    let _tx = signal.await.unwrap();

    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let run = h.store.only_run();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .latest_error
        .as_deref()
        .unwrap()
        .contains("insert_into_destination"));

    // Some chunks made it to staging, but nothing was loaded
    assert!(!h.destination.staged_files().is_empty());
    assert!(h.destination.loads().is_empty());
    assert_eq!(std::fs::read_dir(chunks.path()).unwrap().count(), 0);

    assert_eq!(
        h.audit.event_types().last().map(String::as_str),
        Some("run_failed")
    );
}

#[tokio::test]
async fn test_signal_during_run_creation_still_finalizes_run() {
    let h = HarnessBuilder::new(FakeSource::with_rows(event_rows(5)))
        .store(MemoryRunStore::slow_inserts(Duration::from_millis(300)))
        .build();

    let (tx, rx) = watch::channel(false);
    let driver = h.driver.with_cancellation(rx);

    let signal = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tx
    });

    let err = driver.run(inputs()).await.unwrap_err();
    let _tx = signal.await.unwrap();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    // The record written before the signal still gets its terminal status
    let run = h.store.only_run();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.latest_error.as_deref().unwrap().starts_with("Cancelled"));
    assert_eq!(
        h.store.history(&run.id),
        vec![RunStatus::Starting, RunStatus::Failed]
    );
    assert!(h.source.streams_opened().is_empty());
}
