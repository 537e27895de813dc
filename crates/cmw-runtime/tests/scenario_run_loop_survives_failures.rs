//! The run loop keeps going through failures and stops on shutdown.
//!
//! GREEN when:
//! - A failed cycle is logged and does not end the loop.
//! - Shutdown stops the loop between cycles.
//! - Shutdown also interrupts a cycle stuck in retry backoff.

mod common;

use common::*;
use std::time::Duration;

#[tokio::test]
async fn failing_cycle_then_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let src = ScriptedSource::new(vec![]);
    let mut p = poller(dir.path(), src.clone(), 1, breaker());

    // Shutdown is already signalled: exactly one cycle runs, and its failure
    // does not escape the loop.
    p.run(async {}).await;
    assert_eq!(src.calls(), 1);
}

#[tokio::test]
async fn successful_cycles_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let src = ScriptedSource::new(vec![Ok(status(10_000, 5_000, vec![down(507.0, 0, 0)]))]);
    let mut p = poller(dir.path(), src.clone(), 1, breaker());

    let stop = tokio::time::sleep(Duration::from_millis(50));
    p.run(stop).await;

    assert_eq!(src.calls(), 1);
    assert!(p.state().is_some());
}

#[tokio::test]
async fn shutdown_interrupts_retry_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let src = ScriptedSource::new(vec![]);
    let settings = settings_with_backoff(5, Duration::from_secs(60));
    let mut p = poller_with(dir.path(), src.clone(), settings, breaker());

    let stop = tokio::time::sleep(Duration::from_millis(50));
    tokio::time::timeout(Duration::from_secs(5), p.run(stop))
        .await
        .expect("shutdown must not wait for the retry backoff");

    assert_eq!(src.calls(), 1);
    assert!(p.state().is_none());
    assert_eq!(p.breaker().consecutive_failures(), 0);
}
