//! Concurrency guarantees and the timer-driven lifecycle.

mod support;

use std::fs;
use std::time::Duration;

use anyhow::Result;
use support::{FakeManager, FakeRegistry, init_tracing, scanner};
use tempfile::TempDir;
use tokio::time::sleep;

/// Poll until `check` passes or the deadline expires.
async fn wait_for(mut check: impl FnMut() -> bool, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(25)).await;
    }
    check()
}

#[tokio::test]
async fn concurrent_scan_calls_never_overlap() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    fs::write(dir.path().join("app.war"), b"bytes")?;

    let registry = FakeRegistry::new();
    let manager = FakeManager::new();
    manager.set_execute_delay(Duration::from_millis(200));
    let scanner = scanner(dir.path(), |_| {}, &registry, &manager);

    let first = {
        let scanner = scanner.clone();
        tokio::spawn(async move { scanner.scan().await })
    };
    let second = {
        let scanner = scanner.clone();
        tokio::spawn(async move { scanner.scan().await })
    };

    let (first, second) = (first.await?, second.await?);

    // Both cycles ran to completion, strictly one after the other.
    assert_eq!(manager.max_concurrent_executions(), 1);
    let staged: Vec<usize> = [&first, &second]
        .iter()
        .map(|stats| stats.as_ref().expect("cycle should run").staged)
        .collect();
    // Whichever cycle went first did the work; the loser saw the
    // committed state and built an empty plan.
    assert_eq!(staged.iter().sum::<usize>(), 1);
    assert_eq!(manager.plans().len(), 1);
    assert!(scanner.deployed().contains("app.war"));
    Ok(())
}

#[tokio::test]
async fn started_scanner_picks_up_dropped_content() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;

    let registry = FakeRegistry::new();
    let manager = FakeManager::new();
    let scanner = scanner(
        dir.path(),
        |config| config.scan_interval_ms = 50,
        &registry,
        &manager,
    );
    scanner.start().await?;

    fs::write(dir.path().join("late.war"), b"bytes")?;
    let marker = dir.path().join("late.war.deployed");
    assert!(
        wait_for(|| marker.exists(), Duration::from_secs(5)).await,
        "scanner never picked up the dropped content"
    );
    assert!(scanner.deployed().contains("late.war"));

    // After stop, no further triggers fire.
    scanner.stop();
    sleep(Duration::from_millis(100)).await;
    fs::write(dir.path().join("ignored.war"), b"bytes")?;
    sleep(Duration::from_millis(300)).await;
    assert!(dir.path().join("ignored.war").exists());
    assert!(!dir.path().join("ignored.war.deployed").exists());
    Ok(())
}

#[tokio::test]
async fn disabling_pauses_and_reenabling_resumes() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;

    let registry = FakeRegistry::new();
    let manager = FakeManager::new();
    let scanner = scanner(
        dir.path(),
        |config| config.scan_interval_ms = 50,
        &registry,
        &manager,
    );
    scanner.start().await?;

    scanner.set_scan_enabled(false);
    sleep(Duration::from_millis(100)).await;
    fs::write(dir.path().join("parked.war"), b"bytes")?;
    sleep(Duration::from_millis(300)).await;
    assert!(dir.path().join("parked.war").exists());
    assert!(!dir.path().join("parked.war.deployed").exists());

    scanner.set_scan_enabled(true);
    let marker = dir.path().join("parked.war.deployed");
    assert!(
        wait_for(|| marker.exists(), Duration::from_secs(5)).await,
        "scanner never resumed"
    );

    scanner.stop();
    Ok(())
}

#[tokio::test]
async fn zero_interval_scans_once_per_configuration() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    fs::write(dir.path().join("first.war"), b"bytes")?;

    let registry = FakeRegistry::new();
    let manager = FakeManager::new();
    let scanner = scanner(
        dir.path(),
        |config| config.scan_interval_ms = 0,
        &registry,
        &manager,
    );
    scanner.start().await?;

    let first_marker = dir.path().join("first.war.deployed");
    assert!(
        wait_for(|| first_marker.exists(), Duration::from_secs(5)).await,
        "one-shot scan never ran"
    );

    // No periodic rescan happens.
    fs::write(dir.path().join("second.war"), b"bytes")?;
    sleep(Duration::from_millis(300)).await;
    assert!(!dir.path().join("second.war.deployed").exists());

    // Reconfiguring the interval schedules another one-shot pass.
    scanner.set_scan_interval(0);
    let second_marker = dir.path().join("second.war.deployed");
    assert!(
        wait_for(|| second_marker.exists(), Duration::from_secs(5)).await,
        "reconfiguration did not trigger a scan"
    );

    scanner.stop();
    Ok(())
}
