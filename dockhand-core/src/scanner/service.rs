//! The orchestrating scanner service.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dockhand_model::DeploymentName;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::markers::MarkerManager;
use super::plan_builder::PlanBuilder;
use super::tracker::DeployedSetTracker;
use super::walker::DirectoryWalker;
use crate::config::ScannerConfig;
use crate::error::{Result, ScanError};
use crate::filter::ScanFilter;
use crate::fs::FileSystem;
use crate::manager::DeploymentManager;
use crate::registry::DeploymentRegistry;

/// Summary of one completed scan cycle, logged on completion and
/// returned to direct callers of [`DeploymentScanner::scan`].
#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    /// Correlation id for this cycle's log lines.
    pub cycle_id: Uuid,
    /// When the cycle acquired the scan lock.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the cycle.
    pub duration_ms: u64,
    /// Markers found on disk during the walk.
    pub markers_seen: usize,
    /// Content items staged and handed off this cycle.
    pub staged: usize,
    /// Content items that failed staging and stay for retry.
    pub failed: usize,
    /// Deployments undeployed because their artifacts disappeared.
    pub undeployed: usize,
    /// Spurious markers deleted.
    pub pruned: usize,
    /// Size of the committed deployed set.
    pub deployed: usize,
}

/// Scheduling knobs, published to the ticker task through a watch
/// channel so changes cancel any pending trigger and reschedule.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    enabled: bool,
    interval_ms: u64,
}

/// Cross-cycle bookkeeping that only the cycle holder may touch. Living
/// inside the scan mutex makes the mutex double as the re-entrancy
/// guard for the whole reconciliation pass.
#[derive(Default)]
struct CycleState {
    /// Exploded-archive directories already warned about. An entry is
    /// dropped when the directory disappears, so a returning directory
    /// is warned about again.
    exploded_warned: HashSet<PathBuf>,
}

/// Filesystem deployment scanner service.
///
/// One instance watches one directory tree. [`scan`](Self::scan) runs a
/// single reconciliation cycle; [`start`](Self::start) rebuilds the
/// deployed set from on-disk markers and then drives cycles from a
/// timer until [`stop`](Self::stop).
pub struct DeploymentScanner {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    filter: Arc<dyn ScanFilter>,
    manager: Arc<dyn DeploymentManager>,
    registry: Arc<dyn DeploymentRegistry>,
    plan_builder: PlanBuilder,
    deployed: DeployedSetTracker,
    cycle: Mutex<CycleState>,
    schedule: watch::Sender<Schedule>,
    shutdown: CancellationToken,
    ticker_task: StdMutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for DeploymentScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schedule = *self.schedule.borrow();
        f.debug_struct("DeploymentScanner")
            .field("root", &self.root)
            .field("enabled", &schedule.enabled)
            .field("interval_ms", &schedule.interval_ms)
            .field("deployed", &self.deployed.snapshot().len())
            .field("stopped", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl DeploymentScanner {
    /// Wire up a scanner over its collaborators. The watched root is
    /// validated when the service is started.
    pub fn new(
        config: &ScannerConfig,
        fs: Arc<dyn FileSystem>,
        filter: Arc<dyn ScanFilter>,
        registry: Arc<dyn DeploymentRegistry>,
        manager: Arc<dyn DeploymentManager>,
    ) -> Self {
        let plan_builder = PlanBuilder::new(
            Arc::clone(&fs),
            Arc::clone(&registry),
            Arc::clone(&manager),
        );
        let (schedule, _) = watch::channel(Schedule {
            enabled: config.enabled,
            interval_ms: config.scan_interval_ms,
        });

        Self {
            root: config.root.clone(),
            fs,
            filter,
            manager,
            registry,
            plan_builder,
            deployed: DeployedSetTracker::new(),
            cycle: Mutex::new(CycleState::default()),
            schedule,
            shutdown: CancellationToken::new(),
            ticker_task: StdMutex::new(None),
        }
    }

    /// Directory this scanner watches.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Whether cycles currently run.
    pub fn is_enabled(&self) -> bool {
        self.schedule.borrow().enabled
    }

    /// Current scan interval in milliseconds.
    pub fn scan_interval_ms(&self) -> u64 {
        self.schedule.borrow().interval_ms
    }

    /// Snapshot of the deployed set as of the last committed cycle.
    pub fn deployed(&self) -> Arc<HashSet<DeploymentName>> {
        self.deployed.snapshot()
    }

    /// Enable or disable scanning. Takes effect from the next tick; a
    /// cycle already in flight runs to completion.
    pub fn set_scan_enabled(&self, enabled: bool) {
        info!(enabled, root = %self.root.display(), "updating scan enabled flag");
        self.schedule.send_modify(|s| s.enabled = enabled);
    }

    /// Change the scan interval. Cancels any pending trigger and
    /// reschedules under the new interval.
    pub fn set_scan_interval(&self, interval_ms: u64) {
        info!(interval_ms, root = %self.root.display(), "updating scan interval");
        self.schedule.send_modify(|s| s.interval_ms = interval_ms);
    }

    /// Validate the watched root, rebuild the deployed set from on-disk
    /// markers, and start the timer task. Idempotent once started.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.validate_root().await?;
        self.deployed
            .rebuild_at_startup(&self.fs, &self.registry, &self.root)
            .await?;

        let mut task = self.ticker_task.lock().expect("ticker task lock poisoned");
        if task.is_none() {
            let scanner = Arc::clone(self);
            *task = Some(tokio::spawn(scanner.run_schedule()));
            info!(root = %self.root.display(), "deployment scanner started");
        }
        Ok(())
    }

    /// Stop scanning: no further triggers fire, but a cycle already in
    /// flight runs to completion after this returns.
    pub fn stop(&self) {
        self.schedule.send_modify(|s| s.enabled = false);
        self.shutdown.cancel();
        info!(root = %self.root.display(), "deployment scanner stopped");
    }

    async fn validate_root(&self) -> Result<()> {
        if !self.fs.path_exists(&self.root).await {
            return Err(ScanError::DirectoryDoesNotExist(self.root.clone()));
        }
        let metadata = self.fs.metadata(&self.root).await?;
        if !metadata.is_dir {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        if metadata.readonly {
            return Err(ScanError::DirectoryNotWritable(self.root.clone()));
        }
        Ok(())
    }

    /// Run one reconciliation cycle.
    ///
    /// At most one cycle runs at a time; concurrent callers wait on the
    /// scan lock, and a caller cancelled while waiting abandons the
    /// cycle without doing any work. Errors never escape: a failed
    /// cycle is logged and the deployed set keeps its last committed
    /// generation. Returns `None` for a skipped or failed cycle.
    pub async fn scan(&self) -> Option<CycleStats> {
        let mut state = self.cycle.lock().await;

        // The flag may have been cleared between scheduling and lock
        // acquisition.
        if !self.is_enabled() {
            trace!(root = %self.root.display(), "scan disabled; skipping cycle");
            return None;
        }

        match self.run_cycle(&mut state).await {
            Ok(stats) => {
                info!(
                    cycle_id = %stats.cycle_id,
                    duration_ms = stats.duration_ms,
                    staged = stats.staged,
                    failed = stats.failed,
                    undeployed = stats.undeployed,
                    pruned = stats.pruned,
                    deployed = stats.deployed,
                    "scan cycle complete"
                );
                Some(stats)
            }
            Err(error) => {
                error!(root = %self.root.display(), %error, "scan cycle failed");
                None
            }
        }
    }

    async fn run_cycle(&self, state: &mut CycleState) -> Result<CycleStats> {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        debug!(
            %cycle_id,
            root = %self.root.display(),
            "scanning for deployment content changes"
        );

        let snapshot = self.deployed.snapshot();
        let walker = DirectoryWalker::new(
            self.fs.as_ref(),
            self.filter.as_ref(),
            &self.plan_builder,
        );
        let mut acc = walker.walk(&self.root).await?;

        self.warn_exploded(state, &acc.exploded);

        let staged_names: HashSet<DeploymentName> =
            acc.staged.iter().map(|item| item.name.clone()).collect();
        let undeployed = self.plan_builder.stage_removals(
            &mut acc.plan,
            &snapshot,
            &acc.markers,
            &staged_names,
        );

        if !acc.plan.is_empty() {
            for action in &acc.plan {
                debug!(%cycle_id, %action, "staged deployment action");
            }
            let plan = std::mem::take(&mut acc.plan);
            // The one long-blocking await of the cycle. A report coming
            // back means the plan was accepted; per-action outcomes are
            // the manager's concern.
            let report = self.manager.execute_plan(plan).await?;
            trace!(%cycle_id, outcomes = report.outcomes.len(), "plan executed");
        }

        let markers = MarkerManager::new(Arc::clone(&self.fs));
        let mut committed = HashSet::new();
        for item in &acc.staged {
            if markers.commit(&item.name, &item.path).await {
                committed.insert(item.name.clone());
            }
        }

        let valid = markers.prune(&acc.markers, &snapshot, &staged_names).await;
        let pruned = acc.markers.len() - valid.len();

        let mut next = valid;
        next.extend(committed);
        let deployed = next.len();
        self.deployed.replace(next);

        Ok(CycleStats {
            cycle_id,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            markers_seen: acc.markers.len(),
            staged: acc.staged.len(),
            failed: acc.failed,
            undeployed,
            pruned,
            deployed,
        })
    }

    /// Warn about skipped exploded-archive directories, once per
    /// appearance rather than once per cycle.
    fn warn_exploded(&self, state: &mut CycleState, exploded: &[PathBuf]) {
        let current: HashSet<PathBuf> = exploded.iter().cloned().collect();
        state.exploded_warned.retain(|path| current.contains(path));
        for path in current {
            if state.exploded_warned.insert(path.clone()) {
                warn!(
                    path = %path.display(),
                    "exploded deployment directories are not supported; ignoring"
                );
            }
        }
    }

    /// Timer loop. Rebuilds its ticker whenever the schedule changes;
    /// an interval of zero means one scan per (re)configuration. Ticks
    /// are never queued: a tick that fires while a cycle is still
    /// running is skipped.
    async fn run_schedule(self: Arc<Self>) {
        let mut rx = self.schedule.subscribe();
        loop {
            let schedule = *rx.borrow_and_update();

            if !schedule.enabled {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        continue;
                    }
                }
            }

            if schedule.interval_ms == 0 {
                self.scan().await;
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        continue;
                    }
                }
            }

            let mut ticker = interval(Duration::from_millis(schedule.interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        // Reschedule under the new configuration.
                        break;
                    }
                    _ = ticker.tick() => {
                        // Runs outside the select race: shutdown never
                        // aborts a cycle in flight.
                        self.scan().await;
                    }
                }
            }
        }
    }
}
