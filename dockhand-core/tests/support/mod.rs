//! Shared fixtures for the integration suite: recording fakes for the
//! registry and deployment-manager collaborators, and scanner wiring
//! over a temp directory.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dockhand_core::{
    DeploymentManager, DeploymentRegistry, DeploymentScanner, ExecuteError, RegistryError,
    ScannerConfig, StageError, StandardFilter,
};
use dockhand_core::fs::RealFs;
use dockhand_model::{
    ContentSummary, DeploymentAction, DeploymentName, DeploymentPlan, PlanReport,
    RegisteredDeployment,
};

/// Build a deployed-set expectation from string names.
pub fn names(list: &[&str]) -> HashSet<DeploymentName> {
    list.iter().map(|n| DeploymentName::from(*n)).collect()
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory configuration model.
#[derive(Default)]
pub struct FakeRegistry {
    deployments: Mutex<HashMap<DeploymentName, RegisteredDeployment>>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, name: &str, started: bool) {
        self.deployments
            .lock()
            .unwrap()
            .insert(name.into(), RegisteredDeployment { started });
    }
}

#[async_trait]
impl DeploymentRegistry for FakeRegistry {
    async fn find_deployment(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<RegisteredDeployment>, RegistryError> {
        Ok(self.deployments.lock().unwrap().get(name).copied())
    }

    async fn deployment_names(&self) -> Result<HashSet<DeploymentName>, RegistryError> {
        Ok(self.deployments.lock().unwrap().keys().cloned().collect())
    }
}

/// Recording deployment manager with failure injection and concurrency
/// instrumentation.
#[derive(Default)]
pub struct FakeManager {
    plans: Mutex<Vec<DeploymentPlan>>,
    io_failures: Mutex<HashSet<DeploymentName>>,
    duplicates: Mutex<HashSet<DeploymentName>>,
    fail_execution: AtomicBool,
    execute_delay_ms: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Executed plans, in submission order.
    pub fn plans(&self) -> Vec<DeploymentPlan> {
        self.plans.lock().unwrap().clone()
    }

    /// Action verbs of the `index`-th executed plan.
    pub fn plan_verbs(&self, index: usize) -> Vec<&'static str> {
        self.plans.lock().unwrap()[index]
            .iter()
            .map(DeploymentAction::verb)
            .collect()
    }

    /// Simulate an I/O failure distributing content for `name`.
    pub fn fail_io_for(&self, name: &str) {
        self.io_failures.lock().unwrap().insert(name.into());
    }

    pub fn clear_io_failures(&self) {
        self.io_failures.lock().unwrap().clear();
    }

    /// Make a fresh distribute of `name` report a duplicate-name race.
    pub fn duplicate_name(&self, name: &str) {
        self.duplicates.lock().unwrap().insert(name.into());
    }

    pub fn set_fail_execution(&self, fail: bool) {
        self.fail_execution.store(fail, Ordering::SeqCst);
    }

    pub fn set_execute_delay(&self, delay: Duration) {
        self.execute_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Highest number of concurrently executing plans observed.
    pub fn max_concurrent_executions(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn check_io(&self, name: &DeploymentName) -> Result<(), StageError> {
        if self.io_failures.lock().unwrap().contains(name) {
            return Err(StageError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("injected transfer failure for {name}"),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeploymentManager for FakeManager {
    async fn distribute(
        &self,
        name: &DeploymentName,
        _content: &ContentSummary,
    ) -> Result<(), StageError> {
        if self.duplicates.lock().unwrap().contains(name) {
            return Err(StageError::DuplicateName(name.clone()));
        }
        self.check_io(name)
    }

    async fn distribute_replacement(
        &self,
        name: &DeploymentName,
        _content: &ContentSummary,
    ) -> Result<(), StageError> {
        self.check_io(name)
    }

    async fn execute_plan(&self, plan: DeploymentPlan) -> Result<PlanReport, ExecuteError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let delay = self.execute_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        let result = if self.fail_execution.load(Ordering::SeqCst) {
            Err(ExecuteError::Failed("injected execution failure".into()))
        } else {
            self.plans.lock().unwrap().push(plan.clone());
            Ok(PlanReport::success_for(&plan))
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// A scanner over `root` wired to the given fakes, with the standard
/// filter and the real filesystem.
pub fn scanner(
    root: &Path,
    config_tweak: impl FnOnce(&mut ScannerConfig),
    registry: &Arc<FakeRegistry>,
    manager: &Arc<FakeManager>,
) -> Arc<DeploymentScanner> {
    let mut config = ScannerConfig::new(root);
    config_tweak(&mut config);
    Arc::new(DeploymentScanner::new(
        &config,
        Arc::new(RealFs::new()),
        Arc::new(StandardFilter),
        Arc::clone(registry) as Arc<dyn DeploymentRegistry>,
        Arc::clone(manager) as Arc<dyn DeploymentManager>,
    ))
}
