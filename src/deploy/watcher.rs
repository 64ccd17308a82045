//! Hot deploy of script services.
//!
//! # Responsibilities
//! - Deploy every script already in the directory, then watch it
//! - Apply create/modify/remove events through the registry
//! - Track which file owns which binding
//!
//! # Design Decisions
//! - One deployer per directory, owning its deployment map; nothing else
//!   touches the map, so it needs no lock
//! - Loading runs in its own task with a timeout: a script that fails,
//!   hangs or panics only loses that file
//! - A missing directory or a broken watch stops this deployer, never the
//!   process
//!
//! # States
//! ```text
//! idle → watching ⇄ handling
//!          ↓
//!       stopped   (shutdown, watch failure)
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use super::reducer::{reduce, DeployAction};
use super::script::{ScriptLoader, ScriptService};
use super::source::{DeployEvent, EventSource};
use crate::config::DeployConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::plugins::{PluginDescriptor, PluginRecord, PluginRegistry};
use crate::routing::MatchPolicy;

/// Where a deployed script is bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentEntry {
    pub source_path: PathBuf,
    pub service_name: String,
    pub bound_path: String,
    pub match_policy: MatchPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Idle,
    Watching,
    Handling,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub directory: PathBuf,
    /// Pause between the initial scan and the first drained event.
    pub startup_delay: Duration,
    pub deploy_timeout: Duration,
}

impl DeploySettings {
    /// `None` when no directory is configured.
    pub fn from_config(config: &DeployConfig) -> Option<Self> {
        Some(Self {
            directory: config.directory.clone()?,
            startup_delay: Duration::from_millis(config.startup_delay_ms),
            deploy_timeout: Duration::from_secs(config.deploy_timeout_secs),
        })
    }
}

/// Deploys scripts from one directory.
pub struct HotDeployer<S: EventSource> {
    registry: Arc<PluginRegistry>,
    loader: Arc<dyn ScriptLoader>,
    source: S,
    settings: DeploySettings,
    deployments: HashMap<PathBuf, DeploymentEntry>,
    state: watch::Sender<WatcherState>,
}

impl<S: EventSource> HotDeployer<S> {
    pub fn new(
        registry: Arc<PluginRegistry>,
        loader: Arc<dyn ScriptLoader>,
        source: S,
        settings: DeploySettings,
    ) -> Self {
        let (state, _) = watch::channel(WatcherState::Idle);
        Self {
            registry,
            loader,
            source,
            settings,
            deployments: HashMap::new(),
            state,
        }
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Follow state changes from another task.
    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    pub fn deployments(&self) -> &HashMap<PathBuf, DeploymentEntry> {
        &self.deployments
    }

    /// Scan, watch and handle events until shutdown.
    ///
    /// Returns an error only when the directory or the watch itself fails;
    /// the deployer is `Stopped` either way.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), GatewayError> {
        let result = self.watch_loop(&mut shutdown).await;
        if let Err(e) = &result {
            tracing::error!(path = ?self.settings.directory, error = %e, "Hot deploy stopped");
        } else {
            tracing::info!(path = ?self.settings.directory, "Hot deploy stopped");
        }
        self.set_state(WatcherState::Stopped);
        result
    }

    async fn watch_loop(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), GatewayError> {
        let dir = self.check_directory().await?;
        self.settings.directory = dir.clone();

        self.scan().await?;
        let mut events = self.source.open(&dir)?;
        self.set_state(WatcherState::Watching);

        if !self.settings.startup_delay.is_zero() {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                _ = tokio::time::sleep(self.settings.startup_delay) => {}
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                event = events.recv() => match event {
                    Some(Ok(event)) => {
                        self.set_state(WatcherState::Handling);
                        self.handle(event).await;
                        self.set_state(WatcherState::Watching);
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(GatewayError::Watch {
                            path: dir,
                            reason: "event stream closed".into(),
                        })
                    }
                },
            }
        }
    }

    async fn check_directory(&self) -> Result<PathBuf, GatewayError> {
        let dir = &self.settings.directory;
        let watch_error = |reason: String| GatewayError::Watch {
            path: dir.clone(),
            reason,
        };
        let metadata = tokio::fs::metadata(dir)
            .await
            .map_err(|e| watch_error(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(watch_error("not a directory".into()));
        }
        tokio::fs::canonicalize(dir)
            .await
            .map_err(|e| watch_error(e.to_string()))
    }

    /// Deploy every recognized file in the directory, in name order.
    /// Returns how many were deployed.
    pub async fn scan(&mut self) -> Result<usize, GatewayError> {
        let dir = self.settings.directory.clone();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| GatewayError::Watch {
                path: dir.clone(),
                reason: e.to_string(),
            })?;

        let mut scripts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && self.loader.recognizes(&path) {
                scripts.push(path);
            }
        }
        scripts.sort();

        let mut deployed = 0;
        for path in scripts {
            if self.deploy(&path).await {
                deployed += 1;
            }
        }
        tracing::info!(path = ?dir, deployed, "Initial scan complete");
        Ok(deployed)
    }

    /// Apply one filesystem event.
    pub async fn handle(&mut self, event: DeployEvent) {
        self.prune();
        let path = event.path();
        let tracked = self.deployments.contains_key(path);
        let recognized = self.loader.recognizes(path);
        tracing::debug!(?event, tracked, recognized, "Deploy event");

        for action in reduce(&event, tracked, recognized) {
            match action {
                DeployAction::Deploy(path) => {
                    self.deploy(&path).await;
                }
                DeployAction::Undeploy(path) => self.undeploy(&path),
            }
        }
    }

    async fn deploy(&mut self, path: &Path) -> bool {
        match self.try_deploy(path).await {
            Ok(entry) => {
                tracing::info!(
                    file = ?path,
                    service = %entry.service_name,
                    path = %entry.bound_path,
                    "Script deployed"
                );
                self.deployments.insert(path.to_path_buf(), entry);
                metrics::record_deployment("deployed");
                true
            }
            Err(e) => {
                tracing::error!(file = ?path, error = %e, "Script deploy failed");
                metrics::record_deployment("failed");
                false
            }
        }
    }

    async fn try_deploy(&mut self, path: &Path) -> Result<DeploymentEntry, GatewayError> {
        let script = self.load(path).await?;

        let descriptor = PluginDescriptor::new(&script.name)
            .with_description(&script.description)
            .with_default_uri(&script.uri)
            .with_match_policy(script.match_policy)
            .secured(script.secured);
        let record = Arc::new(PluginRecord::new(
            Arc::new(descriptor),
            script.service.clone(),
            HashMap::new(),
        ));
        let info = self
            .registry
            .register_service(record, &script.uri, script.match_policy, script.secured)
            .map_err(|e| GatewayError::Deploy {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        // Another file bound at the same slot has just been displaced.
        self.deployments.retain(|source, entry| {
            let displaced = source != path
                && entry.bound_path == info.path
                && entry.match_policy == info.match_policy;
            if displaced {
                tracing::warn!(file = ?source, path = %entry.bound_path, "Script binding displaced");
            }
            !displaced
        });

        Ok(DeploymentEntry {
            source_path: path.to_path_buf(),
            service_name: script.name,
            bound_path: info.path.clone(),
            match_policy: info.match_policy,
        })
    }

    async fn load(&self, path: &Path) -> Result<ScriptService, GatewayError> {
        let loader = self.loader.clone();
        let owned = path.to_path_buf();
        let mut task = tokio::spawn(async move { loader.load(&owned).await });

        match tokio::time::timeout(self.settings.deploy_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(GatewayError::Deploy {
                path: path.to_path_buf(),
                reason: format!("loader task failed: {join}"),
            }),
            Err(_) => {
                task.abort();
                Err(GatewayError::Deploy {
                    path: path.to_path_buf(),
                    reason: format!("load timed out after {:?}", self.settings.deploy_timeout),
                })
            }
        }
    }

    /// Drop entries whose service was unbound or moved by someone else,
    /// e.g. through the admin API.
    fn prune(&mut self) {
        let registry = &self.registry;
        self.deployments.retain(|source, entry| {
            let live = registry.service_binding(&entry.service_name).is_some_and(|info| {
                info.path == entry.bound_path && info.match_policy == entry.match_policy
            });
            if !live {
                tracing::info!(file = ?source, service = %entry.service_name, "Script service no longer bound, forgetting it");
            }
            live
        });
    }

    fn undeploy(&mut self, path: &Path) {
        let Some(entry) = self.deployments.remove(path) else {
            return;
        };
        let unbound = self.registry.unregister_service_owned(
            &entry.bound_path,
            entry.match_policy,
            &entry.service_name,
        );
        match unbound {
            Some(_) => {
                tracing::info!(file = ?path, path = %entry.bound_path, "Script undeployed");
                metrics::record_deployment("undeployed");
            }
            None => {
                tracing::debug!(file = ?path, service = %entry.service_name, "Script service already gone");
            }
        }
    }

    fn set_state(&self, state: WatcherState) {
        self.state.send_replace(state);
    }
}
