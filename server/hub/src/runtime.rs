use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use nexus_config::{NexusConfig, SystemMode};
use nexus_core::BridgeRouter;
use nexus_master::MasterServer;
use nexus_openbridge::OpenBridgeEndpoint;
use nexus_peer::PeerClient;

use crate::build;
use crate::forwarder::{DeferredForwarder, HubForwarder, LeafSink, RunningSystem};

/// One configured system's running task, joined on shutdown.
struct Task {
    name: String,
    handle: tokio::task::JoinHandle<Result<()>>,
}

/// Everything `nexus-hub` holds for the lifetime of one process: every
/// configured system, wired together by a single shared `BridgeRouter`
/// and `HubForwarder`, plus the tasks driving each one.
pub struct Hub {
    tasks: Vec<Task>,
    cancel: CancellationToken,
}

impl Hub {
    /// Loads and validates the configuration document, constructs every
    /// system it names, and wires cross-system bridging between them.
    /// Nothing is listening on the network yet; call `run` to do that.
    pub fn build(config_path: &Path, force_acl: bool) -> Result<Self> {
        let config = NexusConfig::from_file(config_path).context("loading configuration")?;
        let bridges = config.compiled_bridges().context("compiling bridge rules")?;
        let router = Arc::new(BridgeRouter::new(bridges));
        let deferred = Arc::new(DeferredForwarder::new());
        let cancel = CancellationToken::new();

        let mut systems = HashMap::new();
        let mut tasks = Vec::new();

        for (name, system) in &config.systems {
            match system.mode {
                SystemMode::Master => {
                    let cfg = build::master_config(name, system, &config.global, force_acl)
                        .with_context(|| format!("system {name:?}"))?;
                    let master = Arc::new(MasterServer::with_shared_router(
                        cfg,
                        router.clone(),
                        deferred.clone(),
                        Arc::new(nexus_core::NoopMetrics),
                    ));
                    systems.insert(name.clone(), RunningSystem::Master(master.clone()));
                    tasks.push(spawn_master(name.clone(), master, cancel.clone()));
                }
                SystemMode::Peer => {
                    let cfg = build::peer_config(name, system, &config.global).with_context(|| format!("system {name:?}"))?;
                    let repeater_id = cfg.repeater_id;
                    let sink = Arc::new(LeafSink { forwarder: deferred.clone(), system_name: name.clone() });
                    let peer = Arc::new(PeerClient::with_sink(cfg, sink));
                    systems.insert(name.clone(), RunningSystem::Peer(peer.clone(), repeater_id));
                    tasks.push(spawn_peer(name.clone(), peer, cancel.clone()));
                }
                SystemMode::OpenBridge => {
                    let cfg = build::openbridge_config(name, system).with_context(|| format!("system {name:?}"))?;
                    let sink = Arc::new(LeafSink { forwarder: deferred.clone(), system_name: name.clone() });
                    let endpoint = Arc::new(OpenBridgeEndpoint::with_collaborators(cfg, sink, Arc::new(nexus_core::NoopMetrics)));
                    systems.insert(name.clone(), RunningSystem::OpenBridge(endpoint.clone()));
                    tasks.push(spawn_openbridge(name.clone(), endpoint, cancel.clone()));
                }
            }
        }

        deferred.install(Arc::new(HubForwarder::new(router, systems)));

        Ok(Self { tasks, cancel })
    }

    /// Runs every system until `ctrl_c` or any one of them exits on its
    /// own (always a bind failure or similar fatal setup error, §7
    /// *resource* at bind time — `serve`/`run` otherwise loop until
    /// cancellation), then cancels and joins the rest.
    pub async fn run(self) -> Result<()> {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name.as_str()).collect();
        info!(systems = ?names, "nexus-hub starting");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
            }
            _ = self.cancel.cancelled() => {
                info!("a system task exited on its own, shutting down the rest");
            }
        }
        self.cancel.cancel();

        let mut first_error = None;
        for task in self.tasks {
            match task.handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(system = %task.name, error = %e, "system task returned an error");
                    first_error.get_or_insert(e);
                }
                Err(e) => error!(system = %task.name, error = %e, "system task panicked"),
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Every spawned system task cancels the shared token on exit, whether it
/// returned `Ok` or `Err` — one system failing to bind should bring the
/// whole process down for a restart, not limp along half-connected.
fn spawn_master(name: String, master: Arc<MasterServer>, cancel: CancellationToken) -> Task {
    let tag = name.clone();
    let guard = cancel.clone();
    let handle = tokio::spawn(async move {
        let result = master.serve(cancel).await.with_context(|| format!("MASTER system {tag:?}"));
        guard.cancel();
        result
    });
    Task { name, handle }
}

fn spawn_peer(name: String, peer: Arc<PeerClient>, cancel: CancellationToken) -> Task {
    let tag = name.clone();
    let guard = cancel.clone();
    let handle = tokio::spawn(async move {
        let result = peer.run(cancel).await.with_context(|| format!("PEER system {tag:?}"));
        guard.cancel();
        result
    });
    Task { name, handle }
}

fn spawn_openbridge(name: String, endpoint: Arc<OpenBridgeEndpoint>, cancel: CancellationToken) -> Task {
    let tag = name.clone();
    let guard = cancel.clone();
    let handle = tokio::spawn(async move {
        let result = endpoint.serve(cancel).await.with_context(|| format!("OPENBRIDGE system {tag:?}"));
        guard.cancel();
        result
    });
    Task { name, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_temp_config(text: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "nexus-hub-test-{}-{}.yaml",
            std::process::id(),
            text.len()
        ));
        std::fs::write(&path, text).unwrap();
        path
    }

    const TWO_MASTERS: &str = r#"
systems:
  MASTER-A:
    mode: MASTER
    port: 0
  MASTER-B:
    mode: MASTER
    port: 0
bridges:
  WORLD:
    - system: MASTER-A
      tgid: 3100
      timeslot: 1
      active: true
    - system: MASTER-B
      tgid: 3100
      timeslot: 1
      active: true
"#;

    #[tokio::test]
    async fn build_wires_every_configured_system_and_installs_the_forwarder() {
        let path = write_temp_config(TWO_MASTERS);
        let hub = Hub::build(&path, false).expect("valid configuration should build");
        assert_eq!(hub.tasks.len(), 2);

        // Give the spawned serve loops a moment to bind before dropping the
        // hub; a build-time panic in a spawned task would otherwise be lost.
        tokio::time::sleep(Duration::from_millis(20)).await;

        hub.cancel.cancel();
        for task in hub.tasks {
            let _ = tokio::time::timeout(Duration::from_secs(1), task.handle).await;
        }
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn build_rejects_a_bridge_rule_naming_an_unconfigured_system() {
        let yaml = "systems:\n  MASTER-A:\n    mode: MASTER\n    port: 0\nbridges:\n  WORLD:\n    - system: GHOST\n      tgid: 1\n      timeslot: 1\n";
        let path = write_temp_config(yaml);
        assert!(Hub::build(&path, false).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
