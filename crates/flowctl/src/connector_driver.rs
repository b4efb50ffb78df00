//! Connector Driver: the opaque container-transport collaborator that
//! `activate::endpoint::ConnectorDialer` defers to. Pulls the task's
//! connector image, launches it under a `flow-connector-init` sidecar (the
//! same shim used to front capture/materialization connectors generally),
//! and dials the forwarded gRPC port once it accepts connections.
//!
//! Grounded in `estuary-flow/crates/flowctl/src/connector.rs`'s
//! `docker_spawn`/`connector_client` pair, adapted from the capture-protocol
//! stdio shape to this orchestrator's own `connector::Client` (a bidi-stream
//! `Apply` RPC) and driven by task name rather than a single fixed image.

use anyhow::Context;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::{Child, Command};

const CONNECTOR_INIT_PORT: u16 = 49092;
const DIAL_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// The subset of an `IMAGE`-typed endpoint config this driver needs: the
/// image reference, everything else is opaque to us and forwarded to the
/// connector as-is via `config_json`.
#[derive(serde::Deserialize)]
struct ImageEndpointConfig {
    image: String,
}

/// Dials capture and materialization connectors by pulling and running
/// their container image through Docker, one container per task per Apply
/// call. Containers are tracked so they can be torn down once every task in
/// a run has been applied.
pub struct DockerDialer {
    /// Maps task name to its `connector_type`/`config_json`, pre-resolved
    /// from the selection so `dial` can look up the image by name alone
    /// (the `ConnectorDialer` trait only passes the task name).
    specs: HashMap<String, (String, String)>,
    children: Mutex<Vec<(Child, TempDir)>>,
}

impl DockerDialer {
    pub fn new(tasks: &[activate::selection::Task]) -> Self {
        let mut specs = HashMap::new();
        for task in tasks {
            let entry = match task {
                activate::selection::Task::Capture { name, spec } => {
                    Some((name.clone(), spec.connector_type.clone(), spec.config_json.clone()))
                }
                activate::selection::Task::Materialization { name, spec } => {
                    Some((name.clone(), spec.connector_type.clone(), spec.config_json.clone()))
                }
                activate::selection::Task::Derivation { .. } => None,
            };
            if let Some((name, connector_type, config_json)) = entry {
                specs.insert(name, (connector_type, config_json));
            }
        }
        Self {
            specs,
            children: Mutex::new(Vec::new()),
        }
    }

    fn image_for(&self, task_name: &str) -> anyhow::Result<String> {
        let (connector_type, config_json) = self
            .specs
            .get(task_name)
            .with_context(|| format!("no connector spec known for task {task_name}"))?;

        anyhow::ensure!(
            connector_type == "IMAGE",
            "task {task_name} uses connector type '{connector_type}', but this \
             orchestrator's Connector Driver only supports the 'IMAGE' type"
        );

        let config: ImageEndpointConfig = serde_json::from_str(config_json)
            .with_context(|| format!("parsing endpoint config for task {task_name}"))?;
        Ok(config.image)
    }

    /// Stops every container this dialer has launched. Best-effort: logs
    /// and continues past individual kill failures so one stuck container
    /// doesn't block cleanup of the rest.
    pub async fn shutdown(&self) {
        let children = std::mem::take(&mut *self.children.lock().unwrap());
        for (mut child, _dir) in children {
            if let Err(error) = child.kill().await {
                tracing::warn!(%error, "failed to stop connector container");
            }
        }
    }
}

#[async_trait::async_trait]
impl activate::endpoint::ConnectorDialer for DockerDialer {
    async fn dial(&self, task_name: &str, network: &str) -> anyhow::Result<connector::Client> {
        let image = self.image_for(task_name)?;

        pull(&image)
            .await
            .with_context(|| format!("pulling connector image {image} for task {task_name}"))?;
        let inspect = inspect(&image)
            .await
            .with_context(|| format!("inspecting connector image {image}"))?;

        let dir = tempfile::tempdir().context("creating connector sidecar temp directory")?;
        let host_inspect = dir.path().join("image-inspect.json");
        std::fs::write(&host_inspect, inspect)?;

        let host_connector_init =
            locate_bin::locate("flow-connector-init").context("locating flow-connector-init")?;
        let port = portpicker::pick_unused_port().context("no local ports are free")?;

        let target_inspect = "/tmp/image-inspect.json";
        let target_connector_init = "/tmp/connector_init";

        let child = Command::new("docker")
            .args([
                "run",
                "--rm",
                "--network",
                network,
                "--entrypoint",
                target_connector_init,
                "--mount",
                &format!(
                    "type=bind,source={},target={target_connector_init}",
                    host_connector_init.display()
                ),
                "--mount",
                &format!(
                    "type=bind,source={},target={target_inspect}",
                    host_inspect.display()
                ),
                "--publish",
                &format!("127.0.0.1:{port}:{CONNECTOR_INIT_PORT}"),
                &image,
                &format!("--image-inspect-json-path={target_inspect}"),
                &format!("--port={CONNECTOR_INIT_PORT}"),
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning connector container for {task_name}"))?;

        self.children.lock().unwrap().push((child, dir));

        let endpoint = format!("http://127.0.0.1:{port}");
        dial_with_retry(&endpoint, network)
            .await
            .with_context(|| format!("dialing connector container for {task_name}"))
    }
}

async fn pull(image: &str) -> anyhow::Result<()> {
    let status = Command::new("docker")
        .args(["pull", image])
        .status()
        .await
        .context("spawning docker pull")?;
    anyhow::ensure!(status.success(), "docker pull {image} exited with {status}");
    Ok(())
}

async fn inspect(image: &str) -> anyhow::Result<Vec<u8>> {
    let output = Command::new("docker")
        .args(["inspect", image])
        .output()
        .await
        .context("spawning docker inspect")?;
    anyhow::ensure!(
        output.status.success(),
        "docker inspect {image} exited with {}",
        output.status
    );
    Ok(output.stdout)
}

/// Connector containers take a moment to bind their listener after `docker
/// run` returns; retry the dial until it succeeds or `DIAL_TIMEOUT` elapses.
async fn dial_with_retry(endpoint: &str, network: &str) -> anyhow::Result<connector::Client> {
    let deadline = tokio::time::Instant::now() + DIAL_TIMEOUT;
    loop {
        match connector::Client::connect(endpoint, network).await {
            Ok(client) => return Ok(client),
            Err(error) if tokio::time::Instant::now() < deadline => {
                tracing::debug!(%error, endpoint, "connector not yet ready, retrying");
                tokio::time::sleep(DIAL_RETRY_INTERVAL).await;
            }
            Err(error) => return Err(error.into()),
        }
    }
}
