//! Local Data-Plane Supervisor (C9): starts, monitors, and tears down the
//! three colocated subprocesses -- metadata store, broker, consumer -- that
//! make up an ephemeral data plane for `temp-data-plane`, `test`, and
//! `deploy`.
//!
//! Each child is placed into its own process group so a terminal SIGINT to
//! this process does not directly reach them, and on unix is told to die if
//! this process dies uncleanly. Shutdown comes in two strengths: a graceful
//! stop (SIGTERM, reverse-dependency order, bounded wait) the caller can
//! escalate from on a second signal, and a hard kill (SIGKILL, reverse
//! order, unconditional wait) used either directly or after escalation.

mod address;

pub use address::Address;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} did not start accepting connections within the deadline")]
    NotReady(&'static str),
}

/// Paths to the three sibling binaries the supervisor spawns. Resolved
/// alongside the running `flowctl` executable or on `$PATH`, mirroring
/// `locate_bin`'s use elsewhere in this tree for connector tooling.
pub struct Binaries {
    pub metadata_store: PathBuf,
    pub broker: PathBuf,
    pub consumer: PathBuf,
}

impl Binaries {
    pub fn locate() -> anyhow::Result<Self> {
        Ok(Self {
            metadata_store: locate_bin::locate("etcd")?,
            broker: locate_bin::locate("gazette")?,
            consumer: locate_bin::locate("flow-consumer")?,
        })
    }
}

/// The supervisor's temp directory: removed on drop unless the caller asked
/// for it to be kept (the `--tempdir` flag), in which case a pre-existing
/// directory is used and left in place.
pub struct Workdir {
    // Held only for its Drop impl; never read once `path` is captured.
    _ephemeral: Option<tempfile::TempDir>,
    path: PathBuf,
}

impl Workdir {
    pub fn ephemeral() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            _ephemeral: Some(dir),
            path,
        })
    }

    pub fn persistent(path: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            _ephemeral: None,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A running local data plane. Dropping it best-effort SIGKILLs any child
/// still alive, since `Drop` cannot be async; callers that want a graceful
/// shutdown should call [`DataPlane::stop_gracefully`] themselves first.
pub struct DataPlane {
    workdir: Workdir,
    // Populated in start order (metadata store, broker, consumer) so
    // shutdown can walk it in reverse-dependency order.
    children: Vec<(&'static str, async_process::Child)>,
    pub broker_address: Address,
    pub consumer_address: Address,
}

impl DataPlane {
    /// Start all three subprocesses and wait for each to begin accepting
    /// connections before starting the next, since the broker depends on
    /// the metadata store and the consumer depends on both.
    pub async fn start(
        binaries: &Binaries,
        workdir: Workdir,
        broker_address: Address,
        consumer_address: Address,
    ) -> anyhow::Result<Self> {
        let builds_root = workdir.path().join("builds");
        std::fs::create_dir_all(&builds_root).context("creating builds-root directory")?;

        let metadata_address = Address::unix_socket(workdir.path(), "metadata-store.sock");
        let mut children = Vec::new();

        let mut cmd = async_process::Command::new(&binaries.metadata_store);
        cmd.arg("--listen-client-urls")
            .arg(metadata_address.listen_value())
            .arg("--data-dir")
            .arg(workdir.path().join("metadata-store"));
        children.push(("metadata store", spawn_supervised("metadata store", cmd)?));
        wait_ready(&metadata_address, Duration::from_secs(5))
            .await
            .map_err(|_| Error::NotReady("metadata store"))?;

        let mut cmd = async_process::Command::new(&binaries.broker);
        cmd.arg("serve")
            .arg("--broker.port")
            .arg(broker_address.listen_value())
            .arg("--broker.replication")
            .arg("1")
            .arg("--broker.watch-delay")
            .arg("0s")
            .arg("--etcd.address")
            .arg(metadata_address.endpoint_url());
        children.push(("broker", spawn_supervised("broker", cmd)?));
        wait_ready(&broker_address, Duration::from_secs(5))
            .await
            .map_err(|_| Error::NotReady("broker"))?;

        let mut cmd = async_process::Command::new(&binaries.consumer);
        cmd.arg("serve")
            .arg("--consumer.port")
            .arg(consumer_address.listen_value())
            .arg("--broker.address")
            .arg(broker_address.endpoint_url())
            .arg("--etcd.address")
            .arg(metadata_address.endpoint_url())
            .arg("--flow.builds-root")
            .arg(format!("file://{}", builds_root.display()));
        children.push(("consumer", spawn_supervised("consumer", cmd)?));
        wait_ready(&consumer_address, Duration::from_secs(5))
            .await
            .map_err(|_| Error::NotReady("consumer"))?;

        Ok(Self {
            workdir,
            children,
            broker_address,
            consumer_address,
        })
    }

    pub fn builds_root(&self) -> PathBuf {
        self.workdir.path().join("builds")
    }

    /// SIGTERM every child in reverse-dependency order (consumer, broker,
    /// metadata store), waiting up to `grace` for each. Returns the names of
    /// any child still alive once `grace` elapses, so the caller can invite
    /// the user to escalate to [`DataPlane::kill`].
    pub async fn stop_gracefully(&mut self, grace: Duration) -> Vec<&'static str> {
        for (name, child) in self.children.iter().rev() {
            tracing::info!(child = name, "sending SIGTERM");
            if let Err(err) = async_process::signal_group(child.id(), libc::SIGTERM) {
                tracing::warn!(child = name, %err, "failed to signal child");
            }
        }

        let deadline = tokio::time::Instant::now() + grace;
        let mut still_alive = Vec::new();

        for (name, child) in self.children.iter_mut().rev() {
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if tokio::time::Instant::now() < deadline => {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    Ok(None) => {
                        still_alive.push(*name);
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(child = name, %err, "error waiting for child");
                        break;
                    }
                }
            }
        }

        self.children
            .retain(|(name, _)| !still_alive.contains(name));
        still_alive
    }

    /// SIGKILL every remaining child in reverse-dependency order and reap
    /// each one unconditionally.
    pub async fn kill(&mut self) {
        for (name, child) in self.children.iter().rev() {
            tracing::info!(child = name, "sending SIGKILL");
            if let Err(err) = async_process::signal_group(child.id(), libc::SIGKILL) {
                tracing::warn!(child = name, %err, "failed to signal child");
            }
        }
        for (name, child) in self.children.iter_mut().rev() {
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) => tokio::time::sleep(Duration::from_millis(50)).await,
                    Err(err) => {
                        tracing::warn!(child = name, %err, "error reaping child");
                        break;
                    }
                }
            }
        }
        self.children.clear();
    }

    /// Move a locally-produced build artifact into the plane's builds-root,
    /// using a cross-filesystem-aware move tool rather than a rename
    /// syscall, since the source build directory may live on a different
    /// filesystem than the supervisor's temp directory.
    pub async fn move_build_into(&self, build_path: &Path) -> anyhow::Result<PathBuf> {
        let file_name = build_path
            .file_name()
            .context("build path has no file name")?;
        let dest = self.builds_root().join(file_name);

        let mut cmd = async_process::Command::new("mv");
        cmd.arg(build_path).arg(&dest);
        let child: async_process::Child = cmd.spawn().context("spawning mv")?.into();
        let status = child.wait().await.context("waiting for mv")?;
        if !status.success() {
            anyhow::bail!("mv {} -> {} failed: {status}", build_path.display(), dest.display());
        }

        Ok(dest)
    }
}

impl Drop for DataPlane {
    fn drop(&mut self) {
        for (name, child) in self.children.iter().rev() {
            _ = async_process::signal_group(child.id(), libc::SIGKILL);
            tracing::debug!(child = name, "dropped data plane child, sent SIGKILL");
        }
        // Each `async_process::Child` also kills on its own drop; the
        // explicit group signal above additionally reaps any grandchild.
    }
}

fn spawn_supervised(
    name: &'static str,
    mut cmd: async_process::Command,
) -> anyhow::Result<async_process::Child> {
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    async_process::new_process_group(&mut cmd);

    let child = cmd.spawn().with_context(|| format!("spawning {name}"))?;
    let mut child: async_process::Child = child.into();
    child.kill_on_drop(true);

    forward_logs(name, child.stdout.take());
    forward_logs(name, child.stderr.take());

    Ok(child)
}

/// Read a child's stdio line-by-line on a background task and re-emit each
/// line as a structured `tracing` event, so sub-process logs interleave
/// with the orchestrator's own output instead of writing past it.
fn forward_logs(name: &'static str, stdio: Option<async_process::ChildStdio>) {
    let Some(stdio) = stdio else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdio).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => tracing::info!(child = name, "{line}"),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(child = name, %err, "error reading child output");
                    break;
                }
            }
        }
    });
}

/// Poll `address` until something accepts a connection, or `deadline`
/// elapses.
async fn wait_ready(address: &Address, deadline: Duration) -> anyhow::Result<()> {
    let until = tokio::time::Instant::now() + deadline;
    loop {
        let ready = match address {
            Address::Tcp(port) => tokio::net::TcpStream::connect(("127.0.0.1", *port))
                .await
                .is_ok(),
            Address::Unix(path) => tokio::net::UnixStream::connect(path).await.is_ok(),
        };
        if ready {
            return Ok(());
        }
        if tokio::time::Instant::now() >= until {
            anyhow::bail!("deadline elapsed waiting for {}", address.endpoint_url());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tcp_address_urls() {
        let addr = Address::Tcp(1234);
        assert_eq!(addr.endpoint_url(), "http://127.0.0.1:1234");
        assert_eq!(addr.listen_value(), "127.0.0.1:1234");
    }

    #[test]
    fn test_unix_address_urls() {
        let addr = Address::Unix(PathBuf::from("/tmp/x/broker.sock"));
        assert_eq!(addr.endpoint_url(), "unix:///tmp/x/broker.sock");
        assert_eq!(addr.listen_value(), "unix:///tmp/x/broker.sock");
    }

    #[tokio::test]
    async fn test_wait_ready_times_out_when_nothing_listens() {
        let addr = Address::Unix(PathBuf::from("/tmp/definitely-not-a-socket.sock"));
        let err = wait_ready(&addr, Duration::from_millis(100)).await.unwrap_err();
        assert!(err.to_string().contains("deadline elapsed"));
    }

    #[tokio::test]
    async fn test_wait_ready_succeeds_once_a_listener_is_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((_socket, _)) = listener.accept().await else {
                    break;
                };
            }
        });

        wait_ready(&Address::Tcp(port), Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_workdir_ephemeral_is_removed_on_drop() {
        let workdir = Workdir::ephemeral().unwrap();
        let path = workdir.path().to_path_buf();
        assert!(path.exists());
        drop(workdir);
        assert!(!path.exists());
    }

    #[test]
    fn test_workdir_persistent_is_left_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept");
        {
            let workdir = Workdir::persistent(path.clone()).unwrap();
            assert!(workdir.path().exists());
        }
        assert!(path.exists());
    }
}
