//! Dual-mode addressing: the broker and consumer each listen on either a
//! TCP port or a UNIX domain socket, and both the orchestrator's own
//! clients and the sibling process being pointed at them need the same
//! endpoint URL.

use std::path::PathBuf;

#[derive(Clone, Debug)]
pub enum Address {
    Tcp(u16),
    Unix(PathBuf),
}

impl Address {
    /// Picks an unused loopback TCP port.
    pub fn ephemeral_tcp() -> anyhow::Result<Self> {
        let port = portpicker::pick_unused_port()
            .ok_or_else(|| anyhow::anyhow!("no unused TCP port is available"))?;
        Ok(Address::Tcp(port))
    }

    /// A UNIX socket path rooted under `dir`, named `name`.
    pub fn unix_socket(dir: &std::path::Path, name: &str) -> Self {
        Address::Unix(dir.join(name))
    }

    /// The gRPC endpoint URL a [`gazette::Router`] or sibling process dials.
    pub fn endpoint_url(&self) -> String {
        match self {
            Address::Tcp(port) => format!("http://127.0.0.1:{port}"),
            Address::Unix(path) => format!("unix://{}", path.display()),
        }
    }

    /// The value a server process is told to bind to.
    pub fn listen_value(&self) -> String {
        match self {
            Address::Tcp(port) => format!("127.0.0.1:{port}"),
            Address::Unix(path) => format!("unix://{}", path.display()),
        }
    }
}
