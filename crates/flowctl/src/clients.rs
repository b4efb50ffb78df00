//! Control-Plane Clients (C2): `clap::Args` groups for the broker, shard
//! consumer, and Etcd endpoints, following `estuary-flow`'s derive + env
//! pattern for `ApiArgs`. Each `build_*` helper also runs C2's bounded
//! liveness probe so that unreachable or misconfigured endpoints fail fast,
//! before any later step attempts destructive work.

use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

/// How long the startup liveness probe is allowed to take before a client
/// is considered unreachable.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, clap::Args)]
pub struct BrokerArgs {
    /// Address of the broker's gRPC endpoint.
    #[arg(long = "broker.address", env = "BROKER_ADDRESS", default_value = "http://localhost:8080")]
    pub address: String,
    /// Path to a PEM-encoded CA certificate to trust, for an `https://` address.
    #[arg(long = "broker.ca-cert", env = "BROKER_CA_CERT")]
    pub ca_cert: Option<PathBuf>,
    /// Bearer token to authenticate requests with.
    #[arg(long = "broker.token", env = "BROKER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Availability zone to prefer when a route offers multiple members.
    #[arg(long = "broker.zone", env = "BROKER_ZONE", default_value = "")]
    pub zone: String,
}

#[derive(Debug, clap::Args)]
pub struct ConsumerArgs {
    /// Address of the consumer's gRPC endpoint.
    #[arg(long = "consumer.address", env = "CONSUMER_ADDRESS", default_value = "http://localhost:9000")]
    pub address: String,
    /// Path to a PEM-encoded CA certificate to trust, for an `https://` address.
    #[arg(long = "consumer.ca-cert", env = "CONSUMER_CA_CERT")]
    pub ca_cert: Option<PathBuf>,
    /// Bearer token to authenticate requests with.
    #[arg(long = "consumer.token", env = "CONSUMER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Availability zone to prefer when a route offers multiple members.
    #[arg(long = "consumer.zone", env = "CONSUMER_ZONE", default_value = "")]
    pub zone: String,
}

#[derive(Debug, clap::Args)]
pub struct EtcdArgs {
    /// Address of the metadata store's debug/introspection endpoint, used
    /// to discover the builds root (C1).
    #[arg(long = "etcd.address", env = "ETCD_ADDRESS", default_value = "http://localhost:2379")]
    pub address: String,
}

fn load_tls_config(ca_cert: &Option<PathBuf>) -> anyhow::Result<Option<tonic::transport::ClientTlsConfig>> {
    let Some(path) = ca_cert else {
        return Ok(None);
    };
    let pem = std::fs::read(path)
        .with_context(|| format!("reading CA certificate {}", path.display()))?;
    let cert = tonic::transport::Certificate::from_pem(pem);
    Ok(Some(tonic::transport::ClientTlsConfig::new().ca_certificate(cert)))
}

/// Builds a journal client from `args` and runs its liveness probe: a
/// `List` with a selector matching no entity, bounded to 5s.
pub async fn build_broker_client(args: &BrokerArgs) -> anyhow::Result<gazette::journal::Client> {
    let auth = gazette::Auth::new(args.token.clone()).context("parsing broker token")?;
    let tls = load_tls_config(&args.ca_cert)?;
    let router = gazette::journal::JournalRouter::new(&args.address, auth, &args.zone, tls)
        .with_context(|| format!("invalid broker address '{}'", args.address))?;
    let client = gazette::journal::Client::new(router);

    probe_broker(&client)
        .await
        .with_context(|| format!("probing broker at '{}'", args.address))?;

    Ok(client)
}

/// Builds a shard client from `args` and runs its liveness probe.
pub async fn build_consumer_client(args: &ConsumerArgs) -> anyhow::Result<gazette::shard::Client> {
    let auth = gazette::Auth::new(args.token.clone()).context("parsing consumer token")?;
    let tls = load_tls_config(&args.ca_cert)?;
    let router = gazette::shard::ShardRouter::new(&args.address, auth, &args.zone, tls)
        .with_context(|| format!("invalid consumer address '{}'", args.address))?;
    let client = gazette::shard::Client::new(router);

    probe_consumer(&client)
        .await
        .with_context(|| format!("probing consumer at '{}'", args.address))?;

    Ok(client)
}

async fn probe_broker(client: &gazette::journal::Client) -> anyhow::Result<()> {
    let req = proto_gazette::broker::ListRequest {
        selector: Some(proto_gazette::broker::LabelSelector {
            include: Some(labels::build_set([(
                "estuary.dev/impossible-probe-label",
                "unreachable",
            )])),
            exclude: None,
        }),
    };
    tokio::time::timeout(PROBE_TIMEOUT, client.list(req))
        .await
        .context("timed out waiting for broker response")??;
    Ok(())
}

async fn probe_consumer(client: &gazette::shard::Client) -> anyhow::Result<()> {
    let req = proto_gazette::consumer::ListRequest {
        selector: Some(proto_gazette::broker::LabelSelector {
            include: Some(labels::build_set([(
                "estuary.dev/impossible-probe-label",
                "unreachable",
            )])),
            exclude: None,
        }),
    };
    tokio::time::timeout(PROBE_TIMEOUT, client.list(req))
        .await
        .context("timed out waiting for consumer response")??;
    Ok(())
}
