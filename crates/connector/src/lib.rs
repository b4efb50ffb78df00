//! A thin async client of the connector `Apply` RPC (C5), modeled as
//! bidi-streaming even though exactly one request is sent and one response
//! is received: `send -> close-send -> recv -> close`, per the wire shape's
//! forward-compatibility note (a future connector revision may stream Apply
//! progress).

use futures::StreamExt;
use proto_flow::connector;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error(transparent)]
    Grpc(#[from] tonic::Status),
    #[error("connector closed its Apply stream without sending a response")]
    NoResponse,
}

/// GrpcClient is the hand-rolled equivalent of what `tonic-build` would
/// generate for a connector's `Apply` RPC, since this tree has no `.proto`
/// IDL (and thus no codegen) available.
#[derive(Clone)]
pub struct Client {
    inner: tonic::client::Grpc<tonic::transport::Channel>,
}

impl Client {
    /// Dial the connector endpoint. `network` names the container network
    /// the connector process was launched on; it has already been applied
    /// out-of-band by the connector driver and is accepted here only so
    /// callers can log which network backed a given Apply.
    pub async fn connect(endpoint: &str, network: &str) -> Result<Self> {
        tracing::debug!(endpoint, network, "dialing connector");

        let channel = tonic::transport::Endpoint::from_shared(endpoint.to_string())?
            .connect_timeout(std::time::Duration::from_secs(5))
            .connect()
            .await?;

        Ok(Self {
            inner: tonic::client::Grpc::new(channel),
        })
    }

    pub async fn apply(
        &mut self,
        req: connector::ApplyRequest,
    ) -> Result<connector::ApplyResponse> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("connector was not ready: {e}")))?;

        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static("/flow.Connector/Apply");
        let outbound = tokio_stream::once(req);

        let response = self
            .inner
            .streaming(tonic::Request::new(outbound), path, codec)
            .await?;

        response
            .into_inner()
            .next()
            .await
            .ok_or(Error::NoResponse)?
            .map_err(Error::Grpc)
    }
}
