use crate::router::connect_unix;
use crate::Router;
use futures::FutureExt;
use proto_gazette::broker;
use std::sync::Arc;
use tonic::codegen::{Body, Bytes, StdError};
use tonic::transport::Uri;

/// GrpcClient is the hand-rolled equivalent of what `tonic-build` would
/// generate for the broker `Journal` gRPC service, since this tree has no
/// `.proto` IDL (and thus no codegen) available. It speaks directly to
/// `tonic::client::Grpc<T>`, the same plumbing the generated stubs use.
#[derive(Clone)]
pub struct GrpcClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl<T> GrpcClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
{
    pub fn new(inner: T) -> Self {
        Self {
            inner: tonic::client::Grpc::new(inner),
        }
    }

    pub fn with_interceptor<I>(
        inner: T,
        interceptor: I,
    ) -> GrpcClient<tonic::service::interceptor::InterceptedService<T, I>>
    where
        I: tonic::service::Interceptor,
        T::ResponseBody: Default,
        T: tonic::codegen::Service<
            http::Request<tonic::body::BoxBody>,
            Response = http::Response<
                <T as tonic::client::GrpcService<tonic::body::BoxBody>>::ResponseBody,
            >,
        >,
        <T as tonic::codegen::Service<http::Request<tonic::body::BoxBody>>>::Error:
            Into<StdError> + Send + Sync,
    {
        GrpcClient::new(tonic::service::interceptor::InterceptedService::new(
            inner,
            interceptor,
        ))
    }

    async fn unary<Req, Resp>(
        &mut self,
        req: Req,
        path: &'static str,
    ) -> Result<Resp, tonic::Status>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("service was not ready: {e}")))?;

        let codec = tonic::codec::ProstCodec::default();
        let path = http::uri::PathAndQuery::from_static(path);
        let req = tonic::Request::new(req);

        Ok(self.inner.unary(req, path, codec).await?.into_inner())
    }

    pub async fn list(
        &mut self,
        req: broker::ListRequest,
    ) -> Result<broker::ListResponse, tonic::Status> {
        self.unary(req, "/protocol.Journal/List").await
    }

    pub async fn apply(
        &mut self,
        req: broker::ApplyRequest,
    ) -> Result<broker::ApplyResponse, tonic::Status> {
        self.unary(req, "/protocol.Journal/Apply").await
    }

    pub async fn list_fragments(
        &mut self,
        req: broker::FragmentsRequest,
    ) -> Result<broker::FragmentsResponse, tonic::Status> {
        self.unary(req, "/protocol.Journal/ListFragments").await
    }
}

// SubClient is the routed sub-client of Client.
type SubClient = GrpcClient<
    tonic::service::interceptor::InterceptedService<tonic::transport::Channel, crate::auth::Auth>,
>;
pub type JournalRouter = Router<SubClient>;

/// Client is an async client of the broker Journal gRPC service (C2), used
/// to List and Apply JournalSpecs.
#[derive(Clone)]
pub struct Client {
    router: Arc<JournalRouter>,
}

impl Client {
    pub fn new(router: JournalRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    pub async fn list(&self, req: broker::ListRequest) -> crate::Result<broker::ListResponse> {
        let mut client = self.router.route(None, false).await?;

        let resp = client.list(req).await.map_err(crate::Error::Grpc)?;
        crate::check_broker_status(resp.status)?;
        Ok(resp)
    }

    pub async fn apply(&self, req: broker::ApplyRequest) -> crate::Result<broker::ApplyResponse> {
        let mut client = self.router.route(None, false).await?;

        let resp = client.apply(req).await.map_err(crate::Error::Grpc)?;
        crate::check_broker_status(resp.status)?;
        Ok(resp)
    }

    pub async fn list_fragments(
        &self,
        req: broker::FragmentsRequest,
    ) -> crate::Result<broker::FragmentsResponse> {
        let mut client = self.router.route(None, false).await?;

        let resp = client.list_fragments(req).await.map_err(crate::Error::Grpc)?;
        crate::check_broker_status(resp.status)?;
        Ok(resp)
    }
}

impl JournalRouter {
    /// Builds a router dispatching to the broker. `tls` supplies a custom CA
    /// root (e.g. from `--broker.ca-cert`) for endpoints using the `https`
    /// scheme; when `None`, `tonic`'s native-roots default applies.
    pub fn new(
        endpoint: &str,
        interceptor: crate::Auth,
        zone: &str,
        tls: Option<tonic::transport::ClientTlsConfig>,
    ) -> crate::Result<Self> {
        Router::delegated_new(
            move |endpoint| {
                let interceptor = interceptor.clone();
                let tls = tls.clone();

                async move {
                    let endpoint = endpoint.connect_timeout(std::time::Duration::from_secs(5));
                    let endpoint = match tls {
                        Some(tls) => endpoint.tls_config(tls)?,
                        None => endpoint,
                    };
                    let channel = if endpoint.uri().scheme_str() == Some("unix") {
                        endpoint
                            .connect_with_connector(tower::util::service_fn(move |uri: Uri| {
                                connect_unix(uri)
                            }))
                            .await?
                    } else {
                        endpoint.connect().await?
                    };
                    Ok(GrpcClient::with_interceptor(channel, interceptor))
                }
                .boxed()
            },
            endpoint,
            zone,
        )
    }
}
