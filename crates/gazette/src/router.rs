use futures::future::BoxFuture;
use futures::FutureExt;
use proto_gazette::{broker, header::ProcessId};
use std::collections::HashMap;
use std::sync::Arc;
use tonic::transport::{Endpoint, Uri};

type MemberId = ProcessId;

// DialState represents a sub-client which may be:
// - Ready (if Some)
// - Currently being dialed (if locked)
// - Neither (None and not locked).
// Ready clients also track their number of uses since the last sweep.
type DialState<T> = Arc<futures::lock::Mutex<Option<(T, usize)>>>;

type NewClientFn<T> =
    Box<dyn Fn(Endpoint) -> BoxFuture<'static, Result<T, crate::Error>> + Send + Sync>;

/// Router facilitates dispatching requests to designated members of
/// a dynamic serving topology, by maintaining ready sub-clients to
/// member endpoints which may be dynamically discovered over time.
///
/// `T` is the routed sub-client type (a generated gRPC client, wrapped with
/// our auth interceptor); the broker and shard clients each instantiate
/// their own `Router<T>` via [`Router::delegated_new`].
pub struct Router<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Router<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    states: std::sync::Mutex<HashMap<MemberId, DialState<T>>>,
    default: DialState<T>,
    default_endpoint: String,
    zone: String,
    new_client: NewClientFn<T>,
}

impl<T: Clone> Router<T> {
    /// Build a Router which dials new sub-clients using `new_client`,
    /// defaulting to `endpoint` when no broker::Route is available, and
    /// preferring members in `zone` when one is.
    pub fn delegated_new<F, Fut>(new_client: F, endpoint: &str, zone: &str) -> crate::Result<Self>
    where
        F: Fn(Endpoint) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = crate::Result<T>> + Send + 'static,
    {
        // Validate the default endpoint parses, so routing errors surface early.
        build_endpoint(endpoint)?;

        Ok(Self {
            inner: Arc::new(Inner {
                states: Default::default(),
                default: Default::default(),
                default_endpoint: endpoint.to_string(),
                zone: zone.to_string(),
                new_client: Box::new(move |e| new_client(e).boxed()),
            }),
        })
    }

    /// Map an optional broker::Route and indication of whether the "primary"
    /// member is required into a ready sub-client for use in the dispatch of
    /// an RPC. Absent a route, dispatches to the Router's default endpoint.
    ///
    /// route() will prefer to send requests to a ready sub-client if
    /// possible, or will dial a new one if required by the `route` and
    /// `primary` requirement.
    pub async fn route(&self, route: Option<&broker::Route>, primary: bool) -> crate::Result<T> {
        let (endpoint, state) = self.pick(route, primary);

        // Acquire member-specific, async-aware lock.
        let mut state = state.lock().await;

        // Fast path: client is dialed and ready.
        if let Some((ref client, uses)) = &mut *state {
            *uses += 1;
            return Ok(client.clone());
        }

        // Slow path: dial the endpoint.
        let client = (self.inner.new_client)(build_endpoint(&endpoint)?).await?;
        *state = Some((client.clone(), 1));

        Ok(client)
    }

    fn pick(&self, route: Option<&broker::Route>, primary: bool) -> (String, DialState<T>) {
        // Acquire non-async lock which *cannot* be held across an await point.
        let mut states = self.inner.states.lock().unwrap();
        let index = pick(route, primary, &self.inner.zone, &states);

        match index {
            Some(index) => {
                let route = route.unwrap();
                let id = route.members[index].clone();
                let endpoint = route.endpoints[index].clone();

                let state = match states.get(&id) {
                    Some(state) => state.clone(),
                    None => states.entry(id).or_default().clone(),
                };
                (endpoint, state)
            }
            None => (self.inner.default_endpoint.clone(), self.inner.default.clone()),
        }
    }

    // Identify sub-clients which have not been used since the preceding
    // sweep, and drop them. As members come and go, sub-clients may no
    // longer be needed. Call sweep() periodically to clear them out.
    pub fn sweep(&self) {
        let mut states = self.inner.states.lock().unwrap();

        states.retain(|id, state| {
            // Retain entries which are currently connecting.
            let Some(mut state) = state.try_lock() else {
                return true;
            };
            // Drop entries which are not connected.
            let Some((_client, uses)) = &mut *state else {
                return false;
            };
            // Drop entries which have not been used since the last sweep.
            if *uses == 0 {
                tracing::debug!(?id, "dropping idle member connection");
                return false;
            }
            *uses = 0; // Mark for next sweep.
            true
        });
    }
}

fn pick<T>(
    route: Option<&broker::Route>,
    primary: bool,
    zone: &str,
    states: &HashMap<MemberId, DialState<T>>,
) -> Option<usize> {
    let route = route?;
    if route.members.is_empty() {
        return None;
    }

    route
        .members
        .iter()
        .enumerate()
        .max_by_key(|(index, id)| {
            let connected = if let Some(state) = states.get(id) {
                if let Some(state) = state.try_lock() {
                    state.is_some() // Transport is ready.
                } else {
                    true // Another task has started dialing this transport.
                }
            } else {
                false // Transport has not been started.
            };

            // Member selection criteria:
            (
                // If we want the primary, then prefer the primary.
                primary && *index as i32 == route.primary,
                // Prefer members in our same zone.
                zone == id.zone,
                // Prefer members which are already connected.
                connected,
            )
        })
        .map(|(index, _)| index)
}

fn build_endpoint(endpoint: &str) -> crate::Result<Endpoint> {
    Endpoint::from_shared(endpoint.to_string())
        .map_err(|_| crate::Error::InvalidEndpoint(endpoint.to_string()))
}

/// Dials a `unix:///path/to/socket` URI, for use as a tonic connector.
pub(crate) async fn connect_unix(
    uri: Uri,
) -> std::io::Result<hyper_util::rt::TokioIo<tokio::net::UnixStream>> {
    let path = uri.path();
    let io = tokio::net::UnixStream::connect(path).await?;
    Ok(hyper_util::rt::TokioIo::new(io))
}
