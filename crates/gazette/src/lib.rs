//! Thin async clients over the Gazette broker and consumer shard gRPC
//! services, plus the routing and auth plumbing shared by both (C2).

pub mod auth;
pub mod journal;
pub mod metadata;
pub mod router;
pub mod shard;

pub use auth::Auth;
pub use router::Router;

use proto_gazette::{broker, consumer};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid gRPC endpoint: '{0}'")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
    #[error(transparent)]
    Grpc(#[from] tonic::Status),
    #[error("failed to parse bearer token")]
    BearerToken(#[source] tonic::metadata::errors::InvalidMetadataValue),
    #[error("broker returned status {0:?}")]
    BrokerStatus(broker::Status),
    #[error("consumer returned status {0:?}")]
    ConsumerStatus(consumer::Status),
    #[error("no route is available to reach this entity")]
    NoRoute,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("{0}")]
    Protocol(&'static str),
}

/// Maps a non-Ok broker Status into an Error.
pub(crate) fn check_broker_status(status: i32) -> Result<()> {
    match broker::Status::try_from(status).unwrap_or_default() {
        broker::Status::Ok => Ok(()),
        other => Err(Error::BrokerStatus(other)),
    }
}

/// Maps a non-Ok consumer Status into an Error.
pub(crate) fn check_consumer_status(status: i32) -> Result<()> {
    match consumer::Status::try_from(status).unwrap_or_default() {
        consumer::Status::Ok => Ok(()),
        other => Err(Error::ConsumerStatus(other)),
    }
}
