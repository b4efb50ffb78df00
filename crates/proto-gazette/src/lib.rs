//! Hand-authored equivalents of the Gazette broker & consumer gRPC message
//! types. Upstream these are produced by `prost-build`/`pbjson-build` from
//! `broker.proto` and `consumer.proto`; this crate carries the same wire
//! shapes and JSON field-naming (camelCase) by hand since no `.proto` IDL
//! ships in this tree.

pub mod broker;
pub mod consumer;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed Etcd revision header")]
    MalformedHeader,
}

/// Header is attached to most broker/consumer RPC responses and carries the
/// Etcd revision the response was generated against, alongside routing
/// metadata for the responding member.
#[derive(Clone, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    #[prost(message, optional, tag = "1")]
    pub process_id: Option<header::ProcessId>,
    #[prost(message, optional, tag = "2")]
    pub route: Option<broker::Route>,
    #[prost(message, optional, tag = "3")]
    pub etcd: Option<header::Etcd>,
}

/// Claims are the JWT claims signed and presented as a bearer token when
/// authenticating to a Gazette broker or consumer, scoping the bearer's
/// capability mask to a LabelSelector over the journals/shards it covers.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sel: broker::LabelSelector,
    pub cap: u32,
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
}

pub mod header {
    #[derive(Clone, PartialEq, Eq, Hash, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProcessId {
        #[prost(string, tag = "1")]
        pub zone: String,
        #[prost(string, tag = "2")]
        pub suffix: String,
    }

    #[derive(Clone, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Etcd {
        #[prost(int64, tag = "1")]
        pub cluster_id: i64,
        #[prost(int64, tag = "2")]
        pub member_id: i64,
        #[prost(int64, tag = "3")]
        pub revision: i64,
        #[prost(int64, tag = "4")]
        pub raft_term: i64,
    }
}
