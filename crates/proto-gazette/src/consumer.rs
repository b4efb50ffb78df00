//! Message types of Gazette's `consumer.Shard` gRPC service.

use crate::broker::{LabelSelector, LabelSet, Route};

/// ShardSpec describes a consumer shard and its configuration.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardSpec {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, repeated, tag = "2")]
    pub sources: Vec<shard_spec::Source>,
    #[prost(string, tag = "3")]
    pub recovery_log_prefix: String,
    #[prost(string, tag = "4")]
    pub hint_prefix: String,
    #[prost(int32, tag = "5")]
    pub hint_backups: i32,
    #[prost(message, optional, tag = "6")]
    pub max_txn_duration: Option<super::broker::prost_types::Duration>,
    #[prost(message, optional, tag = "7")]
    pub min_txn_duration: Option<super::broker::prost_types::Duration>,
    #[prost(bool, tag = "8")]
    pub disable: bool,
    #[prost(int32, tag = "9")]
    pub hot_standbys: i32,
    #[prost(message, optional, tag = "10")]
    pub labels: Option<LabelSet>,
    #[prost(bool, tag = "11")]
    pub disable_wait_for_ack: bool,
    #[prost(string, tag = "12")]
    pub ring_id: String,
}

pub mod shard_spec {
    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Source {
        #[prost(string, tag = "1")]
        pub journal: String,
        #[prost(int64, tag = "2")]
        pub min_offset: i64,
    }
}

/// ReplicaStatus is a replica's self-reported status, polled to detect
/// whether a shard assignment has reached a stable, serving state.
#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaStatus {
    #[prost(enumeration = "replica_status::Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub errors: String,
}

pub mod replica_status {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
    #[repr(i32)]
    pub enum Code {
        #[default]
        Idle = 0,
        Backfill = 1,
        Primary = 2,
        Replica = 3,
        Failed = 4,
        Standby = 5,
        Tailing = 6,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum Status {
    #[default]
    Ok = 0,
    ShardNotFound = 1,
    NoShardPrimary = 2,
    NotShardPrimary = 3,
    EtcdTransactionFailed = 4,
    ShardStopped = 5,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[prost(message, repeated, tag = "1")]
    pub changes: Vec<apply_request::Change>,
}

pub mod apply_request {
    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Change {
        #[prost(int64, tag = "1")]
        pub expect_mod_revision: i64,
        #[prost(message, optional, tag = "2")]
        pub upsert: Option<super::ShardSpec>,
        #[prost(string, tag = "3")]
        pub delete: String,
    }
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<crate::Header>,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[prost(message, optional, tag = "1")]
    pub selector: Option<LabelSelector>,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<crate::Header>,
    #[prost(message, repeated, tag = "3")]
    pub shards: Vec<list_response::Shard>,
}

pub mod list_response {
    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Shard {
        #[prost(message, optional, tag = "1")]
        pub spec: Option<super::ShardSpec>,
        #[prost(int64, tag = "2")]
        pub mod_revision: i64,
        #[prost(message, optional, tag = "3")]
        pub route: Option<Route>,
        #[prost(message, repeated, tag = "4")]
        pub status: Vec<super::ReplicaStatus>,
    }
}

/// StatRequest polls a single shard's read-through progress against a set of
/// journals it reads, optionally blocking until each offset has been read.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRequest {
    #[prost(string, tag = "1")]
    pub shard: String,
    /// Journal offsets which the shard's transactions must have read through
    /// before StatResponse is returned. An empty map polls the shard's
    /// current progress without blocking.
    #[prost(map = "string, int64", tag = "2")]
    pub read_through: std::collections::HashMap<String, i64>,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatResponse {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<crate::Header>,
    /// Journal offsets the shard has read through as of this response.
    #[prost(map = "string, int64", tag = "3")]
    pub read_through: std::collections::HashMap<String, i64>,
    /// Journal offsets the shard has published through as of this response,
    /// for journals the shard writes into (its recovery log and derived
    /// collection partitions).
    #[prost(map = "string, int64", tag = "4")]
    pub publish_at: std::collections::HashMap<String, i64>,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignRequest {
    #[prost(string, repeated, tag = "1")]
    pub shards: Vec<String>,
    #[prost(bool, tag = "2")]
    pub only_failed: bool,
    #[prost(bool, tag = "3")]
    pub dry_run: bool,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignResponse {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<crate::Header>,
    #[prost(string, repeated, tag = "3")]
    pub shards: Vec<String>,
}
