//! Message types of Gazette's `protocol.Journal` gRPC service.

/// Label is a named bit of metadata attached to a JournalSpec or ShardSpec.
/// Within a LabelSet, Labels are always held in (name, value) sorted order.
#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
    /// Prefix marks this label as a prefix-match selector value, when used
    /// within a LabelSelector's exclude set.
    #[prost(bool, tag = "3")]
    #[serde(default, skip_serializing_if = "is_false")]
    pub prefix: bool,
}

fn is_false(b: &bool) -> bool {
    !b
}

/// LabelSet is a collection of labels and their values, always held in
/// sorted (name, value) order with no duplicate (name, value) pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
pub struct LabelSet {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
}

/// LabelSelector defines a filter over LabelSets by their included or
/// excluded Labels. A LabelSet matches a selector if it includes all labels
/// of `include`, and excludes any label of `exclude` (where a Label with
/// `prefix == true` excludes any value sharing that prefix).
#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[prost(message, optional, tag = "1")]
    pub include: Option<LabelSet>,
    #[prost(message, optional, tag = "2")]
    pub exclude: Option<LabelSet>,
}

/// Fragment store & retention policy of a journal.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSpecFragment {
    #[prost(int64, tag = "1")]
    pub length: i64,
    #[prost(string, repeated, tag = "2")]
    pub stores: Vec<String>,
    #[prost(message, optional, tag = "3")]
    pub refresh_interval: Option<prost_types::Duration>,
    #[prost(message, optional, tag = "4")]
    pub retention: Option<prost_types::Duration>,
    #[prost(int64, tag = "5")]
    pub flush_interval_seconds: i64,
    #[prost(string, tag = "6")]
    pub path_postfix_template: String,
    #[prost(enumeration = "CompressionCodec", tag = "7")]
    pub compression_codec: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum CompressionCodec {
    #[default]
    Invalid = 0,
    None = 1,
    Gzip = 2,
    Zstandard = 3,
    Snappy = 4,
    GzipOffloadDecompression = 5,
}

/// JournalSpec describes a Gazette journal and its configuration.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, tag = "2")]
    pub replication: i32,
    #[prost(message, optional, tag = "3")]
    pub labels: Option<LabelSet>,
    #[prost(message, optional, tag = "4")]
    pub fragment: Option<JournalSpecFragment>,
    #[prost(int64, tag = "5")]
    pub max_append_rate: i64,
    #[prost(message, optional, tag = "6")]
    pub suspend: Option<journal_spec::Suspend>,
    #[prost(enumeration = "journal_spec::Flag", tag = "7")]
    pub flags: i32,
}

pub mod journal_spec {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
    #[repr(i32)]
    pub enum Flag {
        #[default]
        NotSpecified = 0,
        ODirect = 1,
        OExcl = 2,
    }

    /// Suspend marks a journal as suspended (no fragments, minimal Etcd
    /// overhead) at a given recorded write-head offset.
    #[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Suspend {
        #[prost(enumeration = "Level", tag = "1")]
        pub level: i32,
        #[prost(int64, tag = "2")]
        pub offset: i64,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
    #[repr(i32)]
    pub enum Level {
        #[default]
        None = 0,
        Partial = 1,
        Full = 2,
    }
}

/// Route communicates the members that are responsible for serving a
/// journal or shard, and the current primary among them (if applicable).
#[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[prost(message, repeated, tag = "1")]
    pub members: Vec<crate::header::ProcessId>,
    #[prost(int32, tag = "2")]
    pub primary: i32,
    #[prost(string, repeated, tag = "3")]
    pub endpoints: Vec<String>,
}

/// Status is a response status code common to broker RPCs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum Status {
    #[default]
    Ok = 0,
    JournalNotFound = 1,
    NoJournalPrimaryBroker = 2,
    NotJournalPrimaryBroker = 3,
    NotJournalBroker = 4,
    InsufficientJournalBrokers = 5,
    OffsetNotYetAvailable = 6,
    WrongAppendOffset = 7,
    IndexHasGreaterOffset = 8,
    RegisterMismatch = 9,
    UpsertRangeConflict = 10,
    EtcdTransactionFailed = 11,
    Suspended = 12,
    WrongRoute = 13,
    FragmentStoreUnhealthy = 14,
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
        pub upsert: Option<super::JournalSpec>,
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
    pub journals: Vec<list_response::Journal>,
}

pub mod list_response {
    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Journal {
        #[prost(message, optional, tag = "1")]
        pub spec: Option<super::JournalSpec>,
        #[prost(int64, tag = "2")]
        pub mod_revision: i64,
        #[prost(message, optional, tag = "3")]
        pub route: Option<super::Route>,
    }
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentsRequest {
    #[prost(string, tag = "1")]
    pub journal: String,
    #[prost(int64, tag = "2")]
    pub begin_mod_time: i64,
    #[prost(int64, tag = "3")]
    pub end_mod_time: i64,
    #[prost(string, tag = "4")]
    pub next_page_token: String,
    #[prost(int32, tag = "5")]
    pub page_limit: i32,
    #[prost(bool, tag = "6")]
    pub signature_ttl_seconds: bool,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentsResponse {
    #[prost(enumeration = "Status", tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub header: Option<crate::Header>,
    #[prost(message, repeated, tag = "3")]
    pub fragments: Vec<fragments_response::Fragment>,
    #[prost(string, tag = "4")]
    pub next_page_token: String,
}

pub mod fragments_response {
    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Fragment {
        #[prost(message, optional, tag = "1")]
        pub spec: Option<FragmentSpec>,
        #[prost(string, tag = "2")]
        pub signed_url: String,
    }

    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FragmentSpec {
        #[prost(string, tag = "1")]
        pub journal: String,
        #[prost(int64, tag = "2")]
        pub begin: i64,
        #[prost(int64, tag = "3")]
        pub end: i64,
        #[prost(bytes, tag = "4")]
        pub sum: Vec<u8>,
        #[prost(string, tag = "5")]
        pub compression_codec: String,
        #[prost(string, tag = "6")]
        pub backing_store: String,
        #[prost(message, optional, tag = "7")]
        pub mod_time: Option<prost_types::Timestamp>,
        #[prost(int64, tag = "8")]
        pub path_postfix: i64,
    }
}

/// Minimal stand-in for `google.protobuf.{Duration,Timestamp}` used only to
/// keep field shapes honest; upstream these come from `pbjson-types`.
pub mod prost_types {
    #[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
    pub struct Duration {
        #[prost(int64, tag = "1")]
        pub seconds: i64,
        #[prost(int32, tag = "2")]
        pub nanos: i32,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
    pub struct Timestamp {
        #[prost(int64, tag = "1")]
        pub seconds: i64,
        #[prost(int32, tag = "2")]
        pub nanos: i32,
    }
}
