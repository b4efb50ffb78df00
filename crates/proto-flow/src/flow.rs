//! Catalog task specifications: captures, collections, derivations and
//! materializations, together with the range and log-level types shared
//! across them.

use proto_gazette::{broker, consumer};

/// RangeSpec defines the [begin, end] key and rClock ranges assigned
/// to a single catalog-task shard splitting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSpec {
    #[prost(fixed32, tag = "1")]
    pub key_begin: u32,
    #[prost(fixed32, tag = "2")]
    pub key_end: u32,
    #[prost(fixed32, tag = "3")]
    pub r_clock_begin: u32,
    #[prost(fixed32, tag = "4")]
    pub r_clock_end: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum LogLevel {
    #[default]
    UndefinedLevel = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

/// CaptureSpec is the assembled specification of a capture task.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub connector_type: String,
    #[prost(string, tag = "3")]
    pub config_json: String,
    #[prost(message, repeated, tag = "4")]
    pub bindings: Vec<capture_spec::Binding>,
    #[prost(uint32, tag = "5")]
    pub interval_seconds: u32,
    #[prost(message, optional, tag = "6")]
    pub shard_template: Option<consumer::ShardSpec>,
    #[prost(message, optional, tag = "7")]
    pub recovery_log_template: Option<broker::JournalSpec>,
    #[prost(string, tag = "8")]
    pub network: String,
}

pub mod capture_spec {
    use proto_gazette::broker;

    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Binding {
        #[prost(string, tag = "1")]
        pub resource_config_json: String,
        #[prost(string, repeated, tag = "2")]
        pub resource_path: Vec<String>,
        #[prost(message, optional, tag = "3")]
        pub collection: Option<super::CollectionSpec>,
        #[prost(bool, tag = "4")]
        pub backfill: bool,
        #[prost(message, optional, tag = "5")]
        pub state_key: Option<broker::Label>,
    }
}

/// CollectionSpec is the assembled specification of a Flow collection,
/// optionally paired with a derivation when the collection has one.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub write_schema_json: String,
    #[prost(string, tag = "3")]
    pub read_schema_json: String,
    #[prost(string, repeated, tag = "4")]
    pub key: Vec<String>,
    #[prost(string, tag = "5")]
    pub uuid_ptr: String,
    #[prost(string, repeated, tag = "6")]
    pub partition_fields: Vec<String>,
    #[prost(string, tag = "7")]
    pub ack_template_json: String,
    #[prost(message, optional, tag = "8")]
    pub partition_template: Option<broker::JournalSpec>,
    #[prost(message, optional, tag = "9")]
    pub derivation: Option<collection_spec::Derivation>,
}

pub mod collection_spec {
    use proto_gazette::{broker, consumer};

    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Derivation {
        #[prost(string, tag = "1")]
        pub connector_type: String,
        #[prost(string, tag = "2")]
        pub config_json: String,
        #[prost(message, repeated, tag = "3")]
        pub transforms: Vec<Transform>,
        #[prost(message, optional, tag = "4")]
        pub shard_template: Option<consumer::ShardSpec>,
        #[prost(message, optional, tag = "5")]
        pub recovery_log_template: Option<broker::JournalSpec>,
        #[prost(string, tag = "6")]
        pub network: String,
    }

    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Transform {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(message, optional, tag = "2")]
        pub collection: Option<super::CollectionSpec>,
        #[prost(bool, tag = "3")]
        pub backfill: bool,
    }
}

/// MaterializationSpec is the assembled specification of a materialization task.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializationSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub connector_type: String,
    #[prost(string, tag = "3")]
    pub config_json: String,
    #[prost(message, repeated, tag = "4")]
    pub bindings: Vec<materialization_spec::Binding>,
    #[prost(message, optional, tag = "5")]
    pub shard_template: Option<consumer::ShardSpec>,
    #[prost(message, optional, tag = "6")]
    pub recovery_log_template: Option<broker::JournalSpec>,
    #[prost(string, tag = "7")]
    pub network: String,
}

pub mod materialization_spec {
    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Binding {
        #[prost(string, tag = "1")]
        pub resource_config_json: String,
        #[prost(string, repeated, tag = "2")]
        pub resource_path: Vec<String>,
        #[prost(message, optional, tag = "3")]
        pub collection: Option<super::CollectionSpec>,
        #[prost(bool, tag = "4")]
        pub backfill: bool,
        #[prost(bool, tag = "5")]
        pub delta_updates: bool,
    }
}

/// TestSpec is the assembled specification of a catalog test.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSpec {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub steps: Vec<test_spec::Step>,
}

pub mod test_spec {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
    #[repr(i32)]
    pub enum StepType {
        #[default]
        Ingest = 0,
        Verify = 1,
    }

    #[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Step {
        #[prost(enumeration = "StepType", tag = "1")]
        pub step_type: i32,
        #[prost(string, tag = "2")]
        pub collection: String,
        #[prost(string, tag = "3")]
        pub docs_json_lines: String,
        #[prost(string, tag = "4")]
        pub description: String,
        #[prost(uint32, tag = "5")]
        pub step_index: u32,
    }
}
