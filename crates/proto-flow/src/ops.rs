//! Labeling types attached to running task shards: the catalog task's kind
//! and the decoded contents of its ShardSpec LabelSet.

use crate::flow::RangeSpec;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum TaskType {
    #[default]
    InvalidType = 0,
    Capture = 1,
    Derivation = 2,
    Materialization = 3,
}

/// ShardLabeling is the decoded form of the labels attached to a running
/// consumer ShardSpec, as encoded/decoded by `labels::shard`.
#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardLabeling {
    #[prost(string, tag = "1")]
    pub build: String,
    #[prost(string, tag = "2")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[prost(enumeration = "log::Level", tag = "3")]
    pub log_level: i32,
    #[prost(message, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeSpec>,
    #[prost(string, tag = "5")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub split_source: String,
    #[prost(string, tag = "6")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub split_target: String,
    #[prost(string, tag = "7")]
    pub task_name: String,
    #[prost(enumeration = "TaskType", tag = "8")]
    pub task_type: i32,
    #[prost(string, tag = "9")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub logs_journal: String,
    #[prost(string, tag = "10")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stats_journal: String,
}

impl TaskType {
    /// The lowercase wire form written into the `estuary.dev/task-type`
    /// label, matching this type's `serde(rename_all = "lowercase")`.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            TaskType::InvalidType => "invalidType",
            TaskType::Capture => "capture",
            TaskType::Derivation => "derivation",
            TaskType::Materialization => "materialization",
        }
    }

    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "invalidType" => Some(Self::InvalidType),
            "capture" => Some(Self::Capture),
            "derivation" => Some(Self::Derivation),
            "materialization" => Some(Self::Materialization),
            _ => None,
        }
    }
}

impl ShardLabeling {
    /// Returns the enum value of `log_level`, or the default if the field
    /// is set to an invalid numeric value.
    pub fn log_level(&self) -> log::Level {
        log::Level::try_from(self.log_level).unwrap_or_default()
    }

    /// Returns the enum value of `task_type`, or the default if the field
    /// is set to an invalid numeric value.
    pub fn task_type(&self) -> TaskType {
        TaskType::try_from(self.task_type).unwrap_or_default()
    }
}

pub mod log {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, prost::Enumeration, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "lowercase")]
    #[repr(i32)]
    pub enum Level {
        #[default]
        UndefinedLevel = 0,
        Error = 1,
        Warn = 2,
        Info = 3,
        Debug = 4,
        Trace = 5,
    }

    impl Level {
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Level::UndefinedLevel => "undefinedLevel",
                Level::Error => "error",
                Level::Warn => "warn",
                Level::Info => "info",
                Level::Debug => "debug",
                Level::Trace => "trace",
            }
        }

        pub fn from_str_name(value: &str) -> Option<Self> {
            match value {
                "undefinedLevel" => Some(Self::UndefinedLevel),
                "error" => Some(Self::Error),
                "warn" => Some(Self::Warn),
                "info" => Some(Self::Info),
                "debug" => Some(Self::Debug),
                "trace" => Some(Self::Trace),
                _ => None,
            }
        }
    }
}
