//! Message types of the connector `Apply` RPC, driven by the Endpoint
//! Applier (C5) against capture and materialization connectors. Field
//! naming follows `estuary-flow`'s connector-protocol `Request::Apply` /
//! `Response::Applied` JSON shapes, carried here over a hand-authored
//! bidi-streaming gRPC message pair instead of stdio JSON.

use crate::flow;

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[prost(message, optional, tag = "1")]
    pub capture: Option<flow::CaptureSpec>,
    #[prost(message, optional, tag = "2")]
    pub materialization: Option<flow::MaterializationSpec>,
    /// Opaque, unique version of this application: the Build ID label of
    /// the task's shard template.
    #[prost(string, tag = "3")]
    pub version: String,
    /// Dry-run applications take no action.
    #[prost(bool, tag = "4")]
    pub dry_run: bool,
}

#[derive(Clone, Debug, Default, PartialEq, prost::Message, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    /// User-facing description of the action taken by this application,
    /// or of the action that would have been taken, if this was a dry run.
    #[prost(string, tag = "1")]
    pub action_description: String,
}
