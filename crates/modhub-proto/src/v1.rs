// ABOUTME: Prost message definitions for modhub.v1 plus the generated service stubs.
// ABOUTME: Field tags must stay in sync with proto/modhub.proto.

use std::collections::HashMap;

/// Request body for calls that take no arguments. Wire-compatible with
/// `google.protobuf.Empty`.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

/// A widget a module exposes on the hub dashboard.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Widget {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub title: String,
    /// Path on the module's UI server that returns the widget's live JSON payload.
    #[prost(string, tag = "3")]
    pub data_endpoint: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WidgetList {
    #[prost(message, repeated, tag = "1")]
    pub widgets: Vec<Widget>,
}

/// Self-description returned by a module's GetInfo.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleInfo {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub version: String,
    /// Base URL of the module's own HTTP UI, empty when it has none.
    #[prost(string, tag = "4")]
    pub ui_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteRequest {
    #[prost(string, tag = "1")]
    pub action_id: String,
    #[prost(map = "string, string", tag = "2")]
    pub params: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub error: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterRequest {
    #[prost(string, tag = "1")]
    pub module_id: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(int32, tag = "3")]
    pub pid: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub hub_id: String,
    #[prost(map = "string, string", tag = "3")]
    pub config: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyRequest {
    #[prost(string, tag = "1")]
    pub title: String,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NotifyResponse {
    #[prost(bool, tag = "1")]
    pub delivered: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogLevel {
    Unspecified = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogRequest {
    #[prost(enumeration = "LogLevel", tag = "1")]
    pub level: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogResponse {
    #[prost(bool, tag = "1")]
    pub logged: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SystemInfoResponse {
    #[prost(string, tag = "1")]
    pub os: String,
    #[prost(string, tag = "2")]
    pub arch: String,
}

include!(concat!(env!("OUT_DIR"), "/modhub.v1.ModuleService.rs"));
include!(concat!(env!("OUT_DIR"), "/modhub.v1.HubService.rs"));
