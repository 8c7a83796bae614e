//! Wire messages of the `junctiond.JunctionService` gRPC service.
//!
//! Field numbers match the daemon's schema and must not be reordered.

use junction_common::{InstanceName, InstanceSpec, InstanceStatus};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FunctionData {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub rootfs: ::prost::alloc::string::String,
    #[prost(uint32, tag = "3")]
    pub cpu: u32,
    #[prost(uint32, tag = "4")]
    pub memory_mb: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FunctionName {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FunctionStatus {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub state: ::prost::alloc::string::String,
    #[prost(uint32, tag = "3")]
    pub cpu: u32,
    #[prost(uint32, tag = "4")]
    pub memory_mb: u32,
    #[prost(int64, tag = "5")]
    pub started_at: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FunctionList {
    #[prost(message, repeated, tag = "1")]
    pub functions: ::prost::alloc::vec::Vec<FunctionStatus>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpawnResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

include!(concat!(env!("OUT_DIR"), "/junctiond.JunctionService.rs"));

impl From<InstanceSpec> for FunctionData {
    fn from(spec: InstanceSpec) -> Self {
        Self {
            name: spec.name,
            rootfs: spec.rootfs_path,
            cpu: spec.cpu_shares,
            memory_mb: spec.memory_mb,
        }
    }
}

impl From<FunctionData> for InstanceSpec {
    fn from(data: FunctionData) -> Self {
        Self {
            name: data.name,
            rootfs_path: data.rootfs,
            cpu_shares: data.cpu,
            memory_mb: data.memory_mb,
        }
    }
}

impl From<InstanceName> for FunctionName {
    fn from(name: InstanceName) -> Self {
        Self { name: name.name }
    }
}

// proto3 has no presence for scalars, so zero values mean "not reported".
impl From<FunctionStatus> for InstanceStatus {
    fn from(status: FunctionStatus) -> Self {
        Self {
            name: status.name,
            state: Some(status.state).filter(|s| !s.is_empty()),
            cpu_shares: Some(status.cpu).filter(|&c| c != 0),
            memory_mb: Some(status.memory_mb).filter(|&m| m != 0),
            started_at: Some(status.started_at).filter(|&t| t != 0),
        }
    }
}

impl From<InstanceStatus> for FunctionStatus {
    fn from(status: InstanceStatus) -> Self {
        Self {
            name: status.name,
            state: status.state.unwrap_or_default(),
            cpu: status.cpu_shares.unwrap_or_default(),
            memory_mb: status.memory_mb.unwrap_or_default(),
            started_at: status.started_at.unwrap_or_default(),
        }
    }
}
