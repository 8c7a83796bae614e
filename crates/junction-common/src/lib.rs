// Shared data model for the junctiond control plane.
//
// Everything here is transport-agnostic: the gRPC binding lives in
// `junction-client`, and `InMemoryDaemon` implements the same contract
// in-process for tests.

use std::fmt::Display;

use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};

mod context;
mod error;
mod memory;

pub use context::CallContext;
pub use error::{CloseError, ConfigError, ConnectionError, Operation, RpcError};
pub use memory::InMemoryDaemon;
pub use tokio_util::sync::CancellationToken;
pub use tonic::Code;

// Define the primary Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, RpcError>;

/// Creation request for a single instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub rootfs_path: String,
    pub cpu_shares: u32,
    pub memory_mb: u32,
}

impl InstanceSpec {
    pub fn new(
        name: impl Into<String>,
        rootfs_path: impl Into<String>,
        cpu_shares: u32,
        memory_mb: u32,
    ) -> Self {
        Self {
            name: name.into(),
            rootfs_path: rootfs_path.into(),
            cpu_shares,
            memory_mb,
        }
    }

    /// Checks the shape invariants a spec must satisfy before it is sent.
    ///
    /// Whether `rootfs_path` exists and whether `name` is already taken are
    /// for the daemon to decide.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.is_empty() {
            return Err("instance name must not be empty".to_string());
        }
        if self.rootfs_path.is_empty() {
            return Err(format!("instance {} has an empty rootfs path", self.name));
        }
        if self.cpu_shares == 0 {
            return Err(format!("instance {} requests zero cpu shares", self.name));
        }
        if self.memory_mb == 0 {
            return Err(format!("instance {} requests zero memory", self.name));
        }
        Ok(())
    }
}

/// Identifier used to address an existing instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceName {
    pub name: String,
}

impl InstanceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Display for InstanceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// One running instance as reported by the daemon.
///
/// Only `name` is guaranteed. The remaining fields are passed through when the
/// daemon fills them in and are `None` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStatus {
    pub name: String,
    pub state: Option<String>,
    pub cpu_shares: Option<u32>,
    pub memory_mb: Option<u32>,
    /// Unix timestamp (seconds) at which the daemon started the instance.
    pub started_at: Option<i64>,
}

impl InstanceStatus {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: None,
            cpu_shares: None,
            memory_mb: None,
            started_at: None,
        }
    }
}

impl Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "InstanceStatus(name: {}, state: {:?}, cpu_shares: {:?}, memory_mb: {:?}, started_at: {:?})",
            self.name, self.state, self.cpu_shares, self.memory_mb, self.started_at
        )
    }
}

/// Lifecycle operations against a junctiond daemon.
///
/// Every call is bound to its own [`CallContext`]; cancelling one call never
/// affects another call issued through the same implementation.
#[async_trait]
pub trait InstanceControl: Send + Sync {
    /// Creates an instance. Succeeds only once the daemon acknowledges it.
    async fn spawn(&self, ctx: &CallContext, spec: InstanceSpec) -> Result<()>;

    /// Removes the instance with the given name. What happens for an unknown
    /// name is up to the daemon.
    async fn remove(&self, ctx: &CallContext, name: &str) -> Result<()>;

    /// Returns every instance the daemon tracks, in the daemon's order.
    async fn list(&self, ctx: &CallContext) -> Result<Vec<InstanceStatus>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validation() {
        let spec = InstanceSpec::new("f1", "/var/lib/rootfs", 1, 256);
        assert!(spec.validate().is_ok());

        let unnamed = InstanceSpec::new("  ", "/var/lib/rootfs", 1, 256);
        assert!(unnamed.validate().unwrap_err().contains("name"));

        // Anything non-empty is the daemon's call.
        let spaced = InstanceSpec::new(" ", "/var/lib/rootfs", 1, 256);
        assert!(spaced.validate().is_ok());

        let no_cpu = InstanceSpec::new("f1", "/var/lib/rootfs", 0, 256);
        assert!(no_cpu.validate().unwrap_err().contains("cpu"));

        let no_memory = InstanceSpec::new("f1", "/var/lib/rootfs", 1, 0);
        assert!(no_memory.validate().unwrap_err().contains("memory"));
    }

    #[test]
    fn test_serialization() {
        let spec = InstanceSpec::new("f1", "/var/lib/rootfs", 1, 256);
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"rootfs_path\":\"/var/lib/rootfs\""));

        let status: InstanceStatus =
            serde_json::from_str(r#"{"name":"f1","state":null,"cpu_shares":null,"memory_mb":null,"started_at":null}"#)
                .unwrap();
        assert_eq!(status, InstanceStatus::named("f1"));
    }
}
