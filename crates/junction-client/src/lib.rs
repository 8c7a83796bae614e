//! # junctiond client
//!
//! Control-plane client for the junctiond instance daemon. One
//! [`JunctionClient`] owns one gRPC channel to the daemon's Unix socket and
//! exposes the lifecycle operations of [`InstanceControl`]:
//!
//! - `spawn` creates an instance from an [`InstanceSpec`]
//! - `remove` tears an instance down by name
//! - `list` enumerates the instances the daemon is running
//!
//! Every call takes a [`CallContext`] carrying its own deadline and
//! cancellation token. Failures are returned as [`RpcError`] exactly as the
//! daemon or transport reported them; nothing is retried or cached here.
//!
//! Payloads are gzip-compressed by default (see [`Compression`]), and the
//! socket is dialed lazily on the first call unless [`ConnectMode::Eager`] is
//! configured.

pub mod config;
pub mod proto;
pub mod transport;

mod client;

pub use client::JunctionClient;
pub use config::{ClientConfig, Compression, ConnectMode, DEFAULT_SOCKET_PATH};
pub use transport::Transport;

// Re-export the shared model so callers only need this crate
pub use junction_common as common;
pub use junction_common::{
    CallContext, CancellationToken, CloseError, Code, ConfigError, ConnectionError, InMemoryDaemon,
    InstanceControl, InstanceName, InstanceSpec, InstanceStatus, Operation, RpcError,
};
