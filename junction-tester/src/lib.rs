//! Test harness for the junctiond client.
//!
//! [`FakeDaemon`] answers the `junctiond.JunctionService` gRPC API from an
//! [`InMemoryDaemon`] and is served over a real Unix socket in a temporary
//! directory, so the client under test goes through the same transport it
//! uses against the real daemon.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use junction_client::proto::junction_service_server::{JunctionService, JunctionServiceServer};
use junction_client::proto::{
    Empty, FunctionData, FunctionList, FunctionName, FunctionStatus, RemoveResponse,
    SpawnResponse,
};
use junction_common::{CallContext, InMemoryDaemon, InstanceControl, InstanceSpec};
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub use junction_client;
pub use junction_common;

/// Installs a test-friendly subscriber honouring `RUST_LOG`. Safe to call
/// from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub struct FakeDaemon {
    store: InMemoryDaemon,
    // Names whose spawn/remove are acknowledged with success=false.
    rejected: HashSet<String>,
}

impl FakeDaemon {
    pub fn builder() -> FakeDaemonBuilder {
        FakeDaemonBuilder::default()
    }

    fn rejection(&self, name: &str) -> Option<String> {
        self.rejected
            .contains(name)
            .then(|| format!("daemon refused instance {name}"))
    }
}

#[tonic::async_trait]
impl JunctionService for FakeDaemon {
    async fn spawn(
        &self,
        request: Request<FunctionData>,
    ) -> Result<Response<SpawnResponse>, Status> {
        let spec = InstanceSpec::from(request.into_inner());
        debug!(name = %spec.name, "fake daemon: spawn");
        if let Some(message) = self.rejection(&spec.name) {
            return Ok(Response::new(SpawnResponse {
                success: false,
                message,
            }));
        }
        self.store.spawn(&CallContext::new(), spec).await?;
        Ok(Response::new(SpawnResponse {
            success: true,
            message: String::new(),
        }))
    }

    async fn remove(
        &self,
        request: Request<FunctionName>,
    ) -> Result<Response<RemoveResponse>, Status> {
        let name = request.into_inner().name;
        debug!(%name, "fake daemon: remove");
        if let Some(message) = self.rejection(&name) {
            return Ok(Response::new(RemoveResponse {
                success: false,
                message,
            }));
        }
        self.store.remove(&CallContext::new(), &name).await?;
        Ok(Response::new(RemoveResponse {
            success: true,
            message: String::new(),
        }))
    }

    async fn list(&self, _request: Request<Empty>) -> Result<Response<FunctionList>, Status> {
        let functions = self
            .store
            .list(&CallContext::new())
            .await?
            .into_iter()
            .map(FunctionStatus::from)
            .collect();
        Ok(Response::new(FunctionList { functions }))
    }
}

#[derive(Debug)]
pub struct FakeDaemonBuilder {
    latency: Option<Duration>,
    rejected: HashSet<String>,
    gzip: bool,
}

impl Default for FakeDaemonBuilder {
    fn default() -> Self {
        Self {
            latency: None,
            rejected: HashSet::new(),
            gzip: true,
        }
    }
}

impl FakeDaemonBuilder {
    /// Delays every call before it is answered.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Acknowledges spawn/remove of `name` with `success = false`.
    pub fn reject(mut self, name: impl Into<String>) -> Self {
        self.rejected.insert(name.into());
        self
    }

    /// Serves without gzip support, like a daemon built without compression.
    pub fn without_gzip(mut self) -> Self {
        self.gzip = false;
        self
    }

    /// Binds a fresh socket and starts serving in the background. Must be
    /// called from within a Tokio runtime.
    pub fn serve(self) -> anyhow::Result<RunningDaemon> {
        let dir = tempfile::tempdir().context("Failed to create socket directory")?;
        let socket_path = dir.path().join("junctiond.sock");
        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind {}", socket_path.display()))?;

        let store = match self.latency {
            Some(latency) => InMemoryDaemon::new().with_latency(latency),
            None => InMemoryDaemon::new(),
        };
        let daemon = FakeDaemon {
            store,
            rejected: self.rejected,
        };

        let mut service = JunctionServiceServer::new(daemon);
        if self.gzip {
            service = service
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let incoming = UnixListenerStream::new(listener);
        let handle = tokio::spawn(async move {
            Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(incoming, async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(socket = %socket_path.display(), gzip = self.gzip, "Fake junctiond listening");
        Ok(RunningDaemon {
            socket_path,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
            _dir: dir,
        })
    }
}

/// A fake daemon serving in the background. Dropping it stops the server and
/// removes the socket directory.
pub struct RunningDaemon {
    socket_path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), tonic::transport::Error>>>,
    _dir: TempDir,
}

impl RunningDaemon {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Stops the server and waits for it to drain.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("Fake daemon task panicked")?
                .context("Fake daemon failed")?;
        }
        Ok(())
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
