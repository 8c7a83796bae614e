use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use junction_common::{
    CallContext, CloseError, Code, ConnectionError, InstanceControl, InstanceName, InstanceSpec,
    InstanceStatus, Operation, Result, RpcError,
};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::proto::{Empty, FunctionData, FunctionName};
use crate::transport::Transport;

/// Lifecycle client for a junctiond daemon.
///
/// Cloning is cheap and every clone shares the same channel, so one client can
/// serve any number of concurrent callers. Closing any clone closes them all.
///
/// ```rust,ignore
/// use junction_client::{CallContext, InstanceControl, InstanceSpec, JunctionClient};
///
/// let client = JunctionClient::open("/run/junctiond.sock").await?;
/// let ctx = CallContext::timeout(Duration::from_secs(10));
///
/// client.spawn(&ctx, InstanceSpec::new("f1", "/var/lib/rootfs", 1, 256)).await?;
/// for status in client.list(&ctx).await? {
///     println!("{status}");
/// }
/// client.remove(&ctx, "f1").await?;
/// client.close()?;
/// ```
#[derive(Debug, Clone)]
pub struct JunctionClient {
    transport: Arc<Transport>,
    call_timeout: Option<Duration>,
}

impl JunctionClient {
    /// Opens a channel to the daemon at `socket_path` with default settings.
    pub async fn open(socket_path: impl AsRef<Path>) -> std::result::Result<Self, ConnectionError> {
        Self::open_with_config(ClientConfig::new(socket_path)).await
    }

    pub async fn open_with_config(
        config: ClientConfig,
    ) -> std::result::Result<Self, ConnectionError> {
        let transport = Transport::open(&config).await?;
        Ok(Self {
            transport: Arc::new(transport),
            call_timeout: config.call_timeout,
        })
    }

    /// Opens a channel configured from `JUNCTIOND_*` environment variables.
    pub async fn from_env() -> std::result::Result<Self, ConnectionError> {
        let config = ClientConfig::from_env()?;
        Self::open_with_config(config).await
    }

    pub fn socket_path(&self) -> &Path {
        self.transport.socket_path()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Releases the channel. Calls still in flight fail with `ChannelClosed`.
    pub fn close(&self) -> std::result::Result<(), CloseError> {
        self.transport.close().map_err(|err| {
            warn!(error = %err, "Failed to close junctiond channel");
            err
        })
    }

    // Falls back to the configured timeout when the caller set no deadline.
    fn bind(&self, ctx: &CallContext) -> CallContext {
        match (ctx.deadline(), self.call_timeout) {
            (None, Some(timeout)) => ctx.clone().with_timeout(timeout),
            _ => ctx.clone(),
        }
    }

    fn finish<T>(&self, operation: Operation, started: Instant, result: Result<T>) -> Result<T> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(%operation, elapsed_ms, "junctiond call succeeded"),
            Err(err) => warn!(%operation, elapsed_ms, code = ?err.code(), error = %err, "junctiond call failed"),
        }
        result
    }
}

fn outgoing<M>(ctx: &CallContext, message: M) -> tonic::Request<M> {
    let mut request = tonic::Request::new(message);
    if let Some(remaining) = ctx.remaining() {
        request.set_timeout(remaining);
    }
    request
}

fn acknowledge(operation: Operation, success: bool, message: String) -> Result<()> {
    if success {
        Ok(())
    } else {
        Err(RpcError::Rejected { operation, message })
    }
}

#[async_trait]
impl InstanceControl for JunctionClient {
    #[instrument(skip(self, ctx, spec), fields(name = %spec.name))]
    async fn spawn(&self, ctx: &CallContext, spec: InstanceSpec) -> Result<()> {
        let op = Operation::Spawn;
        spec.validate()
            .map_err(|reason| RpcError::status(op, Code::InvalidArgument, reason))?;

        let ctx = self.bind(ctx);
        let mut stub = self.transport.stub(op)?;
        let request = outgoing(&ctx, FunctionData::from(spec));
        let started = Instant::now();

        let call = ctx.scope(op, async move {
            stub.spawn(request)
                .await
                .map_err(|status| RpcError::from_status(op, status))
        });
        let result = self.transport.guard(op, call).await;
        let ack = self.finish(op, started, result)?.into_inner();
        acknowledge(op, ack.success, ack.message)
    }

    #[instrument(skip(self, ctx))]
    async fn remove(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let op = Operation::Remove;
        let ctx = self.bind(ctx);
        let mut stub = self.transport.stub(op)?;
        let request = outgoing(&ctx, FunctionName::from(InstanceName::new(name)));
        let started = Instant::now();

        let call = ctx.scope(op, async move {
            stub.remove(request)
                .await
                .map_err(|status| RpcError::from_status(op, status))
        });
        let result = self.transport.guard(op, call).await;
        let ack = self.finish(op, started, result)?.into_inner();
        acknowledge(op, ack.success, ack.message)
    }

    #[instrument(skip(self, ctx))]
    async fn list(&self, ctx: &CallContext) -> Result<Vec<InstanceStatus>> {
        let op = Operation::List;
        let ctx = self.bind(ctx);
        let mut stub = self.transport.stub(op)?;
        let request = outgoing(&ctx, Empty {});
        let started = Instant::now();

        let call = ctx.scope(op, async move {
            stub.list(request)
                .await
                .map_err(|status| RpcError::from_status(op, status))
        });
        let result = self.transport.guard(op, call).await;
        let list = self.finish(op, started, result)?.into_inner();
        debug!(count = list.functions.len(), "Listed instances");
        Ok(list.functions.into_iter().map(InstanceStatus::from).collect())
    }
}
