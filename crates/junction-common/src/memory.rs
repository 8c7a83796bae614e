use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tonic::Code;
use tracing::{debug, instrument};

use crate::{
    CallContext, InstanceControl, InstanceSpec, InstanceStatus, Operation, Result, RpcError,
};

/// In-process stand-in for a junctiond daemon.
///
/// Instances are listed in creation order. Spawning a taken name fails with
/// `AlreadyExists` and removing an unknown name fails with `NotFound`.
#[derive(Debug, Default)]
pub struct InMemoryDaemon {
    instances: Mutex<Vec<InstanceStatus>>,
    latency: Option<Duration>,
}

impl InMemoryDaemon {
    pub fn new() -> Self {
        Default::default()
    }

    /// Delays every operation by `latency` before it touches any state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn len(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn with_instances<T>(
        &self,
        operation: Operation,
        f: impl FnOnce(&mut Vec<InstanceStatus>) -> Result<T>,
    ) -> Result<T> {
        let mut instances = self.instances.lock().map_err(|_| {
            RpcError::status(operation, Code::Internal, "instance table lock poisoned")
        })?;
        f(&mut *instances)
    }
}

#[async_trait]
impl InstanceControl for InMemoryDaemon {
    #[instrument(skip(self, ctx, spec), fields(name = %spec.name))]
    async fn spawn(&self, ctx: &CallContext, spec: InstanceSpec) -> Result<()> {
        let op = Operation::Spawn;
        ctx.scope(op, async {
            self.simulate_latency().await;
            spec.validate()
                .map_err(|reason| RpcError::status(op, Code::InvalidArgument, reason))?;
            self.with_instances(op, |instances| {
                if instances.iter().any(|i| i.name == spec.name) {
                    return Err(RpcError::status(
                        op,
                        Code::AlreadyExists,
                        format!("instance {} already exists", spec.name),
                    ));
                }
                instances.push(InstanceStatus {
                    name: spec.name.clone(),
                    state: Some("running".to_string()),
                    cpu_shares: Some(spec.cpu_shares),
                    memory_mb: Some(spec.memory_mb),
                    started_at: Some(chrono::Utc::now().timestamp()),
                });
                debug!(total = instances.len(), "Instance registered");
                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    async fn remove(&self, ctx: &CallContext, name: &str) -> Result<()> {
        let op = Operation::Remove;
        ctx.scope(op, async {
            self.simulate_latency().await;
            self.with_instances(op, |instances| {
                let before = instances.len();
                instances.retain(|i| i.name != name);
                if instances.len() == before {
                    return Err(RpcError::status(
                        op,
                        Code::NotFound,
                        format!("instance {name} not found"),
                    ));
                }
                Ok(())
            })
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    async fn list(&self, ctx: &CallContext) -> Result<Vec<InstanceStatus>> {
        let op = Operation::List;
        ctx.scope(op, async {
            self.simulate_latency().await;
            self.with_instances(op, |instances| Ok(instances.clone()))
        })
        .await
    }
}
