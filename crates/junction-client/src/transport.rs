use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use junction_common::{CloseError, Code, ConnectionError, Operation, RpcError};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{debug, info, instrument};

use crate::config::{ClientConfig, ConnectMode};
use crate::proto::junction_service_client::JunctionServiceClient;

/// The generated service stub bound to our channel.
pub type Stub = JunctionServiceClient<Channel>;

// Only used for the :authority header; the connector ignores it and dials the socket.
const ENDPOINT_URI: &str = "http://junctiond.local";

// sun_path is 108 bytes on Linux, including the trailing NUL.
const MAX_SOCKET_PATH_LEN: usize = 107;

/// One channel to a junctiond daemon over a Unix socket.
///
/// The stub is configured once at open time (compression, message limits) and
/// cloned for every call, so concurrent callers never contend on it beyond a
/// read lock.
#[derive(Debug)]
pub struct Transport {
    socket_path: PathBuf,
    target: String,
    stub: RwLock<Option<Stub>>,
    shutdown: CancellationToken,
}

impl Transport {
    #[instrument(skip(config), fields(socket = %config.socket_path.display(), mode = ?config.connect_mode))]
    pub async fn open(config: &ClientConfig) -> Result<Self, ConnectionError> {
        let socket_path = validate_socket_path(&config.socket_path)?;
        let target = format!("unix://{}", socket_path.display());

        let endpoint = Endpoint::from_shared(ENDPOINT_URI)
            .map_err(|source| ConnectionError::Endpoint {
                target: target.clone(),
                source,
            })?
            .connect_timeout(config.connect_timeout);

        let dial_path = Arc::new(socket_path.clone());
        let connector = service_fn(move |_: Uri| {
            let path = Arc::clone(&dial_path);
            async move { UnixStream::connect(path.as_path()).await }
        });

        let channel = match config.connect_mode {
            ConnectMode::Lazy => endpoint.connect_with_connector_lazy(connector),
            ConnectMode::Eager => {
                tokio::time::timeout(
                    config.connect_timeout,
                    endpoint.connect_with_connector(connector),
                )
                .await
                .map_err(|_| ConnectionError::ConnectTimeout {
                    target: target.clone(),
                    timeout: config.connect_timeout,
                })?
                .map_err(|source| ConnectionError::Connect {
                    target: target.clone(),
                    source,
                })?
            }
        };

        let mut stub = JunctionServiceClient::new(channel)
            .max_decoding_message_size(config.max_decoding_message_size);
        if let Some(encoding) = config.compression.encoding() {
            stub = stub.send_compressed(encoding).accept_compressed(encoding);
        }

        info!(channel = %target, compression = ?config.compression, "Opened junctiond channel");
        Ok(Self {
            socket_path,
            target,
            stub: RwLock::new(Some(stub)),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// A stub for one call, or `ChannelClosed` once the transport is closed.
    pub fn stub(&self, operation: Operation) -> Result<Stub, RpcError> {
        let guard = self.stub.read().map_err(|_| {
            RpcError::status(operation, Code::Internal, "channel state lock poisoned")
        })?;
        guard
            .as_ref()
            .cloned()
            .ok_or(RpcError::ChannelClosed { operation })
    }

    /// Runs `call` unless the transport is closed first, in which case the
    /// call is dropped and fails with `ChannelClosed`.
    pub async fn guard<T, F>(&self, operation: Operation, call: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(RpcError::ChannelClosed { operation }),
            result = call => result,
        }
    }

    /// Drops the channel and aborts every in-flight call on it.
    ///
    /// Only the first close succeeds; later ones report `AlreadyClosed`.
    pub fn close(&self) -> Result<(), CloseError> {
        let mut guard = self.stub.write().map_err(|_| CloseError::Poisoned)?;
        let stub = guard.take().ok_or_else(|| CloseError::AlreadyClosed {
            target: self.target.clone(),
        })?;
        self.shutdown.cancel();
        drop(stub);
        info!(channel = %self.target, "Closed junctiond channel");
        Ok(())
    }
}

/// Rejects paths that can never name a connectable socket.
pub fn validate_socket_path(path: &Path) -> Result<PathBuf, ConnectionError> {
    let invalid = |reason: &str| ConnectionError::InvalidSocketPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let raw = path.as_os_str();
    if raw.is_empty() {
        return Err(invalid("socket path is empty"));
    }
    if !path.is_absolute() {
        return Err(invalid("socket path must be absolute"));
    }
    if path.to_string_lossy().contains('\0') {
        return Err(invalid("socket path contains a NUL byte"));
    }
    if raw.len() > MAX_SOCKET_PATH_LEN {
        return Err(invalid("socket path exceeds the sun_path limit"));
    }
    if path.is_dir() {
        return Err(invalid("socket path names a directory"));
    }

    debug!(path = %path.display(), "Socket path accepted");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Compression;
    use std::time::Duration;

    #[test]
    fn test_validate_socket_path() {
        assert!(validate_socket_path(Path::new("/run/junctiond.sock")).is_ok());

        let empty = validate_socket_path(Path::new("")).unwrap_err();
        assert!(matches!(empty, ConnectionError::InvalidSocketPath { .. }));

        let relative = validate_socket_path(Path::new("relative/jd.sock")).unwrap_err();
        assert!(relative.to_string().contains("absolute"));

        let nul = validate_socket_path(Path::new("/run/jd\0.sock")).unwrap_err();
        assert!(nul.to_string().contains("NUL"));

        let long = format!("/tmp/{}.sock", "x".repeat(120));
        assert!(validate_socket_path(Path::new(&long)).is_err());

        let dir = tempfile::tempdir().unwrap();
        let err = validate_socket_path(dir.path()).unwrap_err();
        assert!(err.to_string().contains("directory"));
    }

    #[tokio::test]
    async fn test_lazy_open_does_not_dial() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new(dir.path().join("absent.sock"));

        let transport = Transport::open(&config).await.unwrap();
        assert!(!transport.is_closed());
        assert!(transport.target().starts_with("unix://"));
        assert!(transport.stub(Operation::List).is_ok());
    }

    #[tokio::test]
    async fn test_eager_open_fails_without_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new(dir.path().join("absent.sock"))
            .with_connect_mode(ConnectMode::Eager)
            .with_connect_timeout(Duration::from_secs(2))
            .with_compression(Compression::Disabled);

        let err = Transport::open(&config).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Connect { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_close_once() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Transport::open(&ClientConfig::new(dir.path().join("jd.sock")))
            .await
            .unwrap();

        transport.close().unwrap();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.stub(Operation::Spawn),
            Err(RpcError::ChannelClosed { operation: Operation::Spawn })
        ));
        assert!(matches!(
            transport.close(),
            Err(CloseError::AlreadyClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_guard_aborts_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(
            Transport::open(&ClientConfig::new(dir.path().join("jd.sock")))
                .await
                .unwrap(),
        );

        let closer = Arc::clone(&transport);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close().unwrap();
        });

        let result: Result<(), RpcError> = transport
            .guard(Operation::List, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RpcError::ChannelClosed { .. })));
    }
}
