use std::time::{Duration, Instant};

use junction_client::{
    CallContext, CancellationToken, ClientConfig, Code, InstanceControl, JunctionClient, RpcError,
};
use junction_tester::{init_tracing, FakeDaemon};

const DAEMON_LATENCY: Duration = Duration::from_millis(400);

fn aborted(err: &RpcError) -> bool {
    matches!(
        err.code(),
        Code::DeadlineExceeded | Code::Cancelled
    )
}

#[tokio::test]
async fn test_deadline_unblocks_only_its_own_call() -> anyhow::Result<()> {
    init_tracing();
    let daemon = FakeDaemon::builder().with_latency(DAEMON_LATENCY).serve()?;
    let client = JunctionClient::open(daemon.socket_path()).await?;

    let hurried = CallContext::timeout(Duration::from_millis(50));
    let patient = CallContext::timeout(Duration::from_secs(10));

    let started = Instant::now();
    let hurried_call = async {
        let result = client.list(&hurried).await;
        (result, started.elapsed())
    };
    let patient_call = client.list(&patient);
    let ((hurried_result, hurried_elapsed), patient_result) =
        tokio::join!(hurried_call, patient_call);

    let err = hurried_result.unwrap_err();
    assert!(aborted(&err), "unexpected error {err:?}");
    assert!(
        hurried_elapsed < DAEMON_LATENCY,
        "deadline call took {hurried_elapsed:?}"
    );
    assert!(patient_result?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancel_token_unblocks_only_its_own_call() -> anyhow::Result<()> {
    init_tracing();
    let daemon = FakeDaemon::builder().with_latency(DAEMON_LATENCY).serve()?;
    let client = JunctionClient::open(daemon.socket_path()).await?;

    let token = CancellationToken::new();
    let doomed = CallContext::new().with_cancellation(token.clone());
    let survivor = CallContext::new();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let started = Instant::now();
    let doomed_call = async {
        let result = client.list(&doomed).await;
        (result, started.elapsed())
    };
    let ((doomed_result, doomed_elapsed), survivor_result) =
        tokio::join!(doomed_call, client.list(&survivor));

    assert!(matches!(doomed_result, Err(RpcError::Cancelled { .. })));
    assert!(doomed_elapsed < DAEMON_LATENCY);
    assert!(survivor_result?.is_empty());

    // The channel is still good after a cancelled call.
    assert!(client.list(&CallContext::new()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_configured_call_timeout_bounds_calls() -> anyhow::Result<()> {
    init_tracing();
    let daemon = FakeDaemon::builder().with_latency(DAEMON_LATENCY).serve()?;
    let config = ClientConfig::new(daemon.socket_path()).with_call_timeout(Duration::from_millis(50));
    let client = JunctionClient::open_with_config(config).await?;

    let err = client.list(&CallContext::new()).await.unwrap_err();
    assert!(aborted(&err), "unexpected error {err:?}");

    // An explicit deadline overrides the configured one.
    let listed = client
        .list(&CallContext::timeout(Duration::from_secs(10)))
        .await?;
    assert!(listed.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_close_aborts_in_flight_calls() -> anyhow::Result<()> {
    init_tracing();
    let daemon = FakeDaemon::builder()
        .with_latency(Duration::from_secs(30))
        .serve()?;
    let client = JunctionClient::open(daemon.socket_path()).await?;

    let in_flight = {
        let client = client.clone();
        tokio::spawn(async move { client.list(&CallContext::new()).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    client.close()?;

    let result = tokio::time::timeout(Duration::from_secs(5), in_flight).await??;
    assert!(matches!(result, Err(RpcError::ChannelClosed { .. })));
    Ok(())
}
