use futures::future::pending;
use hyper::{body, Client, StatusCode, Uri};
use scheduler::{
    harness::{shutdown_channel, ShutdownSignal, Supervisor, TerminationCause, Worker, WorkerId},
    library::{BoxedError, EmptyResult},
    services::{HealthCheckServer, ListenError, WorkerError},
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{Barrier, Notify},
    time::{sleep, timeout},
};

const ALL_WORKERS: [WorkerId; 3] = [
    WorkerId::EventStream,
    WorkerId::MetadataWatcher,
    WorkerId::HealthCheck,
];

fn forever() -> impl Worker {
    |_: ShutdownSignal| async { pending::<EmptyResult>().await }
}

fn failing(message: &'static str) -> impl Worker {
    move |_: ShutdownSignal| async move { Err::<(), BoxedError>(message.into()) }
}

fn gated(gate: Arc<Barrier>, message: &'static str) -> impl Worker {
    move |_: ShutdownSignal| {
        let gate = gate.clone();
        async move {
            gate.wait().await;
            Err::<(), BoxedError>(message.into())
        }
    }
}

fn supervisor() -> Supervisor {
    Supervisor::new().with_shutdown_timeout(Duration::from_millis(50))
}

async fn run(supervisor: Supervisor) -> TerminationCause {
    timeout(Duration::from_secs(10), supervisor.run())
        .await
        .expect("supervisor did not terminate")
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn failing_worker_is_attributed() {
    for failing_id in ALL_WORKERS {
        let mut supervisor = supervisor();

        for id in ALL_WORKERS {
            supervisor = if id == failing_id {
                supervisor.with_worker(id, failing("boom"))
            } else {
                supervisor.with_worker(id, forever())
            };
        }

        match run(supervisor).await {
            TerminationCause::Failed { worker, error } => {
                assert_eq!(worker, failing_id);
                assert_eq!(error.to_string(), "boom");
            }
            other => panic!("unexpected cause {:?}", other),
        }
    }
}

#[tokio::test]
async fn concurrent_terminations_select_one() {
    for _ in 0..20 {
        let gate = Arc::new(Barrier::new(2));

        let supervisor = supervisor()
            .with_worker(WorkerId::EventStream, gated(gate.clone(), "events"))
            .with_worker(WorkerId::MetadataWatcher, gated(gate, "metadata"))
            .with_worker(WorkerId::HealthCheck, forever());

        let cause = run(supervisor).await;

        match cause {
            TerminationCause::Failed { worker, error } => match worker {
                WorkerId::EventStream => assert_eq!(error.to_string(), "events"),
                WorkerId::MetadataWatcher => assert_eq!(error.to_string(), "metadata"),
                WorkerId::HealthCheck => panic!("blocked worker was selected"),
            },
            other => panic!("unexpected cause {:?}", other),
        }
    }
}

#[tokio::test]
async fn first_arrival_wins() {
    let release = Arc::new(Notify::new());
    let winner_release = release.clone();

    let winner = move |_: ShutdownSignal| {
        let release = winner_release.clone();
        async move {
            release.notified().await;
            Err::<(), BoxedError>("first".into())
        }
    };

    // Only fails once the supervisor has picked its outcome
    let loser = |shutdown: ShutdownSignal| async move {
        shutdown.signal().await;
        Err::<(), BoxedError>("second".into())
    };

    let supervisor = supervisor()
        .with_worker(WorkerId::MetadataWatcher, winner)
        .with_worker(WorkerId::EventStream, loser)
        .with_worker(WorkerId::HealthCheck, forever());
    let supervision = tokio::spawn(run(supervisor));

    sleep(Duration::from_millis(50)).await;
    release.notify_one();

    match supervision.await.unwrap() {
        TerminationCause::Failed { worker, error } => {
            assert_eq!(worker, WorkerId::MetadataWatcher);
            assert_eq!(error.to_string(), "first");
        }
        other => panic!("unexpected cause {:?}", other),
    }
}

#[tokio::test]
async fn clean_health_check_exit_terminates() {
    let server = Arc::new(HealthCheckServer::new("127.0.0.1:0"));
    let (stop_handle, stop_signal) = shutdown_channel();

    // Health check server whose listener is shut down by the test instead of the supervisor
    let health_check = move |_: ShutdownSignal| {
        let server = server.clone();
        let stop_signal = stop_signal.clone();
        async move { Worker::run(&*server, stop_signal).await }
    };

    let supervisor = supervisor()
        .with_worker(WorkerId::EventStream, forever())
        .with_worker(WorkerId::MetadataWatcher, forever())
        .with_worker(WorkerId::HealthCheck, health_check);
    let supervision = tokio::spawn(run(supervisor));

    sleep(Duration::from_millis(100)).await;
    stop_handle.trigger();

    let cause = supervision.await.unwrap();

    assert!(matches!(
        cause,
        TerminationCause::CleanTermination {
            worker: WorkerId::HealthCheck
        }
    ));
}

#[tokio::test]
async fn occupied_port_terminates_with_bind_error() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = occupied.local_addr().unwrap().to_string();

    let supervisor = supervisor()
        .with_worker(WorkerId::EventStream, forever())
        .with_worker(WorkerId::MetadataWatcher, forever())
        .with_worker(WorkerId::HealthCheck, HealthCheckServer::new(address));

    let cause = run(supervisor).await;

    match cause {
        TerminationCause::Failed { worker, error } => {
            assert_eq!(worker, WorkerId::HealthCheck);
            assert!(matches!(
                error.downcast_ref::<WorkerError>(),
                Some(WorkerError::HealthCheck(ListenError::Bind { .. }))
            ));
        }
        other => panic!("unexpected cause {:?}", other),
    }
}

#[tokio::test]
async fn healthcheck_is_idempotent() {
    let port = free_port();
    let server = HealthCheckServer::new(format!("127.0.0.1:{}", port));
    let (handle, signal) = shutdown_channel();
    let serving = tokio::spawn(async move { server.serve(signal).await });

    let client = Client::new();
    let uri: Uri = format!("http://127.0.0.1:{}/healthcheck", port)
        .parse()
        .unwrap();

    let mut ready = false;
    for _ in 0..100 {
        if client.get(uri.clone()).await.is_ok() {
            ready = true;
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(ready, "health check server did not come up");

    for _ in 0..5 {
        let response = client.get(uri.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    handle.trigger();
    assert!(serving.await.unwrap().is_ok());
}
