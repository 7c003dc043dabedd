use super::WorkerError;
use crate::harness::{ShutdownSignal, Worker};
use crate::library::EmptyResult;
use async_trait::async_trait;
use log::info;
use std::{io, net::SocketAddr};
use thiserror::Error;
use tokio::net::lookup_host;
use warp::{Filter, Rejection, Reply};

/// Failure of the health check listener
#[derive(Error, Debug)]
pub enum ListenError {
    /// Listen address could not be resolved
    #[error("unable to resolve listen address {address}")]
    Resolve {
        /// Address as configured
        address: String,
        /// Resolver error
        #[source]
        source: io::Error,
    },
    /// Listen address resolved to nothing
    #[error("listen address {0} did not resolve to any socket address")]
    Unresolvable(String),
    /// Listener could not be bound
    #[error("unable to bind health check listener to {address}")]
    Bind {
        /// Resolved socket address
        address: SocketAddr,
        /// Server error
        #[source]
        source: warp::Error,
    },
}

/// Liveness endpoint for external orchestration probes
///
/// Serves `GET /healthcheck` which always responds with `200 ok`. The response does not
/// reflect the scheduler state, it merely indicates that the process is alive.
#[derive(Debug, Clone)]
pub struct HealthCheckServer {
    listen: String,
}

impl HealthCheckServer {
    /// Creates a server which will listen on the given address, e.g. `:80` or `127.0.0.1:8080`
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
        }
    }

    /// Routes served by the health check server
    pub fn routes() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        warp::get()
            .and(warp::path("healthcheck"))
            .and(warp::path::end())
            .map(|| "ok")
    }

    /// Binds the listener and serves requests until the shutdown signal completes
    pub async fn serve(&self, shutdown: ShutdownSignal) -> Result<(), ListenError> {
        let address = resolve(&self.listen).await?;

        let (address, server) = warp::serve(Self::routes())
            .try_bind_with_graceful_shutdown(address, shutdown.signal())
            .map_err(|source| ListenError::Bind { address, source })?;

        info!("Listening for health checks on {}/healthcheck", address);

        server.await;

        Ok(())
    }
}

#[async_trait]
impl Worker for HealthCheckServer {
    async fn run(&self, shutdown: ShutdownSignal) -> EmptyResult {
        self.serve(shutdown)
            .await
            .map_err(|e| WorkerError::HealthCheck(e).into())
    }
}

/// Expands the host-less `:port` notation to all interfaces
fn normalize(listen: &str) -> String {
    if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_owned()
    }
}

async fn resolve(listen: &str) -> Result<SocketAddr, ListenError> {
    lookup_host(normalize(listen))
        .await
        .map_err(|source| ListenError::Resolve {
            address: listen.to_owned(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenError::Unresolvable(listen.to_owned()))
}
