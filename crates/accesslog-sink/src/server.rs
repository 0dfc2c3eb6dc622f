// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! gRPC service host: one listener, three services (ingestion, health,
//! reflection) on a single tonic server.

use crate::error::ServerError;
use crate::stream::{IngestionService, StreamHandler};
use accesslog_proto::v1::access_log_service_server::AccessLogServiceServer;
use accesslog_proto::{ACCESS_LOG_SERVICE_NAME, FILE_DESCRIPTOR_SET};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;
use tracing::{debug, error, info};

pub struct ServiceHost {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    health: HealthReporter,
    service_name: String,
}

impl ServiceHost {
    /// Binds `addr` and registers every service. A bind failure is fatal: the
    /// caller must not proceed to serve.
    pub async fn bind(
        addr: SocketAddr,
        service_name: &str,
        handler: Arc<StreamHandler>,
    ) -> Result<Self, ServerError> {
        info!("access-log server running in [gRPC] mode, listening at [{addr}]");
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            error!("Failed to announce on network: mode=gRPC address={addr} error={source}");
            ServerError::Bind { addr, source }
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (health, health_service) = tonic_health::server::health_reporter();

        let reflection = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .register_encoded_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        let router = Server::builder()
            .add_service(health_service)
            .add_service(reflection)
            .add_service(AccessLogServiceServer::new(IngestionService::new(handler)));

        Ok(Self {
            listener,
            local_addr,
            router,
            health,
            service_name: service_name.to_string(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Health reporter of this server. Statuses can be set by service name.
    pub fn health_reporter(&self) -> HealthReporter {
        self.health.clone()
    }

    /// Sets the health of the whole server (`""`), of the configured service
    /// name and of the ingestion service.
    pub async fn set_status(&self, status: ServingStatus) {
        set_status(&mut self.health.clone(), &self.service_name, status).await;
    }

    /// Serves until `shutdown` resolves or the server fails. Stops accepting
    /// and closes the listener on shutdown; open streams are expected to be
    /// ended by the same signal through their [`StreamHandler`].
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        debug!("Starting access-log server on {}", self.local_addr);
        self.router
            .serve_with_incoming_shutdown(TcpListenerStream::new(self.listener), shutdown)
            .await?;
        debug!("Access-log server on {} stopped", self.local_addr);
        Ok(())
    }
}

pub(crate) async fn set_status(
    health: &mut HealthReporter,
    service_name: &str,
    status: ServingStatus,
) {
    debug!(
        "Health of server, {} and {} set to {:?}",
        service_name, ACCESS_LOG_SERVICE_NAME, status
    );
    health.set_service_status("", status).await;
    health.set_service_status(service_name, status).await;
    health
        .set_service_status(ACCESS_LOG_SERVICE_NAME, status)
        .await;
}
