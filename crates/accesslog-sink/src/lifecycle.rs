// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of the access-log server.
//!
//! ```text
//!   Initializing ──bind ok──> Serving ──cancel──> Draining ──listener closed──> Stopped
//!        │                       │
//!        └──bind failed──────────┴──serve failed────────────────────────────> Stopped
//! ```
//!
//! [`AccessLogger::run`] returns [`ServerError::Cancelled`] whenever the
//! cancellation token fired, whatever the server itself returned. Callers
//! treat that as a normal stop and every other error as fatal.

use crate::config::Settings;
use crate::error::ServerError;
use crate::metrics::AccessLogMetrics;
use crate::processor::Pipeline;
use crate::server::{set_status, ServiceHost};
use crate::stream::StreamHandler;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tonic_health::ServingStatus;
use tracing::{debug, error, info, warn};

/// How long open connections get to finish once shutdown starts. Long-lived
/// RPCs such as health `Watch` never finish on their own.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifecycleState {
    Initializing,
    Serving,
    Draining,
    Stopped,
}

/// Observes the lifecycle of a running [`AccessLogger`].
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    state: watch::Receiver<ServiceLifecycleState>,
    local_addr: watch::Receiver<Option<SocketAddr>>,
}

impl LifecycleHandle {
    pub fn state(&self) -> ServiceLifecycleState {
        *self.state.borrow()
    }

    pub fn is_serving(&self) -> bool {
        self.state() == ServiceLifecycleState::Serving
    }

    /// Address the listener is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.borrow()
    }

    /// Waits until the server reaches `target` or stops. Returns the state it
    /// settled in.
    pub async fn wait_for(&self, target: ServiceLifecycleState) -> ServiceLifecycleState {
        let mut state = self.state.clone();
        let result = state
            .wait_for(|s| *s == target || *s == ServiceLifecycleState::Stopped)
            .await
            .map(|s| *s);
        // sender dropped: the server is gone
        result.unwrap_or(ServiceLifecycleState::Stopped)
    }
}

struct LifecycleState {
    state: Arc<watch::Sender<ServiceLifecycleState>>,
    local_addr: watch::Sender<Option<SocketAddr>>,
}

impl LifecycleState {
    fn transition(&self, next: ServiceLifecycleState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("access-log server {:?} -> {:?}", previous, next);
        }
    }
}

/// Composes the pipeline, the stream handler and the service host and runs
/// them until cancelled.
pub struct AccessLogger {
    settings: Settings,
    pipeline: Pipeline,
    metrics: AccessLogMetrics,
    shutdown_grace: Duration,
    lifecycle: LifecycleState,
    handle: LifecycleHandle,
}

impl AccessLogger {
    pub fn new(settings: Settings, pipeline: Pipeline, metrics: AccessLogMetrics) -> Self {
        let (state_tx, state_rx) = watch::channel(ServiceLifecycleState::Initializing);
        let (addr_tx, addr_rx) = watch::channel(None);
        Self {
            settings,
            pipeline,
            metrics,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            lifecycle: LifecycleState {
                state: Arc::new(state_tx),
                local_addr: addr_tx,
            },
            handle: LifecycleHandle {
                state: state_rx,
                local_addr: addr_rx,
            },
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn lifecycle(&self) -> LifecycleHandle {
        self.handle.clone()
    }

    /// Serves until `cancel` fires or the server fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let result = self.serve_until_cancelled(&cancel).await;
        if cancel.is_cancelled() {
            return Err(ServerError::Cancelled);
        }
        result
    }

    async fn serve_until_cancelled(self, cancel: &CancellationToken) -> Result<(), ServerError> {
        info!("Starting access-log server");

        // Separate from `cancel` so the watcher can flip health and state
        // before streams and the listener are torn down.
        let shutdown = CancellationToken::new();
        let handler = Arc::new(StreamHandler::new(
            self.pipeline,
            &self.metrics,
            shutdown.clone(),
        ));

        let host = match ServiceHost::bind(
            self.settings.listen_addr(),
            &self.settings.service_name,
            handler,
        )
        .await
        {
            Ok(host) => host,
            Err(e) => {
                self.lifecycle.transition(ServiceLifecycleState::Stopped);
                return Err(e);
            }
        };
        self.lifecycle.local_addr.send_replace(Some(host.local_addr()));
        host.set_status(ServingStatus::Serving).await;
        self.lifecycle.transition(ServiceLifecycleState::Serving);

        let watcher = {
            let cancel = cancel.clone();
            let shutdown = shutdown.clone();
            let mut health = host.health_reporter();
            let service_name = self.settings.service_name.clone();
            let state = Arc::clone(&self.lifecycle.state);
            tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("Cancellation requested, draining access-log server");
                        let previous = state.send_replace(ServiceLifecycleState::Draining);
                        debug!("access-log server {:?} -> Draining", previous);
                        set_status(&mut health, &service_name, ServingStatus::NotServing).await;
                    }
                    () = shutdown.cancelled() => {}
                }
                shutdown.cancel();
            })
        };

        let signal = {
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        };
        let serve = host.serve(signal);
        tokio::pin!(serve);
        let grace = self.shutdown_grace;
        let served = tokio::select! {
            served = &mut serve => served,
            () = async {
                shutdown.cancelled().await;
                tokio::time::sleep(grace).await;
            } => {
                warn!("Connections still open {:?} after shutdown, closing listener", grace);
                Ok(())
            }
        };

        // the server may have exited on its own; release the watcher
        shutdown.cancel();
        if let Err(e) = watcher.await {
            error!("Cancellation watcher failed: {}", e);
        }

        self.lifecycle.transition(ServiceLifecycleState::Stopped);
        info!("Access-log server stopped");
        served
    }
}
