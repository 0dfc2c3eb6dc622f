// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

#![allow(dead_code)]

use accesslog_proto::v1::access_log_service_client::AccessLogServiceClient;
use accesslog_proto::v1::{
    stream_access_logs_message::LogEntries, CommonProperties, HttpAccessLogEntries,
    HttpAccessLogEntry, HttpRequestProperties, HttpResponseProperties, Identifier, Node,
    StreamAccessLogsMessage,
};
use accesslog_sink::batch::LogBatch;
use accesslog_sink::lifecycle::DEFAULT_SHUTDOWN_GRACE;
use accesslog_sink::metrics::aggregator_service::{AggregatorHandle, AggregatorService};
use accesslog_sink::metrics::{register, AccessLogMetrics};
use accesslog_sink::processor::{AccessLogRecorder, Pipeline, StreamContext};
use accesslog_sink::{
    AccessLogger, LifecycleHandle, ProcessError, ServerError, ServiceLifecycleState, Settings,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

pub const SERVICE_NAME: &str = "AccessLog";

/// The recording callback fails any batch carrying this path.
pub const POISON_PATH: &str = "/poison";

/// Request paths seen by the pipeline, with the node id of their stream.
pub type Seen = Arc<Mutex<Vec<(String, String)>>>;

/// An access-log server on an ephemeral localhost port. The pipeline is the
/// standard one plus a callback that records what it saw and rejects batches
/// carrying [`POISON_PATH`].
pub struct TestServer {
    pub addr: SocketAddr,
    pub cancel: CancellationToken,
    pub lifecycle: LifecycleHandle,
    pub aggregator: AggregatorHandle,
    pub seen: Seen,
    task: JoinHandle<Result<(), ServerError>>,
    aggregator_task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_grace(DEFAULT_SHUTDOWN_GRACE).await
    }

    pub async fn start_with_grace(grace: Duration) -> Self {
        let (service, aggregator) = AggregatorService::new(1_024);
        let aggregator_task = tokio::spawn(service.run());
        let registry = register(aggregator.clone()).expect("counters register");
        let metrics = AccessLogMetrics::from_registry(&registry).expect("counters resolve");

        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);
        let pipeline = Pipeline::builder()
            .callback(AccessLogRecorder::new(metrics.requests.clone()))
            .callback(
                move |ctx: &StreamContext, batch: &LogBatch| -> Result<(), ProcessError> {
                    let node = ctx
                        .identifier
                        .as_ref()
                        .map(|i| i.node_id.clone())
                        .unwrap_or_default();
                    if let LogBatch::HttpLogs(entries) = batch {
                        if entries.iter().any(|e| e.request_path == POISON_PATH) {
                            return Err(ProcessError::new("recorder", "poisoned batch"));
                        }
                        let mut recorded = recorded.lock().expect("lock");
                        for entry in entries {
                            recorded.push((node.clone(), entry.request_path.clone()));
                        }
                    }
                    Ok(())
                },
            )
            .build();

        let settings = Settings {
            server_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            server_port: 0,
            debug_port: 0,
            service_name: SERVICE_NAME.to_string(),
            ..Default::default()
        };
        let logger = AccessLogger::new(settings, pipeline, metrics).with_shutdown_grace(grace);
        let lifecycle = logger.lifecycle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(logger.run(cancel.clone()));

        let state = timeout(
            Duration::from_secs(5),
            lifecycle.wait_for(ServiceLifecycleState::Serving),
        )
        .await
        .expect("server should start");
        assert_eq!(state, ServiceLifecycleState::Serving);
        let addr = lifecycle.local_addr().expect("bound address");

        Self {
            addr,
            cancel,
            lifecycle,
            aggregator,
            seen,
            task,
            aggregator_task,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A fresh connection for the health and reflection clients.
    pub async fn channel(&self) -> Channel {
        Endpoint::from_shared(self.endpoint())
            .expect("valid endpoint")
            .connect()
            .await
            .expect("channel connects")
    }

    pub async fn client(&self) -> AccessLogServiceClient<Channel> {
        AccessLogServiceClient::connect(self.endpoint())
            .await
            .expect("client connects")
    }

    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().expect("lock").clone()
    }

    /// Value of the series of `name` carrying every `(key, value)` in `tags`.
    pub async fn counter(&self, name: &str, tags: &[(&str, &str)]) -> Option<u64> {
        let samples = self.aggregator.snapshot().await.expect("snapshot");
        samples
            .into_iter()
            .find(|s| {
                s.name.as_str() == name
                    && tags
                        .iter()
                        .all(|(k, v)| s.tags.iter().any(|(sk, sv)| sk == *k && sv == *v))
            })
            .map(|s| s.value)
    }

    /// Polls the series until it holds `expected`, for up to 5s.
    pub async fn wait_for_counter(&self, name: &str, tags: &[(&str, &str)], expected: u64) {
        let reached = timeout(Duration::from_secs(5), async {
            while self.counter(name, tags).await != Some(expected) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "{name} {tags:?} never reached {expected}, last {:?}",
            self.counter(name, tags).await
        );
    }

    /// Cancels the server and returns what `run` returned.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.cancel.cancel();
        let result = timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server should stop after cancellation")
            .expect("server task should not panic");
        self.aggregator.shutdown().expect("aggregator running");
        self.aggregator_task.await.expect("aggregator task");
        result
    }
}

pub fn identifier(node_id: &str) -> Identifier {
    Identifier {
        node: Some(Node {
            id: node_id.to_string(),
            cluster: "edge".to_string(),
        }),
        log_name: "als".to_string(),
    }
}

/// One HTTP batch, one entry per path, all answered with `response_code`.
pub fn http_message(
    node_id: Option<&str>,
    paths: &[&str],
    response_code: Option<u32>,
) -> StreamAccessLogsMessage {
    StreamAccessLogsMessage {
        identifier: node_id.map(identifier),
        log_entries: Some(LogEntries::HttpLogs(HttpAccessLogEntries {
            log_entry: paths
                .iter()
                .map(|path| HttpAccessLogEntry {
                    common_properties: Some(CommonProperties {
                        upstream_cluster: "svcA".to_string(),
                        route_name: "default".to_string(),
                        ..Default::default()
                    }),
                    request: Some(HttpRequestProperties {
                        path: path.to_string(),
                        original_path: path.to_string(),
                        ..Default::default()
                    }),
                    response: Some(HttpResponseProperties { response_code }),
                    ..Default::default()
                })
                .collect(),
        })),
    }
}

/// Polls `condition` every 10ms for up to 5s.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
