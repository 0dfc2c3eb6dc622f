// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch processing pipeline.
//!
//! A [`Pipeline`] is an ordered, immutable list of callbacks built once at
//! startup and shared by every stream. Each received batch is handed to every
//! callback in registration order; the first failure aborts the rest of the
//! callbacks for that batch.
//!
//! ```text
//!   LogBatch ──> callback 0 ──> callback 1 ──> ... ──> Ok(())
//!                    │              │
//!                    └── Err ───────┴──> ProcessError (stream ends)
//! ```

use crate::batch::{HttpEntry, LogBatch, StreamIdentifier, TcpEntry};
use crate::error::ProcessError;
use crate::metrics::registry::Counter;
use crate::metrics::tags::{CLUSTER, REQUEST_PATH, RESPONSE_CODE};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-stream metadata handed to every callback.
#[derive(Debug, Clone, Default)]
pub struct StreamContext {
    pub peer: Option<SocketAddr>,
    /// Sent by the proxy on the first message of the stream.
    pub identifier: Option<StreamIdentifier>,
}

impl StreamContext {
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            peer,
            identifier: None,
        }
    }

    fn node_id(&self) -> &str {
        self.identifier
            .as_ref()
            .map(|i| i.node_id.as_str())
            .unwrap_or_default()
    }

    fn log_name(&self) -> &str {
        self.identifier
            .as_ref()
            .map(|i| i.log_name.as_str())
            .unwrap_or_default()
    }
}

/// A side effect run for every received batch. Must not block: it runs inline
/// on the stream's task, before the next message is read.
pub trait AccessLogCallback: Send + Sync {
    /// Short name used in errors and logs.
    fn name(&self) -> &'static str {
        "callback"
    }

    fn on_batch(&self, ctx: &StreamContext, batch: &LogBatch) -> Result<(), ProcessError>;
}

impl<F> AccessLogCallback for F
where
    F: Fn(&StreamContext, &LogBatch) -> Result<(), ProcessError> + Send + Sync,
{
    fn on_batch(&self, ctx: &StreamContext, batch: &LogBatch) -> Result<(), ProcessError> {
        self(ctx, batch)
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    callbacks: Vec<Arc<dyn AccessLogCallback>>,
}

impl PipelineBuilder {
    pub fn callback(mut self, callback: impl AccessLogCallback + 'static) -> Self {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            callbacks: self.callbacks.into(),
        }
    }
}

/// Ordered callback list. Cloning shares the same callbacks.
#[derive(Clone)]
pub struct Pipeline {
    callbacks: Arc<[Arc<dyn AccessLogCallback>]>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.callbacks.iter().map(|c| c.name()))
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The pipeline every sink runs: one [`AccessLogRecorder`].
    pub fn standard(requests: Counter) -> Pipeline {
        Pipeline::builder()
            .callback(AccessLogRecorder::new(requests))
            .build()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn process(&self, ctx: &StreamContext, batch: &LogBatch) -> Result<(), ProcessError> {
        for callback in self.callbacks.iter() {
            callback.on_batch(ctx, batch)?;
        }
        Ok(())
    }
}

/// Counts every HTTP entry and writes one structured record per entry.
pub struct AccessLogRecorder {
    requests: Counter,
}

impl AccessLogRecorder {
    pub fn new(requests: Counter) -> Self {
        Self { requests }
    }

    fn record_http(&self, ctx: &StreamContext, entry: &HttpEntry) {
        let response_code = entry
            .response_code
            .map(|code| code.to_string())
            .unwrap_or_default();

        // metric loss is tolerated; the record below is still written
        if let Err(e) = self.requests.increment(&[
            (REQUEST_PATH, entry.request_path.as_str()),
            (RESPONSE_CODE, response_code.as_str()),
            (CLUSTER, entry.upstream_cluster.as_str()),
        ]) {
            warn!("Failed to count access-log request: {}", e);
        }

        info!(
            protocol_version = entry.protocol_version,
            request_path = %entry.request_path,
            request_original_path = %entry.request_original_path,
            request_method = entry.request_method,
            response_code = %response_code,
            cluster = %entry.upstream_cluster,
            route_name = %entry.route_name,
            start_time = ?entry.start_time.map(|t| t.to_rfc3339()),
            time_to_last_upstream_tx_byte = ?entry.time_to_last_upstream_tx_byte,
            node_id = ctx.node_id(),
            log_name = ctx.log_name(),
            "received http request"
        );
    }

    fn record_tcp(&self, ctx: &StreamContext, entry: &TcpEntry) {
        info!(
            upstream_cluster = %entry.upstream_cluster,
            route_name = %entry.route_name,
            node_id = ctx.node_id(),
            log_name = ctx.log_name(),
            "received tcp request"
        );
    }
}

impl AccessLogCallback for AccessLogRecorder {
    fn name(&self) -> &'static str {
        "access_log_recorder"
    }

    fn on_batch(&self, ctx: &StreamContext, batch: &LogBatch) -> Result<(), ProcessError> {
        match batch {
            LogBatch::HttpLogs(entries) => {
                for entry in entries {
                    self.record_http(ctx, entry);
                }
            }
            LogBatch::TcpLogs(entries) => {
                for entry in entries {
                    self.record_tcp(ctx, entry);
                }
            }
            LogBatch::Empty => {}
        }
        Ok(())
    }
}
