// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingestion stream handling.
//!
//! One [`StreamHandler`] is shared by every connection. For each stream it
//! reads messages strictly in order and runs the pipeline on each one before
//! reading the next, so a slow callback slows the sender down through the
//! transport's flow control and nothing else.

use crate::batch::InboundMessage;
use crate::metrics::registry::Counter;
use crate::metrics::tags::{MESSAGE_KIND, STREAM_STATUS};
use crate::metrics::AccessLogMetrics;
use crate::processor::{Pipeline, StreamContext};
use accesslog_proto::v1::access_log_service_server::AccessLogService;
use accesslog_proto::v1::{StreamAccessLogsMessage, StreamAccessLogsResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Request, Response, Status, Streaming};
use tracing::{debug, error, warn};

/// What a stream delivered before it ended cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub batches: u64,
    pub entries: u64,
}

pub struct StreamHandler {
    pipeline: Pipeline,
    received_messages: Counter,
    completed_streams: Counter,
    shutdown: CancellationToken,
}

impl StreamHandler {
    /// `shutdown` ends every open stream with `UNAVAILABLE` once cancelled.
    pub fn new(pipeline: Pipeline, metrics: &AccessLogMetrics, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            received_messages: metrics.received_messages.clone(),
            completed_streams: metrics.completed_streams.clone(),
            shutdown,
        }
    }

    /// Consumes `stream` until the peer closes it, a receive fails, a batch
    /// fails processing, or the server shuts down.
    pub async fn handle_stream<S>(
        &self,
        peer: Option<SocketAddr>,
        stream: S,
    ) -> Result<StreamSummary, Status>
    where
        S: Stream<Item = Result<StreamAccessLogsMessage, Status>> + Send,
    {
        debug!("Access-log stream opened by {:?}", peer);

        let result = self.consume(peer, stream).await;

        // tonic reports a peer that aborts mid-stream as end-of-stream, so
        // those land in "ok" too
        let outcome = match &result {
            Ok(summary) => {
                debug!(
                    "Access-log stream from {:?} closed after {} batches ({} entries)",
                    peer, summary.batches, summary.entries
                );
                "ok"
            }
            Err(status) if status.code() == Code::Unavailable && self.shutdown.is_cancelled() => {
                debug!("Access-log stream from {:?} stopped by shutdown", peer);
                "cancelled"
            }
            Err(status) => {
                warn!("Access-log stream from {:?} failed: {}", peer, status);
                "error"
            }
        };
        if let Err(e) = self.completed_streams.increment(&[(STREAM_STATUS, outcome)]) {
            debug!("Failed to count completed stream: {}", e);
        }

        result
    }

    async fn consume<S>(&self, peer: Option<SocketAddr>, stream: S) -> Result<StreamSummary, Status>
    where
        S: Stream<Item = Result<StreamAccessLogsMessage, Status>> + Send,
    {
        tokio::pin!(stream);

        let mut ctx = StreamContext::new(peer);
        let mut summary = StreamSummary::default();

        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    return Err(Status::unavailable("access-log server is shutting down"));
                }
                next = stream.next() => next,
            };

            let message = match next {
                None => return Ok(summary),
                Some(Err(status)) => return Err(status),
                Some(Ok(message)) => InboundMessage::from(message),
            };

            if let Some(identifier) = message.identifier {
                ctx.identifier = Some(identifier);
            }

            let batch = message.batch;
            if let Err(e) = self
                .received_messages
                .increment(&[(MESSAGE_KIND, batch.kind())])
            {
                debug!("Failed to count received message: {}", e);
            }

            if let Err(e) = self.pipeline.process(&ctx, &batch) {
                error!("Failed to process access-log batch from {:?}: {}", peer, e);
                return Err(e.into());
            }

            summary.batches += 1;
            summary.entries += batch.len() as u64;
        }
    }
}

/// tonic service wrapper around a shared [`StreamHandler`].
#[derive(Clone)]
pub struct IngestionService {
    handler: Arc<StreamHandler>,
}

impl IngestionService {
    pub fn new(handler: Arc<StreamHandler>) -> Self {
        Self { handler }
    }
}

#[tonic::async_trait]
impl AccessLogService for IngestionService {
    async fn stream_access_logs(
        &self,
        request: Request<Streaming<StreamAccessLogsMessage>>,
    ) -> Result<Response<StreamAccessLogsResponse>, Status> {
        let peer = request.remote_addr();
        self.handler
            .handle_stream(peer, request.into_inner())
            .await?;
        Ok(Response::new(StreamAccessLogsResponse {}))
    }
}
