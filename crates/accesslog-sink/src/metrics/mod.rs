// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Counters emitted by the sink.

pub mod aggregator_service;
pub mod registry;
pub mod tags;

use crate::error::MetricError;
use aggregator_service::AggregatorHandle;
use registry::{Counter, CounterSpec, MetricRegistry};
use tags::{CLUSTER, MESSAGE_KIND, REQUEST_PATH, RESPONSE_CODE, STREAM_STATUS};

/// Upper bound on distinct counter series held by the aggregator.
pub const MAX_CONTEXTS: usize = 10_240;

pub const ACCESS_LOG_REQUESTS: CounterSpec = CounterSpec {
    name: "accesslogs.requests",
    description: "The number of requests, as noted in access logs (which are lossy)",
    unit: "1",
    tag_keys: &[REQUEST_PATH, RESPONSE_CODE, CLUSTER],
};

pub const RECEIVED_MESSAGES: CounterSpec = CounterSpec {
    name: "accesslogs.server.received_messages",
    description: "Messages received on ingestion streams, by batch kind",
    unit: "1",
    tag_keys: &[MESSAGE_KIND],
};

pub const COMPLETED_STREAMS: CounterSpec = CounterSpec {
    name: "accesslogs.server.completed_streams",
    description: "Ingestion streams that ended, by outcome (peer aborts count as ok)",
    unit: "1",
    tag_keys: &[STREAM_STATUS],
};

/// Declares every counter of the sink. Called once before serving.
pub fn register(aggregator: AggregatorHandle) -> Result<MetricRegistry, MetricError> {
    MetricRegistry::builder()
        .counter(ACCESS_LOG_REQUESTS)
        .counter(RECEIVED_MESSAGES)
        .counter(COMPLETED_STREAMS)
        .build(aggregator)
}

/// Counter handles used on the ingestion path.
#[derive(Debug, Clone)]
pub struct AccessLogMetrics {
    pub requests: Counter,
    pub received_messages: Counter,
    pub completed_streams: Counter,
}

impl AccessLogMetrics {
    pub fn from_registry(registry: &MetricRegistry) -> Result<Self, MetricError> {
        Ok(Self {
            requests: registry.counter(ACCESS_LOG_REQUESTS.name)?,
            received_messages: registry.counter(RECEIVED_MESSAGES.name)?,
            completed_streams: registry.counter(COMPLETED_STREAMS.name)?,
        })
    }
}
