// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

/// Errors raised while reading or validating [`crate::Settings`].
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A callback refused a batch. Aborts the rest of the pipeline for that batch
/// and terminates the stream that carried it.
#[derive(Debug, thiserror::Error)]
#[error("callback '{callback}' failed: {reason}")]
pub struct ProcessError {
    pub callback: &'static str,
    pub reason: String,
}

impl ProcessError {
    pub fn new(callback: &'static str, reason: impl Into<String>) -> Self {
        Self {
            callback,
            reason: reason.into(),
        }
    }
}

impl From<ProcessError> for tonic::Status {
    fn from(e: ProcessError) -> Self {
        tonic::Status::internal(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("counter '{0}' is registered more than once")]
    DuplicateCounter(&'static str),

    #[error("unknown counter '{0}'")]
    UnknownCounter(String),

    #[error("tag '{tag}' is not declared for counter '{counter}'")]
    UndeclaredTag { counter: &'static str, tag: String },

    #[error("metric aggregator is not running")]
    AggregatorClosed,
}

/// Errors surfaced by the service host and the lifecycle controller.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to announce on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to build reflection service: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    #[error("gRPC server error: {0}")]
    Serve(#[from] tonic::transport::Error),

    #[error("server stopped: cancellation requested")]
    Cancelled,
}

impl ServerError {
    /// True when the server stopped because its cancellation token fired.
    /// Every other error is fatal to the process.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ServerError::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("could not parse log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("could not install global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}
