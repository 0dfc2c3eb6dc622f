// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Access-log sink
//!
//! A long-running gRPC server that accepts streamed batches of HTTP/TCP
//! access-log entries pushed by proxies, turns every entry into a structured
//! log record and a tagged request counter, and reports its health.
//!
//! ## Architecture
//!
//! - [`metrics`]: counter declarations, tag vocabulary and the aggregator actor
//! - [`processor`]: the ordered callback pipeline run for every batch
//! - [`stream`]: per-connection stream handling and the tonic service
//! - [`server`]: listener, RPC dispatch (ingestion, health, reflection)
//! - [`lifecycle`]: startup, cancellation watcher, shutdown
//! - [`debug_server`]: plain-text `/metrics` endpoint for operators

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod debug_server;
pub mod error;
pub mod lifecycle;
pub mod logger;
pub mod metrics;
pub mod processor;
pub mod server;
pub mod stream;

pub use config::Settings;
pub use error::{ProcessError, ServerError};
pub use lifecycle::{AccessLogger, LifecycleHandle, ServiceLifecycleState};
