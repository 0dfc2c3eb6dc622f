// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide `tracing` subscriber.
//!
//! Access-log records are regular `tracing` events at INFO, so the level set
//! here also decides whether they are written at all.

use crate::config::LogFormat;
use crate::error::LoggerError;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter applied to every record. Transport internals are silenced.
pub fn env_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    let directives = format!("h2=off,hyper=off,tower=off,{level}");
    Ok(EnvFilter::try_new(directives)?)
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(level: &str, format: LogFormat) -> Result<(), LoggerError> {
    let filter = env_filter(level)?;

    let text = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_level(true)
            .with_thread_names(false)
            .with_thread_ids(false)
            .with_line_number(false)
            .with_file(false)
            .with_target(true)
    });
    let json = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()?;

    debug!("Logging subsystem enabled");
    Ok(())
}
