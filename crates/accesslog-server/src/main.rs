// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use accesslog_sink::{
    config::{LogFormat, Settings},
    debug_server::DebugServer,
    logger,
    metrics::{self, aggregator_service::AggregatorService, AccessLogMetrics, MAX_CONTEXTS},
    processor::Pipeline,
    AccessLogger, ServerError,
};

#[tokio::main]
pub async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            let _ = logger::init("info", LogFormat::Text);
            error!("Error reading access-log server settings: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = logger::init(&settings.log_level, settings.log_format) {
        eprintln!("Error initializing logger: {e}");
        process::exit(1);
    }
    debug!("Access-log server settings: {:?}", settings);

    let (aggregator_service, aggregator) = AggregatorService::new(MAX_CONTEXTS);
    let aggregator_task = tokio::spawn(aggregator_service.run());

    let metrics = match metrics::register(aggregator.clone())
        .and_then(|registry| AccessLogMetrics::from_registry(&registry))
    {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("Error registering access-log counters: {e}");
            process::exit(1);
        }
    };

    let cancel = CancellationToken::new();

    if let Some(debug_addr) = settings.debug_addr() {
        match DebugServer::bind(debug_addr, aggregator.clone()).await {
            Ok(debug_server) => {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if let Err(e) = debug_server.serve(cancel).await {
                        error!("Debug server stopped: {e}");
                    }
                });
            }
            Err(e) => {
                error!("Error starting debug server: {e}");
                process::exit(1);
            }
        }
    } else {
        info!("Debug server disabled");
    }

    tokio::spawn(wait_for_signal(cancel.clone()));

    let pipeline = Pipeline::standard(metrics.requests.clone());
    let access_logger = AccessLogger::new(settings, pipeline, metrics);

    let result = access_logger.run(cancel.clone()).await;
    cancel.cancel();

    if aggregator.shutdown().is_ok() {
        let _ = aggregator_task.await;
    }

    match result {
        Ok(()) | Err(ServerError::Cancelled) => info!("Access-log server shut down"),
        Err(e) => {
            error!("Access-log server failed: {e}");
            process::exit(1);
        }
    }
}

/// Cancels `cancel` on ctrl-c or, on unix, SIGTERM.
async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received ctrl-c, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                error!("Error installing SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received ctrl-c, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received ctrl-c, shutting down");
    }
    cancel.cancel();
}
