// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Plain-text debug endpoint. `GET /metrics` renders every counter series held
//! by the aggregator, one per line:
//!
//! ```text
//! accesslogs.requests{cluster="svcA",request_path="/foo",response_code="200"} 3
//! ```
//!
//! `GET /metrics.json` returns the same series as a JSON array.

use crate::error::ServerError;
use crate::metrics::aggregator_service::{AggregatorHandle, CounterSample};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::Write;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const METRICS_PATH: &str = "/metrics";
pub const METRICS_JSON_PATH: &str = "/metrics.json";

#[derive(Debug, Serialize)]
struct SeriesView<'a> {
    name: &'a str,
    tags: BTreeMap<&'a str, &'a str>,
    value: u64,
}

pub struct DebugServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    aggregator: AggregatorHandle,
}

impl DebugServer {
    pub async fn bind(addr: SocketAddr, aggregator: AggregatorHandle) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!("Debug server listening at [{local_addr}]");
        Ok(Self {
            listener,
            local_addr,
            aggregator,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let server = hyper::server::conn::http1::Builder::new();
        let mut joinset = tokio::task::JoinSet::new();

        loop {
            let conn = tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Debug server on {} stopping", self.local_addr);
                    joinset.abort_all();
                    return Ok(());
                }
                con_res = self.listener.accept() => match con_res {
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::ConnectionAborted
                                | io::ErrorKind::ConnectionReset
                                | io::ErrorKind::ConnectionRefused
                        ) =>
                    {
                        continue;
                    }
                    Err(e) => {
                        error!("Debug server error: {e}");
                        return Err(ServerError::Accept(e));
                    }
                    Ok((conn, _)) => conn,
                },
                finished = async {
                    match joinset.join_next().await {
                        Some(finished) => finished,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!("Debug connection handler panicked: {:?}", e);
                        }
                    }
                    continue;
                },
            };

            let conn = hyper_util::rt::TokioIo::new(conn);
            let server = server.clone();
            let aggregator = self.aggregator.clone();
            joinset.spawn(async move {
                let service = service_fn(move |req| {
                    let aggregator = aggregator.clone();
                    async move { Ok::<_, Infallible>(handle(req, &aggregator).await) }
                });
                if let Err(e) = server.serve_connection(conn, service).await {
                    debug!("Debug connection error: {e}");
                }
            });
        }
    }
}

const TEXT: &str = "text/plain; charset=utf-8";
const JSON: &str = "application/json";

async fn handle(req: Request<Incoming>, aggregator: &AggregatorHandle) -> Response<Full<Bytes>> {
    let path = req.uri().path();
    if req.method() != Method::GET || (path != METRICS_PATH && path != METRICS_JSON_PATH) {
        return respond(StatusCode::NOT_FOUND, TEXT, "not found\n".to_string());
    }

    let samples = match aggregator.snapshot().await {
        Ok(samples) => samples,
        Err(e) => {
            error!("Failed to read counters: {e}");
            return respond(StatusCode::SERVICE_UNAVAILABLE, TEXT, format!("{e}\n"));
        }
    };

    if path == METRICS_JSON_PATH {
        match render_metrics_json(&samples) {
            Ok(body) => respond(StatusCode::OK, JSON, body),
            Err(e) => {
                error!("Failed to encode counters: {e}");
                respond(StatusCode::INTERNAL_SERVER_ERROR, TEXT, format!("{e}\n"))
            }
        }
    } else {
        respond(StatusCode::OK, TEXT, render_metrics(&samples))
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(content_type),
    );
    response
}

pub fn render_metrics_json(samples: &[CounterSample]) -> Result<String, serde_json::Error> {
    let series: Vec<SeriesView<'_>> = samples
        .iter()
        .map(|sample| SeriesView {
            name: sample.name.as_str(),
            tags: sample.tags.iter().collect(),
            value: sample.value,
        })
        .collect();
    serde_json::to_string(&series)
}

/// One line per series, in snapshot order.
pub fn render_metrics(samples: &[CounterSample]) -> String {
    let mut out = String::new();
    for sample in samples {
        out.push_str(sample.name.as_str());
        if !sample.tags.is_empty() {
            out.push('{');
            for (i, (key, value)) in sample.tags.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(key);
                out.push_str("=\"");
                escape_into(&mut out, value);
                out.push('"');
            }
            out.push('}');
        }
        // writing to a String cannot fail
        let _ = writeln!(out, " {}", sample.value);
    }
    out
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}
