// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Domain model of one message received on an ingestion stream.
//!
//! Wire messages are converted once, on receipt; everything downstream works
//! on [`LogBatch`] and never sees protobuf types.

use accesslog_proto::v1::{
    stream_access_logs_message::LogEntries, CommonProperties, HttpAccessLogEntry, Identifier,
    StreamAccessLogsMessage, TcpAccessLogEntry,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Identity of the proxy on the other end of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamIdentifier {
    pub node_id: String,
    pub node_cluster: String,
    pub log_name: String,
}

impl From<Identifier> for StreamIdentifier {
    fn from(identifier: Identifier) -> Self {
        let node = identifier.node.unwrap_or_default();
        Self {
            node_id: node.id,
            node_cluster: node.cluster,
            log_name: identifier.log_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpEntry {
    pub request_path: String,
    pub request_original_path: String,
    pub request_method: &'static str,
    /// `None` when the proxy sent no response, e.g. on downstream disconnect.
    pub response_code: Option<u32>,
    pub upstream_cluster: String,
    pub route_name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub time_to_last_upstream_tx_byte: Option<Duration>,
    pub protocol_version: &'static str,
}

impl From<HttpAccessLogEntry> for HttpEntry {
    fn from(entry: HttpAccessLogEntry) -> Self {
        let protocol_version = entry.protocol_version().as_str_name();
        let common = Common::from(entry.common_properties);
        let request = entry.request.unwrap_or_default();
        let request_method = request.request_method().as_str_name();

        Self {
            request_path: request.path,
            request_original_path: request.original_path,
            request_method,
            response_code: entry.response.and_then(|r| r.response_code),
            upstream_cluster: common.upstream_cluster,
            route_name: common.route_name,
            start_time: common.start_time,
            time_to_last_upstream_tx_byte: common.time_to_last_upstream_tx_byte,
            protocol_version,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpEntry {
    pub upstream_cluster: String,
    pub route_name: String,
}

impl From<TcpAccessLogEntry> for TcpEntry {
    fn from(entry: TcpAccessLogEntry) -> Self {
        let common = Common::from(entry.common_properties);
        Self {
            upstream_cluster: common.upstream_cluster,
            route_name: common.route_name,
        }
    }
}

struct Common {
    upstream_cluster: String,
    route_name: String,
    start_time: Option<DateTime<Utc>>,
    time_to_last_upstream_tx_byte: Option<Duration>,
}

impl From<Option<CommonProperties>> for Common {
    fn from(common: Option<CommonProperties>) -> Self {
        let common = common.unwrap_or_default();
        let start_time = (common.start_time_unix_nanos != 0)
            .then(|| DateTime::from_timestamp_nanos(common.start_time_unix_nanos));
        // negative latencies are malformed and dropped
        let time_to_last_upstream_tx_byte = common
            .time_to_last_upstream_tx_byte_nanos
            .and_then(|nanos| u64::try_from(nanos).ok())
            .map(Duration::from_nanos);

        Self {
            upstream_cluster: common.upstream_cluster,
            route_name: common.route_name,
            start_time,
            time_to_last_upstream_tx_byte,
        }
    }
}

/// One batch of entries of a single kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBatch {
    HttpLogs(Vec<HttpEntry>),
    TcpLogs(Vec<TcpEntry>),
    Empty,
}

impl LogBatch {
    pub fn len(&self) -> usize {
        match self {
            LogBatch::HttpLogs(entries) => entries.len(),
            LogBatch::TcpLogs(entries) => entries.len(),
            LogBatch::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short label used as a metric tag.
    pub fn kind(&self) -> &'static str {
        match self {
            LogBatch::HttpLogs(_) => "http",
            LogBatch::TcpLogs(_) => "tcp",
            LogBatch::Empty => "empty",
        }
    }
}

impl From<Option<LogEntries>> for LogBatch {
    fn from(entries: Option<LogEntries>) -> Self {
        match entries {
            Some(LogEntries::HttpLogs(http)) => {
                LogBatch::HttpLogs(http.log_entry.into_iter().map(HttpEntry::from).collect())
            }
            Some(LogEntries::TcpLogs(tcp)) => {
                LogBatch::TcpLogs(tcp.log_entry.into_iter().map(TcpEntry::from).collect())
            }
            None => LogBatch::Empty,
        }
    }
}

/// A received message split into its optional identifier and its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub identifier: Option<StreamIdentifier>,
    pub batch: LogBatch,
}

impl From<StreamAccessLogsMessage> for InboundMessage {
    fn from(message: StreamAccessLogsMessage) -> Self {
        Self {
            identifier: message.identifier.map(StreamIdentifier::from),
            batch: LogBatch::from(message.log_entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accesslog_proto::v1::{
        HttpAccessLogEntries, HttpRequestProperties, HttpResponseProperties, HttpVersion, Node,
        RequestMethod, TcpAccessLogEntries,
    };

    #[test]
    fn test_http_entry_conversion() {
        let entry = HttpAccessLogEntry {
            common_properties: Some(CommonProperties {
                upstream_cluster: "svcA".to_string(),
                route_name: "route-1".to_string(),
                start_time_unix_nanos: 1_700_000_000_000_000_000,
                time_to_last_upstream_tx_byte_nanos: Some(1_500_000),
            }),
            protocol_version: HttpVersion::Http2 as i32,
            request: Some(HttpRequestProperties {
                path: "/foo?x=1".to_string(),
                original_path: "/api/foo?x=1".to_string(),
                request_method: RequestMethod::Post as i32,
            }),
            response: Some(HttpResponseProperties {
                response_code: Some(201),
            }),
        };

        let converted = HttpEntry::from(entry);
        assert_eq!(converted.request_path, "/foo?x=1");
        assert_eq!(converted.request_original_path, "/api/foo?x=1");
        assert_eq!(converted.request_method, "POST");
        assert_eq!(converted.response_code, Some(201));
        assert_eq!(converted.upstream_cluster, "svcA");
        assert_eq!(converted.route_name, "route-1");
        assert_eq!(converted.protocol_version, "HTTP2");
        assert_eq!(
            converted.time_to_last_upstream_tx_byte,
            Some(Duration::from_micros(1_500))
        );
        assert_eq!(
            converted.start_time.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_http_entry_with_missing_parts() {
        let converted = HttpEntry::from(HttpAccessLogEntry::default());
        assert_eq!(converted.response_code, None);
        assert_eq!(converted.start_time, None);
        assert_eq!(converted.time_to_last_upstream_tx_byte, None);
        assert_eq!(converted.request_method, "REQUEST_METHOD_UNSPECIFIED");
        assert_eq!(converted.protocol_version, "HTTP_VERSION_UNSPECIFIED");
    }

    #[test]
    fn test_negative_latency_is_dropped() {
        let entry = TcpAccessLogEntry {
            common_properties: Some(CommonProperties {
                time_to_last_upstream_tx_byte_nanos: Some(-5),
                ..Default::default()
            }),
        };
        let common = Common::from(entry.common_properties);
        assert_eq!(common.time_to_last_upstream_tx_byte, None);
    }

    #[test]
    fn test_message_variants() {
        let empty = InboundMessage::from(StreamAccessLogsMessage::default());
        assert_eq!(empty.batch, LogBatch::Empty);
        assert_eq!(empty.batch.kind(), "empty");
        assert!(empty.batch.is_empty());

        let tcp = InboundMessage::from(StreamAccessLogsMessage {
            identifier: Some(Identifier {
                node: Some(Node {
                    id: "envoy-1".to_string(),
                    cluster: "edge".to_string(),
                }),
                log_name: "als".to_string(),
            }),
            log_entries: Some(LogEntries::TcpLogs(TcpAccessLogEntries {
                log_entry: vec![TcpAccessLogEntry::default(), TcpAccessLogEntry::default()],
            })),
        });
        assert_eq!(tcp.batch.kind(), "tcp");
        assert_eq!(tcp.batch.len(), 2);
        let identifier = tcp.identifier.unwrap();
        assert_eq!(identifier.node_id, "envoy-1");
        assert_eq!(identifier.node_cluster, "edge");
        assert_eq!(identifier.log_name, "als");

        let http = LogBatch::from(Some(LogEntries::HttpLogs(HttpAccessLogEntries {
            log_entry: vec![],
        })));
        assert_eq!(http, LogBatch::HttpLogs(vec![]));
        assert!(http.is_empty());
    }
}
