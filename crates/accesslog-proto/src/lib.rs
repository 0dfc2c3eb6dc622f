// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Generated protobuf and gRPC models for the access-log ingestion service.
//!
//! This crate compiles the `accesslog.v1` protobuf definitions with
//! `tonic-build` and re-exports the generated module, both the server trait
//! used by the sink and the client used by tests and tooling.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod v1 {
    #![allow(clippy::derive_partial_eq_without_eq)]
    tonic::include_proto!("accesslog.v1");
}

/// Encoded `FileDescriptorSet` of every compiled proto file, registered with
/// the reflection service.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("accesslog_descriptor");

/// Fully-qualified name of the ingestion service, as reported by health checks
/// and reflection.
pub const ACCESS_LOG_SERVICE_NAME: &str = "accesslog.v1.AccessLogService";
