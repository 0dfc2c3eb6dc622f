// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::SettingsError;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

const DEFAULT_SERVER_PORT: u16 = 8083;
const DEFAULT_DEBUG_PORT: u16 = 9091;
const DEFAULT_SERVICE_NAME: &str = "AccessLog";
const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format of the process logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(SettingsError::Invalid(format!(
                "Invalid log format '{other}'. Must be one of: text, json"
            ))),
        }
    }
}

/// Startup settings of the access-log sink.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the gRPC listener binds to
    pub server_host: IpAddr,
    /// gRPC listener port
    pub server_port: u16,
    /// Port of the debug `/metrics` endpoint, 0 disables it
    pub debug_port: u16,
    /// Name reported by the health service
    pub service_name: String,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            server_port: DEFAULT_SERVER_PORT,
            debug_port: DEFAULT_DEBUG_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Settings {
    /// Create settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        let server_host = match env::var("SERVER_HOST") {
            Ok(host) => host.trim().parse::<IpAddr>().map_err(|e| {
                SettingsError::Invalid(format!("SERVER_HOST '{host}' is not an IP address: {e}"))
            })?,
            Err(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let server_port = parse_port("SERVER_PORT", DEFAULT_SERVER_PORT)?;
        let debug_port = parse_port("DEBUG_PORT", DEFAULT_DEBUG_PORT)?;
        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());
        let log_level = env::var("LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        let log_format = match env::var("LOG_FORMAT") {
            Ok(val) => val.parse()?,
            Err(_) => LogFormat::default(),
        };

        let settings = Self {
            server_host,
            server_port,
            debug_port,
            service_name,
            log_level,
            log_format,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.server_port == 0 {
            return Err(SettingsError::Invalid(
                "SERVER_PORT must be greater than 0".to_string(),
            ));
        }

        if self.debug_port != 0 && self.debug_port == self.server_port {
            return Err(SettingsError::Invalid(format!(
                "DEBUG_PORT and SERVER_PORT must differ, both are {}",
                self.server_port
            )));
        }

        if self.service_name.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "SERVICE_NAME cannot be empty".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(SettingsError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_host, self.server_port)
    }

    /// Address of the debug endpoint, `None` when disabled.
    pub fn debug_addr(&self) -> Option<SocketAddr> {
        (self.debug_port != 0).then(|| SocketAddr::new(self.server_host, self.debug_port))
    }
}

fn parse_port(var: &str, default: u16) -> Result<u16, SettingsError> {
    match env::var(var) {
        Ok(val) => val.trim().parse::<u16>().map_err(|e| {
            SettingsError::Invalid(format!("{var} '{val}' is not a valid port: {e}"))
        }),
        Err(_) => Ok(default),
    }
}
