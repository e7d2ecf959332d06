// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context};

const DEFAULT_LISTEN_ADDRESS: &str = ":9104";
const DEFAULT_TELEMETRY_PATH: &str = "/metrics";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    pub listen_address: SocketAddr,
    /// Path serving the metrics, always starting with `/`.
    pub telemetry_path: String,
    /// Suppresses per-line error logs. Errors are still counted.
    pub silent: bool,
    pub log_level: String,
    /// Serve over TLS when both a certificate and a key are configured.
    pub tls: Option<TlsPaths>,
}

/// PEM files for the TLS listener. The key must not be encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl ExporterConfig {
    pub fn from_env() -> anyhow::Result<ExporterConfig> {
        let listen_address = env::var("RSYSLOG_EXPORTER_LISTEN_ADDRESS")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDRESS.to_string());
        let listen_address = parse_listen_address(&listen_address)?;

        let telemetry_path = env::var("RSYSLOG_EXPORTER_TELEMETRY_PATH")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_PATH.to_string());
        if !telemetry_path.starts_with('/') {
            return Err(anyhow!(
                "telemetry path must start with '/', got: {telemetry_path}"
            ));
        }

        let silent = env::var("RSYSLOG_EXPORTER_SILENT")
            .map(|val| matches!(val.to_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        let log_level = env::var("RSYSLOG_EXPORTER_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let tls = match (
            non_empty_var("RSYSLOG_EXPORTER_TLS_SERVER_CRT"),
            non_empty_var("RSYSLOG_EXPORTER_TLS_SERVER_KEY"),
        ) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "Both RSYSLOG_EXPORTER_TLS_SERVER_CRT and RSYSLOG_EXPORTER_TLS_SERVER_KEY must be specified"
                ))
            }
        };

        Ok(ExporterConfig {
            listen_address,
            telemetry_path,
            silent,
            log_level,
            tls,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|val| !val.is_empty())
}

/// Parses `host:port`, where an empty host (`:9104`) means every interface.
fn parse_listen_address(address: &str) -> anyhow::Result<SocketAddr> {
    let address = match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => address.to_string(),
    };
    address
        .parse()
        .with_context(|| format!("invalid listen address: {address}"))
}
