use crate::form::{GROUPED_LIMIT_CAP, RAW_LIMIT_CAP};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// Trusted target table, inlined into every statement.
    pub table: String,
    pub schema_columns: Vec<String>,
    pub schema_ttl: Duration,
    pub api_key: Option<String>,
    pub default_limit: i64,
    pub max_grouped_limit: i64,
    pub max_raw_limit: i64,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    mvrq_listen_addr: Option<String>,
    #[serde(default)]
    mvrq_listen_host: Option<String>,
    #[serde(default)]
    mvrq_listen_port: Option<u16>,
    #[serde(default = "default_table")]
    mvrq_table: String,
    #[serde(default)]
    mvrq_schema_columns: Option<String>,
    #[serde(default = "default_schema_ttl_secs")]
    mvrq_schema_ttl_secs: u64,
    #[serde(default)]
    mvrq_api_key: Option<String>,
    #[serde(default = "default_limit")]
    mvrq_default_limit: i64,
    #[serde(default = "default_max_grouped_limit")]
    mvrq_max_grouped_limit: i64,
    #[serde(default = "default_max_raw_limit")]
    mvrq_max_raw_limit: i64,
}

fn default_table() -> String {
    "mvr".to_string()
}

const fn default_schema_ttl_secs() -> u64 {
    3600
}

const fn default_limit() -> i64 {
    100
}

const fn default_max_grouped_limit() -> i64 {
    GROUPED_LIMIT_CAP
}

const fn default_max_raw_limit() -> i64 {
    RAW_LIMIT_CAP
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse MVRQ_* environment variables")?;

        let listen_addr = resolve_addr(
            raw.mvrq_listen_addr,
            raw.mvrq_listen_host,
            raw.mvrq_listen_port,
        )?;

        let table = raw.mvrq_table.trim().to_string();
        ensure!(!table.is_empty(), "MVRQ_TABLE must not be empty");

        let schema_columns = raw
            .mvrq_schema_columns
            .as_deref()
            .map(split_columns)
            .filter(|columns| !columns.is_empty())
            .context("MVRQ_SCHEMA_COLUMNS must list the table's columns")?;

        Ok(Self {
            listen_addr,
            table,
            schema_columns,
            schema_ttl: Duration::from_secs(raw.mvrq_schema_ttl_secs),
            api_key: raw.mvrq_api_key.filter(|key| !key.is_empty()),
            default_limit: raw.mvrq_default_limit.max(1),
            max_grouped_limit: raw.mvrq_max_grouped_limit.clamp(1, GROUPED_LIMIT_CAP),
            max_raw_limit: raw.mvrq_max_raw_limit.clamp(1, RAW_LIMIT_CAP),
        })
    }

    /// Configuration for in-process use where no listener or environment is involved.
    pub fn embedded<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            table: table.into(),
            schema_columns: columns.into_iter().map(Into::into).collect(),
            schema_ttl: Duration::from_secs(default_schema_ttl_secs()),
            api_key: None,
            default_limit: default_limit(),
            max_grouped_limit: GROUPED_LIMIT_CAP,
            max_raw_limit: RAW_LIMIT_CAP,
        }
    }
}

fn split_columns(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid MVRQ_LISTEN_ADDR value")?
            .next()
            .context("MVRQ_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(8490);
    format!("{host}:{port}")
        .to_socket_addrs()
        .context("invalid listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}
