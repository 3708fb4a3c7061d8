// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use mqlens_core::AdapterSettings;
use serde::{Deserialize, Serialize};

/// Top-level mqlens configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MqlensConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Local SQLite database holding profiles and the vault.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Bounded waits applied to every broker request.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Browse, drain and lease tuning.
    #[serde(default)]
    pub browse: BrowseConfig,

    /// Change-notification bus settings.
    #[serde(default)]
    pub events: EventsConfig,
}

impl MqlensConfig {
    /// Adapter knobs derived from the timeout and browse sections.
    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
            operation_timeout: Duration::from_secs(self.timeouts.operation_secs),
            receive_wait: Duration::from_secs(self.timeouts.receive_wait_secs),
            batch_size: self.browse.batch_size,
            holding_queue_prefix: self.browse.holding_queue_prefix.clone(),
            lease_duration: Duration::from_secs(self.browse.lease_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("mqlens").join("mqlens.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("mqlens.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Argon2id parameters for the vault's passphrase-derived wrapping key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,

    #[serde(default = "default_operation_secs")]
    pub operation_secs: u64,

    /// Get-with-wait interval when polling a queue for its next message.
    #[serde(default = "default_receive_wait_secs")]
    pub receive_wait_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            operation_secs: default_operation_secs(),
            receive_wait_secs: default_receive_wait_secs(),
        }
    }
}

fn default_connect_secs() -> u64 {
    10
}

fn default_operation_secs() -> u64 {
    10
}

fn default_receive_wait_secs() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrowseConfig {
    /// Page size used by the CLI when `--limit` is not given.
    #[serde(default = "default_browse_limit")]
    pub default_limit: usize,

    /// Messages moved per round trip during drain, replay and leasing.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_holding_queue_prefix")]
    pub holding_queue_prefix: String,

    /// Visibility/lock duration for leased messages, in seconds.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            default_limit: default_browse_limit(),
            batch_size: default_batch_size(),
            holding_queue_prefix: default_holding_queue_prefix(),
            lease_secs: default_lease_secs(),
        }
    }
}

fn default_browse_limit() -> usize {
    50
}

fn default_batch_size() -> usize {
    50
}

fn default_holding_queue_prefix() -> String {
    "mqlens.holding".to_string()
}

fn default_lease_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Broadcast buffer; slow subscribers skip events beyond this.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    256
}
