// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the semantic constraints serde cannot express: positive timeouts,
//! batch size bounds, a usable holding queue prefix, and Argon2 minimums.

use crate::diagnostic::ConfigError;
use crate::model::MqlensConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const MAX_BATCH_SIZE: usize = 1000;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &MqlensConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    for (key, secs) in [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.operation_secs", config.timeouts.operation_secs),
        ("timeouts.receive_wait_secs", config.timeouts.receive_wait_secs),
        ("browse.lease_secs", config.browse.lease_secs),
    ] {
        if secs == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    if config.browse.default_limit == 0 {
        fail("browse.default_limit must be greater than zero".to_string());
    }

    if !(1..=MAX_BATCH_SIZE).contains(&config.browse.batch_size) {
        fail(format!(
            "browse.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
            config.browse.batch_size
        ));
    }

    let prefix = &config.browse.holding_queue_prefix;
    if prefix.is_empty() {
        fail("browse.holding_queue_prefix must not be empty".to_string());
    } else if let Some(bad) = prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        fail(format!(
            "browse.holding_queue_prefix `{prefix}` contains `{bad}`; use letters, digits, `.`, `_` or `-`"
        ));
    }

    if config.events.capacity == 0 {
        fail("events.capacity must be greater than zero".to_string());
    }

    if config.vault.kdf_memory_cost < 32768 {
        fail(format!(
            "vault.kdf_memory_cost must be at least 32768 (32 MiB), got {}",
            config.vault.kdf_memory_cost
        ));
    }

    if config.vault.kdf_iterations < 2 {
        fail(format!(
            "vault.kdf_iterations must be at least 2, got {}",
            config.vault.kdf_iterations
        ));
    }

    if config.vault.kdf_parallelism < 1 {
        fail(format!(
            "vault.kdf_parallelism must be at least 1, got {}",
            config.vault.kdf_parallelism
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
