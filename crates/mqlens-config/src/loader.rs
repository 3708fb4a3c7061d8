// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./mqlens.toml` > `~/.config/mqlens/mqlens.toml` >
//! `/etc/mqlens/mqlens.toml` with environment variable overrides via the
//! `MQLENS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MqlensConfig;

/// Config sections, used to map `MQLENS_<SECTION>_<KEY>` onto `section.key`.
const SECTIONS: &[&str] = &["logging", "storage", "vault", "timeouts", "browse", "events"];

pub const SYSTEM_CONFIG_PATH: &str = "/etc/mqlens/mqlens.toml";
pub const LOCAL_CONFIG_FILE: &str = "mqlens.toml";

/// `~/.config/mqlens/mqlens.toml`, when a config dir is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mqlens").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/mqlens/mqlens.toml`
/// 3. `~/.config/mqlens/mqlens.toml`
/// 4. `./mqlens.toml`
/// 5. `MQLENS_*` environment variables
pub fn load_config() -> Result<MqlensConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MqlensConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MqlensConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MqlensConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MqlensConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MqlensConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider mapping `MQLENS_BROWSE_BATCH_SIZE` to
/// `browse.batch_size`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// underscore-containing keys survive intact.
fn env_provider() -> Env {
    Env::prefixed("MQLENS_")
        .ignore(&["VAULT_KEY"])
        .map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
