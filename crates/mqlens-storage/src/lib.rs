// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for mqlens.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the secret-free connection
//! profile store. The vault tables live in the same database.

pub mod database;
pub mod migrations;
pub mod profiles;

pub use database::Database;
pub use profiles::SqliteProfileStore;
