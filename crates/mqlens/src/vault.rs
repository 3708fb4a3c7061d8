// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mqlens vault` commands.

use std::io::IsTerminal;

use clap::Subcommand;
use secrecy::SecretString;
use serde_json::json;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::output::{Output, print_table};

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// List stored secrets with masked values.
    List,
    /// Re-encrypt the vault key under a new passphrase.
    ChangePassphrase,
}

pub async fn run(ctx: &AppContext, out: Output, command: VaultCommand) -> CliResult {
    match command {
        VaultCommand::List => {
            let entries: Vec<_> = ctx
                .secrets
                .list_masked()
                .await?
                .into_iter()
                .map(|(key, masked)| json!({ "key": key, "value": masked }))
                .collect();
            out.emit(&entries, |entries| {
                let rows: Vec<Vec<String>> = entries
                    .iter()
                    .map(|e| {
                        vec![
                            e["key"].as_str().unwrap_or_default().to_string(),
                            e["value"].as_str().unwrap_or_default().to_string(),
                        ]
                    })
                    .collect();
                print_table(&["KEY", "VALUE"], &rows);
            })
        }
        VaultCommand::ChangePassphrase => {
            // Unlock with the current passphrase before asking for the new one.
            ctx.secrets.vault().await?;
            let new_passphrase = prompt_new_passphrase()?;
            ctx.secrets.change_passphrase(&new_passphrase).await?;
            out.done("vault passphrase changed")
        }
    }
}

fn prompt_new_passphrase() -> CliResult<SecretString> {
    if !std::io::stdin().is_terminal() {
        return Err(CliError::usage(
            "change-passphrase needs a terminal to read the new passphrase",
        ));
    }
    let first = rpassword::prompt_password("New vault passphrase: ")
        .map_err(|e| CliError::io("<tty>", e))?;
    let second = rpassword::prompt_password("Confirm new vault passphrase: ")
        .map_err(|e| CliError::io("<tty>", e))?;
    if first.is_empty() {
        return Err(CliError::usage("empty passphrase not allowed"));
    }
    if first != second {
        return Err(CliError::usage("passphrases do not match"));
    }
    Ok(SecretString::from(first))
}
