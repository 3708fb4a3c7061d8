// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mqlens profiles` and `mqlens adapters`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use colored::Colorize;
use mqlens_core::{ConnectionProfile, ProviderType};
use serde_json::{Value, json};

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::output::{Output, print_table};

#[derive(Subcommand, Debug)]
pub enum ProfilesCommand {
    /// List saved profiles.
    List,
    /// Show one profile (secrets are never shown).
    Show {
        /// Profile id or name.
        profile: String,
    },
    /// Add a profile. Secret fields in the parameters go to the vault.
    Add {
        name: String,
        /// Broker type, e.g. rabbitmq or awssqs.
        #[arg(long)]
        provider: ProviderType,
        /// Connection parameters as a JSON object.
        #[arg(long, conflicts_with = "params_file")]
        params: Option<String>,
        /// Read connection parameters from a JSON file.
        #[arg(long)]
        params_file: Option<PathBuf>,
        /// Prompt for each secret field instead of passing it on the command line.
        #[arg(long)]
        ask_secrets: bool,
    },
    /// Write every profile as a JSON array.
    Export {
        /// Include secrets from the vault.
        #[arg(long)]
        include_secrets: bool,
        /// Output file; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Import profiles from a JSON array (`-` reads stdin).
    Import { path: String },
    /// Delete a profile and its secrets.
    Delete { profile: String },
}

pub async fn run(ctx: &AppContext, out: Output, command: ProfilesCommand) -> CliResult {
    match command {
        ProfilesCommand::List => list(ctx, out).await,
        ProfilesCommand::Show { profile } => {
            let profile = ctx.resolve_profile(&profile).await?;
            out.emit(&profile, |p| {
                println!("{}", p.name.bold());
                println!("  id:       {}", p.id);
                println!("  provider: {}", p.provider_type());
                let params = serde_json::to_value(&p.params)
                    .ok()
                    .and_then(|mut v| v.get_mut("connectionParams").map(Value::take));
                if let Some(Value::Object(params)) = params {
                    for (key, value) in params {
                        println!("  {key}: {value}");
                    }
                }
            })
        }
        ProfilesCommand::Add {
            name,
            provider,
            params,
            params_file,
            ask_secrets,
        } => {
            let raw = match (params, params_file) {
                (Some(inline), _) => inline,
                (None, Some(path)) => read_file(&path)?,
                (None, None) => "{}".to_string(),
            };
            let mut profile = build_profile(&name, provider, &raw)?;
            if ask_secrets {
                prompt_secrets(&mut profile)?;
            }
            let saved = ctx.manager.profiles().save(profile).await?;
            out.emit(&saved, |p| {
                println!("{} saved profile {} ({})", "✓".green(), p.name.bold(), p.id);
            })
        }
        ProfilesCommand::Export {
            include_secrets,
            output,
        } => {
            let profiles = ctx.manager.profiles().export(include_secrets).await?;
            let body = serde_json::to_string_pretty(&profiles)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, body)
                        .map_err(|e| CliError::io(path.display().to_string(), e))?;
                    out.done(&format!(
                        "exported {} profiles to {}",
                        profiles.len(),
                        path.display()
                    ))
                }
                None => {
                    println!("{body}");
                    Ok(())
                }
            }
        }
        ProfilesCommand::Import { path } => {
            let body = if path == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| CliError::io("<stdin>", e))?;
                buf
            } else {
                read_file(Path::new(&path))?
            };
            let report = ctx.manager.profiles().import(&body).await?;
            out.emit(&report, |r| {
                println!("{} imported {} profiles", "✓".green(), r.imported.len());
                for skipped in &r.skipped {
                    println!(
                        "  {} record {}: {}",
                        "skipped".yellow(),
                        skipped.index,
                        skipped.reason
                    );
                }
            })
        }
        ProfilesCommand::Delete { profile } => {
            let profile = ctx.resolve_profile(&profile).await?;
            let removed = ctx.manager.delete_profile(&profile.id).await?;
            out.done(&format!("deleted profile {} ({})", removed.name, removed.id))
        }
    }
}

async fn list(ctx: &AppContext, out: Output) -> CliResult {
    let profiles = ctx.manager.profiles().list().await?;
    out.emit(&profiles, |profiles| {
        let rows: Vec<Vec<String>> = profiles
            .iter()
            .map(|p| vec![p.id.clone(), p.name.clone(), p.provider_type().to_string()])
            .collect();
        print_table(&["ID", "NAME", "PROVIDER"], &rows);
    })
}

/// `mqlens adapters`: the registry with each entry's status.
pub fn adapters(ctx: &AppContext, out: Output) -> CliResult {
    let entries: Vec<Value> = ctx
        .manager
        .registry()
        .list_all()
        .iter()
        .map(|e| {
            json!({
                "name": e.manifest.name,
                "providerType": e.manifest.provider_type,
                "version": e.manifest.version,
                "status": e.status.to_string(),
                "capabilities": e.manifest.capabilities,
                "description": e.manifest.description,
            })
        })
        .collect();
    out.emit(&entries, |entries| {
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|e| {
                ["name", "version", "status", "description"]
                    .iter()
                    .map(|k| e[*k].as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .collect();
        print_table(&["NAME", "VERSION", "STATUS", "DESCRIPTION"], &rows);
    })
}

fn read_file(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|e| CliError::io(path.display().to_string(), e))
}

/// Assembles a profile from a name, provider and a JSON parameter object.
pub fn build_profile(name: &str, provider: ProviderType, params: &str) -> CliResult<ConnectionProfile> {
    let params: Value = serde_json::from_str(params)?;
    if !params.is_object() {
        return Err(CliError::usage("connection parameters must be a JSON object"));
    }
    let record = json!({
        "name": name,
        "providerType": provider,
        "connectionParams": params,
    });
    Ok(serde_json::from_value(record)?)
}

fn prompt_secrets(profile: &mut ConnectionProfile) -> CliResult {
    for &field in profile.params.secret_fields() {
        let value = rpassword::prompt_password(format!("{field} (empty to skip): "))
            .map_err(|e| CliError::io("<tty>", e))?;
        if value.is_empty() {
            continue;
        }
        if let Some(slot) = profile.params.secret_slot_mut(field) {
            *slot = Some(value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use mqlens_core::{ConnectionParams, SecretField};

    use super::*;

    #[test]
    fn profile_from_params_json() {
        let profile = build_profile(
            "local",
            ProviderType::RabbitMq,
            r#"{"host": "rabbit.local", "username": "guest", "password": "pw"}"#,
        )
        .unwrap();
        assert_eq!(profile.name, "local");
        assert!(profile.id.is_empty());
        assert!(matches!(profile.params, ConnectionParams::RabbitMq(ref p) if p.host == "rabbit.local"));
        assert_eq!(profile.params.secret(SecretField::Password), Some("pw"));
    }

    #[test]
    fn params_must_be_an_object() {
        let err = build_profile("x", ProviderType::Kafka, "[1]").unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[test]
    fn missing_required_params_fail() {
        let err = build_profile("x", ProviderType::AwsSqs, "{}").unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
    }
}
