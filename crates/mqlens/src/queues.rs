// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue commands: `queues`, `queue`, `browse`, `put`, `delete`, `clear`.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use mqlens_core::{BrowseOptions, MessageFilter, PropertyMap};
use serde_json::Value;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::output::{Output, or_dash, preview, print_table};

const PREVIEW_CHARS: usize = 60;

/// Message body and properties for `put` and `publish`.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Message body as text.
    #[arg(long, short, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the body from a file. Without --data or --file, stdin is read.
    #[arg(long, short)]
    pub file: Option<PathBuf>,
    /// Message property as key=value; JSON values are kept typed.
    #[arg(long = "property", value_name = "KEY=VALUE")]
    pub properties: Vec<String>,
}

impl PayloadArgs {
    pub fn payload(&self) -> CliResult<Vec<u8>> {
        match (&self.data, &self.file) {
            (Some(data), _) => Ok(data.clone().into_bytes()),
            (None, Some(path)) => {
                std::fs::read(path).map_err(|e| CliError::io(path.display().to_string(), e))
            }
            (None, None) => {
                if std::io::stdin().is_terminal() {
                    return Err(CliError::usage("no message body: pass --data, --file or pipe stdin"));
                }
                let mut body = Vec::new();
                std::io::stdin()
                    .read_to_end(&mut body)
                    .map_err(|e| CliError::io("<stdin>", e))?;
                Ok(body)
            }
        }
    }

    pub fn property_map(&self) -> CliResult<Option<PropertyMap>> {
        if self.properties.is_empty() {
            return Ok(None);
        }
        self.properties
            .iter()
            .map(|pair| parse_property(pair))
            .collect::<CliResult<PropertyMap>>()
            .map(Some)
    }
}

/// `key=value`; the value is taken as JSON when it parses, otherwise as text.
pub fn parse_property(pair: &str) -> CliResult<(String, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .ok_or_else(|| CliError::usage(format!("property `{pair}` is not key=value")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::usage(format!("property `{pair}` has an empty key")));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

pub async fn list(ctx: &AppContext, out: Output, profile: &str, filter: Option<&str>) -> CliResult {
    let id = ctx.connect(profile).await?;
    let queues = ctx.manager.list_queues(&id, filter).await?;
    out.emit(&queues, |queues| {
        let rows: Vec<Vec<String>> = queues
            .iter()
            .map(|q| vec![q.name.clone(), or_dash(q.depth)])
            .collect();
        print_table(&["QUEUE", "DEPTH"], &rows);
    })
}

pub async fn show(ctx: &AppContext, out: Output, profile: &str, queue: &str) -> CliResult {
    let id = ctx.connect(profile).await?;
    let props = ctx.manager.get_queue_properties(&id, queue).await?;
    out.emit(&props, |p| {
        println!("{}", p.name.bold());
        println!("  depth:     {}", or_dash(p.depth));
        println!("  max depth: {}", or_dash(p.max_depth));
        println!("  durable:   {}", or_dash(p.durable));
        println!("  consumers: {}", or_dash(p.consumer_count));
        if let Some(description) = &p.description {
            println!("  {description}");
        }
        for (key, value) in &p.attributes {
            println!("  {key}: {value}");
        }
    })
}

#[derive(Args, Debug)]
pub struct BrowseArgs {
    pub queue: String,
    /// Messages to show; defaults to browse.default_limit.
    #[arg(long, short)]
    pub limit: Option<i64>,
    /// Zero-based position of the first message.
    #[arg(long, short, default_value_t = 0)]
    pub start: i64,
    #[arg(long)]
    pub message_id: Option<String>,
    #[arg(long)]
    pub correlation_id: Option<String>,
    /// Print full payloads instead of a one-line preview.
    #[arg(long)]
    pub payloads: bool,
}

impl BrowseArgs {
    pub fn options(&self, default_limit: usize) -> BrowseOptions {
        let limit = self
            .limit
            .unwrap_or_else(|| i64::try_from(default_limit).unwrap_or(i64::MAX));
        BrowseOptions::from_signed(limit, self.start).with_filter(MessageFilter {
            message_id: self.message_id.clone(),
            correlation_id: self.correlation_id.clone(),
        })
    }
}

pub async fn browse(ctx: &AppContext, out: Output, profile: &str, args: &BrowseArgs) -> CliResult {
    let id = ctx.connect(profile).await?;
    let options = args.options(ctx.config.browse.default_limit);
    let messages = ctx
        .manager
        .browse_messages(&id, &args.queue, &options)
        .await?;
    out.emit(&messages, |messages| {
        if args.payloads {
            for (offset, m) in messages.iter().enumerate() {
                println!(
                    "{} {} {}",
                    format!("#{}", options.start_position + offset).dimmed(),
                    m.id.bold(),
                    or_dash(m.timestamp.map(|t| t.to_rfc3339()))
                );
                println!("{}\n", m.payload_text());
            }
            return;
        }
        let rows: Vec<Vec<String>> = messages
            .iter()
            .enumerate()
            .map(|(offset, m)| {
                vec![
                    (options.start_position + offset).to_string(),
                    m.id.clone(),
                    or_dash(m.correlation_id.as_deref()),
                    or_dash(m.timestamp.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())),
                    m.payload.len().to_string(),
                    preview(&m.payload_text(), PREVIEW_CHARS),
                ]
            })
            .collect();
        print_table(&["#", "ID", "CORRELATION", "TIMESTAMP", "SIZE", "PAYLOAD"], &rows);
    })
}

pub async fn put(
    ctx: &AppContext,
    out: Output,
    profile: &str,
    queue: &str,
    payload: &PayloadArgs,
) -> CliResult {
    let body = payload.payload()?;
    let properties = payload.property_map()?;
    let id = ctx.connect(profile).await?;
    ctx.manager
        .put_message(&id, queue, &body, properties.as_ref())
        .await?;
    out.done(&format!("put {} bytes on {queue}", body.len()))
}

pub async fn delete(
    ctx: &AppContext,
    out: Output,
    profile: &str,
    queue: &str,
    message_ids: &[String],
) -> CliResult {
    let id = ctx.connect(profile).await?;
    match message_ids {
        [single] => {
            ctx.manager.delete_message(&id, queue, single).await?;
            out.done(&format!("deleted {single} from {queue}"))
        }
        many => {
            let removed = ctx.manager.delete_messages(&id, queue, many).await?;
            out.done(&format!("deleted {removed} messages from {queue}"))
        }
    }
}

pub async fn clear(ctx: &AppContext, out: Output, profile: &str, queue: &str, yes: bool) -> CliResult {
    if !yes {
        return Err(CliError::usage(format!(
            "clearing removes every message on {queue}; rerun with --yes"
        )));
    }
    let id = ctx.connect(profile).await?;
    ctx.manager.clear_queue(&id, queue).await?;
    out.done(&format!("cleared {queue}"))
}
