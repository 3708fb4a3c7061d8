// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic and channel commands. Both capabilities are optional per broker;
//! an adapter without them answers with an "is not supported" error.

use clap::Subcommand;
use colored::Colorize;
use mqlens_core::ChannelStatus;

use crate::context::AppContext;
use crate::error::CliResult;
use crate::output::{Output, or_dash, print_table};
use crate::queues::PayloadArgs;

pub async fn list_topics(
    ctx: &AppContext,
    out: Output,
    profile: &str,
    filter: Option<&str>,
) -> CliResult {
    let id = ctx.connect(profile).await?;
    let topics = ctx.manager.list_topics(&id, filter).await?;
    out.emit(&topics, |topics| {
        let rows: Vec<Vec<String>> = topics
            .iter()
            .map(|t| vec![t.name.clone(), or_dash(t.topic_string.as_deref())])
            .collect();
        print_table(&["TOPIC", "TOPIC STRING"], &rows);
    })
}

pub async fn publish(
    ctx: &AppContext,
    out: Output,
    profile: &str,
    topic: &str,
    payload: &PayloadArgs,
) -> CliResult {
    let body = payload.payload()?;
    let properties = payload.property_map()?;
    let id = ctx.connect(profile).await?;
    ctx.manager
        .publish_message(&id, topic, &body, properties.as_ref())
        .await?;
    out.done(&format!("published {} bytes to {topic}", body.len()))
}

pub async fn list_channels(
    ctx: &AppContext,
    out: Output,
    profile: &str,
    filter: Option<&str>,
) -> CliResult {
    let id = ctx.connect(profile).await?;
    let channels = ctx.manager.list_channels(&id, filter).await?;
    out.emit(&channels, |channels| {
        let rows: Vec<Vec<String>> = channels
            .iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    or_dash(c.channel_type.as_deref()),
                    status_label(c.status),
                ]
            })
            .collect();
        print_table(&["CHANNEL", "TYPE", "STATUS"], &rows);
    })
}

#[derive(Subcommand, Debug)]
pub enum ChannelCommand {
    /// Show one channel's properties.
    Show {
        #[arg(long, short)]
        profile: String,
        channel: String,
    },
    /// Request a channel start.
    Start {
        #[arg(long, short)]
        profile: String,
        channel: String,
    },
    /// Request a channel stop.
    Stop {
        #[arg(long, short)]
        profile: String,
        channel: String,
    },
}

pub async fn channel(ctx: &AppContext, out: Output, command: ChannelCommand) -> CliResult {
    match command {
        ChannelCommand::Show { profile, channel } => {
            let id = ctx.connect(&profile).await?;
            let props = ctx.manager.get_channel_properties(&id, &channel).await?;
            out.emit(&props, |p| {
                println!("{} {}", p.name.bold(), status_label(p.status));
                println!("  type:       {}", or_dash(p.channel_type.as_deref()));
                println!("  connection: {}", or_dash(p.connection_name.as_deref()));
                for (key, value) in &p.attributes {
                    println!("  {key}: {value}");
                }
            })
        }
        ChannelCommand::Start { profile, channel } => {
            let id = ctx.connect(&profile).await?;
            ctx.manager.start_channel(&id, &channel).await?;
            out.done(&format!("start requested for {channel}"))
        }
        ChannelCommand::Stop { profile, channel } => {
            let id = ctx.connect(&profile).await?;
            ctx.manager.stop_channel(&id, &channel).await?;
            out.done(&format!("stop requested for {channel}"))
        }
    }
}

fn status_label(status: ChannelStatus) -> String {
    let text = status.to_string();
    match status {
        ChannelStatus::Running => text.green().to_string(),
        ChannelStatus::Retrying => text.yellow().to_string(),
        ChannelStatus::Stopped => text.red().to_string(),
        ChannelStatus::Inactive => text.dimmed().to_string(),
    }
}
