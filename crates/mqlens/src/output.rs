// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human tables or JSON, chosen once per invocation.

use colored::Colorize;
use serde::Serialize;

use crate::error::CliResult;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Prints `value` as JSON in JSON mode, otherwise runs `human`.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> CliResult {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }

    /// A one-line confirmation. In JSON mode `{"ok": true, "message": ...}`.
    pub fn done(&self, message: &str) -> CliResult {
        if self.json {
            let body = serde_json::json!({ "ok": true, "message": message });
            println!("{}", serde_json::to_string_pretty(&body)?);
        } else {
            println!("{} {message}", "✓".green());
        }
        Ok(())
    }
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        println!("{}", "(none)".dimmed());
        return;
    }
    print!("{}", render_table(headers, rows));
}

/// Left-aligned columns separated by two spaces. The header is bold when
/// colors are on.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| {
                let pad = width.saturating_sub(cell.chars().count());
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = String::new();
    let header = line(headers.iter().map(|h| h.to_string()).collect());
    out.push_str(&header.trim_end().bold().to_string());
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.clone()));
    }
    out
}

/// One-line preview of a payload, at most `max` characters.
pub fn preview(text: &str, max: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}

pub fn or_dash(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
