// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! M3U playlist parsing.
//!
//! The parser never fails: anything it cannot make sense of is skipped, so a
//! malformed playlist produces an empty or partial catalog.

use crate::catalog::{Catalog, Category, Channel};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const EXTINF_TAG: &str = "#EXTINF";
const UNCATEGORIZED: &str = "Uncategorized";
/// How many lines after an `#EXTINF` tag may hold its stream url.
const URL_LOOKAHEAD: usize = 4;

#[derive(Debug)]
struct ParseState {
    next_id: u64,
    /// Lines before this index were consumed as a stream url.
    resume_at: usize,
    groups: HashMap<String, Category>,
    /// First-seen order of group names.
    order: Vec<String>,
}

impl Default for ParseState {
    fn default() -> Self {
        Self {
            next_id: 1,
            resume_at: 0,
            groups: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl ParseState {
    fn step(mut self, index: usize, line: &str, lines: &[&str]) -> Self {
        if index < self.resume_at {
            return self;
        }
        let Some(info) = extinf_info(line) else {
            return self;
        };
        let Some((url_index, url)) = find_stream_url(lines, index) else {
            return self;
        };

        let id = self.next_id;
        let channel = build_channel(info, url, id);

        let group = channel.group.clone();
        self.groups
            .entry(group.clone())
            .or_insert_with(|| {
                self.order.push(group.clone());
                Category::new(category_id(&group), group)
            })
            .channels
            .push(channel);

        self.next_id += 1;
        self.resume_at = url_index + 1;
        self
    }

    fn finish(mut self) -> Catalog {
        let categories: Vec<Category> = self
            .order
            .iter()
            .filter_map(|name| self.groups.remove(name))
            .collect();
        Catalog::from_categories(categories)
    }
}

/// Parse playlist text into a catalog grouped by `group-title`.
pub fn parse(text: &str) -> Catalog {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    lines
        .iter()
        .enumerate()
        .fold(ParseState::default(), |state, (index, line)| {
            state.step(index, line, &lines)
        })
        .finish()
}

/// Returns the text after `#EXTINF`, its colon and its duration field.
fn extinf_info(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(EXTINF_TAG)?;
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
    Some(rest.trim_start())
}

fn find_stream_url<'a>(lines: &[&'a str], tag_index: usize) -> Option<(usize, &'a str)> {
    let end = (tag_index + 1 + URL_LOOKAHEAD).min(lines.len());
    (tag_index + 1..end)
        .map(|i| (i, lines[i]))
        .find(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn build_channel(info: &str, url: &str, id: u64) -> Channel {
    let tvg_id = attribute(info, "tvg-id").unwrap_or_default();
    let tvg_name = attribute(info, "tvg-name").unwrap_or_default();
    let logo = attribute(info, "tvg-logo").unwrap_or_default();
    let group = attribute(info, "group-title")
        .filter(|g| !g.is_empty())
        .unwrap_or(UNCATEGORIZED);

    let name = match info.rsplit_once(',') {
        Some((_, name)) => name.trim().to_string(),
        None if !tvg_name.is_empty() => tvg_name.to_string(),
        None => format!("Channel {}", id),
    };

    Channel {
        id: id.to_string(),
        name,
        url: url.to_string(),
        logo: logo.to_string(),
        group: group.to_string(),
        epg_id: tvg_id.to_string(),
        is_live: true,
    }
}

/// Value of the first `key="value"` pair whose key starts a word.
fn attribute<'a>(info: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", key);
    let mut offset = 0;
    while let Some(pos) = info[offset..].find(&needle) {
        let start = offset + pos;
        let at_boundary = info[..start]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        let value_start = start + needle.len();
        if at_boundary {
            let value = &info[value_start..];
            return value.find('"').map(|end| &value[..end]);
        }
        offset = value_start;
    }
    None
}

/// Stable category identifier derived from the group name.
pub fn category_id(group: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(group.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Render a catalog back into an extended M3U playlist.
pub fn to_m3u(catalog: &Catalog) -> String {
    let mut out = String::from("#EXTM3U\n");
    for category in catalog.categories() {
        for channel in &category.channels {
            out.push_str(&format!(
                "#EXTINF:-1 tvg-id=\"{}\" tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\",{}\n{}\n",
                quoted_value(&channel.epg_id),
                quoted_value(&channel.name),
                quoted_value(&channel.logo),
                quoted_value(&category.name),
                display_name(&channel.name),
                channel.url
            ));
        }
    }
    out
}

/// Attribute values end at the next double quote.
fn quoted_value(value: &str) -> String {
    value.replace('"', "'")
}

/// The name is read back from after the last comma, so it cannot carry one.
fn display_name(name: &str) -> String {
    name.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
