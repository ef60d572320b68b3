//! M3U playlist parser
//!
//! Turns extended M3U text into an ordered list of [`Channel`]s plus the
//! playlist level EPG URL carried by the `#EXTM3U` header.
//!
//! Parsing is lenient: unknown lines are skipped and an `#EXTINF` declaration
//! that never receives a URL line is dropped. All parser state (pending
//! channel, extra tag accumulator) lives on the stack of a single call, so
//! independent inputs can be parsed concurrently.
//!
//! Extra tags (`#name:value` lines) belong to the *next* declaration. Tags
//! that appear between a declaration and its URL line are discarded together
//! with the accumulator when the URL line finalises the channel.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::models::{Channel, ExtraTags, ParsedPlaylist, EPG_URL_TAG};

pub const EXTM3U: &str = "#EXTM3U";
pub const EXTINF: &str = "#EXTINF:";
pub const EXTGRP: &str = "#EXTGRP:";

pub const ATTR_TVG_ID: &str = "tvg-id";
pub const ATTR_GROUP_TITLE: &str = "group-title";
pub const ATTR_TVG_LOGO: &str = "tvg-logo";
pub const ATTR_EPG_URL: &str = "x-tvg-url";
/// Older spelling of `x-tvg-url` still emitted by some providers
pub const ATTR_EPG_URL_ALIAS: &str = "url-tvg";

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).expect("valid attribute regex"))
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(?:\.\d+)?").expect("valid duration regex"))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Channel declared by `#EXTINF` that is still waiting for its URL line
#[derive(Debug)]
struct PendingChannel {
    name: String,
    group: Option<String>,
    logo: Option<String>,
    tvg_id: Option<String>,
    extra_tags: ExtraTags,
}

impl PendingChannel {
    /// Build from the text after `#EXTINF:`, e.g. `-1 tvg-id="bbc1" group-title="UK",BBC One`
    fn from_extinf(info: &str, extra_tags: ExtraTags) -> Self {
        let rest = match duration_regex().find(info) {
            Some(duration) => &info[duration.end()..],
            None => info,
        };

        let mut group = None;
        let mut logo = None;
        let mut tvg_id = None;
        for captures in attribute_regex().captures_iter(rest) {
            let (_, [key, value]) = captures.extract();
            match key {
                ATTR_TVG_ID => tvg_id = non_empty(value),
                ATTR_GROUP_TITLE => group = non_empty(value),
                ATTR_TVG_LOGO => logo = non_empty(value),
                _ => {}
            }
        }

        let remainder = attribute_regex().replace_all(rest, "");
        let remainder = remainder.trim();
        let name = remainder.strip_prefix(',').unwrap_or(remainder).trim();

        Self {
            name: name.to_string(),
            group,
            logo,
            tvg_id,
            extra_tags,
        }
    }

    fn finish(self, url: &str, position: u32) -> Channel {
        Channel {
            name: self.name,
            url: url.to_string(),
            group: self.group,
            logo: self.logo,
            tvg_id: self.tvg_id,
            position,
            extra_tags: self.extra_tags,
        }
    }
}

/// Extract the EPG URL from the attribute part of an `#EXTM3U` line
fn parse_header_epg_url(attributes: &str) -> Option<String> {
    let mut alias = None;
    for captures in attribute_regex().captures_iter(attributes) {
        let (_, [key, value]) = captures.extract();
        match key {
            ATTR_EPG_URL if !value.is_empty() => return Some(value.to_string()),
            ATTR_EPG_URL_ALIAS if alias.is_none() => alias = non_empty(value),
            _ => {}
        }
    }
    alias
}

/// Whether a tag name cannot be carried as a `#name:value` line.
///
/// Covers the EPG key, names that would be read back as the header, a
/// declaration or a group override, and names a reader would split
/// differently (empty, containing `:` or a line break).
pub fn is_reserved_tag_name(name: &str) -> bool {
    if name == EPG_URL_TAG || name.is_empty() || name.contains([':', '\n', '\r']) {
        return true;
    }
    let line = format!("#{name}:");
    line.starts_with(EXTM3U) || line.starts_with(EXTINF) || line.starts_with(EXTGRP)
}

/// Split a generic `#name:value` directive. The value is trimmed; lines with
/// an empty name or value are not tags.
fn parse_tag_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.strip_prefix('#')?.split_once(':')?;
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Parse M3U text into channels and the playlist EPG URL. Never fails.
pub fn parse_m3u(content: &str) -> ParsedPlaylist {
    let mut channels: Vec<Channel> = Vec::new();
    let mut epg_url: Option<String> = None;
    let mut pending: Option<PendingChannel> = None;
    let mut accumulator = ExtraTags::new();
    let mut discarded = 0usize;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(attributes) = line.strip_prefix(EXTM3U) {
            if epg_url.is_none() {
                epg_url = parse_header_epg_url(attributes);
            }
        } else if let Some(info) = line.strip_prefix(EXTINF) {
            if pending.is_some() {
                discarded += 1;
            }
            pending = Some(PendingChannel::from_extinf(
                info,
                std::mem::take(&mut accumulator),
            ));
        } else if let Some(group) = line.strip_prefix(EXTGRP) {
            if let Some(channel) = pending.as_mut() {
                channel.group = non_empty(group.trim());
            }
        } else if line.starts_with('#') {
            if let Some((name, value)) = parse_tag_line(line) {
                if !is_reserved_tag_name(name) {
                    accumulator.insert(name.to_string(), value.to_string());
                }
            }
        } else {
            if let Some(channel) = pending.take() {
                let position = channels.len() as u32 + 1;
                channels.push(channel.finish(line, position));
            }
            accumulator.clear();
        }
    }

    if pending.is_some() {
        discarded += 1;
    }

    debug!(
        "Parsed {} channels from M3U content ({} incomplete declarations discarded, epg_url: {:?})",
        channels.len(),
        discarded,
        epg_url
    );

    ParsedPlaylist { channels, epg_url }
}
