//! M3U playlist generator
//!
//! Inverse of [`crate::sources::m3u::parse_m3u`]. Output is deterministic:
//! header, then per channel its extra tags, the `#EXTINF` declaration and the
//! stream URL, joined with `\n` and no trailing newline.

use crate::models::Channel;
use crate::sources::m3u::{
    is_reserved_tag_name, ATTR_EPG_URL, ATTR_GROUP_TITLE, ATTR_TVG_ID, ATTR_TVG_LOGO, EXTINF,
    EXTM3U,
};

/// Duration placeholder written on every declaration (live streams)
const LIVE_DURATION: &str = "-1";

fn push_attribute(extinf: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        extinf.push_str(&format!(" {key}=\"{value}\""));
    }
}

/// Build the `#EXTINF` line for a channel
fn extinf_line(channel: &Channel) -> String {
    let mut extinf = format!("{EXTINF}{LIVE_DURATION}");
    push_attribute(&mut extinf, ATTR_TVG_ID, channel.tvg_id.as_deref());
    push_attribute(&mut extinf, ATTR_GROUP_TITLE, channel.group.as_deref());
    push_attribute(&mut extinf, ATTR_TVG_LOGO, channel.logo.as_deref());
    extinf.push(',');
    extinf.push_str(&channel.name);
    extinf
}

/// Generate M3U text for `channels` in the given order.
///
/// Positions are not written; order alone carries them.
pub fn generate_m3u(channels: &[Channel], epg_url: Option<&str>) -> String {
    let mut lines = Vec::with_capacity(1 + channels.len() * 2);

    match epg_url.filter(|url| !url.is_empty()) {
        Some(url) => lines.push(format!("{EXTM3U} {ATTR_EPG_URL}=\"{url}\"")),
        None => lines.push(EXTM3U.to_string()),
    }

    for channel in channels {
        for (tag, value) in &channel.extra_tags {
            // reserved names would be read back as a header, declaration or group
            if !is_reserved_tag_name(tag) {
                lines.push(format!("#{tag}:{value}"));
            }
        }
        lines.push(extinf_line(channel));
        lines.push(channel.url.clone());
    }

    lines.join("\n")
}
