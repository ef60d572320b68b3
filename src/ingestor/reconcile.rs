//! Merge freshly ingested channels with previously stored metadata.
//!
//! Synchronisation is authoritative for name, url, group and logo. The
//! program guide id and extra tags are user-editable, so whatever was stored
//! for the same stream URL takes precedence over the upstream values.

use std::collections::HashMap;
use tracing::debug;

use crate::models::{Channel, ChannelMetadata};

/// Merge a single fresh channel with its prior metadata, if any.
fn merge_channel(fresh: &Channel, prior: Option<&ChannelMetadata>, position: u32) -> Channel {
    let (tvg_id, extra_tags) = match prior {
        Some(prior) => {
            let mut extra_tags = fresh.extra_tags.clone();
            extra_tags.extend(
                prior
                    .extra_tags
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
            (prior.tvg_id.clone(), extra_tags)
        }
        None => (fresh.tvg_id.clone(), fresh.extra_tags.clone()),
    };

    Channel {
        name: fresh.name.clone(),
        url: fresh.url.clone(),
        group: fresh.group.clone(),
        logo: fresh.logo.clone(),
        tvg_id,
        position,
        extra_tags,
    }
}

/// Reconcile `fresh` against `prior_by_url`, producing new channels numbered 1..N
/// in the order of `fresh`.
///
/// URLs are matched by exact string equality. A channel whose URL changed
/// upstream is treated as new and carries nothing over.
pub fn reconcile_channels(
    fresh: &[Channel],
    prior_by_url: &HashMap<String, ChannelMetadata>,
) -> Vec<Channel> {
    let mut matched = 0usize;

    let merged: Vec<Channel> = fresh
        .iter()
        .enumerate()
        .map(|(index, channel)| {
            let prior = prior_by_url.get(&channel.url);
            if prior.is_some() {
                matched += 1;
            }
            merge_channel(channel, prior, index as u32 + 1)
        })
        .collect();

    debug!(
        "Reconciled {} channels: {} matched stored metadata, {} new",
        merged.len(),
        matched,
        merged.len() - matched
    );

    merged
}
