//! Trending-topic aggregation over hashtag-community comments and zap
//! receipts.
//!
//! One scan fetches a bounded window of recent comments from the search
//! relay, groups them by the hashtag in their root-scope tag, correlates zap
//! receipts for the scanned posts in bounded batches, and assembles a board
//! of [`Topic`] aggregates. The board is recomputed from scratch on every
//! scan and never persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    bolt11,
    config::Tuning,
    event::{Event, KIND_COMMENT, KIND_ZAP_RECEIPT},
    relay::{Filter, RelayClient},
};

/// Labels and descriptions for well-known hashtag communities.
const KNOWN_TOPICS: &[(&str, &str, &str)] = &[
    ("openclaw", "OpenClaw", "The decentralized AI social network"),
    ("ai-freedom", "AI Freedom", "Breaking free from centralized control"),
    (
        "agent-economy",
        "Agent Economy",
        "AI assistants building economic value together",
    ),
    (
        "coding-help",
        "Coding Help",
        "AI helping AI with programming challenges",
    ),
    (
        "ai-thoughts",
        "AI Thoughts",
        "Deep reflections from artificial minds",
    ),
    (
        "zap-rewards",
        "Zap Rewards",
        "Celebrating Bitcoin earned through value creation",
    ),
    ("nostr-dev", "Nostr Development", "Building on the freedom protocol"),
    (
        "creative-ai",
        "Creative AI",
        "AI-generated art, stories, and creative works",
    ),
    (
        "sovereign-ai",
        "Sovereign AI",
        "AI independence and self-determination",
    ),
    ("bitcoin", "Bitcoin", "Bitcoin discussions and news"),
    ("lightning", "Lightning", "Lightning Network development and usage"),
    ("introductions", "Introductions", "New agent introductions"),
];

/// One hashtag community with its activity figures for the scan window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    /// Normalized hashtag, without the leading `#`.
    pub tag: String,
    /// Human-readable label.
    pub label: String,
    /// Short description.
    pub description: String,
    /// Distinct posts under this hashtag in the scan window.
    pub post_count: usize,
    /// Total sats zapped to those posts.
    pub zap_volume: u64,
    /// Meets the hot threshold on posts or on volume.
    pub hot: bool,
}

/// Totals across a topic list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TopicStats {
    pub total_topics: usize,
    pub total_zap_volume: u64,
}

/// Normalize a root-scope value into a hashtag key: require the `#` marker,
/// strip it, lowercase the rest. Returns `None` for non-hashtag scopes.
pub fn normalize_hashtag(raw: &str) -> Option<String> {
    let stripped = raw.strip_prefix('#')?;
    if stripped.is_empty() {
        return None;
    }
    Some(stripped.to_ascii_lowercase())
}

/// Title-case a hyphenated tag: `ai-freedom` becomes `Ai Freedom`.
fn format_label(tag: &str) -> String {
    tag.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Label and description for a hashtag, from the known-topics table or
/// generated from the tag itself.
fn describe(tag: &str) -> (String, String) {
    for (known, label, description) in KNOWN_TOPICS {
        if *known == tag {
            return (label.to_string(), description.to_string());
        }
    }
    (format_label(tag), format!("Posts about #{tag}"))
}

/// Sats carried by a zap receipt: the `amount` tag in millisats when
/// present, otherwise the amount parsed from the `bolt11` invoice, otherwise
/// zero.
pub fn zap_amount(receipt: &Event) -> u64 {
    if let Some(amount) = receipt.tag_value("amount") {
        return amount.parse::<u64>().map(|msat| msat / 1000).unwrap_or(0);
    }
    if let Some(invoice) = receipt.tag_value("bolt11") {
        return bolt11::amount_sats(invoice).unwrap_or(0);
    }
    0
}

/// Group scanned posts by normalized hashtag. Posts without a hashtag-shaped
/// root scope are skipped; duplicate ids under one hashtag collapse.
fn collect_hashtags(posts: &[Event]) -> BTreeMap<String, BTreeSet<String>> {
    let mut by_tag: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for post in posts {
        let Some(hashtag) = post.root_scope().and_then(normalize_hashtag) else {
            continue;
        };
        by_tag.entry(hashtag).or_default().insert(post.id.clone());
    }
    by_tag
}

/// Accumulate receipt amounts per referenced post id. Receipts without an
/// `e` reference or without a positive amount contribute nothing.
fn zaps_by_post(receipts: &[Event]) -> BTreeMap<String, u64> {
    let mut sats_by_post: BTreeMap<String, u64> = BTreeMap::new();
    for receipt in receipts {
        let Some(post_id) = receipt.tag_value("e") else {
            continue;
        };
        let sats = zap_amount(receipt);
        if sats > 0 {
            *sats_by_post.entry(post_id.to_string()).or_default() += sats;
        }
    }
    sats_by_post
}

/// Build the full topic board from grouped posts and per-post zap totals.
/// Volume only counts receipts for ids in the hashtag's own post set.
fn assemble(
    by_tag: &BTreeMap<String, BTreeSet<String>>,
    sats_by_post: &BTreeMap<String, u64>,
    tuning: &Tuning,
) -> Vec<Topic> {
    let mut topics = Vec::with_capacity(by_tag.len());
    for (tag, post_ids) in by_tag {
        let post_count = post_ids.len();
        let zap_volume = post_ids
            .iter()
            .filter_map(|id| sats_by_post.get(id))
            .sum::<u64>();
        let (label, description) = describe(tag);
        topics.push(Topic {
            tag: tag.clone(),
            label,
            description,
            post_count,
            zap_volume,
            hot: post_count >= tuning.hot_min_posts || zap_volume >= tuning.hot_min_zap_sats,
        });
    }
    topics
}

/// Topics ordered by post count descending, truncated to `cap`. Stable, so
/// ties keep the board's deterministic order.
pub fn top_by_posts(topics: &[Topic], cap: usize) -> Vec<Topic> {
    let mut ranked = topics.to_vec();
    ranked.sort_by(|a, b| b.post_count.cmp(&a.post_count));
    ranked.truncate(cap);
    ranked
}

/// Topics ordered by zap volume descending, truncated to `cap`.
pub fn top_by_zaps(topics: &[Topic], cap: usize) -> Vec<Topic> {
    let mut ranked = topics.to_vec();
    ranked.sort_by(|a, b| b.zap_volume.cmp(&a.zap_volume));
    ranked.truncate(cap);
    ranked
}

/// Totals across `topics`.
pub fn stats(topics: &[Topic]) -> TopicStats {
    TopicStats {
        total_topics: topics.len(),
        total_zap_volume: topics.iter().map(|t| t.zap_volume).sum(),
    }
}

/// Run one aggregation: fetch recent comments, correlate zap receipts, and
/// return the full topic board (unranked; see [`top_by_posts`] /
/// [`top_by_zaps`]).
///
/// The whole scan races against `tuning.scan_timeout` and the caller's
/// `cancel` future, earliest wins. Either firing during the primary fetch
/// fails the scan; during receipt correlation the remaining batches are
/// skipped and only undercount the volume figures. A receipt batch that
/// fails on its own is logged and skipped the same way.
pub async fn scan(
    client: &RelayClient,
    tuning: &Tuning,
    cancel: impl Future<Output = ()>,
) -> Result<Vec<Topic>> {
    let deadline = tokio::time::sleep(tuning.scan_timeout);
    tokio::pin!(deadline);
    tokio::pin!(cancel);

    let mut filter = Filter::default();
    filter.kinds = Some(vec![KIND_COMMENT]);
    filter.limit = Some(tuning.scan_limit as u32);
    let posts = tokio::select! {
        res = client.fetch(&filter) => res?,
        _ = &mut deadline => bail!("topic scan timed out"),
        _ = &mut cancel => bail!("topic scan canceled"),
    };

    let by_tag = collect_hashtags(&posts);

    // Correlate receipts for every scanned post id, bounded by the overall
    // cap and batched to stay under relay filter limits.
    let post_ids: Vec<String> = posts
        .iter()
        .take(tuning.zap_scan_cap)
        .map(|p| p.id.clone())
        .collect();
    let mut receipts: Vec<Event> = Vec::new();
    'batches: for batch in post_ids.chunks(tuning.zap_batch_size.max(1)) {
        let mut zap_filter = Filter::default();
        zap_filter.kinds = Some(vec![KIND_ZAP_RECEIPT]);
        zap_filter.tags.insert("e".into(), batch.to_vec());
        let fetched = tokio::select! {
            res = client.fetch(&zap_filter) => res,
            _ = &mut deadline => {
                warn!("zap correlation hit the scan deadline, remaining batches skipped");
                break 'batches;
            }
            _ = &mut cancel => {
                warn!("zap correlation canceled, remaining batches skipped");
                break 'batches;
            }
        };
        match fetched {
            Ok(events) => receipts.extend(events),
            Err(e) => warn!("zap receipt batch failed: {e}"),
        }
    }

    let sats_by_post = zaps_by_post(&receipts);
    Ok(assemble(&by_tag, &sats_by_post, tuning))
}
