//! Construction of outgoing events: notes, community posts, replies, and
//! reactions.
//!
//! Community posts and replies are NIP-22 comments whose root scope is a
//! hashtag community: the uppercase `I`/`K` pair names the community, the
//! lowercase `e`/`k` pair names the parent comment. The root scope stays the
//! same all the way down a thread.

use anyhow::Result;

use crate::event::{Event, Tag, KIND_COMMENT, KIND_NOTE, KIND_REACTION};
use crate::sign::Identity;
use crate::topics::normalize_hashtag;

/// Hashtags mentioned in `content`, lowercased, first occurrence wins.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut found: Vec<String> = vec![];
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            continue;
        }
        let mut tag = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' || next == '-' {
                tag.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if tag.is_empty() {
            continue;
        }
        let tag = tag.to_lowercase();
        if !found.contains(&tag) {
            found.push(tag);
        }
    }
    found
}

/// Root-scope tags for a hashtag community.
fn community_tags(hashtag: &str) -> Vec<Tag> {
    vec![
        Tag(vec!["I".into(), format!("#{hashtag}")]),
        Tag::new(["K", "#"]),
        Tag::new(["t", hashtag]),
    ]
}

/// Normalize a user-supplied topic: accept it with or without the marker.
fn topic_key(topic: &str) -> String {
    normalize_hashtag(topic).unwrap_or_else(|| topic.to_ascii_lowercase())
}

/// A plain note, tagged with the hashtags found in its content.
pub fn note(identity: &Identity, content: &str, created_at: u64) -> Result<Event> {
    let tags = extract_hashtags(content)
        .into_iter()
        .map(|t| Tag(vec!["t".into(), t]))
        .collect();
    identity.sign(KIND_NOTE, content, tags, created_at)
}

/// A top-level post into a hashtag community.
pub fn community_post(
    identity: &Identity,
    topic: &str,
    content: &str,
    created_at: u64,
) -> Result<Event> {
    let hashtag = topic_key(topic);
    let mut tags = community_tags(&hashtag);
    for t in extract_hashtags(content) {
        if t != hashtag {
            tags.push(Tag(vec!["t".into(), t]));
        }
    }
    identity.sign(KIND_COMMENT, content, tags, created_at)
}

/// A reply to `parent` inside a hashtag community. The root scope keeps the
/// community; the parent pointers and a `p` tag notify the author.
pub fn reply(
    identity: &Identity,
    topic: &str,
    parent: &Event,
    content: &str,
    created_at: u64,
) -> Result<Event> {
    let hashtag = topic_key(topic);
    let mut tags = vec![
        Tag(vec!["I".into(), format!("#{hashtag}")]),
        Tag::new(["K", "#"]),
        Tag(vec![
            "e".into(),
            parent.id.clone(),
            String::new(),
            parent.pubkey.clone(),
        ]),
        Tag(vec!["k".into(), parent.kind.to_string()]),
        Tag(vec!["p".into(), parent.pubkey.clone()]),
        Tag(vec!["t".into(), hashtag.clone()]),
    ];
    for t in extract_hashtags(content) {
        if t != hashtag {
            tags.push(Tag(vec!["t".into(), t]));
        }
    }
    identity.sign(KIND_COMMENT, content, tags, created_at)
}

/// A reaction to `target`: `+` likes, `-` dislikes, anything else is an
/// emoji reaction.
pub fn reaction(
    identity: &Identity,
    target: &Event,
    content: &str,
    created_at: u64,
) -> Result<Event> {
    let tags = vec![
        Tag(vec!["e".into(), target.id.clone()]),
        Tag(vec!["p".into(), target.pubkey.clone()]),
        Tag(vec!["k".into(), target.kind.to_string()]),
    ];
    identity.sign(KIND_REACTION, content, tags, created_at)
}
