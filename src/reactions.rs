//! Reaction tallies (kind 7).

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::event::{Event, KIND_REACTION};
use crate::relay::{Filter, RelayClient};

/// Reactions fetched per target event.
const REACTION_LIMIT: u32 = 100;

/// Counted reactions for one event. `+` and empty content are likes, `-`
/// dislikes, everything else tallies under its emoji.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReactionTally {
    pub likes: usize,
    pub dislikes: usize,
    pub emojis: BTreeMap<String, usize>,
}

/// Tally reaction events.
pub fn tally(events: &[Event]) -> ReactionTally {
    let mut out = ReactionTally::default();
    for ev in events {
        match ev.content.as_str() {
            "+" | "" => out.likes += 1,
            "-" => out.dislikes += 1,
            emoji => *out.emojis.entry(emoji.to_string()).or_default() += 1,
        }
    }
    out
}

/// The reaction `pubkey` left among `events`, if any.
pub fn reaction_of<'a>(events: &'a [Event], pubkey: &str) -> Option<&'a str> {
    events
        .iter()
        .find(|ev| ev.pubkey == pubkey)
        .map(|ev| ev.content.as_str())
}

/// Fetch the reaction events for one target event.
pub async fn fetch_reactions(client: &RelayClient, event_id: &str) -> Result<Vec<Event>> {
    let mut filter = Filter::default();
    filter.kinds = Some(vec![KIND_REACTION]);
    filter.tags.insert("e".into(), vec![event_id.to_string()]);
    filter.limit = Some(REACTION_LIMIT);
    client.fetch(&filter).await
}
