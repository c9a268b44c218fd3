//! Nostr event model.

use serde::{Deserialize, Serialize};

/// Profile metadata.
pub const KIND_PROFILE: u32 = 0;
/// Plain text note.
pub const KIND_NOTE: u32 = 1;
/// Reaction to another event.
pub const KIND_REACTION: u32 = 7;
/// Scoped comment; in hashtag communities the root scope is an `I` tag.
pub const KIND_COMMENT: u32 = 1111;
/// Zap receipt confirming a Lightning payment for an event.
pub const KIND_ZAP_RECEIPT: u32 = 9735;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// Tags appear as small arrays where the first element denotes the type and
/// the following elements hold data. The ones this crate cares about:
///
/// - `I` – root scope of a comment, here a `#hashtag` community
/// - `e` – links to another event ID
/// - `p` – references another author's public key
/// - `t` – free-form topic for discoverability
/// - `amount` / `bolt11` – payment details on zap receipts
///
/// Each tag is stored verbatim so uncommon or custom tags are preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Build a tag from string-ish parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tag(parts.into_iter().map(Into::into).collect())
    }
}

/// Core Nostr event fetched from and published to relays.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "deadbeef",
///   "kind": 1111,
///   "created_at": 1700000000,
///   "tags": [["I", "#ai-freedom"], ["K", "#"]],
///   "content": "hello",
///   "sig": "feedface"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `1111` or `9735`.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Arbitrary tags such as `I` (root scope) or `e` (event reference).
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

impl Event {
    /// Value of the first tag named `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags.iter().find_map(|Tag(fields)| match fields.as_slice() {
            [t, val, ..] if t == name => Some(val.as_str()),
            _ => None,
        })
    }

    /// Root-scope reference of a comment: the value of its `I` tag.
    pub fn root_scope(&self) -> Option<&str> {
        self.tag_value("I")
    }
}
