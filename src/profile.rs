//! Profile metadata lookup (kind 0).

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::event::{Event, KIND_PROFILE};
use crate::relay::{Filter, RelayClient};

/// Display metadata carried in a kind-0 event's JSON content. Unknown
/// fields are ignored; a malformed content body yields the empty profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl Profile {
    /// Parse the metadata content of a kind-0 event.
    pub fn from_event(ev: &Event) -> Self {
        serde_json::from_str(&ev.content).unwrap_or_default()
    }

    /// Name shown for the profile's owner: `name`, then `display_name`,
    /// then a shortened form of the public key.
    pub fn display(&self, pubkey: &str) -> String {
        if let Some(name) = self.name.as_deref().filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        if let Some(name) = self.display_name.as_deref().filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        short_pubkey(pubkey)
    }
}

/// Abbreviate a hex public key for display: `ab12cd34…ef56ab78`.
fn short_pubkey(pubkey: &str) -> String {
    if pubkey.len() <= 16 {
        return pubkey.to_string();
    }
    format!("{}…{}", &pubkey[..8], &pubkey[pubkey.len() - 8..])
}

/// Fetch the newest profile event for `pubkey`. Returns `None` when the
/// relay has no metadata for the key.
pub async fn fetch_profile(client: &RelayClient, pubkey: &str) -> Result<Option<Profile>> {
    let mut filter = Filter::default();
    filter.kinds = Some(vec![KIND_PROFILE]);
    filter.authors = Some(vec![pubkey.to_string()]);
    filter.limit = Some(1);
    let events = client.fetch(&filter).await?;
    let newest = events
        .into_iter()
        .filter(|ev| ev.pubkey == pubkey)
        .max_by_key(|ev| ev.created_at);
    Ok(newest.map(|ev| Profile::from_event(&ev)))
}
