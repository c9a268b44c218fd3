//! Event hashing, signing, and signature verification.

use anyhow::{anyhow, Result};
use secp256k1::{schnorr::Signature, Keypair, Message, Secp256k1, XOnlyPublicKey};
use sha2::{Digest, Sha256};

use crate::event::{Event, Tag};

/// Recompute the Nostr event hash from its fields.
pub fn event_hash(ev: &Event) -> Result<[u8; 32]> {
    let arr = serde_json::json!([0, ev.pubkey, ev.created_at, ev.kind, ev.tags, ev.content]);
    let data = serde_json::to_vec(&arr)?;
    let hash = Sha256::digest(&data);
    Ok(hash.into())
}

/// Verify an event's ID and Schnorr signature.
pub fn verify_event(ev: &Event) -> Result<()> {
    let hash = event_hash(ev)?;
    let calc_id = hex::encode(hash);
    if calc_id != ev.id {
        return Err(anyhow!("id mismatch"));
    }
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    let pk = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest_slice(&hash)?;
    secp.verify_schnorr(&sig, &msg, &pk)?;
    Ok(())
}

/// Signing identity derived from a hex-encoded secret key.
pub struct Identity {
    keypair: Keypair,
}

impl Identity {
    /// Parse a 32-byte hex secret key.
    pub fn from_hex(secret_key: &str) -> Result<Self> {
        let bytes = hex::decode(secret_key.trim())?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, &bytes)
            .map_err(|e| anyhow!("invalid secret key: {e}"))?;
        Ok(Self { keypair })
    }

    /// Hex-encoded x-only public key of this identity.
    pub fn pubkey_hex(&self) -> String {
        hex::encode(self.keypair.x_only_public_key().0.serialize())
    }

    /// Build and sign an event with this identity.
    pub fn sign(&self, kind: u32, content: &str, tags: Vec<Tag>, created_at: u64) -> Result<Event> {
        let mut ev = Event {
            id: String::new(),
            pubkey: self.pubkey_hex(),
            kind,
            created_at,
            tags,
            content: content.to_string(),
            sig: String::new(),
        };
        let hash = event_hash(&ev)?;
        ev.id = hex::encode(hash);
        let msg = Message::from_digest_slice(&hash)?;
        let secp = Secp256k1::new();
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        ev.sig = hex::encode(sig.as_ref());
        Ok(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KIND_NOTE;

    const SK: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn signed_event_verifies() {
        let id = Identity::from_hex(SK).unwrap();
        let ev = id
            .sign(KIND_NOTE, "hello", vec![Tag::new(["t", "news"])], 1)
            .unwrap();
        assert_eq!(ev.pubkey, id.pubkey_hex());
        assert_eq!(ev.id.len(), 64);
        verify_event(&ev).unwrap();
    }

    #[test]
    fn tampered_content_fails_verification() {
        let id = Identity::from_hex(SK).unwrap();
        let mut ev = id.sign(KIND_NOTE, "hello", vec![], 1).unwrap();
        ev.content = "goodbye".into();
        assert!(verify_event(&ev).is_err());
    }

    #[test]
    fn tampered_sig_fails_verification() {
        let id = Identity::from_hex(SK).unwrap();
        let mut ev = id.sign(KIND_NOTE, "hello", vec![], 1).unwrap();
        ev.sig = "00".repeat(64);
        assert!(verify_event(&ev).is_err());
    }

    #[test]
    fn bad_secret_key_rejected() {
        assert!(Identity::from_hex("zz").is_err());
        assert!(Identity::from_hex("0102").is_err());
    }

    #[test]
    fn event_hash_matches_reference() {
        let ev = Event {
            id: String::new(),
            pubkey: "00".repeat(32),
            kind: 1,
            created_at: 1,
            tags: vec![],
            content: String::new(),
            sig: String::new(),
        };
        let expected = {
            let obj =
                serde_json::json!([0, ev.pubkey, ev.created_at, ev.kind, ev.tags, ev.content]);
            let mut hasher = Sha256::new();
            hasher.update(serde_json::to_vec(&obj).unwrap());
            let bytes = hasher.finalize();
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes);
            arr
        };
        assert_eq!(event_hash(&ev).unwrap(), expected);
    }
}
