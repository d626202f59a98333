use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One extracted listing entry. `link` is the natural key within a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub discovered_at: DateTime<Utc>,
}

impl Entry {
    pub fn new(title: impl Into<String>, link: impl Into<String>, discovered_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            discovered_at,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Deterministic storage id for this entry under a profile token.
    pub fn storage_id(&self, profile_token: &str) -> String {
        generate_id(profile_token, &self.link)
    }
}

/// An entry as persisted for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub profile_id: i64,
    pub title: String,
    pub link: String,
    pub summary: String,
    /// First time this link was seen; kept across later refreshes.
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FeedItem> for Entry {
    fn from(item: FeedItem) -> Self {
        Entry::new(item.title, item.link, item.discovered_at).with_summary(item.summary)
    }
}

/// Generate a deterministic ID from a profile token and a link.
pub fn generate_id(profile_token: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(profile_token.as_bytes());
    hasher.update(b"\n");
    hasher.update(link.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generation_deterministic() {
        let id1 = generate_id("tok", "https://example.com/forums/topic/1");
        let id2 = generate_id("tok", "https://example.com/forums/topic/1");
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_id_generation_different_inputs() {
        let id1 = generate_id("tok", "https://example.com/forums/topic/1");
        let id2 = generate_id("tok", "https://example.com/forums/topic/2");
        let id3 = generate_id("other", "https://example.com/forums/topic/1");
        assert_ne!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_id_is_hex_sha256() {
        let entry = Entry::new("Alpha", "https://example.com/a", Utc::now());
        let id = entry.storage_id("tok");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
