//! RSS 2.0 output for published profiles.

use chrono::{DateTime, Utc};
use rss::{Channel, Guid, Item};

use crate::app::{BridgeError, Result};
use crate::domain::{Entry, ExtractionConfig};

/// Render `entries` as an RSS 2.0 document for the profile `config`.
///
/// Each item's link doubles as its permalink guid.
pub fn render_rss(config: &ExtractionConfig, entries: &[Entry], built_at: DateTime<Utc>) -> Result<String> {
    let mut channel = Channel::default();
    channel.set_title(config.feed_title.clone());
    channel.set_link(config.source_url.to_string());
    channel.set_description(format!(
        "Generated from {} using {} mode.",
        config.source_url, config.fetch_mode
    ));
    channel.set_last_build_date(Some(built_at.to_rfc2822()));
    channel.set_items(entries.iter().map(rss_item).collect::<Vec<_>>());

    let bytes = channel
        .write_to(Vec::new())
        .map_err(|e| BridgeError::Other(format!("Failed to write RSS: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| BridgeError::Other(format!("RSS output was not UTF-8: {}", e)))
}

fn rss_item(entry: &Entry) -> Item {
    let mut guid = Guid::default();
    guid.set_value(entry.link.clone());
    guid.set_permalink(true);

    let mut item = Item::default();
    item.set_title(Some(entry.title.clone()));
    item.set_link(Some(entry.link.clone()));
    item.set_guid(Some(guid));
    item.set_pub_date(Some(entry.discovered_at.to_rfc2822()));
    if !entry.summary.is_empty() {
        item.set_description(Some(entry.summary.clone()));
    }
    item
}

/// Public URL of a profile's feed, relative when no base is configured.
pub fn feed_url(public_base_url: Option<&str>, token: &str) -> String {
    let base = public_base_url.unwrap_or_default().trim_end_matches('/');
    format!("{}/feeds/{}.xml", base, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawExtractionConfig;
    use chrono::TimeZone;

    fn config() -> ExtractionConfig {
        ExtractionConfig::from_raw(&RawExtractionConfig {
            feed_title: "Forum & Friends".to_string(),
            source_url: "https://example.com/forums".to_string(),
            fetch_mode: "browser".to_string(),
            ..RawExtractionConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_channel_elements() {
        let built = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let xml = render_rss(&config(), &[], built).unwrap();

        let channel = Channel::read_from(xml.as_bytes()).unwrap();
        assert_eq!(channel.title(), "Forum & Friends");
        assert_eq!(channel.link(), "https://example.com/forums");
        assert_eq!(
            channel.description(),
            "Generated from https://example.com/forums using browser mode."
        );
        assert_eq!(channel.last_build_date(), Some("Sun, 1 Mar 2026 12:00:00 +0000"));
        assert!(channel.items().is_empty());
    }

    #[test]
    fn test_items_use_link_as_guid() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        let entries = vec![
            Entry::new("Alpha", "https://example.com/t/1", at).with_summary("First post"),
            Entry::new("Beta", "https://example.com/t/2", at),
        ];
        let xml = render_rss(&config(), &entries, at).unwrap();
        let channel = Channel::read_from(xml.as_bytes()).unwrap();

        let items = channel.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title(), Some("Alpha"));
        assert_eq!(items[0].link(), Some("https://example.com/t/1"));
        let guid = items[0].guid().unwrap();
        assert_eq!(guid.value(), "https://example.com/t/1");
        assert!(guid.is_permalink());
        assert_eq!(items[0].description(), Some("First post"));
        assert_eq!(items[0].pub_date(), Some("Sun, 1 Mar 2026 08:30:00 +0000"));
        assert_eq!(items[1].description(), None);
    }

    #[test]
    fn test_feed_url() {
        assert_eq!(
            feed_url(Some("https://feeds.example.com/"), "abc"),
            "https://feeds.example.com/feeds/abc.xml"
        );
        assert_eq!(feed_url(None, "abc"), "/feeds/abc.xml");
    }
}
