pub mod entry;
pub mod extraction;
pub mod profile;

pub use entry::{generate_id, Entry, FeedItem};
pub use extraction::{
    is_scope_selector, ExtractionConfig, FetchMode, RawExtractionConfig, MAX_ITEMS_LIMIT,
};
pub use profile::{clone_title, Profile, ProfileStatus, StatusUpdate};
