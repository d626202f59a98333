use chrono::{DateTime, Duration, Utc};

use crate::domain::Profile;

/// When `profile` next becomes due, if ever.
///
/// The base is the later of the last refresh and the refresh anchor, or the
/// creation time when neither is set.
pub fn due_at(profile: &Profile) -> Option<DateTime<Utc>> {
    let base = [profile.last_refreshed_at, profile.refresh_anchor_at]
        .into_iter()
        .flatten()
        .max()
        .or(profile.created_at)?;
    Some(base + Duration::minutes(i64::from(profile.config.refresh_interval_minutes)))
}

pub fn should_refresh(profile: &Profile, now: DateTime<Utc>) -> bool {
    if !profile.active || profile.config.is_manual_only() {
        return false;
    }
    due_at(profile).is_some_and(|due| now >= due)
}
