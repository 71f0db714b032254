//! Read-only listings, leaderboard and aggregate stats over the store.
//!
//! Everything here is a full-roster scan: `stats` is O(n) and the
//! leaderboard sort is O(n log n) over all profiles. That is a
//! scalability ceiling, not a correctness concern; the registry holds
//! its whole state in memory and no streaming interface is required.

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::profile_store::{Identity, ProfileStore};

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub identity: Identity,
    pub handle: String,
    pub view_count: u64,
}

/// Aggregate registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub profile_count: usize,
    pub total_views: u64,
}

/// Return at most `limit` identities from the roster in registration
/// order, starting at `offset`.
///
/// An empty roster with offset 0 yields an empty page; any other offset
/// at or past the roster end is out of range. A limit of 0 yields an
/// empty page as long as the offset is valid.
pub fn list_identities(
    store: &ProfileStore,
    offset: usize,
    limit: usize,
) -> Result<Vec<Identity>, RegistryError> {
    let roster = store.roster();
    if roster.is_empty() && offset == 0 {
        return Ok(Vec::new());
    }
    if offset >= roster.len() {
        return Err(RegistryError::OffsetOutOfRange {
            offset,
            roster_len: roster.len(),
        });
    }

    let end = offset.saturating_add(limit).min(roster.len());
    Ok(roster[offset..end].to_vec())
}

/// Return the `limit` most-viewed profiles, descending by view count.
///
/// Ties break by roster position: of two profiles with equal view
/// counts, the earlier registration ranks first. The sort is stable over
/// the roster sequence, so repeated calls on unchanged state return the
/// same page.
pub fn top_profiles(
    store: &ProfileStore,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, RegistryError> {
    if limit > store.profile_count() {
        return Err(RegistryError::LimitOutOfRange {
            limit,
            roster_len: store.profile_count(),
        });
    }

    let mut entries: Vec<LeaderboardEntry> = store
        .profiles_in_roster_order()
        .map(|profile| LeaderboardEntry {
            identity: profile.identity.clone(),
            handle: profile.handle.clone(),
            view_count: profile.view_count,
        })
        .collect();

    entries.sort_by(|a, b| b.view_count.cmp(&a.view_count));
    entries.truncate(limit);
    Ok(entries)
}

/// Count profiles and sum every view count by iterating the whole
/// roster once. Must agree with the store's running total at all times.
pub fn stats(store: &ProfileStore) -> RegistryStats {
    let total_views = store
        .profiles_in_roster_order()
        .map(|profile| profile.view_count)
        .sum();

    RegistryStats {
        profile_count: store.profile_count(),
        total_views,
    }
}
