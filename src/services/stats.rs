use serde::{Deserialize, Serialize};

use crate::domain::listing::ListingStats;
use crate::repository::ListingReader;
use crate::services::{ServiceError, ServiceResult};

/// Session key holding the memoized counters.
pub const STATS_SESSION_KEY: &str = "listing_stats";

/// Default memo lifetime in seconds.
pub const DEFAULT_STATS_TTL_SECONDS: i64 = 300;

/// Counters computed for one owner at a given unix timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsMemo {
    pub owner_id: i32,
    pub stats: ListingStats,
    pub computed_at: i64,
}

impl StatsMemo {
    pub fn is_fresh(&self, owner_id: i32, now: i64, ttl_seconds: i64) -> bool {
        self.owner_id == owner_id
            && now >= self.computed_at
            && now - self.computed_at < ttl_seconds
    }
}

/// Return the cached counters when still fresh, otherwise query them again.
pub fn resolve_stats<R>(
    repo: &R,
    owner_id: i32,
    cached: Option<StatsMemo>,
    now: i64,
    ttl_seconds: i64,
) -> ServiceResult<StatsMemo>
where
    R: ListingReader + ?Sized,
{
    if let Some(memo) = cached.filter(|memo| memo.is_fresh(owner_id, now, ttl_seconds)) {
        return Ok(memo);
    }

    let stats = repo.listing_stats(owner_id).map_err(ServiceError::from)?;

    Ok(StatsMemo {
        owner_id,
        stats,
        computed_at: now,
    })
}
