//! Counters describing how a cache served its callers.
//!
//! Recording is off by default. Enable it with `CacheBuilder::record_stats` and
//! read a snapshot with `Cache::stats`.

mod cache_stats;
mod stats_counter;

pub use cache_stats::CacheStats;

pub(crate) use stats_counter::{DefaultStatsCounter, DisabledStatsCounter, StatsCounter};

use std::sync::Arc;

pub(crate) type SharedStatsCounter = Arc<dyn StatsCounter<Stats = CacheStats> + Send + Sync>;

pub(crate) fn stats_counter(record_stats: bool) -> SharedStatsCounter {
    if record_stats {
        Arc::<DefaultStatsCounter>::default()
    } else {
        Arc::new(DisabledStatsCounter)
    }
}
