use super::CacheStats;

use crossbeam_utils::atomic::AtomicCell;

pub(crate) fn saturating_add(counter: &AtomicCell<u64>, value: u64) {
    let mut v0 = counter.load();
    loop {
        let v1 = v0.saturating_add(value);
        match counter.compare_exchange(v0, v1) {
            Ok(_) => break,
            Err(v2) => v0 = v2,
        }
    }
}

pub(crate) trait StatsCounter {
    type Stats;

    #[allow(unused_variables)]
    fn record_hits(&self, count: usize) {}

    #[allow(unused_variables)]
    fn record_misses(&self, count: usize) {}

    #[allow(unused_variables)]
    fn record_fetch_success(&self, fetch_time_nanos: u64) {}

    #[allow(unused_variables)]
    fn record_fetch_failure(&self, fetch_time_nanos: u64) {}

    fn record_coalesced(&self) {}

    #[allow(unused_variables)]
    fn record_rejections(&self, count: usize) {}

    fn snapshot(&self) -> Self::Stats;
}

/// A `StatsCounter` that does not record any cache events.
#[derive(Default)]
pub(crate) struct DisabledStatsCounter;

impl StatsCounter for DisabledStatsCounter {
    type Stats = CacheStats;

    fn snapshot(&self) -> Self::Stats {
        // Return a `CacheStats` with all fields set to 0.
        CacheStats::default()
    }
}

#[derive(Default)]
pub(crate) struct DefaultStatsCounter {
    hit_count: AtomicCell<u64>,
    miss_count: AtomicCell<u64>,
    fetch_success_count: AtomicCell<u64>,
    fetch_failure_count: AtomicCell<u64>,
    total_fetch_time: AtomicCell<u64>,
    coalesced_count: AtomicCell<u64>,
    rejected_count: AtomicCell<u64>,
}

impl StatsCounter for DefaultStatsCounter {
    type Stats = CacheStats;

    fn record_hits(&self, count: usize) {
        saturating_add(&self.hit_count, count as u64);
    }

    fn record_misses(&self, count: usize) {
        saturating_add(&self.miss_count, count as u64);
    }

    fn record_fetch_success(&self, fetch_time_nanos: u64) {
        saturating_add(&self.fetch_success_count, 1);
        saturating_add(&self.total_fetch_time, fetch_time_nanos);
    }

    fn record_fetch_failure(&self, fetch_time_nanos: u64) {
        saturating_add(&self.fetch_failure_count, 1);
        saturating_add(&self.total_fetch_time, fetch_time_nanos);
    }

    fn record_coalesced(&self) {
        saturating_add(&self.coalesced_count, 1);
    }

    fn record_rejections(&self, count: usize) {
        saturating_add(&self.rejected_count, count as u64);
    }

    fn snapshot(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        stats
            .set_req_counts(self.hit_count.load(), self.miss_count.load())
            .set_fetch_counts(
                self.fetch_success_count.load(),
                self.fetch_failure_count.load(),
                self.total_fetch_time.load(),
            )
            .set_coalesced_count(self.coalesced_count.load())
            .set_rejected_count(self.rejected_count.load());
        stats
    }
}
