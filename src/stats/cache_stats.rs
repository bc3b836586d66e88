use std::{
    fmt::{self, Debug},
    ops::Add,
};

/// Statistics about the performance of a cache.
///
/// Cache statistics are incremented according to the following rules:
///
/// - Every key of a `fetch` call that is found in the cache increments
///   `hit_count`; every key that is not increments `miss_count`.
///     - When the caller starts a new fetcher call for the missing keys and it
///       succeeds, `fetch_success_count` is incremented. When it fails,
///       `fetch_failure_count` is incremented. Either way the time spent in the
///       fetcher, in nanoseconds, is added to `total_fetch_time_nanos`.
///     - When the caller instead waits for a pending fetcher call for the same
///       missing keys, `coalesced_count` is incremented, and none of the fetch
///       counters change.
/// - Every fetched value refused by the cacheability predicate increments
///   `rejected_count`.
/// - `invalidate` does not modify any statistics.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    hit_count: u64,
    miss_count: u64,
    fetch_success_count: u64,
    fetch_failure_count: u64,
    total_fetch_time_nanos: u64,
    coalesced_count: u64,
    rejected_count: u64,
}

impl Debug for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStats")
            .field("request_count", &self.request_count())
            .field("hit_count", &self.hit_count)
            .field("hit_rate", &self.hit_rate())
            .field("miss_count", &self.miss_count)
            .field("miss_rate", &self.miss_rate())
            .field("fetch_count", &self.fetch_count())
            .field("fetch_success_count", &self.fetch_success_count)
            .field("fetch_failure_count", &self.fetch_failure_count)
            .field("fetch_failure_rate", &self.fetch_failure_rate())
            .field("total_fetch_time_nanos", &self.total_fetch_time_nanos)
            .field(
                "average_fetch_penalty_nanos",
                &self.average_fetch_penalty_nanos(),
            )
            .field("coalesced_count", &self.coalesced_count)
            .field("rejected_count", &self.rejected_count)
            .finish()
    }
}

impl CacheStats {
    pub(crate) fn set_req_counts(&mut self, hit_count: u64, miss_count: u64) -> &mut Self {
        self.hit_count = hit_count;
        self.miss_count = miss_count;
        self
    }

    pub(crate) fn set_fetch_counts(
        &mut self,
        fetch_success_count: u64,
        fetch_failure_count: u64,
        total_fetch_time_nanos: u64,
    ) -> &mut Self {
        self.fetch_success_count = fetch_success_count;
        self.fetch_failure_count = fetch_failure_count;
        self.total_fetch_time_nanos = total_fetch_time_nanos;
        self
    }

    pub(crate) fn set_coalesced_count(&mut self, count: u64) -> &mut Self {
        self.coalesced_count = count;
        self
    }

    pub(crate) fn set_rejected_count(&mut self, count: u64) -> &mut Self {
        self.rejected_count = count;
        self
    }

    /// Number of keys looked up, whether cached or not.
    pub fn request_count(&self) -> u64 {
        self.hit_count.saturating_add(self.miss_count)
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn hit_rate(&self) -> f64 {
        let req_count = self.request_count();
        if req_count == 0 {
            1.0
        } else {
            self.hit_count as f64 / req_count as f64
        }
    }

    pub fn miss_count(&self) -> u64 {
        self.miss_count
    }

    pub fn miss_rate(&self) -> f64 {
        let req_count = self.request_count();
        if req_count == 0 {
            0.0
        } else {
            self.miss_count as f64 / req_count as f64
        }
    }

    /// Number of fetcher calls made by the cache.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_success_count
            .saturating_add(self.fetch_failure_count)
    }

    pub fn fetch_success_count(&self) -> u64 {
        self.fetch_success_count
    }

    pub fn fetch_failure_count(&self) -> u64 {
        self.fetch_failure_count
    }

    pub fn fetch_failure_rate(&self) -> f64 {
        let fetch_count = self.fetch_count();
        if fetch_count == 0 {
            0.0
        } else {
            self.fetch_failure_count as f64 / fetch_count as f64
        }
    }

    pub fn total_fetch_time_nanos(&self) -> u64 {
        self.total_fetch_time_nanos
    }

    pub fn average_fetch_penalty_nanos(&self) -> f64 {
        let fetch_count = self.fetch_count();
        if fetch_count == 0 {
            0.0
        } else {
            self.total_fetch_time_nanos as f64 / fetch_count as f64
        }
    }

    /// Number of callers that waited on another caller's fetch instead of
    /// starting their own.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced_count
    }

    /// Number of fetched values that were returned but not cached.
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }
}

impl<'a, 'b> Add<&'b CacheStats> for &'a CacheStats {
    type Output = CacheStats;

    fn add(self, other: &'b CacheStats) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.saturating_add(other.hit_count),
            miss_count: self.miss_count.saturating_add(other.miss_count),
            fetch_success_count: self
                .fetch_success_count
                .saturating_add(other.fetch_success_count),
            fetch_failure_count: self
                .fetch_failure_count
                .saturating_add(other.fetch_failure_count),
            total_fetch_time_nanos: self
                .total_fetch_time_nanos
                .saturating_add(other.total_fetch_time_nanos),
            coalesced_count: self.coalesced_count.saturating_add(other.coalesced_count),
            rejected_count: self.rejected_count.saturating_add(other.rejected_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CacheStats;

    #[test]
    fn rates_of_empty_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.request_count(), 0);
        assert_eq!(stats.hit_rate(), 1.0);
        assert_eq!(stats.miss_rate(), 0.0);
        assert_eq!(stats.fetch_failure_rate(), 0.0);
        assert_eq!(stats.average_fetch_penalty_nanos(), 0.0);
    }

    #[test]
    fn rates() {
        let mut stats = CacheStats::default();
        stats
            .set_req_counts(3, 1)
            .set_fetch_counts(3, 1, 400)
            .set_coalesced_count(2)
            .set_rejected_count(5);

        assert_eq!(stats.request_count(), 4);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.miss_rate(), 0.25);
        assert_eq!(stats.fetch_count(), 4);
        assert_eq!(stats.fetch_failure_rate(), 0.25);
        assert_eq!(stats.average_fetch_penalty_nanos(), 100.0);
        assert_eq!(stats.coalesced_count(), 2);
        assert_eq!(stats.rejected_count(), 5);
    }

    #[test]
    fn add_saturates() {
        let mut a = CacheStats::default();
        a.set_req_counts(u64::MAX, 1);
        let mut b = CacheStats::default();
        b.set_req_counts(1, 2).set_coalesced_count(7);

        let sum = &a + &b;
        assert_eq!(sum.hit_count(), u64::MAX);
        assert_eq!(sum.miss_count(), 3);
        assert_eq!(sum.coalesced_count(), 7);
    }
}
