pub(crate) mod cacheability;
pub(crate) mod key_set;
pub(crate) mod store;
pub(crate) mod time;

/// The maximum number of times a caller restarts a fetch after the fetcher
/// call it waited on panicked.
pub(crate) const MAX_RETRIES: usize = 200;

/// Prefix for log lines of a named cache, e.g. `[products] `.
#[cfg(feature = "logging")]
pub(crate) fn log_prefix(cache_name: Option<&str>) -> String {
    cache_name.map(|n| format!("[{n}] ")).unwrap_or_default()
}

pub(crate) fn panic_if_retry_exhausted(retries: usize, max: usize) {
    if retries >= max {
        panic!(
            "Too many retries. Tried to read the result of a pending fetch \
    but failed {} times. Maybe the fetcher kept panicking?",
            retries
        );
    }
}
