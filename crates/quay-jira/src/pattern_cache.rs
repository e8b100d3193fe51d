//! Time-expiring cache for compiled patterns.
//!
//! Pattern compilation is expensive relative to how often the same filter or
//! trigger phrase shows up (every push re-evaluates them), so compiled
//! patterns are kept keyed by their source string and dropped after a period
//! of disuse. The cache is an explicit, injectable service rather than
//! process-wide static state so tests can reset it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use regex::Regex;

const DEFAULT_IDLE_EXPIRY: Duration = Duration::from_secs(2 * 60 * 60);
const DEFAULT_CAPACITY: usize = 256;

struct CacheSlot {
    pattern: Arc<Regex>,
    last_used: Instant,
}

pub struct PatternCache {
    idle_expiry: Duration,
    capacity: usize,
    slots: Mutex<HashMap<String, CacheSlot>>,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_EXPIRY, DEFAULT_CAPACITY)
    }
}

impl PatternCache {
    pub fn new(idle_expiry: Duration, capacity: usize) -> Self {
        Self {
            idle_expiry,
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached pattern for `key`, compiling it on first use.
    ///
    /// Expired entries are evicted on access; a hit refreshes the entry's
    /// idle clock. Compilation failures are not cached.
    pub fn get_or_compile<F>(&self, key: &str, compile: F) -> Result<Arc<Regex>>
    where
        F: FnOnce() -> Result<Regex>,
    {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| {
            // A panic while holding the lock cannot leave a slot half-written;
            // the map only ever holds fully compiled patterns.
            poisoned.into_inner()
        });
        slots.retain(|_, slot| now.duration_since(slot.last_used) < self.idle_expiry);

        if let Some(slot) = slots.get_mut(key) {
            slot.last_used = now;
            return Ok(Arc::clone(&slot.pattern));
        }

        let pattern = Arc::new(compile()?);
        if slots.len() >= self.capacity {
            let stalest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| key.clone());
            if let Some(stalest) = stalest {
                slots.remove(&stalest);
            }
        }
        slots.insert(
            key.to_string(),
            CacheSlot {
                pattern: Arc::clone(&pattern),
                last_used: now,
            },
        );
        Ok(pattern)
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::bail;
    use regex::Regex;

    use super::PatternCache;

    fn compile_counter(counter: &std::cell::Cell<usize>) -> impl FnOnce() -> anyhow::Result<Regex> + '_ {
        move || {
            counter.set(counter.get() + 1);
            Ok(Regex::new(r"\d+")?)
        }
    }

    #[test]
    fn unit_second_lookup_reuses_compiled_pattern() {
        let cache = PatternCache::default();
        let compiles = std::cell::Cell::new(0);
        cache
            .get_or_compile("digits", compile_counter(&compiles))
            .expect("first");
        cache
            .get_or_compile("digits", compile_counter(&compiles))
            .expect("second");
        assert_eq!(compiles.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn functional_idle_entries_are_evicted_on_access() {
        let cache = PatternCache::new(Duration::from_millis(10), 8);
        let compiles = std::cell::Cell::new(0);
        cache
            .get_or_compile("digits", compile_counter(&compiles))
            .expect("first");
        std::thread::sleep(Duration::from_millis(25));
        cache
            .get_or_compile("digits", compile_counter(&compiles))
            .expect("after expiry");
        assert_eq!(compiles.get(), 2);
    }

    #[test]
    fn functional_capacity_evicts_the_stalest_entry() {
        let cache = PatternCache::new(Duration::from_secs(3600), 2);
        let compiles = std::cell::Cell::new(0);
        cache
            .get_or_compile("a", compile_counter(&compiles))
            .expect("a");
        cache
            .get_or_compile("b", compile_counter(&compiles))
            .expect("b");
        // Refresh "a" so "b" is the stalest when "c" arrives.
        cache
            .get_or_compile("a", compile_counter(&compiles))
            .expect("a again");
        cache
            .get_or_compile("c", compile_counter(&compiles))
            .expect("c");
        assert_eq!(cache.len(), 2);
        cache
            .get_or_compile("a", compile_counter(&compiles))
            .expect("a still cached");
        assert_eq!(compiles.get(), 4);
    }

    #[test]
    fn regression_compile_failure_is_not_cached() {
        let cache = PatternCache::default();
        let failed: anyhow::Result<_> = cache.get_or_compile("bad", || bail!("no pattern"));
        assert!(failed.is_err());
        assert!(cache.is_empty());

        cache
            .get_or_compile("bad", || Ok(Regex::new("good")?))
            .expect("recompile succeeds");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unit_clear_resets_the_cache() {
        let cache = PatternCache::default();
        cache
            .get_or_compile("digits", || Ok(Regex::new(r"\d+")?))
            .expect("compile");
        cache.clear();
        assert!(cache.is_empty());
    }
}
