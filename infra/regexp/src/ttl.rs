use crate::error::{RegexpError, RegexpErrorExt};
use moka::sync::Cache;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Bounded cache of compiled patterns that forgets entries left unused for `ttl`.
///
/// Unlike the interner this keeps regexes alive on its own, which suits patterns that
/// arrive from requests and are reused in bursts.
#[derive(Debug, Clone)]
pub struct TtlRegexCache {
    cache: Cache<String, Arc<Regex>>,
}

impl TtlRegexCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder().time_to_idle(ttl).max_capacity(capacity).build();
        Self { cache }
    }

    pub fn get_or_compile(&self, pattern: &str) -> Result<Arc<Regex>, RegexpError> {
        if let Some(hit) = self.cache.get(pattern) {
            return Ok(hit);
        }
        let regex = Arc::new(Regex::new(pattern).context(format!("{pattern:?}"))?);
        debug!(pattern, "Caching compiled regexp");
        self.cache.insert(pattern.to_owned(), Arc::clone(&regex));
        Ok(regex)
    }

    /// Number of cached patterns after pending evictions have been applied.
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }
}
