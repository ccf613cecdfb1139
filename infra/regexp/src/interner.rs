use crate::error::{RegexpError, RegexpErrorExt};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::{Arc, LazyLock, Weak};
use tracing::trace;

/// Entries are swept once the map holds this many patterns.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 256;

static GLOBAL: LazyLock<Interner> = LazyLock::new(Interner::new);

/// Compiles `pattern`, sharing the result with every other live caller of the same
/// pattern.
///
/// # Errors
/// Returns [`RegexpError::Compile`] if the pattern is invalid.
pub fn compile(pattern: &str) -> Result<Arc<Regex>, RegexpError> {
    GLOBAL.compile(pattern)
}

/// Like [`compile`] but for patterns known to be valid at build time.
///
/// # Panics
/// Panics if the pattern does not compile.
#[must_use]
pub fn must_compile(pattern: &str) -> Arc<Regex> {
    match GLOBAL.compile(pattern) {
        Ok(regex) => regex,
        Err(e) => panic!("keel_regexp::must_compile({pattern:?}): {e}"),
    }
}

/// Process-wide interner used by [`compile`].
pub fn global() -> &'static Interner {
    &GLOBAL
}

/// Pattern → compiled regex map that only holds weak references.
///
/// A compiled regex lives as long as somebody holds the returned `Arc`; afterwards the
/// slot is dead and the next [`Interner::compile`] for that pattern recompiles it.
#[derive(Debug)]
pub struct Interner {
    inner: Mutex<State>,
}

#[derive(Debug)]
struct State {
    entries: FxHashMap<String, Weak<Regex>>,
    sweep_at: usize,
    min_sweep: usize,
}

/// Snapshot of an [`Interner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternerStats {
    /// Slots in the map, dead or alive.
    pub entries: usize,
    /// Slots whose regex is still referenced.
    pub live: usize,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }

    #[must_use]
    pub fn with_sweep_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            inner: Mutex::new(State {
                entries: FxHashMap::default(),
                sweep_at: threshold,
                min_sweep: threshold,
            }),
        }
    }

    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>, RegexpError> {
        let mut state = self.inner.lock();
        if let Some(live) = state.entries.get(pattern).and_then(Weak::upgrade) {
            return Ok(live);
        }

        // Compiling under the lock keeps two racing callers from producing two copies.
        let regex = Arc::new(Regex::new(pattern).context(format!("{pattern:?}"))?);
        state.entries.insert(pattern.to_owned(), Arc::downgrade(&regex));

        if state.entries.len() >= state.sweep_at {
            let before = state.entries.len();
            state.entries.retain(|_, weak| weak.strong_count() > 0);
            let live = state.entries.len();
            state.sweep_at = (live * 2).max(state.min_sweep);
            trace!(before, live, next_sweep = state.sweep_at, "Swept regexp interner");
        }
        Ok(regex)
    }

    pub fn stats(&self) -> InternerStats {
        let state = self.inner.lock();
        InternerStats {
            entries: state.entries.len(),
            live: state.entries.values().filter(|w| w.strong_count() > 0).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shares_live_regex() {
        let interner = Interner::new();
        let a = interner.compile(r"^v\d+$").unwrap();
        let b = interner.compile(r"^v\d+$").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.stats(), InternerStats { entries: 1, live: 1 });
    }

    #[test]
    fn test_recompiles_after_drop() {
        let interner = Interner::new();
        drop(interner.compile("abc").unwrap());
        assert_eq!(interner.stats(), InternerStats { entries: 1, live: 0 });

        let second = interner.compile("abc").unwrap();
        assert!(second.is_match("xabcx"));
        assert_eq!(interner.stats().live, 1);
    }

    #[test]
    fn test_sweeps_dead_entries() {
        let interner = Interner::with_sweep_threshold(4);
        let keep = interner.compile("keep").unwrap();
        for i in 0..3 {
            drop(interner.compile(&format!("dead{i}")).unwrap());
        }
        // The fourth insert hit the threshold while "dead2" was still held.
        assert_eq!(interner.stats(), InternerStats { entries: 2, live: 1 });
        assert!(keep.is_match("keep"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Interner::new().compile("(unclosed").unwrap_err();
        assert!(matches!(err, RegexpError::Compile { .. }));
        assert_eq!(err.context_message(), Some("\"(unclosed\""));
    }

    #[test]
    fn test_global_helpers() {
        let a = compile("^keel-global$").unwrap();
        let b = must_compile("^keel-global$");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(global().stats().live >= 1);
    }

    #[test]
    #[should_panic(expected = "must_compile")]
    fn test_must_compile_panics() {
        let _ = must_compile("[");
    }
}
