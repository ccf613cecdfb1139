//! # Regexp caches
//!
//! Two ways to avoid recompiling the same pattern:
//!
//! - [`compile`] interns through a process-wide map of weak references, so identical
//!   patterns share one compiled [`Regex`] while anyone still uses it.
//! - [`TtlRegexCache`] owns its entries and evicts them after a period of disuse.

mod error;
mod interner;
mod ttl;

pub use error::{RegexpError, RegexpErrorExt};
pub use interner::{DEFAULT_SWEEP_THRESHOLD, Interner, InternerStats, compile, global, must_compile};
pub use regex::Regex;
pub use ttl::TtlRegexCache;
