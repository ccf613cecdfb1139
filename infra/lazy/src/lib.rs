//! # Lazy values
//!
//! Small wrappers that run an initializer at most once and hand out the memoized
//! outcome afterwards.
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! static CALLS: AtomicUsize = AtomicUsize::new(0);
//! let hostname = keel_lazy::once_value(|| {
//!     CALLS.fetch_add(1, Ordering::SeqCst);
//!     String::from("keel-01")
//! });
//!
//! assert_eq!(hostname(), "keel-01");
//! assert_eq!(hostname(), "keel-01");
//! assert_eq!(CALLS.load(Ordering::SeqCst), 1);
//! ```

mod memo;

pub use memo::{AsyncMemo, Memo};

/// Wraps `f` so that it runs on the first call only; later calls clone the result.
///
/// # Panics
/// If `f` panics, that call and every later call panic.
pub fn once_value<T, F>(f: F) -> impl Fn() -> T + Send + Sync
where
    T: Clone + Send + Sync,
    F: FnOnce() -> T + Send,
{
    let memo = Memo::new();
    let f = std::sync::Mutex::new(Some(f));
    move || {
        memo.get_or_init(|| {
            let init = f.lock().ok().and_then(|mut slot| slot.take());
            match init {
                Some(init) => init(),
                None => panic!("once_value initializer panicked on an earlier call"),
            }
        })
        .clone()
    }
}

/// Like [`once_value`] for fallible initializers. The first outcome is kept, an error
/// included; the initializer is never retried.
pub fn once_result<T, E, F>(f: F) -> impl Fn() -> Result<T, E> + Send + Sync
where
    T: Clone + Send + Sync,
    E: Clone + Send + Sync,
    F: FnOnce() -> Result<T, E> + Send,
{
    once_value(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_once_value_runs_once_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let value = Arc::new(once_value(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![1, 2, 3]
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let value = Arc::clone(&value);
                std::thread::spawn(move || value())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_once_result_keeps_error() {
        let calls = AtomicUsize::new(0);
        let load = once_result(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, String>("no such file".into())
        });
        assert_eq!(load(), Err("no such file".to_owned()));
        assert_eq!(load(), Err("no such file".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
