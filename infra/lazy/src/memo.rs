use std::future::Future;
use std::sync::OnceLock;
use tokio::sync::OnceCell;

/// A value computed on first use.
#[derive(Debug)]
pub struct Memo<T> {
    cell: OnceLock<T>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Memo<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { cell: OnceLock::new() }
    }

    /// Returns the value, running `init` if nobody has yet. Concurrent callers block
    /// until the winning initializer finishes.
    pub fn get_or_init<F: FnOnce() -> T>(&self, init: F) -> &T {
        self.cell.get_or_init(init)
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Async counterpart of [`Memo`].
///
/// A failed initialization leaves the memo empty, so the next caller tries again.
#[derive(Debug)]
pub struct AsyncMemo<T> {
    cell: OnceCell<T>,
}

impl<T> Default for AsyncMemo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncMemo<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self { cell: OnceCell::const_new() }
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> &T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.cell.get_or_init(init).await
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_try_init(init).await
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_memo() {
        let memo = Memo::new();
        assert!(!memo.is_initialized());
        assert_eq!(memo.get(), None);
        assert_eq!(*memo.get_or_init(|| 7), 7);
        assert_eq!(*memo.get_or_init(|| 8), 7);
        assert_eq!(memo.get(), Some(&7));
    }

    #[tokio::test]
    async fn test_async_memo_single_flight() {
        let memo = Arc::new(AsyncMemo::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let memo = Arc::clone(&memo);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    *memo
                        .get_or_init(|| async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            42
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.is_initialized());
    }

    #[tokio::test]
    async fn test_async_memo_retries_after_error() {
        let memo = AsyncMemo::<String>::new();
        let first: Result<&String, &str> = memo.get_or_try_init(|| async { Err("unavailable") }).await;
        assert!(first.is_err());
        assert!(!memo.is_initialized());

        let second: Result<&String, &str> = memo.get_or_try_init(|| async { Ok("ready".to_owned()) }).await;
        assert_eq!(second.unwrap(), "ready");
    }
}
