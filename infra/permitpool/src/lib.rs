//! # Permit pool
//!
//! Bounds how many operations run at once. A [`Permit`] is held for the duration of
//! the work and returned to the pool when dropped.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::trace;

/// Pool size used when a non-positive count is requested.
pub const DEFAULT_PERMITS: usize = 128;

#[derive(Debug, Clone)]
pub struct PermitPool {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// A slot in a [`PermitPool`], released on drop.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl PermitPool {
    /// Creates a pool of `permits` slots; zero or a negative count means [`DEFAULT_PERMITS`].
    #[must_use]
    pub fn new(permits: i64) -> Self {
        let max = usize::try_from(permits).ok().filter(|&n| n > 0).unwrap_or(DEFAULT_PERMITS);
        Self { semaphore: Arc::new(Semaphore::new(max)), max }
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Permit {
        let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is private and never closed.
            Err(_) => unreachable!("permit pool semaphore closed"),
        };
        trace!(in_use = self.current_permits(), max = self.max, "Permit acquired");
        Permit { _permit: permit }
    }

    /// Takes a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<Permit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Some(Permit { _permit: permit }),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }

    /// Slots currently held.
    #[must_use]
    pub fn current_permits(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }

    #[must_use]
    pub const fn max_permits(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_size() {
        assert_eq!(PermitPool::new(0).max_permits(), DEFAULT_PERMITS);
        assert_eq!(PermitPool::new(-4).max_permits(), DEFAULT_PERMITS);
        assert_eq!(PermitPool::new(3).max_permits(), 3);
    }

    #[test]
    fn test_try_acquire_and_release() {
        let pool = PermitPool::new(2);
        let a = pool.try_acquire().unwrap();
        let _b = pool.try_acquire().unwrap();
        assert_eq!(pool.current_permits(), 2);
        assert!(pool.try_acquire().is_none());

        drop(a);
        assert_eq!(pool.current_permits(), 1);
        assert!(pool.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let pool = PermitPool::new(1);
        let held = pool.acquire().await;

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let _permit = pool.acquire().await;
                pool.current_permits()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(held);
        assert_eq!(waiter.await.unwrap(), 1);
        assert_eq!(pool.current_permits(), 0);
    }
}
