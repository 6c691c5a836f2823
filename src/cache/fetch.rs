use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::TtlCache;

impl<V: Clone> TtlCache<V> {
    /// Returns the cached value for `key`, or runs `producer` and caches what it returns.
    ///
    /// - A fresh hit returns immediately and never calls the producer.
    /// - On a miss the producer runs exactly once; an `Ok` value is stored with
    ///   `ttl` (or the cache default) and returned.
    /// - An `Err` is returned unchanged and nothing is stored, so the next
    ///   call tries again.
    ///
    /// Concurrent misses on the same key are not merged: each caller runs its
    /// own producer and the last one to finish wins the slot.
    ///
    /// # Example
    /// ```ignore
    /// let platforms = registry
    ///     .platforms()
    ///     .get_or_fetch(keys::PLATFORMS, None, || api.platforms())
    ///     .await?;
    /// ```
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        debug!(cache = self.name(), key, "fetching from origin");
        let value = producer().await?;

        match ttl {
            Some(ttl) => self.set_with_ttl(key, value.clone(), ttl),
            None => self.set(key, value.clone()),
        }
        Ok(value)
    }
}
