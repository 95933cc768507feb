/// Read-through caching for a [`RecommendationCache`](crate::db::RecommendationCache).
///
/// Looks the key up first. On a hit the cached page is returned and the block
/// never runs. On a miss the block is awaited and its value is written back
/// with the given TTL under the ticket the lookup issued, so an invalidation
/// that lands while the block runs is not undone by the write.
///
/// # Arguments
/// * `$cache`: anything exposing `get_from_cache` and `store`.
/// * `$key`: the [`ResultKey`](crate::db::ResultKey) to look up.
/// * `$ttl`: time-to-live in seconds for the written entry.
/// * `$block`: future computing the value on a miss.
///
/// # Example
/// ```rust,ignore
/// let page: AppResult<RecommendationResult> = cached!(self.cache, key, 300, async {
///     let candidates = self.generator.home(actor).await?;
///     Ok::<_, AppError>(self.rank_home(candidates, page, page_size).await)
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = &$key;
        match $cache.get_from_cache(key).await {
            Ok($crate::db::CacheLookup::Hit(cached)) => {
                tracing::debug!(key = %key, cache = "hit", "Recommendation cache hit");
                Ok(cached)
            }
            Ok($crate::db::CacheLookup::Miss(ticket)) => {
                tracing::debug!(key = %key, cache = "miss", "Recommendation cache miss");
                match $block.await {
                    Ok(value) => $cache.store(&ticket, &value, $ttl).await.map(|_| value),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }};
}
