//! Redis-backed announcement cache.
//!
//! Keys are namespaced under `conference:` so the cache can share a Redis instance.

use conference_core::{BoxFuture, Cache, CacheError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// `Redis` implementation of [`Cache`].
///
/// # Example
///
/// ```no_run
/// use conference::cache::RedisCache;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisCache {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to `Redis` at `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the URL is invalid or the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    fn cache_key(key: &str) -> String {
        format!("conference:{key}")
    }
}

impl Cache for RedisCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, CacheError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            conn.get(Self::cache_key(key))
                .await
                .map_err(|e| CacheError(format!("Failed to read {key}: {e}")))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .set(Self::cache_key(key), value)
                .await
                .map_err(|e| CacheError(format!("Failed to write {key}: {e}")))?;
            tracing::debug!(key, "Cache entry written");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let _: () = conn
                .del(Self::cache_key(key))
                .await
                .map_err(|e| CacheError(format!("Failed to delete {key}: {e}")))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(
            RedisCache::cache_key("RECENT_ANNOUNCEMENTS"),
            "conference:RECENT_ANNOUNCEMENTS"
        );
    }

    #[tokio::test]
    async fn invalid_url_is_a_cache_error() {
        let err = RedisCache::new("not a url").await.err();
        assert!(err.is_some_and(|e| e.0.contains("Redis client")));
    }
}
