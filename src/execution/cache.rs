//! Time-bounded result cache keyed by exact SQL text.

use crate::error::Result;
use crate::execution::QueryExecutor;
use crate::frame::ResultFrame;
use crate::sql::Dialect;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wraps an engine and remembers successful results for `ttl`.
///
/// Failed executions are not cached, so a transient error is retried on the
/// next render pass rather than pinned for the whole interval.
pub struct CachedExecutor<E> {
    inner: E,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, ResultFrame)>>,
}

impl<E: QueryExecutor> CachedExecutor<E> {
    pub fn new(inner: E, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            let dropped = entries.len();
            entries.clear();
            info!("Cleared {} cached results", dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, sql: &str) -> Option<ResultFrame> {
        let mut entries = self.entries.lock().ok()?;
        let (stored, frame) = entries.get(sql)?;
        if stored.elapsed() < self.ttl {
            return Some(frame.clone());
        }
        entries.remove(sql);
        None
    }

    fn store(&self, sql: &str, frame: &ResultFrame) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(sql.to_string(), (Instant::now(), frame.clone()));
        }
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for CachedExecutor<E> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn execute(&self, sql: &str) -> Result<ResultFrame> {
        if let Some(frame) = self.lookup(sql) {
            debug!("cache hit ({} rows)", frame.row_count());
            return Ok(frame);
        }
        let frame = self.inner.execute(sql).await?;
        self.store(sql, &frame);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrendError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl QueryExecutor for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn execute(&self, _sql: &str) -> Result<ResultFrame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TrendError::Execution("boom".to_string()));
            }
            ResultFrame::new(vec!["x".to_string()], vec![vec![json!(1)]])
        }
    }

    fn counting(fail: bool) -> Counting {
        Counting {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_and_clear() {
        let cache = CachedExecutor::new(counting(false), Duration::from_secs(600));
        cache.execute("SELECT 1").await.unwrap();
        cache.execute("SELECT 1").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);

        cache.execute("SELECT  1").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);

        cache.clear();
        assert!(cache.is_empty());
        cache.execute("SELECT 1").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let cache = CachedExecutor::new(counting(false), Duration::ZERO);
        cache.execute("SELECT 1").await.unwrap();
        cache.execute("SELECT 1").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = CachedExecutor::new(counting(true), Duration::from_secs(600));
        assert!(cache.execute("SELECT 1").await.is_err());
        assert!(cache.execute("SELECT 1").await.is_err());
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
