use hashlink::LruCache;

use crate::statement::MySqlStatement;

/// A bounded cache of auto-prepared statements, keyed by the SQL text and
/// the iterable flag it was prepared under. When full, the least recently
/// used statement is evicted so the caller can send `COM_STMT_CLOSE` for it.
#[derive(Debug)]
pub(crate) struct StatementCache {
    inner: LruCache<(bool, String), MySqlStatement>,
}

impl StatementCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Looks up a statement, marking it most recently used on a hit.
    pub(crate) fn get(&mut self, iterable: bool, sql: &str) -> Option<&MySqlStatement> {
        // hashlink promotes on `get`
        self.inner
            .get(&(iterable, sql.to_owned()))
            .map(|stmt| &*stmt)
    }

    /// Inserts a statement, returning the evicted least-recently-used
    /// statement when the cache was full.
    pub(crate) fn insert(
        &mut self,
        iterable: bool,
        sql: &str,
        statement: MySqlStatement,
    ) -> Option<MySqlStatement> {
        let key = (iterable, sql.to_owned());
        let mut evicted = None;

        if self.inner.len() == self.inner.capacity() && !self.inner.contains_key(&key) {
            evicted = self.inner.remove_lru().map(|(_, stmt)| stmt);
        }

        self.inner.insert(key, statement);

        evicted
    }

    pub(crate) fn remove_lru(&mut self) -> Option<MySqlStatement> {
        self.inner.remove_lru().map(|(_, stmt)| stmt)
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::StatementCache;
    use crate::statement::MySqlStatement;

    fn stmt(id: u32) -> MySqlStatement {
        MySqlStatement {
            id,
            params: 0,
            columns: 0,
        }
    }

    #[test]
    fn it_evicts_least_recently_used() {
        let mut cache = StatementCache::new(2);

        assert!(cache.insert(false, "a", stmt(1)).is_none());
        assert!(cache.insert(false, "b", stmt(2)).is_none());

        // touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get(false, "a").map(|s| s.id), Some(1));

        let evicted = cache.insert(false, "c", stmt(3)).unwrap();
        assert_eq!(evicted.id, 2);

        assert!(cache.get(false, "b").is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn it_keys_on_the_iterable_flag() {
        let mut cache = StatementCache::new(4);

        cache.insert(false, "a", stmt(1));
        cache.insert(true, "a", stmt(2));

        assert_eq!(cache.get(false, "a").map(|s| s.id), Some(1));
        assert_eq!(cache.get(true, "a").map(|s| s.id), Some(2));
    }

    #[test]
    fn reinserting_an_existing_key_does_not_evict() {
        let mut cache = StatementCache::new(2);

        cache.insert(false, "a", stmt(1));
        cache.insert(false, "b", stmt(2));

        assert!(cache.insert(false, "a", stmt(3)).is_none());
        assert_eq!(cache.get(false, "b").map(|s| s.id), Some(2));
    }
}
