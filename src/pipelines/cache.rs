use crate::error::{PipelineError, Result};
use crate::pipelines::sentiment::model::SequenceClassificationModel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type SharedModel = Arc<dyn SequenceClassificationModel>;

// Stores WEAK references - weights are freed when every handle using them drops,
// and the next load for that key repeats the full download/mmap.
type CacheStorage = HashMap<String, Weak<dyn SequenceClassificationModel>>;

/// Shares loaded classifier weights between handles of one session.
///
/// There is no process-wide instance; whoever owns the models owns the cache.
pub struct ModelCache {
    cache: Mutex<CacheStorage>,
}

impl ModelCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get_or_create<F>(&self, key: &str, loader: F) -> Result<SharedModel>
    where
        F: FnOnce() -> Result<SharedModel>,
    {
        {
            let mut cache = self.lock()?;
            if let Some(weak) = cache.get(key) {
                if let Some(strong) = weak.upgrade() {
                    tracing::debug!(key, "reusing cached classifier");
                    return Ok(strong);
                }
                // Weak ref dead, remove stale entry
                cache.remove(key);
            }
        }

        let model = loader()?;

        {
            let mut cache = self.lock()?;
            cache.insert(key.to_string(), Arc::downgrade(&model));
        }

        Ok(model)
    }

    /// Forget every entry. Live handles keep their weights.
    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Number of entries whose weights are still alive.
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether no live weights are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheStorage>> {
        self.cache
            .lock()
            .map_err(|_| PipelineError::Unexpected("model cache lock poisoned".to_string()))
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("live_entries", &self.len())
            .finish()
    }
}
