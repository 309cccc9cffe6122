use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use lru::LruCache;

use crate::bus::ExecutionContext;
use crate::command::Command;
use crate::core::BusError;
use crate::policy::InterceptionPolicy;

const DEFAULT_GROUP_CAPACITY: usize = 256;

type Slot = Arc<dyn Any + Send + Sync>;

lazy_static! {
    static ref GLOBAL_CACHE: Arc<CommandCache> = Arc::new(CommandCache::new());
}

/// Grouped LRU store backing the cache-aside policy.
///
/// Values are type-erased; `get` returns `None` when the stored value is of
/// a different type than requested.
pub struct CommandCache {
    group_capacity: NonZeroUsize,
    groups: Mutex<HashMap<String, LruCache<String, Slot>>>,
}

impl CommandCache {
    /// The process-wide default store shared by policies created with
    /// [`CacheAsidePolicy::new`].
    pub fn global() -> &'static Arc<CommandCache> {
        &GLOBAL_CACHE
    }

    pub fn new() -> Self {
        Self::with_group_capacity(DEFAULT_GROUP_CAPACITY)
    }

    pub fn with_group_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            group_capacity: capacity,
            groups: Mutex::new(HashMap::new()),
        }
    }

    pub fn get<T: Clone + Send + Sync + 'static>(&self, group: &str, key: &str) -> Option<T> {
        let mut groups = self.lock_groups();
        let cache = groups.get_mut(group)?;
        cache
            .get(key)
            .and_then(|slot| slot.downcast_ref::<T>())
            .cloned()
    }

    pub fn put<T: Send + Sync + 'static>(&self, group: &str, key: &str, value: T) {
        let mut groups = self.lock_groups();
        let cache = groups
            .entry(group.to_string())
            .or_insert_with(|| LruCache::new(self.group_capacity));
        cache.put(key.to_string(), Arc::new(value));
    }

    pub fn remove(&self, group: &str, key: &str) -> bool {
        let mut groups = self.lock_groups();
        groups
            .get_mut(group)
            .and_then(|cache| cache.pop(key))
            .is_some()
    }

    pub fn clear_group(&self, group: &str) {
        self.lock_groups().remove(group);
    }

    pub fn group_len(&self, group: &str) -> usize {
        self.lock_groups().get(group).map_or(0, LruCache::len)
    }

    fn lock_groups(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, LruCache<String, Slot>>> {
        // A poisoned lock still guards a structurally valid map.
        match self.groups.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for CommandCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A command whose result can be served from and stored into a cache.
pub trait Cacheable: Command {
    /// Key identifying this command shape within its cache group.
    fn cache_key(&self) -> String;

    /// The value to store after a successful execution, usually the result
    /// slot. `None` skips the store.
    fn result_to_cache(&self) -> Option<Self::Output>;

    /// Pre-fill the result slot from a cached value.
    fn apply_cached(&mut self, value: Self::Output);
}

/// Cache-aside interception policy.
///
/// On a cache hit the pre-hook pre-fills the command's result slot and
/// vetoes execution; on a miss the executor runs and the post-hook stores
/// the fresh result under the configured group. A dispatch served from the
/// cache never writes back.
pub struct CacheAsidePolicy {
    cache: Arc<CommandCache>,
    group: String,
}

impl CacheAsidePolicy {
    /// Policy over the process-wide default store.
    pub fn new(group: &str) -> Self {
        Self::with_cache(Arc::clone(CommandCache::global()), group)
    }

    pub fn with_cache(cache: Arc<CommandCache>, group: &str) -> Self {
        Self {
            cache,
            group: group.to_string(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn hit_marker(&self, key: &str) -> String {
        format!("cache:hit:{}:{}", self.group, key)
    }
}

impl<C> InterceptionPolicy<C> for CacheAsidePolicy
where
    C: Cacheable,
    C::Output: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "cache_aside"
    }

    fn pre_execute(&self, ctx: &ExecutionContext, command: &mut C) -> bool {
        let key = command.cache_key();
        match self.cache.get::<C::Output>(&self.group, &key) {
            Some(value) => {
                command.apply_cached(value);
                ctx.items().insert(&self.hit_marker(&key), true);
                log::debug!("cache hit for '{}' in group '{}'", key, self.group);
                false
            }
            None => true,
        }
    }

    fn post_execute(&self, ctx: &ExecutionContext, command: &mut C, fault: Option<&BusError>) {
        if fault.is_some() {
            return;
        }

        let key = command.cache_key();
        if ctx.items().contains(&self.hit_marker(&key)) {
            // Served from the cache in pre_execute; nothing fresh to store.
            return;
        }

        if let Some(value) = command.result_to_cache() {
            self.cache.put(&self.group, &key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let cache = CommandCache::new();

        cache.put("customers", "ann", 1u64);
        assert_eq!(cache.get::<u64>("customers", "ann"), Some(1));
        assert_eq!(cache.group_len("customers"), 1);

        assert!(cache.remove("customers", "ann"));
        assert!(!cache.remove("customers", "ann"));
        assert_eq!(cache.get::<u64>("customers", "ann"), None);
    }

    #[test]
    fn test_type_mismatch_misses() {
        let cache = CommandCache::new();
        cache.put("g", "k", "text".to_string());
        assert_eq!(cache.get::<u64>("g", "k"), None);
        assert_eq!(cache.get::<String>("g", "k"), Some("text".to_string()));
    }

    #[test]
    fn test_groups_are_independent() {
        let cache = CommandCache::new();
        cache.put("a", "k", 1u64);
        cache.put("b", "k", 2u64);

        cache.clear_group("a");
        assert_eq!(cache.get::<u64>("a", "k"), None);
        assert_eq!(cache.get::<u64>("b", "k"), Some(2));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = CommandCache::with_group_capacity(2);
        cache.put("g", "one", 1u64);
        cache.put("g", "two", 2u64);
        cache.put("g", "three", 3u64);

        assert_eq!(cache.get::<u64>("g", "one"), None);
        assert_eq!(cache.get::<u64>("g", "three"), Some(3));
    }
}
