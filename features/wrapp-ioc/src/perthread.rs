//! Values scoped to the current thread, released by [PerThreadManager::cleanup].

use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct ThreadState {
    values: HashMap<String, Box<dyn Any>>,
    cleanup_callbacks: Vec<Box<dyn FnOnce()>>,
}

thread_local! {
    // Keyed by manager id, so registries do not share per-thread values
    static THREAD_STATES: RefCell<HashMap<u64, ThreadState>> = RefCell::new(HashMap::new());
}

/// Manages values which exist once per thread
///
/// Values are created on first access from a thread and live until that thread calls
/// [PerThreadManager::cleanup]. Cleanup never touches other threads' values.
#[derive(Debug)]
pub struct PerThreadManager {
    id: u64,
    next_value: AtomicU64,
}
impl Default for PerThreadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PerThreadManager {
    pub fn new() -> Self {
        PerThreadManager {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            next_value: AtomicU64::new(0),
        }
    }

    /// Creates a handle to a new per-thread value, initially absent on every thread
    pub fn create_value<T: Clone + 'static>(&self) -> PerThreadValue<'_, T> {
        let key = format!("value:{}", self.next_value.fetch_add(1, Ordering::Relaxed));
        PerThreadValue {
            manager: self,
            key,
            _value: PhantomData,
        }
    }

    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.with_state(|state| {
            state
                .values
                .get(key)
                .and_then(|value| value.downcast_ref::<T>())
                .cloned()
        })
    }

    pub fn set<T: 'static>(&self, key: &str, value: T) {
        self.with_state(|state| {
            state.values.insert(key.to_string(), Box::new(value));
        });
    }

    pub fn contains(&self, key: &str) -> bool {
        self.with_state(|state| state.values.contains_key(key))
    }

    /// Returns the value of this thread, creating it if necessary
    ///
    /// `create` runs without any borrow of the thread state held, so it may use per-thread
    /// values itself.
    pub fn get_or_try_create<T: Clone + 'static, E>(
        &self,
        key: &str,
        create: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if let Some(existing) = self.get::<T>(key) {
            return Ok(existing);
        }
        let created = create()?;
        self.set(key, created.clone());
        Ok(created)
    }

    /// Runs `callback` on the next cleanup of the current thread
    pub fn add_cleanup_callback(&self, callback: impl FnOnce() + 'static) {
        self.with_state(|state| state.cleanup_callbacks.push(Box::new(callback)));
    }

    /// Discards all values of the current thread and runs its cleanup callbacks
    pub fn cleanup(&self) {
        let state = THREAD_STATES.with(|states| states.borrow_mut().remove(&self.id));
        let Some(state) = state else {
            return;
        };

        tracing::debug!(
            manager = self.id,
            values = state.values.len(),
            callbacks = state.cleanup_callbacks.len(),
            "Cleaning up per-thread values"
        );
        for callback in state.cleanup_callbacks {
            callback();
        }
        drop(state.values);
    }

    /// Runs `work` and cleans up afterwards
    pub fn run<R>(&self, work: impl FnOnce() -> R) -> R {
        struct CleanupOnDrop<'a>(&'a PerThreadManager);
        impl Drop for CleanupOnDrop<'_> {
            fn drop(&mut self) {
                self.0.cleanup();
            }
        }

        let _cleanup = CleanupOnDrop(self);
        work()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ThreadState) -> R) -> R {
        THREAD_STATES.with(|states| f(states.borrow_mut().entry(self.id).or_default()))
    }
}

/// Handle to a value which exists once per thread
pub struct PerThreadValue<'a, T> {
    manager: &'a PerThreadManager,
    key: String,
    _value: PhantomData<fn() -> T>,
}
impl<T: Clone + 'static> PerThreadValue<'_, T> {
    pub fn get(&self) -> Option<T> {
        self.manager.get(&self.key)
    }

    pub fn get_or(&self, default: T) -> T {
        self.get().unwrap_or(default)
    }

    pub fn set(&self, value: T) {
        self.manager.set(&self.key, value)
    }

    pub fn exists(&self) -> bool {
        self.manager.contains(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        rc::Rc,
        sync::{Arc, Barrier},
        thread,
    };

    use super::*;

    #[test]
    fn values_are_isolated_per_thread() {
        let manager = PerThreadManager::new();
        let value = manager.create_value::<u32>();
        value.set(1);

        let barrier = Barrier::new(2);
        thread::scope(|scope| {
            scope.spawn(|| {
                let value = manager.create_value::<u32>();
                assert!(!value.exists());
                manager.set("shared-key", 2u32);
                barrier.wait();
                barrier.wait();
                assert_eq!(manager.get::<u32>("shared-key"), Some(2));
            });

            barrier.wait();
            manager.cleanup();
            barrier.wait();
        });

        assert!(!value.exists());
        assert_eq!(manager.get::<u32>("shared-key"), None);
    }

    #[test]
    fn cleanup_runs_callbacks_once() {
        let manager = PerThreadManager::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        manager.add_cleanup_callback(move || counter.set(counter.get() + 1));

        manager.cleanup();
        manager.cleanup();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn creates_once_until_cleanup() {
        let manager = PerThreadManager::new();
        let first = manager
            .get_or_try_create("service:clock", || Ok::<_, ()>(Arc::new(1)))
            .unwrap();
        let second = manager
            .get_or_try_create("service:clock", || Ok::<_, ()>(Arc::new(2)))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let result = manager.run(|| manager.get::<Arc<i32>>("service:clock"));
        assert!(result.is_some());
        assert_eq!(manager.get::<Arc<i32>>("service:clock"), None);
    }

    #[test]
    fn managers_do_not_share_values() {
        let a = PerThreadManager::new();
        let b = PerThreadManager::new();
        a.set("key", 1u8);
        assert_eq!(b.get::<u8>("key"), None);
    }
}
