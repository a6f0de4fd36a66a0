//! Just-in-time construction of values, built at most once even under concurrent first use.

use std::{fmt::Debug, sync::OnceLock};

use parking_lot::Mutex;

use crate::errors::RegistryError;

type Creator<T> = Box<dyn FnOnce() -> Result<T, RegistryError> + Send>;

/// Value built on first access
///
/// The creator runs while holding a mutex, every later access reads the cached result without
/// locking. A failed construction is cached as well and every caller observes the same error,
/// construction is never retried.
pub struct JustInTime<T> {
    key: String,
    value: OnceLock<Result<T, RegistryError>>,
    creator: Mutex<Option<Creator<T>>>,
}
impl<T> Debug for JustInTime<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.value.get() {
            None => "pending",
            Some(Ok(_)) => "built",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("JustInTime")
            .field("key", &self.key)
            .field("state", &state)
            .finish()
    }
}

impl<T> JustInTime<T> {
    /// `key` names what is built, accessing the value while a construction with the same key is
    /// in progress on the current thread fails with [RegistryError::RecursiveConstruction]
    pub fn new(
        key: impl Into<String>,
        creator: impl FnOnce() -> Result<T, RegistryError> + Send + 'static,
    ) -> Self {
        JustInTime {
            key: key.into().to_lowercase(),
            value: OnceLock::new(),
            creator: Mutex::new(Some(Box::new(creator))),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether construction has been attempted
    pub fn is_realized(&self) -> bool {
        self.value.get().is_some()
    }

    /// Builds the value if necessary and returns it
    pub fn force(&self) -> Result<&T, RegistryError> {
        if let Some(result) = self.value.get() {
            return result.as_ref().map_err(Clone::clone);
        }

        // Locking here would deadlock, the current thread already holds the mutex
        if construction::is_building(&self.key) {
            return Err(construction::recursion(&self.key));
        }

        let mut creator = self.creator.lock();
        // Another thread may have finished while we waited
        if let Some(result) = self.value.get() {
            return result.as_ref().map_err(Clone::clone);
        }

        let result = match creator.take() {
            Some(create) => create(),
            None => Err(RegistryError::construction(
                self.key.clone(),
                "an earlier construction attempt panicked".into(),
            )),
        };
        if let Err(err) = &result {
            tracing::debug!(key = %self.key, "Just-in-time construction failed: {err}");
        }

        // Only ever set while holding the creator lock
        let _ = self.value.set(result);
        drop(creator);

        match self.value.get() {
            Some(result) => result.as_ref().map_err(Clone::clone),
            None => Err(RegistryError::construction(
                self.key.clone(),
                "constructed value was not stored".into(),
            )),
        }
    }
}

impl<T: Clone> JustInTime<T> {
    pub fn get(&self) -> Result<T, RegistryError> {
        self.force().cloned()
    }
}

/// Tracks which services the current thread is constructing
pub(crate) mod construction {
    use std::cell::RefCell;

    use crate::errors::RegistryError;

    thread_local! {
        static BUILDING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    /// Pops the key again when dropped, also while unwinding
    pub(crate) struct ConstructionGuard {
        key: String,
    }
    impl Drop for ConstructionGuard {
        fn drop(&mut self) {
            BUILDING.with(|building| {
                let mut building = building.borrow_mut();
                if let Some(position) = building.iter().rposition(|k| *k == self.key) {
                    building.remove(position);
                }
            });
        }
    }

    /// Marks `key` as under construction on this thread
    pub(crate) fn enter(key: &str) -> Result<ConstructionGuard, RegistryError> {
        let key = key.to_lowercase();
        if is_building(&key) {
            return Err(recursion(&key));
        }
        BUILDING.with(|building| building.borrow_mut().push(key.clone()));
        Ok(ConstructionGuard { key })
    }

    pub(crate) fn is_building(key: &str) -> bool {
        BUILDING.with(|building| building.borrow().iter().any(|k| k.eq_ignore_ascii_case(key)))
    }

    pub(crate) fn recursion(key: &str) -> RegistryError {
        let chain = BUILDING.with(|building| {
            let building = building.borrow();
            let start = building
                .iter()
                .position(|k| k.eq_ignore_ascii_case(key))
                .unwrap_or(0);
            let mut chain: Vec<String> = building[start..].to_vec();
            chain.push(key.to_string());
            chain
        });
        RegistryError::RecursiveConstruction {
            service_id: key.to_string(),
            chain,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
    };

    use super::*;

    #[test]
    fn builds_once_under_concurrent_access() {
        const THREADS: usize = 8;
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let jit = JustInTime::new("Counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(10));
            Ok(Arc::new(String::from("built")))
        });
        let barrier = Barrier::new(THREADS);

        let seen: Vec<Arc<String>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        jit.get().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(seen.iter().all(|value| Arc::ptr_eq(value, &seen[0])));
    }

    #[test]
    fn failures_are_cached_and_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let jit: JustInTime<u32> = JustInTime::new("Broken", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::construction("Broken", "boom".into()))
        });

        for _ in 0..3 {
            let err = jit.force().unwrap_err();
            assert_eq!(err.to_string(), "Error building service 'Broken': boom");
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(jit.is_realized());
    }

    #[test]
    fn recursive_access_is_reported() {
        let jit: Arc<OnceLock<JustInTime<u32>>> = Arc::new(OnceLock::new());
        let inner = Arc::clone(&jit);
        let _ = jit.set(JustInTime::new("Ouroboros", move || {
            let _guard = construction::enter("Ouroboros")?;
            match inner.get() {
                Some(itself) => itself.force().copied(),
                None => Ok(0),
            }
        }));

        let err = jit.get().unwrap().force().unwrap_err();
        assert!(
            matches!(&err, RegistryError::RecursiveConstruction { chain, .. } if chain == &["ouroboros", "ouroboros"]),
            "{err:?}"
        );
    }

    #[test]
    fn panicking_creators_fail_later_callers() {
        let jit: Arc<JustInTime<u32>> = Arc::new(JustInTime::new("Panics", || panic!("creator")));

        let cloned = Arc::clone(&jit);
        assert!(thread::spawn(move || cloned.force().map(|v| *v)).join().is_err());

        let err = jit.force().unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }
}
