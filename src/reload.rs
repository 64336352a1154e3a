// Reloadable Service
//
// Wraps a `ResolverEngine`/`FilterEngine` in the pin-count-gated hot-swap
// protocol of SPEC_FULL.md §4.6: `pin()` hands out a handle to the current
// component; a `reload()` builds and fully initializes a replacement, then
// atomically swaps it in; the previous component is destroyed once its last
// pinned handle is dropped.
//
// Implementation note (SPEC_FULL.md §4.6): rather than a hand-rolled atomic
// pin counter, the "current component" slot is a `parking_lot::RwLock<Handle<T>>`
// (write-locked only for the swap itself) and the pin count is realized as an
// `Arc`'s own strong count — cloning the handle out of the lock *is* the pin,
// dropping it *is* the unpin, and `Managed<T>`'s `Drop` runs `destroy()` exactly
// once, driven by the last strong reference going away.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::error::EngineError;
use crate::observability::Operation;

/// A component a `ReloadableService` can manage: anything with an explicit
/// teardown hook, run when its last pinned handle is dropped.
pub trait Component: Send + Sync {
    fn destroy(&self);
}

impl Component for crate::resolver::ResolverEngine {
    fn destroy(&self) {
        crate::resolver::ResolverEngine::destroy(self)
    }
}

impl Component for crate::filter::FilterEngine {
    fn destroy(&self) {
        crate::filter::FilterEngine::destroy(self)
    }
}

/// Wraps a component so that dropping the last `Arc` to it runs `destroy()`.
pub struct Managed<T: Component> {
    inner: T,
}

impl<T: Component> Deref for Managed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Component> Drop for Managed<T> {
    fn drop(&mut self) {
        self.inner.destroy();
    }
}

/// A pinned reference to the component that was current at the time of
/// `pin()`. Keeping this alive across a concurrent `reload()` keeps the old
/// component alive (and un-destroyed) for as long as it's held.
pub type Handle<T> = Arc<Managed<T>>;

/// Atomic snapshot-swap wrapper around a resolver or filter engine.
pub struct ReloadableService<T: Component> {
    current: RwLock<Handle<T>>,
    fail_fast: bool,
    propagate_resolution_exceptions: bool,
    generation: AtomicU64,
}

impl<T: Component> ReloadableService<T> {
    pub fn new(initial: T) -> Self {
        Self::with_options(initial, false, true)
    }

    pub fn with_options(initial: T, fail_fast: bool, propagate_resolution_exceptions: bool) -> Self {
        Self {
            current: RwLock::new(Arc::new(Managed { inner: initial })),
            fail_fast,
            propagate_resolution_exceptions,
            generation: AtomicU64::new(0),
        }
    }

    /// Returns a pinned handle to the current component. The short read-lock
    /// critical section only clones the `Arc` out; the caller holds no lock
    /// for the lifetime of the returned handle.
    pub fn pin(&self) -> Handle<T> {
        self.current.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn propagate_resolution_exceptions(&self) -> bool {
        self.propagate_resolution_exceptions
    }

    /// Builds a replacement component and, on success, atomically swaps it
    /// in. On failure: `fail_fast` surfaces the error and leaves the current
    /// component in place; otherwise the failure is logged and swallowed,
    /// also leaving the current component in place (SPEC_FULL.md §4.6).
    pub fn reload<F>(&self, build: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Result<T, EngineError>,
    {
        match build() {
            Ok(component) => {
                let handle = Arc::new(Managed { inner: component });
                {
                    let mut guard = self.current.write();
                    *guard = handle;
                }
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                let _ = Operation::ServiceReloaded { generation }.validate();
                Ok(())
            }
            Err(e) => {
                if self.fail_fast {
                    Err(e)
                } else {
                    warn!(error = %e, "reload failed; retaining previous component");
                    Ok(())
                }
            }
        }
    }
}
