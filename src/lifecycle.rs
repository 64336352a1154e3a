// Component Lifecycle - constructed -> initialized -> (validated)* -> destroyed
//
// Every resolver/filter node embeds a `Lifecycle` guard instead of deriving from a
// shared base class. Mutators call `ensure_constructed`, invocation methods call
// `ensure_invocable`, and `initialize()`/`destroy()` call the matching transition.
// The state is a single atomic so that a node shared via `Arc` across concurrently
// resolving requests never needs a lock just to check "am I initialized".

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::EngineError;

const CONSTRUCTED: u8 = 0;
const INITIALIZED: u8 = 1;
const DESTROYED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    Initialized,
    Destroyed,
}

impl From<u8> for LifecycleState {
    fn from(value: u8) -> Self {
        match value {
            CONSTRUCTED => LifecycleState::Constructed,
            INITIALIZED => LifecycleState::Initialized,
            _ => LifecycleState::Destroyed,
        }
    }
}

/// Tracks where a node sits in the constructed/initialized/destroyed state machine.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CONSTRUCTED),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from(self.state.load(Ordering::Acquire))
    }

    /// Call at the top of any `setX(...)` mutator. Mutation is only legal pre-init.
    pub fn ensure_constructed(&self, component: &str, id: &str) -> Result<(), EngineError> {
        match self.state() {
            LifecycleState::Constructed => Ok(()),
            LifecycleState::Initialized => Err(EngineError::unmodifiable(component, id)),
            LifecycleState::Destroyed => Err(EngineError::destroyed(component, id)),
        }
    }

    /// Call at the top of any invocation method (`resolve`, `matches`, `apply`, ...).
    pub fn ensure_invocable(&self, component: &str, id: &str) -> Result<(), EngineError> {
        match self.state() {
            LifecycleState::Constructed => Err(EngineError::uninitialized(component, id)),
            LifecycleState::Initialized => Ok(()),
            LifecycleState::Destroyed => Err(EngineError::destroyed(component, id)),
        }
    }

    /// One-shot constructed -> initialized transition. Calling this twice, or after
    /// destroy, is a programming error surfaced as the matching `EngineError`.
    pub fn mark_initialized(&self, component: &str, id: &str) -> Result<(), EngineError> {
        match self
            .state
            .compare_exchange(CONSTRUCTED, INITIALIZED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(INITIALIZED) => Err(EngineError::unmodifiable(component, id)),
            Err(_) => Err(EngineError::destroyed(component, id)),
        }
    }

    /// destroy() is idempotent: calling it on an already-destroyed node is a no-op.
    pub fn mark_destroyed(&self) {
        self.state.store(DESTROYED, Ordering::Release);
    }
}

/// A node with a stable configuration id, independent of its lifecycle state.
pub trait Identified {
    fn id(&self) -> &str;
}
