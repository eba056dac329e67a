// Owner liveness tracking. Results are dropped once the owner is torn down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Started,
    Resumed,
    Paused,
    Stopped,
    Initialized,
    Destroyed,
}

impl LifecycleState {
    /// `Initialized` counts as terminal too: the owner has not started yet,
    /// or is racing its own attach.
    pub fn suppresses_delivery(self) -> bool {
        matches!(self, LifecycleState::Destroyed | LifecycleState::Initialized)
    }
}

pub type ObserverId = u64;

pub trait LifecycleObserver: Send + Sync {
    fn on_state_changed(&self, state: LifecycleState);
}

/// Something with a lifecycle that can be observed.
pub trait LifecycleSource: Send + Sync {
    fn current_state(&self) -> LifecycleState;
    fn add_observer(&self, observer: Weak<dyn LifecycleObserver>) -> ObserverId;
    fn remove_observer(&self, id: ObserverId);
}

/// Plain lifecycle holder for owners that do not have one of their own.
pub struct LifecycleRegistry {
    state: RwLock<LifecycleState>,
    observers: Mutex<Vec<(ObserverId, Weak<dyn LifecycleObserver>)>>,
    next_id: AtomicU64,
}

impl LifecycleRegistry {
    /// Starts in `Initialized`, like a freshly constructed owner.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(LifecycleState::Initialized),
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Move to `state` and notify live observers.
    ///
    /// Observers run without the registry lock held, so they may detach
    /// themselves from inside the notification.
    pub fn set_state(&self, state: LifecycleState) {
        *self.state.write() = state;

        let live: Vec<Arc<dyn LifecycleObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|(_, o)| o.strong_count() > 0);
            observers.iter().filter_map(|(_, o)| o.upgrade()).collect()
        };
        for observer in live {
            observer.on_state_changed(state);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

impl LifecycleSource for LifecycleRegistry {
    fn current_state(&self) -> LifecycleState {
        *self.state.read()
    }

    fn add_observer(&self, observer: Weak<dyn LifecycleObserver>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push((id, observer));
        id
    }

    fn remove_observer(&self, id: ObserverId) {
        self.observers.lock().retain(|(oid, _)| *oid != id);
    }
}

/// Weakly bound view of an owner's liveness, checked before every delivery.
pub struct LifecycleGate {
    source: Option<Weak<dyn LifecycleSource>>,
    observer_id: Mutex<Option<ObserverId>>,
    detached: AtomicBool,
}

impl LifecycleGate {
    /// Bind to `owner` if there is one. Without an owner the gate never
    /// suppresses anything.
    pub fn observe(owner: Option<&Arc<dyn LifecycleSource>>) -> Arc<Self> {
        let gate = Arc::new(Self {
            source: owner.map(Arc::downgrade),
            observer_id: Mutex::new(None),
            detached: AtomicBool::new(false),
        });

        if let Some(owner) = owner {
            let weak: Weak<LifecycleGate> = Arc::downgrade(&gate);
            let id = owner.add_observer(weak);
            *gate.observer_id.lock() = Some(id);
            debug!("lifecycle gate attached as observer {}", id);
        }
        gate
    }

    /// Gate for an owner without lifecycle notifications.
    pub fn unobserved() -> Arc<Self> {
        Self::observe(None)
    }

    /// Owner's state, or `None` when there is no owner to ask.
    pub fn current_state(&self) -> Option<LifecycleState> {
        let source = self.source.as_ref()?;
        Some(match source.upgrade() {
            Some(source) => source.current_state(),
            // The owner itself is gone.
            None => LifecycleState::Destroyed,
        })
    }

    pub fn is_suppressed(&self) -> bool {
        self.current_state()
            .is_some_and(LifecycleState::suppresses_delivery)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Stop observing the owner. Safe to call more than once.
    pub fn on_teardown(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        let id = self.observer_id.lock().take();
        if let (Some(id), Some(source)) = (id, self.source.as_ref().and_then(Weak::upgrade)) {
            source.remove_observer(id);
            debug!("lifecycle gate detached observer {}", id);
        }
    }
}

impl LifecycleObserver for LifecycleGate {
    fn on_state_changed(&self, state: LifecycleState) {
        if state == LifecycleState::Destroyed {
            self.on_teardown();
        }
    }
}
