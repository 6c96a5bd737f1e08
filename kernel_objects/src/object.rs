//! Kernel objects
//!
//! Every object is one [`KernelObject`]: identity, a logical reference count
//! and a single mutex guarding everything mutable about it (signal bitset,
//! watchers, wait list and the kind-specific body).
//!
//! The reference count is the number of holders (table entries, capabilities
//! in flight, mappings, task bindings), not the number of `Arc`s. Syscalls
//! clone the `Arc` to work on an object without holding a reference; once the
//! count reaches zero the object is torn down even if such clones remain, and
//! they observe it as dead.

use crate::address_space::SpaceState;
use crate::channel::ChannelState;
use crate::domain::DomainState;
use crate::memory::MemoryState;
use crate::port_io::PortRange;
use crate::signal::{ListenerState, Watcher};
use crate::task::TaskState;
use core_types::{ObjectId, ObjectKind, Signals, TaskId};
use ipc::Event;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub(crate) struct KernelObject {
    id: ObjectId,
    kind: ObjectKind,
    refs: AtomicUsize,
    state: Mutex<ObjectState>,
}

impl KernelObject {
    /// Creates an object holding one reference
    pub(crate) fn new(id: ObjectId, kind: ObjectKind, body: ObjectBody) -> Arc<Self> {
        let signals = match kind {
            ObjectKind::Channel => Signals::WRITABLE,
            _ => Signals::empty(),
        };
        Arc::new(Self {
            id,
            kind,
            refs: AtomicUsize::new(1),
            state: Mutex::new(ObjectState {
                signals,
                sequence: 0,
                label: None,
                watchers: Vec::new(),
                waiters: Vec::new(),
                dead: false,
                body,
            }),
        })
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ObjectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a reference unless the object is already on its way out
    pub(crate) fn try_acquire(&self) -> bool {
        let mut current = self.refs.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(seen) => current = seen,
            }
        }
    }

    /// Adds a reference on behalf of a holder that already owns one
    pub(crate) fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Drops a reference; true when it was the last one
    pub(crate) fn release_ref(&self) -> bool {
        self.refs.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

/// A task parked on an object until its state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitRecord {
    pub task: TaskId,
}

pub(crate) struct ObjectState {
    pub signals: Signals,
    /// Bumped on every signal transition
    pub sequence: u64,
    pub label: Option<String>,
    pub watchers: Vec<Watcher>,
    pub waiters: Vec<WaitRecord>,
    pub dead: bool,
    pub body: ObjectBody,
}

impl ObjectState {
    /// Applies a signal change and queues events for every watcher it fires
    ///
    /// Returns whether the bitset changed.
    pub(crate) fn update_signals(
        &mut self,
        id: ObjectId,
        set: Signals,
        unset: Signals,
        out: &mut Wakeups,
    ) -> bool {
        let before = self.signals;
        let after = before.apply(set, unset);
        if after == before {
            return false;
        }
        self.signals = after;
        self.sequence += 1;
        log::trace!("{} signals {:?} -> {:?}", id, before, after);

        for watcher in &self.watchers {
            if watcher.fires(before, after) {
                out.events.push((
                    watcher.listener.clone(),
                    Event {
                        handle: watcher.handle,
                        object: id,
                        signals: after,
                        sequence: self.sequence,
                    },
                ));
            }
        }
        true
    }

    /// Hands every parked task to `out` for resumption
    pub(crate) fn wake_waiters(&mut self, out: &mut Wakeups) {
        out.tasks.extend(self.waiters.drain(..).map(|w| w.task));
    }

    pub(crate) fn add_waiter(&mut self, task: TaskId) {
        if !self.waiters.iter().any(|w| w.task == task) {
            self.waiters.push(WaitRecord { task });
        }
    }

    pub(crate) fn remove_waiter(&mut self, task: TaskId) {
        self.waiters.retain(|w| w.task != task);
    }
}

/// Kind-specific object state
pub(crate) enum ObjectBody {
    Domain(DomainState),
    Task(TaskState),
    Space(SpaceState),
    Memory(MemoryState),
    Channel(ChannelState),
    PortIo(PortRange),
    Listener(ListenerState),
}

impl ObjectBody {
    pub(crate) fn listener() -> Self {
        ObjectBody::Listener(ListenerState::default())
    }

    pub(crate) fn domain(&self) -> Option<&DomainState> {
        match self {
            ObjectBody::Domain(domain) => Some(domain),
            _ => None,
        }
    }

    pub(crate) fn domain_mut(&mut self) -> Option<&mut DomainState> {
        match self {
            ObjectBody::Domain(domain) => Some(domain),
            _ => None,
        }
    }

    pub(crate) fn task(&self) -> Option<&TaskState> {
        match self {
            ObjectBody::Task(task) => Some(task),
            _ => None,
        }
    }

    pub(crate) fn task_mut(&mut self) -> Option<&mut TaskState> {
        match self {
            ObjectBody::Task(task) => Some(task),
            _ => None,
        }
    }

    pub(crate) fn space(&self) -> Option<&SpaceState> {
        match self {
            ObjectBody::Space(space) => Some(space),
            _ => None,
        }
    }

    pub(crate) fn space_mut(&mut self) -> Option<&mut SpaceState> {
        match self {
            ObjectBody::Space(space) => Some(space),
            _ => None,
        }
    }

    pub(crate) fn memory(&self) -> Option<&MemoryState> {
        match self {
            ObjectBody::Memory(memory) => Some(memory),
            _ => None,
        }
    }

    pub(crate) fn channel_mut(&mut self) -> Option<&mut ChannelState> {
        match self {
            ObjectBody::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    pub(crate) fn port_range(&self) -> Option<PortRange> {
        match self {
            ObjectBody::PortIo(range) => Some(*range),
            _ => None,
        }
    }

    pub(crate) fn listener_mut(&mut self) -> Option<&mut ListenerState> {
        match self {
            ObjectBody::Listener(listener) => Some(listener),
            _ => None,
        }
    }
}

/// Work deferred until every object lock is released
///
/// Listener delivery, scheduler resumes and reference drops all take other
/// locks, so critical sections only record them here.
#[derive(Default)]
pub(crate) struct Wakeups {
    pub events: Vec<(Weak<KernelObject>, Event)>,
    pub tasks: Vec<TaskId>,
    pub released: Vec<Arc<KernelObject>>,
}

impl Wakeups {
    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty() && self.tasks.is_empty() && self.released.is_empty()
    }
}
