//! Signals, watches and listeners
//!
//! A watch ties a target object to a listener with two masks: an event is
//! queued when a bit in `set` rises or a bit in `unset` falls. A listener
//! keeps at most one pending event per source object; a newer transition
//! replaces the older snapshot in place, so queue order reflects when each
//! source first became pending.
//!
//! Listeners raise `READABLE` while events are pending, so they can be
//! watched like any other object.

use crate::kernel::{Kernel, TaskContext};
use crate::object::{KernelObject, Wakeups};
use core_types::{Handle, ObjectId, ObjectKind, Rights, Signals};
use ipc::Event;
use kernel_api::{Instant, KernelError};
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// A registered watch, stored on the target
pub(crate) struct Watcher {
    pub listener: Weak<KernelObject>,
    pub listener_id: ObjectId,
    /// Target handle as named by the registering task
    pub handle: Handle,
    pub set: Signals,
    pub unset: Signals,
}

impl Watcher {
    pub(crate) fn fires(&self, before: Signals, after: Signals) -> bool {
        before.raised(after).intersects(self.set) || before.lowered(after).intersects(self.unset)
    }
}

#[derive(Default)]
pub(crate) struct ListenerState {
    pending: VecDeque<Event>,
}

impl ListenerState {
    /// Queues `event`, coalescing with a pending event from the same source
    pub(crate) fn push(&mut self, event: Event) {
        match self.pending.iter_mut().find(|e| e.object == event.object) {
            Some(existing) => {
                if event.sequence > existing.sequence {
                    *existing = event;
                }
            }
            None => self.pending.push_back(event),
        }
    }

    pub(crate) fn take(&mut self, max: usize) -> Vec<Event> {
        let count = max.min(self.pending.len());
        self.pending.drain(..count).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

enum ListenStep {
    Ready(Vec<Event>),
    Wait,
}

impl Kernel {
    /// Queues an event on a listener; called with no other lock held
    pub(crate) fn deliver(&self, listener: &Arc<KernelObject>, event: Event, out: &mut Wakeups) {
        let mut state = listener.lock();
        if state.dead {
            return;
        }
        let Some(pending) = state.body.listener_mut() else {
            return;
        };
        pending.push(event);
        trace!("{} queued {}", listener.id(), event);
        state.update_signals(listener.id(), Signals::READABLE, Signals::empty(), out);
        state.wake_waiters(out);
    }

    pub(crate) fn sys_signal(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError> {
        let touched = set | unset;
        if !Signals::USER.contains(touched) {
            return Err(KernelError::InvalidArgument(format!(
                "kernel-owned signals {:?}",
                touched - Signals::USER
            )));
        }
        let entry = self.lookup(ctx, handle, None, Rights::SIGNAL)?;
        let mut out = Wakeups::default();
        {
            let mut state = entry.object.lock();
            if state.dead {
                return Err(KernelError::InvalidCapability(format!("{} destroyed", handle)));
            }
            state.update_signals(entry.object.id(), set, unset, &mut out);
        }
        self.flush(out);
        Ok(())
    }

    pub(crate) fn sys_watch(
        &self,
        ctx: &TaskContext,
        listener: Handle,
        target: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError> {
        let listener_entry = self.lookup(ctx, listener, Some(ObjectKind::Listener), Rights::WATCH)?;
        let target_entry = self.lookup(ctx, target, None, Rights::WATCH)?;
        let listener_obj = listener_entry.object;
        let listener_id = listener_obj.id();

        let mut out = Wakeups::default();
        {
            let mut state = target_entry.object.lock();
            if state.dead {
                return Err(KernelError::InvalidCapability(format!("{} destroyed", target)));
            }
            state
                .watchers
                .retain(|w| w.listener_id != listener_id && w.listener.strong_count() > 0);

            if set.is_empty() && unset.is_empty() {
                debug!("{} removed watch on {}", listener_id, target_entry.object.id());
            } else {
                state.watchers.push(Watcher {
                    listener: Arc::downgrade(&listener_obj),
                    listener_id,
                    handle: target,
                    set,
                    unset,
                });
                if state.signals.intersects(set) {
                    out.events.push((
                        Arc::downgrade(&listener_obj),
                        Event {
                            handle: target,
                            object: target_entry.object.id(),
                            signals: state.signals,
                            sequence: state.sequence,
                        },
                    ));
                }
                debug!(
                    "{} watching {} (set {:?}, unset {:?})",
                    listener_id,
                    target_entry.object.id(),
                    set,
                    unset
                );
            }
        }
        self.flush(out);
        Ok(())
    }

    pub(crate) fn sys_listen(
        &self,
        ctx: &TaskContext,
        listener: Handle,
        max_events: usize,
        deadline: Instant,
    ) -> Result<Vec<Event>, KernelError> {
        if max_events == 0 {
            return Err(KernelError::InvalidArgument("max_events is zero".to_string()));
        }
        let entry = self.lookup(ctx, listener, Some(ObjectKind::Listener), Rights::READ)?;
        loop {
            let mut out = Wakeups::default();
            let step = {
                let mut state = entry.object.lock();
                let dead = state.dead;
                let pending = state
                    .body
                    .listener_mut()
                    .filter(|_| !dead)
                    .ok_or(KernelError::Closed)?;
                if !pending.is_empty() {
                    let events = pending.take(max_events);
                    if pending.is_empty() {
                        state.update_signals(
                            entry.object.id(),
                            Signals::empty(),
                            Signals::READABLE,
                            &mut out,
                        );
                    }
                    ListenStep::Ready(events)
                } else if deadline <= self.now() {
                    return Err(KernelError::Timeout);
                } else {
                    state.add_waiter(ctx.task_id());
                    ListenStep::Wait
                }
            };
            self.flush(out);

            match step {
                ListenStep::Ready(events) => return Ok(events),
                ListenStep::Wait => {
                    self.block(ctx, &entry.object, deadline)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_support::boot;
    use kernel_api::{CreateParams, KernelApi};

    fn event(object: u64, sequence: u64) -> Event {
        Event {
            handle: Handle::new(1, 1),
            object: ObjectId::from_raw(object),
            signals: Signals::USER0,
            sequence,
        }
    }

    #[test]
    fn test_pending_coalesces_per_source() {
        let mut pending = ListenerState::default();
        pending.push(event(1, 1));
        pending.push(event(2, 1));
        pending.push(event(1, 3));
        // stale snapshot never overwrites a newer one
        pending.push(event(1, 2));

        let events = pending.take(8);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].object, ObjectId::from_raw(1));
        assert_eq!(events[0].sequence, 3);
        assert_eq!(events[1].object, ObjectId::from_raw(2));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_watcher_masks() {
        let w = Watcher {
            listener: Weak::new(),
            listener_id: ObjectId::from_raw(1),
            handle: Handle::new(1, 1),
            set: Signals::USER0,
            unset: Signals::USER1,
        };
        assert!(w.fires(Signals::empty(), Signals::USER0));
        assert!(!w.fires(Signals::USER0, Signals::empty()));
        assert!(w.fires(Signals::USER1, Signals::empty()));
        assert!(!w.fires(Signals::empty(), Signals::USER1));
    }

    #[test]
    fn test_signal_rejects_kernel_bits() {
        let (boot, _, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let ch = k.create(root, boot.root_domain, CreateParams::channel(1)).unwrap();
        assert!(matches!(
            k.signal(root, ch, Signals::READABLE, Signals::empty()),
            Err(KernelError::InvalidArgument(_))
        ));
        k.signal(root, ch, Signals::USER3, Signals::empty()).unwrap();
        assert!(k.signals_of(root, ch).unwrap().contains(Signals::USER3));
    }

    #[test]
    fn test_watch_and_listen() {
        let (boot, _, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let d = boot.root_domain;
        let l = k.create(root, d, CreateParams::Listener).unwrap();
        let ch = k.create(root, d, CreateParams::channel(1)).unwrap();

        k.watch(root, l, ch, Signals::USER0, Signals::empty()).unwrap();
        assert!(matches!(
            k.listen(root, l, 4, Instant::ZERO),
            Err(KernelError::Timeout)
        ));

        k.signal(root, ch, Signals::USER0, Signals::empty()).unwrap();
        assert!(k.signals_of(root, l).unwrap().contains(Signals::READABLE));
        let events = k.listen(root, l, 4, Instant::ZERO).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].handle, ch);
        assert!(events[0].signals.contains(Signals::USER0));
        assert!(!k.signals_of(root, l).unwrap().contains(Signals::READABLE));
    }

    #[test]
    fn test_watch_on_already_raised_signal_queues_event() {
        let (boot, _, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let d = boot.root_domain;
        let l = k.create(root, d, CreateParams::Listener).unwrap();
        let ch = k.create(root, d, CreateParams::channel(1)).unwrap();

        k.watch(root, l, ch, Signals::WRITABLE, Signals::empty()).unwrap();
        let events = k.listen(root, l, 1, Instant::ZERO).unwrap();
        assert_eq!(events[0].signals, Signals::WRITABLE);
    }

    #[test]
    fn test_empty_masks_remove_watch() {
        let (boot, _, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let d = boot.root_domain;
        let l = k.create(root, d, CreateParams::Listener).unwrap();
        let ch = k.create(root, d, CreateParams::channel(1)).unwrap();

        k.watch(root, l, ch, Signals::USER0, Signals::empty()).unwrap();
        k.watch(root, l, ch, Signals::empty(), Signals::empty()).unwrap();
        k.signal(root, ch, Signals::USER0, Signals::empty()).unwrap();
        assert!(matches!(
            k.listen(root, l, 1, Instant::ZERO),
            Err(KernelError::Timeout)
        ));
    }

    #[test]
    fn test_destruction_notifies_watchers() {
        let (boot, _, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let d = boot.root_domain;
        let l = k.create(root, d, CreateParams::Listener).unwrap();
        let ch = k.create(root, d, CreateParams::channel(1)).unwrap();
        // mask does not mention CLOSED; destruction is reported anyway
        k.watch(root, l, ch, Signals::USER0, Signals::empty()).unwrap();
        k.drop_handle(root, ch).unwrap();

        let events = k.listen(root, l, 4, Instant::ZERO).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].signals.contains(Signals::CLOSED));
    }

    #[test]
    fn test_listen_argument_checks() {
        let (boot, _, _) = boot();
        let k = &boot.kernel;
        let root = &boot.root;
        let l = k.create(root, boot.root_domain, CreateParams::Listener).unwrap();
        assert!(matches!(
            k.listen(root, l, 0, Instant::FOREVER),
            Err(KernelError::InvalidArgument(_))
        ));
        let blind = k.duplicate(root, l, Rights::WATCH).unwrap();
        assert!(matches!(
            k.listen(root, blind, 1, Instant::ZERO),
            Err(KernelError::PermissionDenied(_))
        ));
    }
}
