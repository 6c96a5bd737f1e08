//! Channels
//!
//! A channel is a bounded FIFO mailbox. A message may carry one capability,
//! which leaves the sender's table on `send` and lands in the receiver's table
//! on `recv`; while queued it is owned by the channel.
//!
//! Signals track the queue: `READABLE` while a message is queued, `WRITABLE`
//! while a send would not block, `PEER_CLOSED` once the channel is shut down.

use crate::cap_table::CapEntry;
use crate::kernel::{Kernel, TaskContext};
use crate::object::{KernelObject, ObjectState, Wakeups};
use core_types::{CapabilityEvent, Handle, ObjectId, ObjectKind, Rights, Signals, TaskId};
use ipc::{ChannelMode, Message, ReceivedMessage};
use kernel_api::KernelError;
use log::{debug, info};
use std::collections::VecDeque;
use std::sync::Arc;

/// A message waiting in a channel
pub(crate) struct InFlight {
    pub message: Message,
    pub sender: TaskId,
    pub cap: Option<CapEntry>,
}

/// Queue error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueError {
    Full,
}

/// Bounded FIFO queue.
pub(crate) struct MessageQueue {
    capacity: usize,
    messages: VecDeque<InFlight>,
}

impl MessageQueue {
    /// Creates a queue with the specified capacity.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.messages.len() >= self.capacity
    }

    pub(crate) fn push(&mut self, message: InFlight) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full);
        }
        self.messages.push_back(message);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<InFlight> {
        self.messages.pop_front()
    }

    /// Whether the next message carries a capability
    pub(crate) fn front_carries_cap(&self) -> Option<bool> {
        self.messages.front().map(|m| m.cap.is_some())
    }

    fn drain(&mut self) -> impl Iterator<Item = InFlight> + '_ {
        self.messages.drain(..)
    }
}

pub(crate) struct ChannelState {
    pub queue: MessageQueue,
    pub mode: ChannelMode,
    pub closed: bool,
}

impl ChannelState {
    pub(crate) fn new(depth: usize, mode: ChannelMode) -> Self {
        Self {
            queue: MessageQueue::with_capacity(depth),
            mode,
            closed: false,
        }
    }

    /// Signal levels implied by the queue state
    fn levels(&self) -> Signals {
        let mut signals = Signals::empty();
        if !self.queue.is_empty() {
            signals |= Signals::READABLE;
        }
        if self.closed {
            signals |= Signals::PEER_CLOSED;
        } else if !self.queue.is_full() {
            signals |= Signals::WRITABLE;
        }
        signals
    }

    /// Closes the channel and hands back the references of queued capabilities
    pub(crate) fn shut_down(&mut self) -> Vec<Arc<KernelObject>> {
        self.closed = true;
        self.queue
            .drain()
            .filter_map(|m| m.cap.map(|cap| cap.object))
            .collect()
    }
}

/// Brings the channel's kernel signals in line with its queue
fn sync_signals(id: ObjectId, state: &mut ObjectState, out: &mut Wakeups) {
    let Some(levels) = state.body.channel_mut().map(|c| c.levels()) else {
        return;
    };
    let tracked = Signals::READABLE | Signals::WRITABLE | Signals::PEER_CLOSED;
    let current = state.signals & tracked;
    state.update_signals(id, levels - current, current - levels, out);
}

fn closed_error(parked: bool) -> KernelError {
    if parked {
        KernelError::PeerClosed
    } else {
        KernelError::Closed
    }
}

enum SendStep {
    Sent,
    Wait,
}

enum RecvStep {
    Received(ReceivedMessage, Option<ObjectId>),
    Wait,
    /// The next message carries a capability; retry holding the table
    NeedTable,
}

impl Kernel {
    pub(crate) fn sys_send(
        &self,
        ctx: &TaskContext,
        channel: Handle,
        message: Message,
        transfer: Option<Handle>,
    ) -> Result<(), KernelError> {
        if message.len() > self.config.max_payload {
            return Err(KernelError::InvalidArgument(format!(
                "payload of {} bytes exceeds {}",
                message.len(),
                self.config.max_payload
            )));
        }
        let chan = self.lookup(ctx, channel, Some(ObjectKind::Channel), Rights::WRITE)?;
        let carried = match transfer {
            Some(handle) => {
                let entry = self.lookup(ctx, handle, None, Rights::TRANSFER)?;
                if Arc::ptr_eq(&entry.object, &chan.object) {
                    return Err(KernelError::InvalidArgument(
                        "a channel cannot carry itself".to_string(),
                    ));
                }
                Some((handle, entry.object))
            }
            None => None,
        };

        let mut message = Some(message);
        let mut parked = false;
        loop {
            let mut out = Wakeups::default();
            let step = match &carried {
                None => {
                    let mut state = chan.object.lock();
                    self.send_step(ctx, &chan.object, &mut state, None, &mut message, parked, &mut out)
                }
                Some((handle, object)) => {
                    let (mut table, mut state) = Kernel::lock_pair(&ctx.domain, &chan.object);
                    self.send_step(
                        ctx,
                        &chan.object,
                        &mut state,
                        Some((&mut *table, *handle, object)),
                        &mut message,
                        parked,
                        &mut out,
                    )
                }
            };
            self.flush(out);

            match step? {
                SendStep::Sent => {
                    if let Some((handle, object)) = &carried {
                        self.audit(CapabilityEvent::TransferSent {
                            domain: ctx.domain_id(),
                            handle: *handle,
                            object: object.id(),
                            channel: chan.object.id(),
                        });
                    }
                    debug!("{} sent on {}", ctx.task_id(), chan.object.id());
                    return Ok(());
                }
                SendStep::Wait => {
                    self.block(ctx, &chan.object, kernel_api::Instant::FOREVER)?;
                    parked = true;
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn send_step(
        &self,
        ctx: &TaskContext,
        channel: &KernelObject,
        state: &mut ObjectState,
        table: Option<(&mut ObjectState, Handle, &Arc<KernelObject>)>,
        message: &mut Option<Message>,
        parked: bool,
        out: &mut Wakeups,
    ) -> Result<SendStep, KernelError> {
        let dead = state.dead;
        let Some(chan) = state.body.channel_mut() else {
            return Err(closed_error(parked));
        };
        if dead || chan.closed {
            return Err(closed_error(parked));
        }
        if chan.queue.is_full() {
            if !chan.mode.is_blocking() {
                return Err(KernelError::ResourceExhausted(format!(
                    "channel {} is full",
                    channel.id()
                )));
            }
            state.add_waiter(ctx.task_id());
            return Ok(SendStep::Wait);
        }

        let cap = match table {
            Some((domain, handle, expected)) => {
                let dead = domain.dead;
                let table = domain
                    .body
                    .domain_mut()
                    .filter(|_| !dead)
                    .ok_or_else(|| KernelError::InvalidCapability("domain destroyed".to_string()))?;
                // the entry may have changed since it was looked up
                let unchanged = table
                    .table
                    .get(handle)
                    .map(|entry| {
                        Arc::ptr_eq(&entry.object, expected)
                            && entry.rights.contains(Rights::TRANSFER)
                    })
                    .unwrap_or(false);
                if !unchanged {
                    return Err(KernelError::InvalidCapability(format!(
                        "{} changed during send",
                        handle
                    )));
                }
                table.table.remove(handle).ok()
            }
            None => None,
        };

        let Some(chan) = state.body.channel_mut() else {
            return Err(closed_error(parked));
        };
        let pushed = chan.queue.push(InFlight {
            message: message.take().unwrap_or_default(),
            sender: ctx.task_id(),
            cap,
        });
        debug_assert!(pushed.is_ok());
        sync_signals(channel.id(), state, out);
        state.wake_waiters(out);
        Ok(SendStep::Sent)
    }

    pub(crate) fn sys_recv(
        &self,
        ctx: &TaskContext,
        channel: Handle,
    ) -> Result<ReceivedMessage, KernelError> {
        let chan = self.lookup(ctx, channel, Some(ObjectKind::Channel), Rights::READ)?;
        let mut parked = false;
        loop {
            let mut out = Wakeups::default();
            let mut step = {
                let mut state = chan.object.lock();
                self.recv_step(ctx, &chan.object, &mut state, None, parked, &mut out)
            };
            if matches!(step, Ok(RecvStep::NeedTable)) {
                let (mut table, mut state) = Kernel::lock_pair(&ctx.domain, &chan.object);
                step = self.recv_step(
                    ctx,
                    &chan.object,
                    &mut state,
                    Some(&mut *table),
                    parked,
                    &mut out,
                );
            }
            self.flush(out);

            match step? {
                RecvStep::Received(received, carried) => {
                    if let (Some(handle), Some(object)) = (received.transferred, carried) {
                        self.audit(CapabilityEvent::TransferReceived {
                            domain: ctx.domain_id(),
                            handle,
                            object,
                            channel: chan.object.id(),
                        });
                    }
                    debug!("{} received on {}", ctx.task_id(), chan.object.id());
                    return Ok(received);
                }
                RecvStep::Wait => {
                    self.block(ctx, &chan.object, kernel_api::Instant::FOREVER)?;
                    parked = true;
                }
                RecvStep::NeedTable => {}
            }
        }
    }

    fn recv_step(
        &self,
        ctx: &TaskContext,
        channel: &KernelObject,
        state: &mut ObjectState,
        table: Option<&mut ObjectState>,
        parked: bool,
        out: &mut Wakeups,
    ) -> Result<RecvStep, KernelError> {
        let dead = state.dead;
        let Some(chan) = state.body.channel_mut() else {
            return Err(closed_error(parked));
        };
        if dead {
            return Err(closed_error(parked));
        }

        let (message, carried) = match (chan.queue.front_carries_cap(), table) {
            (None, _) => {
                if chan.closed {
                    return Err(closed_error(parked));
                }
                state.add_waiter(ctx.task_id());
                return Ok(RecvStep::Wait);
            }
            (Some(true), None) => return Ok(RecvStep::NeedTable),
            (Some(false), _) => match chan.queue.pop() {
                Some(message) => (message, None),
                None => return Ok(RecvStep::NeedTable),
            },
            (Some(true), Some(domain)) => {
                let dead = domain.dead;
                let table = domain
                    .body
                    .domain_mut()
                    .filter(|_| !dead)
                    .ok_or_else(|| KernelError::InvalidCapability("domain destroyed".to_string()))?;
                if table.table.is_full() {
                    return Err(KernelError::ResourceExhausted(
                        "no room for the transferred capability".to_string(),
                    ));
                }
                let Some(mut message) = chan.queue.pop() else {
                    return Ok(RecvStep::NeedTable);
                };
                let mut carried = None;
                if let Some(cap) = message.cap.take() {
                    let object = cap.object.id();
                    match table.table.insert(cap) {
                        Ok(handle) => carried = Some((handle, object)),
                        Err(_) => {
                            return Err(KernelError::ResourceExhausted(
                                "no room for the transferred capability".to_string(),
                            ))
                        }
                    }
                }
                (message, carried)
            }
        };

        sync_signals(channel.id(), state, out);
        state.wake_waiters(out);
        Ok(RecvStep::Received(
            ReceivedMessage {
                message: message.message,
                sender: message.sender,
                transferred: carried.map(|(handle, _)| handle),
            },
            carried.map(|(_, object)| object),
        ))
    }

    pub(crate) fn sys_close(&self, ctx: &TaskContext, channel: Handle) -> Result<(), KernelError> {
        let chan = self.lookup(ctx, channel, Some(ObjectKind::Channel), Rights::empty())?;
        let either = Rights::READ | Rights::WRITE;
        if !chan.rights.intersects(either) {
            self.deny(ctx, channel, either, chan.rights);
            return Err(KernelError::PermissionDenied(format!(
                "{} holds neither READ nor WRITE",
                channel
            )));
        }

        let mut out = Wakeups::default();
        {
            let mut state = chan.object.lock();
            let dead = state.dead;
            match state.body.channel_mut() {
                Some(c) if !dead && !c.closed => c.closed = true,
                _ => return Err(KernelError::Closed),
            }
            sync_signals(chan.object.id(), &mut state, &mut out);
            state.wake_waiters(&mut out);
        }
        self.flush(out);
        info!("{} closed channel {}", ctx.task_id(), chan.object.id());
        Ok(())
    }
}
