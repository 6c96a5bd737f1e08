//! The kernel proper
//!
//! [`Kernel`] owns the global pieces (registry, frame allocator, audit trail,
//! scheduler and port bus) and implements [`KernelApi`]. Per-object state
//! lives behind each object's own mutex; the kernel never holds a global lock
//! across a syscall.
//!
//! ## Lock discipline
//!
//! - At most one object lock is held, except on the capability transfer path
//!   which takes the caller's domain and the channel in `ObjectId` order.
//! - Anything that touches another object (listener delivery, resumes,
//!   reference drops) is collected into [`Wakeups`] under the lock and
//!   flushed after it is released.

use crate::cap_table::CapEntry;
use crate::capability_audit::CapabilityAuditLog;
use crate::config::{ConfigError, KernelConfig};
use crate::domain::DomainState;
use crate::frames::FrameAllocator;
use crate::memory::MemoryState;
use crate::object::{KernelObject, ObjectBody, ObjectState, Wakeups};
use crate::registry::ObjectRegistry;
use crate::scheduler::{Scheduler, WakeReason};
use crate::task::{TaskPhase, TaskState};
use core_types::{
    CapabilityEvent, CapabilityInvalidReason, Handle, IoWidth, MapFlags, ObjectId, ObjectKind,
    Rights, Signals, TaskId, VirtRange,
};
use hal::PortIo;
use handover::{HandoverError, Payload, Tag, COOLBOOT};
use ipc::{Event, Message, ReceivedMessage};
use kernel_api::{CreateParams, Instant, KernelApi, KernelError, Mapping, TaskArgs};
use log::{debug, info, trace, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Boot failures
#[derive(Debug, Error)]
pub enum BootError {
    #[error("Invalid kernel configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid handover payload: {0}")]
    Handover(#[from] HandoverError),

    #[error("Handover payload describes no usable memory")]
    NoFreeMemory,

    #[error("Root table cannot hold {0} boot handles")]
    RootTableTooSmall(usize),
}

/// The calling task, as seen by every syscall
///
/// Produced by [`Kernel::boot`] for the root task and by [`Kernel::enter`]
/// for any other running task.
#[derive(Clone)]
pub struct TaskContext {
    pub(crate) task_id: TaskId,
    pub(crate) task: Arc<KernelObject>,
    pub(crate) domain: Arc<KernelObject>,
}

impl TaskContext {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Kernel identity of the domain whose table this task uses
    pub fn domain_id(&self) -> ObjectId {
        self.domain.id()
    }

    pub fn phase(&self) -> TaskPhase {
        let state = self.task.lock();
        state
            .body
            .task()
            .map(|task| task.phase)
            .unwrap_or(TaskPhase::Terminated)
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id)
            .field("task", &self.task.id())
            .field("domain", &self.domain.id())
            .finish()
    }
}

/// A boot file exposed to the root task as a memory object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootFile {
    pub name: String,
    pub handle: Handle,
    /// Size in bytes as recorded in the payload
    pub size: u64,
}

/// Everything the root task starts with
pub struct Boot {
    pub kernel: Arc<Kernel>,
    pub root: TaskContext,
    /// Self handle of the root domain
    pub root_domain: Handle,
    pub root_space: Handle,
    pub root_task: Handle,
    pub files: Vec<BootFile>,
}

/// The kernel object layer
pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) ports: Arc<dyn PortIo>,
    pub(crate) registry: ObjectRegistry,
    pub(crate) frames: Mutex<FrameAllocator>,
    audit: Mutex<CapabilityAuditLog>,
}

impl Kernel {
    /// Brings the kernel up from a handover payload
    ///
    /// Builds the root domain, space and task, exposes every `File` record
    /// as a memory object in the root table and marks the root task
    /// runnable.
    pub fn boot(
        config: KernelConfig,
        scheduler: Arc<dyn Scheduler>,
        ports: Arc<dyn PortIo>,
        payload: &Payload,
    ) -> Result<Boot, BootError> {
        config.validate()?;
        payload.validate(COOLBOOT)?;

        let free = payload.free_ranges();
        if free.is_empty() {
            return Err(BootError::NoFreeMemory);
        }
        let file_records: Vec<_> = payload
            .records()
            .filter(|record| record.tag == Tag::File)
            .collect();
        let needed = 3 + file_records.len();
        if needed > config.max_handles {
            return Err(BootError::RootTableTooSmall(needed));
        }

        info!(
            "booting from {} ({} records, {} free ranges)",
            payload.agent,
            payload.records.len(),
            free.len()
        );

        let kernel = Arc::new(Kernel {
            scheduler,
            ports,
            registry: ObjectRegistry::new(),
            frames: Mutex::new(FrameAllocator::from_ranges(free)),
            audit: Mutex::new(CapabilityAuditLog::with_capacity(config.max_audit_events)),
            config,
        });

        let domain = kernel.new_object(
            ObjectKind::Domain,
            ObjectBody::Domain(DomainState::new(kernel.config.max_handles, None)),
        );
        let space = kernel.new_object(ObjectKind::Space, ObjectBody::Space(Default::default()));
        // the task binding holds its own references on space and domain
        space.acquire();
        domain.acquire();
        let task_id = TaskId::new();
        let mut root_task = TaskState::new(task_id, space.clone(), domain.clone());
        root_task.phase = TaskPhase::Running;
        let task = kernel.new_object(ObjectKind::Task, ObjectBody::Task(root_task));

        let mut grants = vec![
            CapEntry {
                object: domain.clone(),
                rights: ObjectKind::Domain.default_rights(),
            },
            CapEntry {
                object: space.clone(),
                rights: ObjectKind::Space.default_rights(),
            },
            CapEntry {
                object: task.clone(),
                rights: ObjectKind::Task.default_rights(),
            },
        ];
        for record in &file_records {
            let memory = kernel.new_object(
                ObjectKind::Memory,
                ObjectBody::Memory(MemoryState::physical(record.start, record.size)),
            );
            grants.push(CapEntry {
                object: memory,
                rights: Rights::MAP | Rights::READ | Rights::DUPLICATE | Rights::TRANSFER,
            });
        }

        let mut handles = Vec::with_capacity(grants.len());
        for grant in grants {
            let object = grant.object.clone();
            let handle = kernel
                .install(&domain, grant)
                .map_err(|_| BootError::RootTableTooSmall(needed))?;
            kernel.audit(CapabilityEvent::Created {
                domain: domain.id(),
                handle,
                object: object.id(),
                kind: object.kind(),
            });
            handles.push(handle);
        }

        let files = file_records
            .iter()
            .zip(handles.iter().skip(3))
            .map(|(record, handle)| BootFile {
                name: record.name.clone().unwrap_or_default(),
                handle: *handle,
                size: record.size,
            })
            .collect::<Vec<_>>();
        for file in &files {
            debug!("boot file {} ({} bytes) as {}", file.name, file.size, file.handle);
        }

        kernel.scheduler.enqueue(task_id);
        info!("root task {} running in {}", task_id, domain.id());

        Ok(Boot {
            root: TaskContext {
                task_id,
                task,
                domain,
            },
            root_domain: handles[0],
            root_space: handles[1],
            root_task: handles[2],
            files,
            kernel,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.scheduler.now()
    }

    /// Builds the context for a running task reachable from `ctx`
    pub fn enter(&self, ctx: &TaskContext, task: Handle) -> Result<TaskContext, KernelError> {
        let entry = self.lookup(ctx, task, Some(ObjectKind::Task), Rights::empty())?;
        let state = entry.object.lock();
        let bound = state
            .body
            .task()
            .filter(|_| !state.dead)
            .ok_or_else(|| KernelError::InvalidCapability("task destroyed".to_string()))?;
        match bound.phase {
            TaskPhase::Running | TaskPhase::Suspended => {}
            phase => {
                return Err(KernelError::InvalidArgument(format!(
                    "task {} is {:?}",
                    bound.task_id, phase
                )))
            }
        }
        let domain = bound
            .domain
            .clone()
            .ok_or_else(|| KernelError::InvalidArgument("task has no domain".to_string()))?;
        let task_id = bound.task_id;
        drop(state);
        Ok(TaskContext {
            task_id,
            task: entry.object,
            domain,
        })
    }

    pub(crate) fn new_object(&self, kind: ObjectKind, body: ObjectBody) -> Arc<KernelObject> {
        let id = self.registry.register(kind);
        debug!("new {} {}", kind, id);
        KernelObject::new(id, kind, body)
    }

    pub(crate) fn audit(&self, event: CapabilityEvent) {
        let now = self.now();
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_event(now, event);
    }

    /// Rejects every call made on behalf of a terminated task
    fn admit(&self, ctx: &TaskContext) -> Result<(), KernelError> {
        let state = ctx.task.lock();
        match state.body.task() {
            Some(task) if !state.dead && task.phase != TaskPhase::Terminated => Ok(()),
            _ => {
                debug!("{} called after termination", ctx.task_id);
                Err(KernelError::Closed)
            }
        }
    }

    /// Resolves a handle in the caller's table
    ///
    /// Returns a copy of the entry; the caller does not gain a reference.
    pub(crate) fn lookup(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        kind: Option<ObjectKind>,
        required: Rights,
    ) -> Result<CapEntry, KernelError> {
        let resolved = {
            let state = ctx.domain.lock();
            match state.body.domain() {
                Some(domain) if !state.dead => domain.table.get(handle).cloned(),
                _ => Err(CapabilityInvalidReason::TableDestroyed),
            }
        };
        let entry = match resolved {
            Ok(entry) => entry,
            Err(reason) => {
                self.audit(CapabilityEvent::InvalidUseAttempt {
                    domain: ctx.domain.id(),
                    handle,
                    reason,
                });
                debug!("{} used invalid {} ({:?})", ctx.task_id, handle, reason);
                return Err(KernelError::InvalidCapability(format!(
                    "{} ({:?})",
                    handle, reason
                )));
            }
        };

        if let Some(kind) = kind {
            if entry.object.kind() != kind {
                return Err(KernelError::InvalidArgument(format!(
                    "{} names a {}, expected a {}",
                    handle,
                    entry.object.kind(),
                    kind
                )));
            }
        }
        if !entry.rights.contains(required) {
            self.deny(ctx, handle, required, entry.rights);
            return Err(KernelError::PermissionDenied(format!(
                "{} lacks {:?}",
                handle,
                required - entry.rights
            )));
        }
        Ok(entry)
    }

    pub(crate) fn deny(&self, ctx: &TaskContext, handle: Handle, required: Rights, held: Rights) {
        self.audit(CapabilityEvent::PermissionDenied {
            domain: ctx.domain.id(),
            handle,
            required,
            held,
        });
        debug!("{} denied {:?} on {}", ctx.task_id, required, handle);
    }

    /// Inserts an entry that already owns its reference
    ///
    /// On failure the reference is released.
    pub(crate) fn install(
        &self,
        domain: &Arc<KernelObject>,
        entry: CapEntry,
    ) -> Result<Handle, KernelError> {
        let object = entry.object.clone();
        let result = {
            let mut state = domain.lock();
            let dead = state.dead;
            match state.body.domain_mut() {
                Some(table) if !dead => table.table.insert(entry).map_err(|_| {
                    KernelError::ResourceExhausted(format!(
                        "capability table of {} is full",
                        domain.id()
                    ))
                }),
                _ => Err(KernelError::InvalidCapability(format!(
                    "domain {} destroyed",
                    domain.id()
                ))),
            }
        };
        if result.is_err() {
            self.release(object);
        }
        result
    }

    /// Drops one reference
    pub(crate) fn release(&self, object: Arc<KernelObject>) {
        self.release_all(vec![object]);
    }

    /// Drops references, tearing down whatever reaches zero
    ///
    /// Iterative: children released by a teardown join the worklist.
    pub(crate) fn release_all(&self, mut work: Vec<Arc<KernelObject>>) {
        while let Some(object) = work.pop() {
            if !object.release_ref() {
                continue;
            }
            let mut out = self.teardown(&object);
            work.append(&mut out.released);
            self.flush(out);
        }
    }

    /// Runs deferred work with no object lock held
    pub(crate) fn flush(&self, mut out: Wakeups) {
        loop {
            let events = std::mem::take(&mut out.events);
            if events.is_empty() {
                break;
            }
            for (listener, event) in events {
                if let Some(listener) = listener.upgrade() {
                    self.deliver(&listener, event, &mut out);
                }
            }
        }
        for task in out.tasks.drain(..) {
            trace!("resuming {}", task);
            self.scheduler.resume(task);
        }
        if !out.released.is_empty() {
            self.release_all(std::mem::take(&mut out.released));
        }
    }

    fn teardown(&self, object: &Arc<KernelObject>) -> Wakeups {
        let mut out = Wakeups::default();
        let mut reclaim = None;
        let mut exiting = None;
        {
            let mut state = object.lock();
            state.dead = true;
            let mut final_signals = Signals::CLOSED;

            match &mut state.body {
                ObjectBody::Domain(domain) => {
                    out.released
                        .extend(domain.table.drain().into_iter().map(|entry| entry.object));
                }
                ObjectBody::Task(task) => {
                    task.phase = TaskPhase::Terminated;
                    out.released.extend(task.space.take());
                    out.released.extend(task.domain.take());
                    exiting = Some(task.task_id);
                    final_signals |= Signals::TERMINATED;
                }
                ObjectBody::Space(space) => out.released.extend(space.drain()),
                ObjectBody::Memory(memory) => reclaim = Some(memory.clone()),
                ObjectBody::Channel(channel) => {
                    out.released.extend(channel.shut_down());
                    final_signals |= Signals::PEER_CLOSED;
                }
                ObjectBody::PortIo(_) => {}
                ObjectBody::Listener(listener) => listener.clear(),
            }

            Self::final_event(object.id(), &mut state, final_signals, &mut out);
            state.wake_waiters(&mut out);
        }

        if let Some(task_id) = exiting {
            self.scheduler.resume(task_id);
            self.scheduler.dequeue(task_id);
        }
        if let Some(memory) = reclaim {
            self.reclaim(&memory);
        }

        self.registry.release(object.id(), object.kind());
        self.audit(CapabilityEvent::Destroyed {
            object: object.id(),
            kind: object.kind(),
        });
        info!("destroyed {} {}", object.kind(), object.id());
        out
    }

    /// Raises the terminal signals and notifies every watcher regardless of mask
    fn final_event(id: ObjectId, state: &mut ObjectState, raised: Signals, out: &mut Wakeups) {
        state.signals |= raised;
        state.sequence += 1;
        for watcher in state.watchers.drain(..) {
            out.events.push((
                watcher.listener,
                Event {
                    handle: watcher.handle,
                    object: id,
                    signals: state.signals,
                    sequence: state.sequence,
                },
            ));
        }
    }

    /// Parks the caller on `object` until resumed or `deadline`
    ///
    /// The caller must already be registered as a waiter. On return the
    /// registration is gone and the task is running again, unless it was
    /// terminated meanwhile.
    pub(crate) fn block(
        &self,
        ctx: &TaskContext,
        object: &KernelObject,
        deadline: Instant,
    ) -> Result<WakeReason, KernelError> {
        {
            let mut state = ctx.task.lock();
            match state.body.task_mut() {
                Some(task) if task.phase != TaskPhase::Terminated => {
                    task.phase = TaskPhase::Suspended;
                }
                _ => {
                    drop(state);
                    object.lock().remove_waiter(ctx.task_id);
                    return Err(KernelError::Closed);
                }
            }
        }

        trace!("{} parked on {}", ctx.task_id, object.id());
        let reason = self.scheduler.park(ctx.task_id, deadline);
        object.lock().remove_waiter(ctx.task_id);

        let mut state = ctx.task.lock();
        match state.body.task_mut() {
            Some(task) if task.phase != TaskPhase::Terminated => {
                task.phase = TaskPhase::Running;
                trace!("{} back from {} ({:?})", ctx.task_id, object.id(), reason);
                Ok(reason)
            }
            _ => {
                warn!("{} terminated while parked on {}", ctx.task_id, object.id());
                Err(KernelError::Closed)
            }
        }
    }

    /// Locks two distinct objects in `ObjectId` order
    pub(crate) fn lock_pair<'a>(
        first: &'a KernelObject,
        second: &'a KernelObject,
    ) -> (MutexGuard<'a, ObjectState>, MutexGuard<'a, ObjectState>) {
        if first.id() < second.id() {
            let a = first.lock();
            let b = second.lock();
            (a, b)
        } else {
            let b = second.lock();
            let a = first.lock();
            (a, b)
        }
    }

    // Inspection helpers. None of these change state or need rights.

    /// Snapshot of the capability audit trail
    pub fn audit_log(&self) -> CapabilityAuditLog {
        self.audit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of live objects of one kind
    pub fn live_objects(&self, kind: ObjectKind) -> usize {
        self.registry.live_count(kind)
    }

    pub fn total_live_objects(&self) -> usize {
        self.registry.total()
    }

    /// Free physical memory in bytes
    pub fn free_frames(&self) -> u64 {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free_bytes()
    }

    /// Entries in the caller's table
    pub fn handle_count(&self, ctx: &TaskContext) -> usize {
        let state = ctx.domain.lock();
        state.body.domain().map(|d| d.table.len()).unwrap_or(0)
    }

    pub fn rights_of(&self, ctx: &TaskContext, handle: Handle) -> Result<Rights, KernelError> {
        Ok(self.lookup(ctx, handle, None, Rights::empty())?.rights)
    }

    pub fn kind_of(&self, ctx: &TaskContext, handle: Handle) -> Result<ObjectKind, KernelError> {
        Ok(self.lookup(ctx, handle, None, Rights::empty())?.object.kind())
    }

    pub fn object_id(&self, ctx: &TaskContext, handle: Handle) -> Result<ObjectId, KernelError> {
        Ok(self.lookup(ctx, handle, None, Rights::empty())?.object.id())
    }

    pub fn signals_of(&self, ctx: &TaskContext, handle: Handle) -> Result<Signals, KernelError> {
        let entry = self.lookup(ctx, handle, None, Rights::empty())?;
        let signals = entry.object.lock().signals;
        Ok(signals)
    }

    pub fn label_of(
        &self,
        ctx: &TaskContext,
        handle: Handle,
    ) -> Result<Option<String>, KernelError> {
        let entry = self.lookup(ctx, handle, None, Rights::empty())?;
        let label = entry.object.lock().label.clone();
        Ok(label)
    }

    /// Outstanding references on the object behind `handle`
    pub fn ref_count(&self, ctx: &TaskContext, handle: Handle) -> Result<usize, KernelError> {
        Ok(self
            .lookup(ctx, handle, None, Rights::empty())?
            .object
            .ref_count())
    }

    pub fn task_phase(&self, ctx: &TaskContext, task: Handle) -> Result<TaskPhase, KernelError> {
        let entry = self.lookup(ctx, task, Some(ObjectKind::Task), Rights::empty())?;
        let state = entry.object.lock();
        Ok(state
            .body
            .task()
            .map(|task| task.phase)
            .unwrap_or(TaskPhase::Terminated))
    }

    /// Reserved ranges of a space (or a task's space), sorted by address
    pub fn reserved_ranges(
        &self,
        ctx: &TaskContext,
        space: Handle,
    ) -> Result<Vec<VirtRange>, KernelError> {
        let space = self.resolve_space(ctx, space, Rights::empty())?;
        let state = space.lock();
        Ok(state
            .body
            .space()
            .map(|space| space.reserved())
            .unwrap_or_default())
    }

    /// Bytes charged against a domain and its quota
    pub fn domain_usage(
        &self,
        ctx: &TaskContext,
        domain: Handle,
    ) -> Result<(u64, Option<u64>), KernelError> {
        let entry = self.lookup(ctx, domain, Some(ObjectKind::Domain), Rights::empty())?;
        let state = entry.object.lock();
        Ok(state
            .body
            .domain()
            .map(|d| (d.charged, d.quota))
            .unwrap_or((0, None)))
    }
}

impl KernelApi for Kernel {
    type Context = TaskContext;

    fn log(&self, ctx: &TaskContext, text: &str) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_log(ctx, text)
    }

    fn create(
        &self,
        ctx: &TaskContext,
        dest: Handle,
        params: CreateParams,
    ) -> Result<Handle, KernelError> {
        self.admit(ctx)?;
        self.sys_create(ctx, dest, params)
    }

    fn label(&self, ctx: &TaskContext, handle: Handle, text: &str) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_label(ctx, handle, text)
    }

    fn drop_handle(&self, ctx: &TaskContext, handle: Handle) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_drop(ctx, handle)
    }

    fn duplicate(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        rights: Rights,
    ) -> Result<Handle, KernelError> {
        self.admit(ctx)?;
        self.sys_duplicate(ctx, None, handle, rights)
    }

    fn duplicate_into(
        &self,
        ctx: &TaskContext,
        target: Handle,
        handle: Handle,
        rights: Rights,
    ) -> Result<Handle, KernelError> {
        self.admit(ctx)?;
        self.sys_duplicate(ctx, Some(target), handle, rights)
    }

    fn start(
        &self,
        ctx: &TaskContext,
        task: Handle,
        ip: u64,
        sp: u64,
        args: TaskArgs,
    ) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_start(ctx, task, ip, sp, args)
    }

    fn map(
        &self,
        ctx: &TaskContext,
        space: Handle,
        virt: Option<u64>,
        memory: Handle,
        offset: u64,
        len: u64,
        flags: MapFlags,
    ) -> Result<Mapping, KernelError> {
        self.admit(ctx)?;
        self.sys_map(ctx, space, virt, memory, offset, len, flags)
    }

    fn unmap(
        &self,
        ctx: &TaskContext,
        space: Handle,
        virt: u64,
        len: u64,
    ) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_unmap(ctx, space, virt, len)
    }

    fn port_in(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        width: IoWidth,
        port: u16,
    ) -> Result<u32, KernelError> {
        self.admit(ctx)?;
        self.sys_port_in(ctx, handle, width, port)
    }

    fn port_out(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        width: IoWidth,
        port: u16,
        value: u32,
    ) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_port_out(ctx, handle, width, port, value)
    }

    fn send(
        &self,
        ctx: &TaskContext,
        channel: Handle,
        message: Message,
        transfer: Option<Handle>,
    ) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_send(ctx, channel, message, transfer)
    }

    fn recv(&self, ctx: &TaskContext, channel: Handle) -> Result<ReceivedMessage, KernelError> {
        self.admit(ctx)?;
        self.sys_recv(ctx, channel)
    }

    fn close(&self, ctx: &TaskContext, channel: Handle) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_close(ctx, channel)
    }

    fn signal(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_signal(ctx, handle, set, unset)
    }

    fn watch(
        &self,
        ctx: &TaskContext,
        listener: Handle,
        target: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError> {
        self.admit(ctx)?;
        self.sys_watch(ctx, listener, target, set, unset)
    }

    fn listen(
        &self,
        ctx: &TaskContext,
        listener: Handle,
        max_events: usize,
        deadline: Instant,
    ) -> Result<Vec<Event>, KernelError> {
        self.admit(ctx)?;
        self.sys_listen(ctx, listener, max_events, deadline)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::port_io::SimPortBus;
    use crate::scheduler::HostScheduler;
    use handover::{PayloadBuilder, Record};

    pub(crate) fn payload() -> Payload {
        let mut builder = PayloadBuilder::new("unit-test");
        builder
            .add(Record::new(Tag::Free, 0x10_0000, 0x40_0000))
            .unwrap();
        builder
            .add(Record::file("init", 0x20_0000, 0x1800))
            .unwrap();
        builder.build()
    }

    pub(crate) fn boot_with(config: KernelConfig) -> (Boot, Arc<HostScheduler>, SimPortBus) {
        let scheduler = Arc::new(HostScheduler::new());
        let ports = SimPortBus::new();
        let boot = Kernel::boot(
            config,
            scheduler.clone(),
            Arc::new(ports.clone()),
            &payload(),
        )
        .unwrap();
        (boot, scheduler, ports)
    }

    pub(crate) fn boot() -> (Boot, Arc<HostScheduler>, SimPortBus) {
        boot_with(KernelConfig::default())
    }
}
