//! The kernel API trait

use crate::{CreateParams, Instant, KernelError, Mapping, TaskArgs};
use core_types::{Handle, IoWidth, MapFlags, Rights, Signals};
use ipc::{Event, Message, ReceivedMessage};

/// The syscall surface of the kernel
///
/// Every operation names objects through handles in the caller's capability
/// table and is checked against the rights on that entry before anything
/// else happens.
///
/// # Design Principles
///
/// **Explicit caller**: the calling task is passed in as `ctx`; there is no
/// ambient "current task".
///
/// **Shared kernel**: methods take `&self` because every core enters the
/// kernel concurrently. Mutation is serialized per object inside the
/// implementation.
///
/// **Atomic outcomes**: a failed call leaves no partial state behind.
///
/// # Example
///
/// ```no_run
/// use kernel_api::{CreateParams, KernelApi, KernelError};
/// use core_types::Handle;
/// use ipc::Message;
///
/// fn ping<K: KernelApi>(kernel: &K, ctx: &K::Context, domain: Handle) -> Result<(), KernelError> {
///     let channel = kernel.create(ctx, domain, CreateParams::channel(1))?;
///     kernel.send(ctx, channel, Message::from("ping"), None)?;
///     let received = kernel.recv(ctx, channel)?;
///     assert_eq!(received.payload(), b"ping");
///     kernel.drop_handle(ctx, channel)
/// }
/// ```
pub trait KernelApi {
    /// Identity of the calling task, threaded through every call
    type Context;

    /// Writes a diagnostic line to the kernel log
    fn log(&self, ctx: &Self::Context, text: &str) -> Result<(), KernelError>;

    /// Creates an object under the domain `dest` and returns a handle to it
    ///
    /// `dest` needs `CREATE`. The new entry lands in the caller's table with
    /// the maximal rights for the new kind.
    fn create(
        &self,
        ctx: &Self::Context,
        dest: Handle,
        params: CreateParams,
    ) -> Result<Handle, KernelError>;

    /// Attaches a diagnostic name to an object
    fn label(&self, ctx: &Self::Context, handle: Handle, text: &str) -> Result<(), KernelError>;

    /// Removes a table entry, destroying the object if it was the last reference
    fn drop_handle(&self, ctx: &Self::Context, handle: Handle) -> Result<(), KernelError>;

    /// Copies an entry with a subset of its rights
    ///
    /// Asking for a right the source does not hold fails with
    /// `PermissionDenied`.
    fn duplicate(
        &self,
        ctx: &Self::Context,
        handle: Handle,
        rights: Rights,
    ) -> Result<Handle, KernelError>;

    /// Copies an entry into another domain's table
    ///
    /// Needs `DUPLICATE` on the source and `CREATE` on the target domain. The
    /// returned handle is only meaningful inside the target domain.
    fn duplicate_into(
        &self,
        ctx: &Self::Context,
        target: Handle,
        handle: Handle,
        rights: Rights,
    ) -> Result<Handle, KernelError>;

    /// Moves a constructed task to the running state
    fn start(
        &self,
        ctx: &Self::Context,
        task: Handle,
        ip: u64,
        sp: u64,
        args: TaskArgs,
    ) -> Result<(), KernelError>;

    /// Maps a memory object into a space (or a task's space)
    ///
    /// `virt == None` lets the kernel pick the address. `len == 0` maps up to
    /// the end of the object.
    #[allow(clippy::too_many_arguments)]
    fn map(
        &self,
        ctx: &Self::Context,
        space: Handle,
        virt: Option<u64>,
        memory: Handle,
        offset: u64,
        len: u64,
        flags: MapFlags,
    ) -> Result<Mapping, KernelError>;

    /// Removes mappings covering exactly `[virt, virt + len)`
    fn unmap(
        &self,
        ctx: &Self::Context,
        space: Handle,
        virt: u64,
        len: u64,
    ) -> Result<(), KernelError>;

    /// Reads from a port covered by a port-I/O capability
    fn port_in(
        &self,
        ctx: &Self::Context,
        handle: Handle,
        width: IoWidth,
        port: u16,
    ) -> Result<u32, KernelError>;

    /// Writes to a port covered by a port-I/O capability
    fn port_out(
        &self,
        ctx: &Self::Context,
        handle: Handle,
        width: IoWidth,
        port: u16,
        value: u32,
    ) -> Result<(), KernelError>;

    /// Queues a message, optionally moving one capability along with it
    ///
    /// Parks the caller while the mailbox is full, unless the channel is
    /// non-blocking.
    fn send(
        &self,
        ctx: &Self::Context,
        channel: Handle,
        message: Message,
        transfer: Option<Handle>,
    ) -> Result<(), KernelError>;

    /// Dequeues the next message, parking while the mailbox is empty
    fn recv(&self, ctx: &Self::Context, channel: Handle) -> Result<ReceivedMessage, KernelError>;

    /// Shuts the channel down and wakes everyone waiting on it
    fn close(&self, ctx: &Self::Context, channel: Handle) -> Result<(), KernelError>;

    /// Sets and clears user signal bits on an object
    fn signal(
        &self,
        ctx: &Self::Context,
        handle: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError>;

    /// Registers (or replaces, or with empty masks removes) a watch
    fn watch(
        &self,
        ctx: &Self::Context,
        listener: Handle,
        target: Handle,
        set: Signals,
        unset: Signals,
    ) -> Result<(), KernelError>;

    /// Collects up to `max_events` pending events, parking until `deadline`
    fn listen(
        &self,
        ctx: &Self::Context,
        listener: Handle,
        max_events: usize,
        deadline: Instant,
    ) -> Result<Vec<Event>, KernelError>;
}
