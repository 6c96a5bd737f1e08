//! # Kernel Objects
//!
//! The object layer of the kernel: capability tables, the seven object kinds
//! and every syscall that operates on them.
//!
//! ## Philosophy
//!
//! **Authority is explicit.** A task can only name objects through handles in
//! its own domain's table, and every operation checks the rights on that
//! entry first.
//!
//! **Objects are shared, not owned.** An object lives as long as something
//! holds a reference to it (table entries, capabilities in flight, mappings,
//! task bindings) and is torn down, children first, when the last goes away.
//!
//! **The host is a real target.** [`HostScheduler`], [`SimClock`] and
//! [`SimPortBus`] let the same kernel run under `cargo test` with OS threads
//! standing in for tasks.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use handover::{PayloadBuilder, Record, Tag};
//! use ipc::Message;
//! use kernel_api::{CreateParams, KernelApi};
//! use kernel_objects::{HostScheduler, Kernel, KernelConfig, SimPortBus};
//!
//! let mut payload = PayloadBuilder::new("doc");
//! payload.add(Record::new(Tag::Free, 0x10_0000, 0x10_0000)).unwrap();
//!
//! let boot = Kernel::boot(
//!     KernelConfig::default(),
//!     Arc::new(HostScheduler::new()),
//!     Arc::new(SimPortBus::new()),
//!     &payload.build(),
//! )
//! .unwrap();
//!
//! let (kernel, root) = (&boot.kernel, &boot.root);
//! let channel = kernel.create(root, boot.root_domain, CreateParams::channel(4)).unwrap();
//! kernel.send(root, channel, Message::from("hello"), None).unwrap();
//! assert_eq!(kernel.recv(root, channel).unwrap().payload(), b"hello");
//! ```

mod address_space;
mod cap_table;
pub mod capability_audit;
mod channel;
pub mod config;
mod domain;
mod frames;
mod kernel;
mod memory;
mod object;
pub mod port_io;
mod registry;
pub mod scheduler;
mod signal;
mod task;
pub mod timer;

pub use capability_audit::{CapabilityAuditEvent, CapabilityAuditLog};
pub use config::{ConfigError, KernelConfig};
pub use kernel::{Boot, BootError, BootFile, Kernel, TaskContext};
pub use port_io::{PortAccess, SimPortBus};
pub use scheduler::{HostScheduler, ScheduleEvent, Scheduler, WakeReason};
pub use task::TaskPhase;
pub use timer::SimClock;
