//! # Kernel API
//!
//! This crate defines the interface between user-space code and the kernel
//! object layer.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Object creation under an explicit scope (no ambient allocation)
//! - Capability tables with per-entry rights (no global names)
//! - Message passing with explicit capability transfer
//! - Signals, watches and deadline-bounded waits (no hidden wakeups)
//!
//! ## Design Goals
//!
//! 1. **Testability**: the whole surface is a trait and can be mocked
//! 2. **Explicitness**: the calling task is an argument, never ambient state
//! 3. **Data-only boundary**: requests, responses and errors are plain values
//! 4. **Simplicity**: one small set of operations for every object kind

pub mod error;
pub mod kernel;
pub mod params;
pub mod syscalls;
pub mod time;

pub use error::{ErrorKind, KernelError};
pub use kernel::KernelApi;
pub use params::{CreateParams, Mapping, TaskArgs};
pub use syscalls::{
    dispatch, LoopbackTransport, SyscallClient, SyscallCodec, SyscallCodecError, SyscallError,
    SyscallNumber, SyscallRequest, SyscallRequestPayload, SyscallResponse,
    SyscallResponsePayload, SyscallServer, SyscallTransport, SYSCALL_ABI_VERSION,
};
pub use time::{Duration, Instant};
