//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the hardware traits the kernel object layer consumes.
//!
//! ## Philosophy
//!
//! **Architecture must be fully abstracted and swappable.**
//!
//! The kernel never touches a device directly. Port I/O goes through
//! [`PortIo`] after the capability check, and deadlines are measured with a
//! [`TimerDevice`]. Hosted builds plug in simulated devices; bare-metal
//! builds plug in the real instructions.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: every hardware operation goes through a trait
//! 2. **Shared**: devices are used from every core at once, so they take `&self`
//! 3. **Testable**: every trait can be mocked

pub mod port_io;
pub mod timer;

pub use port_io::PortIo;
pub use timer::TimerDevice;
