//! # Inter-Process Communication (IPC)
//!
//! This crate defines the values that travel through kernel channels and
//! listeners.
//!
//! ## Philosophy
//!
//! - **Bytes on the wire, types at the edges**: the kernel moves opaque
//!   payload bytes; [`Message::encode`] / [`Message::decode`] give senders and
//!   receivers a typed view.
//! - **Authority moves, it is not copied**: at most one capability rides along
//!   with a message and leaves the sender's table when it does.
//! - **Events are snapshots**: a listener sees the signal state of an object at
//!   the moment of a watched transition.

pub mod channel;
pub mod event;
pub mod message;

pub use channel::ChannelMode;
pub use event::Event;
pub use message::{Message, PayloadError, ReceivedMessage};
