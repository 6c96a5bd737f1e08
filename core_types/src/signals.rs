//! Signal bitsets
//!
//! Every kernel object carries a signal bitset. The low half is maintained by
//! the kernel (readiness, closure); the `USER*` bits are free for
//! applications and are the only ones the `signal` syscall may touch.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-object readiness/condition flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Signals: u32 {
        /// A message is queued
        const READABLE    = 1 << 0;
        /// A send would not block
        const WRITABLE    = 1 << 1;
        /// The channel was shut down
        const PEER_CLOSED = 1 << 2;
        /// The object was destroyed
        const CLOSED      = 1 << 3;
        /// The task terminated
        const TERMINATED  = 1 << 4;

        const USER0 = 1 << 16;
        const USER1 = 1 << 17;
        const USER2 = 1 << 18;
        const USER3 = 1 << 19;
        const USER4 = 1 << 20;
        const USER5 = 1 << 21;
        const USER6 = 1 << 22;
        const USER7 = 1 << 23;

        /// Bits owned by the kernel
        const KERNEL = Self::READABLE.bits()
            | Self::WRITABLE.bits()
            | Self::PEER_CLOSED.bits()
            | Self::CLOSED.bits()
            | Self::TERMINATED.bits();

        /// Bits owned by applications
        const USER = Self::USER0.bits()
            | Self::USER1.bits()
            | Self::USER2.bits()
            | Self::USER3.bits()
            | Self::USER4.bits()
            | Self::USER5.bits()
            | Self::USER6.bits()
            | Self::USER7.bits();
    }
}

impl Signals {
    /// Applies a set/unset pair: `(self | set) & !unset`
    pub fn apply(self, set: Signals, unset: Signals) -> Signals {
        (self | set) - unset
    }

    /// Bits that went from clear to set between `self` and `next`
    pub fn raised(self, next: Signals) -> Signals {
        next - self
    }

    /// Bits that went from set to clear between `self` and `next`
    pub fn lowered(self, next: Signals) -> Signals {
        self - next
    }
}
