//! Requests a kernel image places in its `.handover` section

use crate::record::{PixelFormat, Tag};
use serde::{Deserialize, Serialize};

/// Name of the section holding the request list
pub const REQUEST_SECTION: &str = ".handover";

/// Default stack size requested from the loader
pub const DEFAULT_STACK_SIZE: u64 = 64 * 1024;

/// One thing the kernel wants the loader to provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub tag: Tag,
    pub flags: u32,
    /// Tag-specific argument (stack size, preferred pixel format)
    pub more: u64,
}

impl Request {
    const fn plain(tag: Tag) -> Self {
        Self { tag, flags: 0, more: 0 }
    }

    pub const fn self_image() -> Self {
        Self::plain(Tag::SelfImage)
    }

    pub const fn stack(preferred_size: u64) -> Self {
        Self {
            tag: Tag::Stack,
            flags: 0,
            more: preferred_size,
        }
    }

    pub const fn kernel() -> Self {
        Self::plain(Tag::Kernel)
    }

    pub const fn files() -> Self {
        Self::plain(Tag::File)
    }

    pub const fn rsdp() -> Self {
        Self::plain(Tag::Rsdp)
    }

    pub const fn fdt() -> Self {
        Self::plain(Tag::Fdt)
    }

    pub const fn framebuffer(preferred: PixelFormat) -> Self {
        Self {
            tag: Tag::Fb,
            flags: 0,
            more: preferred as u64,
        }
    }

    /// Wraps a request list with the MAGIC / END markers the loader scans for
    pub fn section(requests: &[Request]) -> Vec<Request> {
        let mut section = Vec::with_capacity(requests.len() + 2);
        section.push(Self::plain(Tag::Magic));
        section.extend_from_slice(requests);
        section.push(Self::plain(Tag::End));
        section
    }
}
