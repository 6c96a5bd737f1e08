//! Tagged memory-region records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a hand-off record
///
/// The numeric values are part of the boot protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Tag {
    Free = 0,
    Magic = 0xc001_b001,
    SelfImage = 0xa24f_988d,
    Stack = 0xf65b_391b,
    Kernel = 0xbfc7_1b20,
    Loader = 0xf1f8_0c26,
    File = 0xcbc3_6d3b,
    Rsdp = 0x008d_3bbb,
    Fdt = 0xb628_bbc1,
    Fb = 0xe2d5_5685,
    Reserved = 0xb884_1d2d,
    End = 0xffff_ffff,
}

impl Tag {
    pub const fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Tag> {
        let tag = match code {
            0 => Tag::Free,
            0xc001_b001 => Tag::Magic,
            0xa24f_988d => Tag::SelfImage,
            0xf65b_391b => Tag::Stack,
            0xbfc7_1b20 => Tag::Kernel,
            0xf1f8_0c26 => Tag::Loader,
            0xcbc3_6d3b => Tag::File,
            0x008d_3bbb => Tag::Rsdp,
            0xb628_bbc1 => Tag::Fdt,
            0xe2d5_5685 => Tag::Fb,
            0xb884_1d2d => Tag::Reserved,
            0xffff_ffff => Tag::End,
            _ => return None,
        };
        Some(tag)
    }

    /// Protocol name of the tag
    pub const fn name(&self) -> &'static str {
        match self {
            Tag::Free => "FREE",
            Tag::Magic => "MAGIC",
            Tag::SelfImage => "SELF",
            Tag::Stack => "STACK",
            Tag::Kernel => "KERNEL",
            Tag::Loader => "LOADER",
            Tag::File => "FILE",
            Tag::Rsdp => "RSDP",
            Tag::Fdt => "FDT",
            Tag::Fb => "FB",
            Tag::Reserved => "RESERVED",
            Tag::End => "END",
        }
    }

    /// Whether adjacent records of this tag collapse into one
    pub const fn should_merge(&self) -> bool {
        matches!(self, Tag::Free | Tag::Loader | Tag::Kernel | Tag::Reserved)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Framebuffer pixel layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum PixelFormat {
    Rgbx8888 = 0x7451,
    Bgrx8888 = 0xd040,
}

/// A physical address range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysRange {
    pub start: u64,
    pub size: u64,
}

impl PhysRange {
    pub const fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    /// Exclusive end, saturating at the top of physical memory
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn overlaps(&self, other: &PhysRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

impl fmt::Display for PhysRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start.checked_add(self.size) {
            Some(end) => write!(f, "[{:#x}..{:#x})", self.start, end),
            None => write!(f, "[{:#x}+{:#x})", self.start, self.size),
        }
    }
}

/// One tagged region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub tag: Tag,
    pub flags: u32,
    pub start: u64,
    pub size: u64,
    /// File name for FILE records
    pub name: Option<String>,
}

impl Record {
    pub fn new(tag: Tag, start: u64, size: u64) -> Self {
        Self {
            tag,
            flags: 0,
            start,
            size,
            name: None,
        }
    }

    pub fn file(name: impl Into<String>, start: u64, size: u64) -> Self {
        Self {
            tag: Tag::File,
            flags: 0,
            start,
            size,
            name: Some(name.into()),
        }
    }

    pub fn end(&self) -> u64 {
        self.range().end()
    }

    /// Whether `start + size` fits in 64 bits
    pub fn fits(&self) -> bool {
        self.start.checked_add(self.size).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn range(&self) -> PhysRange {
        PhysRange::new(self.start, self.size)
    }
}
