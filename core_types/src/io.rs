//! Port I/O access widths

use serde::{Deserialize, Serialize};

/// Width of a single port access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoWidth {
    Byte,
    Word,
    Dword,
}

impl IoWidth {
    /// Number of consecutive ports touched by one access
    pub const fn bytes(&self) -> u16 {
        match self {
            IoWidth::Byte => 1,
            IoWidth::Word => 2,
            IoWidth::Dword => 4,
        }
    }

    /// Mask selecting the bits an access of this width carries
    pub const fn mask(&self) -> u32 {
        match self {
            IoWidth::Byte => 0xff,
            IoWidth::Word => 0xffff,
            IoWidth::Dword => 0xffff_ffff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width() {
        assert_eq!(IoWidth::Word.bytes(), 2);
        assert_eq!(IoWidth::Byte.mask(), 0xff);
        assert_eq!(0x1234_5678 & IoWidth::Word.mask(), 0x5678);
    }
}
