use bitflags::bitflags;

bitflags! {
    /// Name attributes carried by functions, labels and named locations.
    /// AUTONAMED marks names synthesized by analysis rather than taken from
    /// a symbol a human or toolchain wrote down.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct NameFlags: u32 {
        const PUBLIC = 1 << 0;
        const AUTONAMED = 1 << 1;
        const WEAK = 1 << 2;
    }
}

impl NameFlags {
    pub fn is_public(&self) -> bool {
        self.contains(NameFlags::PUBLIC)
    }

    pub fn is_autonamed(&self) -> bool {
        self.contains(NameFlags::AUTONAMED)
    }

    pub fn is_weak(&self) -> bool {
        self.contains(NameFlags::WEAK)
    }
}
