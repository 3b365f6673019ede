use bitflags::bitflags;

bitflags! {
    /// Set of x86 arithmetic condition flags.
    ///
    /// `PEND` is not a processor flag: it marks that flag state escapes
    /// the unit through an exit whose consumer is unknown, so the flags
    /// may be left in deferred form for whoever runs next.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct FlagSet: u32 {
        const CF = 1 << 0;
        const PF = 1 << 1;
        const AF = 1 << 2;
        const ZF = 1 << 3;
        const SF = 1 << 4;
        const OF = 1 << 5;
        const PEND = 1 << 6;
        const ALL = Self::CF.bits()
            | Self::PF.bits()
            | Self::AF.bits()
            | Self::ZF.bits()
            | Self::SF.bits()
            | Self::OF.bits();
    }
}

// -- EFLAGS bit positions --

pub const EFLAGS_CF: u32 = 1 << 0;
pub const EFLAGS_PF: u32 = 1 << 2;
pub const EFLAGS_AF: u32 = 1 << 4;
pub const EFLAGS_ZF: u32 = 1 << 6;
pub const EFLAGS_SF: u32 = 1 << 7;
pub const EFLAGS_OF: u32 = 1 << 11;

const EFLAGS_MAP: [(FlagSet, u32); 6] = [
    (FlagSet::CF, EFLAGS_CF),
    (FlagSet::PF, EFLAGS_PF),
    (FlagSet::AF, EFLAGS_AF),
    (FlagSet::ZF, EFLAGS_ZF),
    (FlagSet::SF, EFLAGS_SF),
    (FlagSet::OF, EFLAGS_OF),
];

impl FlagSet {
    /// Build a set from an EFLAGS register image.
    pub fn from_eflags(eflags: u32) -> Self {
        EFLAGS_MAP
            .iter()
            .filter(|(_, bit)| eflags & bit != 0)
            .fold(FlagSet::empty(), |acc, (f, _)| acc | *f)
    }

    /// EFLAGS mask covering the processor flags in this set.
    pub fn eflags_mask(self) -> u32 {
        EFLAGS_MAP
            .iter()
            .filter(|(f, _)| self.contains(*f))
            .fold(0, |acc, (_, bit)| acc | bit)
    }

    /// The set without the `PEND` marker.
    #[inline]
    pub fn processor_flags(self) -> Self {
        self & FlagSet::ALL
    }
}

/// How an instruction affects the flags it lists as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagWriteMode {
    /// No flags written.
    #[default]
    Never,
    /// Every listed flag is overwritten whenever the instruction runs.
    Always,
    /// The write depends on runtime operands (e.g. a shift by `cl`,
    /// which leaves flags untouched when the count is zero).
    Maybe,
}
