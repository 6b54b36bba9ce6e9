/// Number of opcodes in the wire protocol, including reserved/unhandled ones.
///
/// Kept as a closed tagged variant (§9 "Dispatch table") rather than a raw
/// `u32` so an unknown wire value fails to parse instead of silently
/// reaching a handler — unknown opcodes are rejected with `ENOSYS` at the
/// dispatcher, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    Control = 0,
    Directory = 1,
    Read = 2,
    GetPerms = 3,
    Watch = 4,
    Unwatch = 5,
    TransactionStart = 6,
    TransactionEnd = 7,
    Introduce = 8,
    Release = 9,
    GetDomainPath = 10,
    Write = 11,
    Mkdir = 12,
    Rm = 13,
    SetPerms = 14,
    WatchEvent = 15,
    Error = 16,
    IsDomainIntroduced = 17,
    Resume = 18,
    SetTarget = 19,
    Restrict = 20,
    ResetWatches = 21,
    DirectoryPart = 22,
}

impl Opcode {
    pub const COUNT: u32 = 23;

    #[must_use]
    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Control,
            1 => Self::Directory,
            2 => Self::Read,
            3 => Self::GetPerms,
            4 => Self::Watch,
            5 => Self::Unwatch,
            6 => Self::TransactionStart,
            7 => Self::TransactionEnd,
            8 => Self::Introduce,
            9 => Self::Release,
            10 => Self::GetDomainPath,
            11 => Self::Write,
            12 => Self::Mkdir,
            13 => Self::Rm,
            14 => Self::SetPerms,
            15 => Self::WatchEvent,
            16 => Self::Error,
            17 => Self::IsDomainIntroduced,
            18 => Self::Resume,
            19 => Self::SetTarget,
            20 => Self::Restrict,
            21 => Self::ResetWatches,
            22 => Self::DirectoryPart,
            _ => return None,
        })
    }

    #[inline]
    #[must_use]
    pub fn wire_value(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_opcode() {
        for raw in 0..Opcode::COUNT {
            let op = Opcode::from_wire(raw).expect("known opcode");
            assert_eq!(op.wire_value(), raw);
        }
    }

    #[test]
    fn rejects_values_past_the_known_range() {
        assert!(Opcode::from_wire(Opcode::COUNT).is_none());
        assert!(Opcode::from_wire(9999).is_none());
    }
}
