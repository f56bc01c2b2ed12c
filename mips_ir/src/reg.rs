/// The physical MIPS CPU registers the backend's fixed template uses.
///
/// | register | usage |
/// | --- | --- |
/// | `$zero` | always zero |
/// | `$v0` | syscall number / return value |
/// | `$a0`–`$a3` | first four call arguments |
/// | `$t0`–`$t2` | expression temporaries |
/// | `$sp`, `$fp`, `$ra` | stack, frame, return address |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    Zero,
    V0,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    Sp,
    Fp,
    Ra,
}

impl Reg {
    /// The argument register for argument `index`, if it is one of the first
    /// four.
    pub fn arg(index: usize) -> Option<Reg> {
        match index {
            0 => Some(Reg::A0),
            1 => Some(Reg::A1),
            2 => Some(Reg::A2),
            3 => Some(Reg::A3),
            _ => None,
        }
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Reg::Zero => "$zero",
            Reg::V0 => "$v0",
            Reg::A0 => "$a0",
            Reg::A1 => "$a1",
            Reg::A2 => "$a2",
            Reg::A3 => "$a3",
            Reg::T0 => "$t0",
            Reg::T1 => "$t1",
            Reg::T2 => "$t2",
            Reg::Sp => "$sp",
            Reg::Fp => "$fp",
            Reg::Ra => "$ra",
        };
        f.write_str(name)
    }
}
