use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Sdiv,
    Srem,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Sdiv => "sdiv",
            BinaryOp::Srem => "srem",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpCond {
    Eq,
    Ne,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IcmpCond {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IcmpCond::Eq => "eq",
            IcmpCond::Ne => "ne",
            IcmpCond::Sgt => "sgt",
            IcmpCond::Sge => "sge",
            IcmpCond::Slt => "slt",
            IcmpCond::Sle => "sle",
        }
    }
}

impl fmt::Display for IcmpCond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The opcode of an instruction. Each variant fixes its operand shape; the
/// shapes are established by the [`Builder`](crate::Builder) constructors and
/// relied upon by every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrKind {
    /// Operands `[lhs, rhs]`, both `i32`.
    Binary(BinaryOp),
    /// No operands. The allocated type is the pointee of the result type.
    Alloca,
    /// Operand `[ptr]`.
    Load,
    /// Operands `[value, ptr]`.
    Store,
    /// Operands `[lhs, rhs]`; yields `i1`.
    Icmp(IcmpCond),
    /// Operands `[cond, iftrue, iffalse]`; the last two are blocks.
    Branch,
    /// Operand `[target]`, a block.
    Jump,
    /// Operands `[callee, arg...]`.
    Call,
    /// Operands `[]` (void) or `[value]`.
    Ret,
    /// Operands `[base, index...]` with at least one index.
    GetElementPtr,
    /// Operand `[value]`.
    Zext,
    /// Operand `[value]`.
    Trunc,
    /// Operands `[value, block]` pairs, one pair per predecessor.
    Phi,
}

impl InstrKind {
    pub fn is_terminator(self) -> bool {
        matches!(self, InstrKind::Branch | InstrKind::Jump | InstrKind::Ret)
    }
}
