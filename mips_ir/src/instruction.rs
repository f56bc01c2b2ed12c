use crate::{Label, Reg};
use std::fmt;

/// Three-register ALU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg3Op {
    Addu,
    Subu,
    Mul,
    Xor,
    Slt,
    Sltu,
}

impl Reg3Op {
    fn mnemonic(self) -> &'static str {
        match self {
            Reg3Op::Addu => "addu",
            Reg3Op::Subu => "subu",
            Reg3Op::Mul => "mul",
            Reg3Op::Xor => "xor",
            Reg3Op::Slt => "slt",
            Reg3Op::Sltu => "sltu",
        }
    }
}

/// Two-register-plus-immediate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imm2Op {
    Addiu,
    Sltiu,
    Xori,
    Andi,
}

impl Imm2Op {
    fn mnemonic(self) -> &'static str {
        match self {
            Imm2Op::Addiu => "addiu",
            Imm2Op::Sltiu => "sltiu",
            Imm2Op::Xori => "xori",
            Imm2Op::Andi => "andi",
        }
    }
}

/// Loads and stores; the operands are `(value, offset, base)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOp {
    Lw,
    Sw,
    Lb,
    Sb,
}

impl MemOp {
    fn mnemonic(self) -> &'static str {
        match self {
            MemOp::Lw => "lw",
            MemOp::Sw => "sw",
            MemOp::Lb => "lb",
            MemOp::Sb => "sb",
        }
    }
}

/// One MARS-assemblable instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Reg3(Reg3Op, Reg, Reg, Reg),
    Imm2(Imm2Op, Reg, Reg, i32),
    Mem(MemOp, Reg, i32, Reg),
    LoadImm(Reg, i32),
    LoadAddress(Reg, Label),
    Move(Reg, Reg),
    Div(Reg, Reg),
    Mflo(Reg),
    Mfhi(Reg),
    BranchNe(Reg, Reg, Label),
    Jump(Label),
    JumpAndLink(Label),
    JumpReg(Reg),
    Syscall,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Reg3(op, d, s, t) => write!(f, "{} {d}, {s}, {t}", op.mnemonic()),
            Instruction::Imm2(op, d, s, imm) => write!(f, "{} {d}, {s}, {imm}", op.mnemonic()),
            Instruction::Mem(op, value, offset, base) => {
                write!(f, "{} {value}, {offset}({base})", op.mnemonic())
            }
            Instruction::LoadImm(d, imm) => write!(f, "li {d}, {imm}"),
            Instruction::LoadAddress(d, label) => write!(f, "la {d}, {label}"),
            Instruction::Move(d, s) => write!(f, "move {d}, {s}"),
            Instruction::Div(s, t) => write!(f, "div {s}, {t}"),
            Instruction::Mflo(d) => write!(f, "mflo {d}"),
            Instruction::Mfhi(d) => write!(f, "mfhi {d}"),
            Instruction::BranchNe(s, t, label) => write!(f, "bne {s}, {t}, {label}"),
            Instruction::Jump(label) => write!(f, "j {label}"),
            Instruction::JumpAndLink(label) => write!(f, "jal {label}"),
            Instruction::JumpReg(s) => write!(f, "jr {s}"),
            Instruction::Syscall => f.write_str("syscall"),
        }
    }
}

/// Shorthand constructors, so generator code reads like the assembly it
/// emits.
pub mod instr {
    use super::*;

    pub fn addu(d: Reg, s: Reg, t: Reg) -> Instruction {
        Instruction::Reg3(Reg3Op::Addu, d, s, t)
    }

    pub fn subu(d: Reg, s: Reg, t: Reg) -> Instruction {
        Instruction::Reg3(Reg3Op::Subu, d, s, t)
    }

    pub fn mul(d: Reg, s: Reg, t: Reg) -> Instruction {
        Instruction::Reg3(Reg3Op::Mul, d, s, t)
    }

    pub fn xor(d: Reg, s: Reg, t: Reg) -> Instruction {
        Instruction::Reg3(Reg3Op::Xor, d, s, t)
    }

    pub fn slt(d: Reg, s: Reg, t: Reg) -> Instruction {
        Instruction::Reg3(Reg3Op::Slt, d, s, t)
    }

    pub fn sltu(d: Reg, s: Reg, t: Reg) -> Instruction {
        Instruction::Reg3(Reg3Op::Sltu, d, s, t)
    }

    pub fn addiu(d: Reg, s: Reg, imm: i32) -> Instruction {
        Instruction::Imm2(Imm2Op::Addiu, d, s, imm)
    }

    pub fn sltiu(d: Reg, s: Reg, imm: i32) -> Instruction {
        Instruction::Imm2(Imm2Op::Sltiu, d, s, imm)
    }

    pub fn xori(d: Reg, s: Reg, imm: i32) -> Instruction {
        Instruction::Imm2(Imm2Op::Xori, d, s, imm)
    }

    pub fn andi(d: Reg, s: Reg, imm: i32) -> Instruction {
        Instruction::Imm2(Imm2Op::Andi, d, s, imm)
    }

    pub fn lw(value: Reg, offset: i32, base: Reg) -> Instruction {
        Instruction::Mem(MemOp::Lw, value, offset, base)
    }

    pub fn sw(value: Reg, offset: i32, base: Reg) -> Instruction {
        Instruction::Mem(MemOp::Sw, value, offset, base)
    }

    pub fn lb(value: Reg, offset: i32, base: Reg) -> Instruction {
        Instruction::Mem(MemOp::Lb, value, offset, base)
    }

    pub fn sb(value: Reg, offset: i32, base: Reg) -> Instruction {
        Instruction::Mem(MemOp::Sb, value, offset, base)
    }

    pub fn li(d: Reg, imm: i32) -> Instruction {
        Instruction::LoadImm(d, imm)
    }

    pub fn la(d: Reg, label: Label) -> Instruction {
        Instruction::LoadAddress(d, label)
    }

    pub fn move_(d: Reg, s: Reg) -> Instruction {
        Instruction::Move(d, s)
    }

    pub fn div(s: Reg, t: Reg) -> Instruction {
        Instruction::Div(s, t)
    }

    pub fn mflo(d: Reg) -> Instruction {
        Instruction::Mflo(d)
    }

    pub fn mfhi(d: Reg) -> Instruction {
        Instruction::Mfhi(d)
    }

    pub fn bne(s: Reg, t: Reg, label: Label) -> Instruction {
        Instruction::BranchNe(s, t, label)
    }

    pub fn j(label: Label) -> Instruction {
        Instruction::Jump(label)
    }

    pub fn jal(label: Label) -> Instruction {
        Instruction::JumpAndLink(label)
    }

    pub fn jr(s: Reg) -> Instruction {
        Instruction::JumpReg(s)
    }

    pub fn syscall() -> Instruction {
        Instruction::Syscall
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_mars_syntax() {
        assert_eq!(instr::addu(Reg::T2, Reg::T0, Reg::T1).to_string(), "addu $t2, $t0, $t1");
        assert_eq!(instr::lw(Reg::T0, -12, Reg::Fp).to_string(), "lw $t0, -12($fp)");
        assert_eq!(instr::sw(Reg::Ra, -4, Reg::Sp).to_string(), "sw $ra, -4($sp)");
        assert_eq!(instr::sltiu(Reg::T2, Reg::T2, 1).to_string(), "sltiu $t2, $t2, 1");
        assert_eq!(
            instr::bne(Reg::T0, Reg::Zero, Label::from("L_main_if_true_0")).to_string(),
            "bne $t0, $zero, L_main_if_true_0",
        );
        assert_eq!(instr::li(Reg::V0, 10).to_string(), "li $v0, 10");
    }
}
