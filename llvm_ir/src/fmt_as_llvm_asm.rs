//! Renders a [`Module`] in LLVM assembly shape, close enough for a human (or
//! an LLVM-aware diff) to follow the lowering. Sigils are applied here from
//! the value kind; stored names are bare.

use crate::instruction::InstrKind;
use crate::module::Module;
use crate::value::{ValueId, ValueKind};
use std::fmt::{self, Write as _};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for &global in self.globals() {
            writeln!(f, "{}", fmt_global(self, global))?;
            first = false;
        }
        for &function in self.functions() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            fmt_function(self, f, function)?;
        }
        Ok(())
    }
}

fn fmt_global(module: &Module, global: ValueId) -> String {
    let is_const = match module.value(global).kind() {
        ValueKind::Global { is_const } => *is_const,
        _ => panic!("global list contains a non-global value"),
    };
    let keyword = if is_const { "constant" } else { "global" };
    let name = module.name(global);
    match module.operand(global, 0) {
        Some(init) => format!("@{name} = {keyword} {}", fmt_constant(module, init)),
        None => {
            let pointee = module.ty(global).pointee().unwrap();
            format!("@{name} = {keyword} {pointee} zeroinitializer")
        }
    }
}

/// A constant rendered with its type, e.g. `i32 5` or
/// `[2 x i32] [i32 1, i32 2]`.
fn fmt_constant(module: &Module, constant: ValueId) -> String {
    let ty = module.ty(constant);
    match module.value(constant).kind() {
        ValueKind::ConstInt(v) => format!("{ty} {v}"),
        ValueKind::ConstArray => {
            let mut out = format!("{ty} [");
            for (i, element) in module.value(constant).operands().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&fmt_constant(module, element.expect("constant array hole")));
            }
            out.push(']');
            out
        }
        _ => panic!("initializer is not a constant"),
    }
}

fn fmt_function(module: &Module, f: &mut fmt::Formatter<'_>, function: ValueId) -> fmt::Result {
    let ret = module.ty(function).return_ty().unwrap();
    let name = module.name(function);
    if module.is_builtin(function) {
        write!(f, "declare {ret} @{name}(")?;
        for (i, &param) in module.params(function).iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", module.ty(param))?;
        }
        return writeln!(f, ")");
    }
    write!(f, "define {ret} @{name}(")?;
    for (i, &param) in module.params(function).iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{} %{}", module.ty(param), module.name(param))?;
    }
    writeln!(f, ") {{")?;
    for &block in module.blocks(function) {
        writeln!(f, "{}:", module.name(block))?;
        for &instr in module.block_instructions(block) {
            writeln!(f, "  {}", fmt_instr(module, instr))?;
        }
    }
    writeln!(f, "}}")
}

/// An operand reference without its type, e.g. `%tmp_0`, `@g`, or `5`.
fn fmt_ref(module: &Module, id: ValueId) -> String {
    match module.value(id).kind() {
        ValueKind::ConstInt(v) => v.to_string(),
        ValueKind::Global { .. } | ValueKind::Function { .. } => format!("@{}", module.name(id)),
        _ => format!("%{}", module.name(id)),
    }
}

fn fmt_typed_ref(module: &Module, id: ValueId) -> String {
    format!("{} {}", module.ty(id), fmt_ref(module, id))
}

fn op(module: &Module, instr: ValueId, index: usize) -> ValueId {
    module
        .operand(instr, index)
        .expect("instruction operand hole")
}

fn fmt_instr(module: &Module, instr: ValueId) -> String {
    let data = module.value(instr);
    let kind = data.instr_kind().expect("block contains a non-instruction");
    let name = data.name();
    match kind {
        InstrKind::Binary(bin) => format!(
            "%{name} = {bin} {}, {}",
            fmt_typed_ref(module, op(module, instr, 0)),
            fmt_ref(module, op(module, instr, 1)),
        ),
        InstrKind::Alloca => {
            format!("%{name} = alloca {}", data.ty().pointee().unwrap())
        }
        InstrKind::Load => format!(
            "%{name} = load {}, {}",
            data.ty(),
            fmt_typed_ref(module, op(module, instr, 0)),
        ),
        InstrKind::Store => format!(
            "store {}, {}",
            fmt_typed_ref(module, op(module, instr, 0)),
            fmt_typed_ref(module, op(module, instr, 1)),
        ),
        InstrKind::Icmp(cond) => format!(
            "%{name} = icmp {cond} {}, {}",
            fmt_typed_ref(module, op(module, instr, 0)),
            fmt_ref(module, op(module, instr, 1)),
        ),
        InstrKind::Branch => format!(
            "br {}, label {}, label {}",
            fmt_typed_ref(module, op(module, instr, 0)),
            fmt_ref(module, op(module, instr, 1)),
            fmt_ref(module, op(module, instr, 2)),
        ),
        InstrKind::Jump => format!("br label {}", fmt_ref(module, op(module, instr, 0))),
        InstrKind::Call => {
            let callee = op(module, instr, 0);
            let mut out = String::new();
            if !data.ty().is_void() {
                let _ = write!(out, "%{name} = ");
            }
            let _ = write!(out, "call {} {}(", data.ty(), fmt_ref(module, callee));
            for index in 1..data.operands().len() {
                if index > 1 {
                    out.push_str(", ");
                }
                out.push_str(&fmt_typed_ref(module, op(module, instr, index)));
            }
            out.push(')');
            out
        }
        InstrKind::Ret => match module.operand(instr, 0) {
            Some(value) => format!("ret {}", fmt_typed_ref(module, value)),
            None => "ret void".to_string(),
        },
        InstrKind::GetElementPtr => {
            let base = op(module, instr, 0);
            let mut out = format!(
                "%{name} = getelementptr {}, {}",
                module.ty(base).pointee().unwrap(),
                fmt_typed_ref(module, base),
            );
            for index in 1..data.operands().len() {
                out.push_str(", ");
                out.push_str(&fmt_typed_ref(module, op(module, instr, index)));
            }
            out
        }
        InstrKind::Zext => format!(
            "%{name} = zext {} to {}",
            fmt_typed_ref(module, op(module, instr, 0)),
            data.ty(),
        ),
        InstrKind::Trunc => format!(
            "%{name} = trunc {} to {}",
            fmt_typed_ref(module, op(module, instr, 0)),
            data.ty(),
        ),
        InstrKind::Phi => {
            let mut out = format!("%{name} = phi {} ", data.ty());
            for (i, pair) in data.operands().chunks(2).enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(
                    out,
                    "[ {}, {} ]",
                    fmt_ref(module, pair[0].expect("phi incoming value hole")),
                    fmt_ref(module, pair[1].expect("phi incoming block hole")),
                );
            }
            out
        }
    }
}
