mod builder;
mod fmt_as_llvm_asm;
mod instruction;
mod module;
mod ty;
mod value;

pub mod passes;

pub use builder::Builder;
pub use instruction::{BinaryOp, IcmpCond, InstrKind};
pub use module::Module;
pub use ty::Type;
pub use value::{Use, ValueData, ValueId, ValueKind};
