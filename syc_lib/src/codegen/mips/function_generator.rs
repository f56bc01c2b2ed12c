//! Per-function emission: stack-frame layout, instruction selection, and
//! φ-to-copy lowering on CFG edges.

use super::size_of;
use llvm_ir as ir;
use llvm_ir::{BinaryOp, IcmpCond, InstrKind};
use mips_ir as mir;
use mips_ir::{instr, Reg};
use std::collections::HashMap;

pub(super) struct FunctionGenerator<'i, 'r> {
    module: &'i ir::Module,
    root: &'r mut mir::Root,
    function: ir::ValueId,
    func_name: String,
    /// `$fp`-relative slot of every value this function produces. Discarded
    /// when the function is done.
    offsets: HashMap<ir::ValueId, i32>,
    frame_size: i32,
    edge_counter: usize,
    current_block: Option<ir::ValueId>,
}

impl<'i, 'r> FunctionGenerator<'i, 'r> {
    pub(super) fn new(
        module: &'i ir::Module,
        root: &'r mut mir::Root,
        function: ir::ValueId,
    ) -> Self {
        let func_name = module.name(function).to_owned();
        Self {
            module,
            root,
            function,
            func_name,
            offsets: HashMap::new(),
            frame_size: 0,
            edge_counter: 0,
            current_block: None,
        }
    }

    pub(super) fn generate(mut self) {
        self.layout_frame();

        self.root
            .add_label(mir::Label::from(format!("_{}", self.func_name)));

        // Prologue: save $ra and the caller's $fp below the caller's frame,
        // re-anchor $fp, then claim the frame.
        self.emit(instr::sw(Reg::Ra, -4, Reg::Sp));
        self.emit(instr::sw(Reg::Fp, -8, Reg::Sp));
        self.emit(instr::move_(Reg::Fp, Reg::Sp));
        if self.frame_size > 32767 {
            self.emit(instr::li(Reg::T0, self.frame_size));
            self.emit(instr::subu(Reg::Sp, Reg::Sp, Reg::T0));
        } else {
            self.emit(instr::addiu(Reg::Sp, Reg::Sp, -self.frame_size));
        }

        // Spill the register-passed arguments into their slots.
        let params = self.module.params(self.function).to_vec();
        for (i, &param) in params.iter().take(4).enumerate() {
            self.store_from(param, Reg::arg(i).unwrap());
        }

        for &block in self.module.blocks(self.function) {
            self.current_block = Some(block);
            let label = self.block_label(block);
            self.root.add_label(label);
            for &instruction in self.module.block_instructions(block) {
                self.select_instr(instruction);
            }
        }
        self.root.add_blank();
    }

    /// Frame layout, offsets growing downward from `$fp`:
    /// `-4` holds `$ra`, `-8` the saved `$fp`, then the first four argument
    /// spill slots, then one slot per produced value. Arguments past four
    /// live in the caller's frame at non-negative offsets.
    fn layout_frame(&mut self) {
        let mut local_start: i32 = 8;

        for (i, &param) in self.module.params(self.function).iter().enumerate() {
            if i < 4 {
                local_start += 4;
                self.offsets.insert(param, -local_start);
            } else {
                self.offsets.insert(param, (i as i32 - 4) * 4);
            }
        }

        for &block in self.module.blocks(self.function) {
            for &instruction in self.module.block_instructions(block) {
                let data = self.module.value(instruction);
                if data.ty().is_void() {
                    continue;
                }
                let (size, align) = if data.is_alloca() {
                    let pointee = data.ty().pointee().unwrap();
                    (size_of(pointee), alignment_of(pointee))
                } else {
                    (4, 4)
                };
                local_start += size;
                if local_start % align != 0 {
                    local_start += align - local_start % align;
                }
                self.offsets.insert(instruction, -local_start);
            }
        }

        if local_start % 8 != 0 {
            local_start += 4;
        }
        self.frame_size = local_start;
    }

    fn emit(&mut self, instruction: mir::Instruction) {
        self.root.add_instr(instruction);
    }

    fn block_label(&self, block: ir::ValueId) -> mir::Label {
        mir::Label::from(format!("L_{}_{}", self.func_name, self.module.name(block)))
    }

    fn offset_of(&self, value: ir::ValueId) -> i32 {
        *self.offsets.get(&value).unwrap_or_else(|| {
            panic!(
                "value `{}` has no stack slot in `{}`",
                self.module.name(value),
                self.func_name,
            )
        })
    }

    /// Materializes a value into `reg`: constants via `li`, globals via
    /// `la`, allocas as their slot address, everything else from its slot.
    fn load_to(&mut self, value: ir::ValueId, reg: Reg) {
        if let Some(constant) = self.module.const_int_value(value) {
            self.emit(instr::li(reg, constant));
            return;
        }
        if matches!(self.module.value(value).kind(), ir::ValueKind::Global { .. }) {
            let label = mir::Label::from(format!("_{}", self.module.name(value)));
            self.emit(instr::la(reg, label));
            return;
        }
        if self.module.value(value).is_alloca() {
            let offset = self.offset_of(value);
            self.emit(instr::addiu(reg, Reg::Fp, offset));
            return;
        }
        let offset = self.offset_of(value);
        self.emit(instr::lw(reg, offset, Reg::Fp));
    }

    fn store_from(&mut self, value: ir::ValueId, reg: Reg) {
        if let Some(&offset) = self.offsets.get(&value) {
            self.emit(instr::sw(reg, offset, Reg::Fp));
        }
    }

    fn op(&self, instruction: ir::ValueId, index: usize) -> ir::ValueId {
        self.module
            .operand(instruction, index)
            .expect("instruction operand hole")
    }

    fn select_instr(&mut self, instruction: ir::ValueId) {
        let kind = *self
            .module
            .value(instruction)
            .instr_kind()
            .expect("block contains a non-instruction");
        match kind {
            InstrKind::Binary(op) => self.select_binary(instruction, op),
            InstrKind::Alloca => {}
            // φ semantics are realized by edge copies at the branches.
            InstrKind::Phi => {}
            InstrKind::Load => {
                self.load_to(self.op(instruction, 0), Reg::T0);
                if self.module.ty(instruction).is_i8() {
                    self.emit(instr::lb(Reg::T1, 0, Reg::T0));
                } else {
                    self.emit(instr::lw(Reg::T1, 0, Reg::T0));
                }
                self.store_from(instruction, Reg::T1);
            }
            InstrKind::Store => {
                let value = self.op(instruction, 0);
                self.load_to(value, Reg::T0);
                self.load_to(self.op(instruction, 1), Reg::T1);
                if self.module.ty(value).is_i8() {
                    self.emit(instr::sb(Reg::T0, 0, Reg::T1));
                } else {
                    self.emit(instr::sw(Reg::T0, 0, Reg::T1));
                }
            }
            InstrKind::Icmp(cond) => self.select_icmp(instruction, cond),
            InstrKind::Branch => self.select_branch(instruction),
            InstrKind::Jump => {
                let target = self.op(instruction, 0);
                self.emit_phi_copies(self.current_block.unwrap(), target);
                let label = self.block_label(target);
                self.emit(instr::j(label));
            }
            InstrKind::Call => self.select_call(instruction),
            InstrKind::Ret => {
                if self.module.operand(instruction, 0).is_some() {
                    self.load_to(self.op(instruction, 0), Reg::V0);
                }
                self.emit(instr::move_(Reg::Sp, Reg::Fp));
                self.emit(instr::lw(Reg::Ra, -4, Reg::Sp));
                self.emit(instr::lw(Reg::Fp, -8, Reg::Sp));
                self.emit(instr::jr(Reg::Ra));
            }
            InstrKind::GetElementPtr => self.select_gep(instruction),
            InstrKind::Zext => {
                // The operand is 0/1 already.
                self.load_to(self.op(instruction, 0), Reg::T0);
                self.store_from(instruction, Reg::T0);
            }
            InstrKind::Trunc => {
                self.load_to(self.op(instruction, 0), Reg::T0);
                if self.module.ty(instruction).is_i1() {
                    self.emit(instr::andi(Reg::T0, Reg::T0, 1));
                }
                self.store_from(instruction, Reg::T0);
            }
        }
    }

    fn select_binary(&mut self, instruction: ir::ValueId, op: BinaryOp) {
        self.load_to(self.op(instruction, 0), Reg::T0);
        self.load_to(self.op(instruction, 1), Reg::T1);
        match op {
            BinaryOp::Add => self.emit(instr::addu(Reg::T2, Reg::T0, Reg::T1)),
            BinaryOp::Sub => self.emit(instr::subu(Reg::T2, Reg::T0, Reg::T1)),
            BinaryOp::Mul => self.emit(instr::mul(Reg::T2, Reg::T0, Reg::T1)),
            BinaryOp::Sdiv => {
                self.emit(instr::div(Reg::T0, Reg::T1));
                self.emit(instr::mflo(Reg::T2));
            }
            BinaryOp::Srem => {
                self.emit(instr::div(Reg::T0, Reg::T1));
                self.emit(instr::mfhi(Reg::T2));
            }
        }
        self.store_from(instruction, Reg::T2);
    }

    fn select_icmp(&mut self, instruction: ir::ValueId, cond: IcmpCond) {
        self.load_to(self.op(instruction, 0), Reg::T0);
        self.load_to(self.op(instruction, 1), Reg::T1);
        match cond {
            IcmpCond::Eq => {
                self.emit(instr::xor(Reg::T2, Reg::T0, Reg::T1));
                self.emit(instr::sltiu(Reg::T2, Reg::T2, 1));
            }
            IcmpCond::Ne => {
                self.emit(instr::xor(Reg::T2, Reg::T0, Reg::T1));
                self.emit(instr::sltu(Reg::T2, Reg::Zero, Reg::T2));
            }
            IcmpCond::Sgt => self.emit(instr::slt(Reg::T2, Reg::T1, Reg::T0)),
            IcmpCond::Sge => {
                self.emit(instr::slt(Reg::T2, Reg::T0, Reg::T1));
                self.emit(instr::xori(Reg::T2, Reg::T2, 1));
            }
            IcmpCond::Slt => self.emit(instr::slt(Reg::T2, Reg::T0, Reg::T1)),
            IcmpCond::Sle => {
                self.emit(instr::slt(Reg::T2, Reg::T1, Reg::T0));
                self.emit(instr::xori(Reg::T2, Reg::T2, 1));
            }
        }
        self.store_from(instruction, Reg::T2);
    }

    /// Conditional branches route each outcome through its own edge block so
    /// φs can be satisfied per edge; copying every φ through its own slot
    /// sidesteps the parallel-copy swap problem.
    fn select_branch(&mut self, instruction: ir::ValueId) {
        self.load_to(self.op(instruction, 0), Reg::T0);
        let from = self.current_block.unwrap();
        let on_true = self.op(instruction, 1);
        let on_false = self.op(instruction, 2);

        let edge_true = self.edge_label(from, on_true);
        let edge_false = self.edge_label(from, on_false);

        self.emit(instr::bne(Reg::T0, Reg::Zero, edge_true.clone()));
        self.emit(instr::j(edge_false.clone()));

        self.root.add_label(edge_true);
        self.emit_phi_copies(from, on_true);
        let label = self.block_label(on_true);
        self.emit(instr::j(label));

        self.root.add_label(edge_false);
        self.emit_phi_copies(from, on_false);
        let label = self.block_label(on_false);
        self.emit(instr::j(label));
    }

    fn edge_label(&mut self, from: ir::ValueId, to: ir::ValueId) -> mir::Label {
        let label = mir::Label::from(format!(
            "{}_to_{}_phi_edge_{}",
            self.block_label(from),
            self.block_label(to),
            self.edge_counter,
        ));
        self.edge_counter += 1;
        label
    }

    /// Satisfies every φ at the head of `to` for the edge arriving from
    /// `from`: the incoming value is read into `$t0` and written to the φ's
    /// slot.
    fn emit_phi_copies(&mut self, from: ir::ValueId, to: ir::ValueId) {
        for &phi in self.module.block_instructions(to) {
            if !self.module.value(phi).is_phi() {
                break;
            }
            match self.module.phi_incoming_for(phi, from) {
                Some(incoming) => self.load_to(incoming, Reg::T0),
                None => self.emit(instr::li(Reg::T0, 0)),
            }
            self.store_from(phi, Reg::T0);
        }
    }

    fn select_call(&mut self, instruction: ir::ValueId) {
        let arg_count = self.module.value(instruction).operands().len() - 1;
        let stack_args = arg_count.saturating_sub(4) as i32;

        if stack_args > 0 {
            self.emit(instr::addiu(Reg::Sp, Reg::Sp, -stack_args * 4));
        }
        for i in 0..arg_count {
            self.load_to(self.op(instruction, i + 1), Reg::T0);
            match Reg::arg(i) {
                Some(reg) => self.emit(instr::move_(reg, Reg::T0)),
                None => self.emit(instr::sw(Reg::T0, (i as i32 - 4) * 4, Reg::Sp)),
            }
        }

        let callee = self.op(instruction, 0);
        let callee_name = self.module.name(callee);
        match callee_name {
            "getint" => {
                self.emit(instr::li(Reg::V0, 5));
                self.emit(instr::syscall());
            }
            "putint" => {
                self.emit(instr::li(Reg::V0, 1));
                self.emit(instr::syscall());
            }
            "putch" => {
                self.emit(instr::li(Reg::V0, 11));
                self.emit(instr::syscall());
            }
            _ => {
                let label = if self.module.is_builtin(callee) {
                    mir::Label::from(callee_name)
                } else {
                    mir::Label::from(format!("_{callee_name}"))
                };
                self.emit(instr::jal(label));
            }
        }

        if stack_args > 0 {
            self.emit(instr::addiu(Reg::Sp, Reg::Sp, stack_args * 4));
        }
        if !self.module.ty(instruction).is_void() {
            self.store_from(instruction, Reg::V0);
        }
    }

    /// Iterative address computation: each index scales by the size of the
    /// type level it walks, then the walked type advances into the array.
    fn select_gep(&mut self, instruction: ir::ValueId) {
        let base = self.op(instruction, 0);
        self.load_to(base, Reg::T0);

        let mut walked = self
            .module
            .ty(base)
            .pointee()
            .expect("gep base is not a pointer")
            .clone();
        let operand_count = self.module.value(instruction).operands().len();
        for i in 1..operand_count {
            let element_size = size_of(&walked);
            self.load_to(self.op(instruction, i), Reg::T1);
            self.emit(instr::li(Reg::T2, element_size));
            self.emit(instr::mul(Reg::T1, Reg::T1, Reg::T2));
            self.emit(instr::addu(Reg::T0, Reg::T0, Reg::T1));
            if let Some(element) = walked.element() {
                walked = element.clone();
            }
        }
        self.store_from(instruction, Reg::T0);
    }
}

fn alignment_of(ty: &llvm_ir::Type) -> i32 {
    match ty {
        llvm_ir::Type::I8 => 1,
        llvm_ir::Type::Array(_, element) => alignment_of(element),
        _ => 4,
    }
}
