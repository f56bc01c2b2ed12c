use crate::instruction::{BinaryOp, IcmpCond, InstrKind};
use crate::module::Module;
use crate::ty::Type;
use crate::value::ValueId;
use vec1::Vec1;

/// Insertion cursor over a module: tracks the current function and block and
/// appends instructions with the operand shape their opcode requires.
pub struct Builder<'m> {
    module: &'m mut Module,
    function: Option<ValueId>,
    block: Option<ValueId>,
}

impl<'m> Builder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            function: None,
            block: None,
        }
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        self.module
    }

    pub fn set_function(&mut self, function: ValueId) {
        self.function = Some(function);
        self.block = None;
    }

    pub fn function(&self) -> ValueId {
        self.function.expect("no current function set")
    }

    pub fn set_block(&mut self, block: ValueId) {
        self.block = Some(block);
    }

    pub fn block(&self) -> ValueId {
        self.block.expect("no current block set")
    }

    pub fn create_block(&mut self, name: impl Into<String>) -> ValueId {
        let function = self.function();
        self.module.create_block(function, name)
    }

    /// `true` if the current block's last instruction is a terminator.
    pub fn block_is_terminated(&self) -> bool {
        self.module
            .block_instructions(self.block())
            .last()
            .is_some_and(|&i| self.module.value(i).is_terminator())
    }

    fn insert(
        &mut self,
        op: InstrKind,
        ty: Type,
        name: impl Into<String>,
        operands: impl IntoIterator<Item = ValueId>,
    ) -> ValueId {
        let instr = self.module.new_instr(op, ty, name);
        for operand in operands {
            self.module.add_operand(instr, Some(operand));
        }
        let block = self.block();
        self.module.append_instr(block, instr);
        instr
    }

    pub fn alloca(&mut self, allocated: Type, name: impl Into<String>) -> ValueId {
        self.insert(InstrKind::Alloca, Type::pointer_to(allocated), name, [])
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        name: impl Into<String>,
    ) -> ValueId {
        self.insert(InstrKind::Binary(op), Type::I32, name, [lhs, rhs])
    }

    pub fn icmp(
        &mut self,
        cond: IcmpCond,
        lhs: ValueId,
        rhs: ValueId,
        name: impl Into<String>,
    ) -> ValueId {
        self.insert(InstrKind::Icmp(cond), Type::I1, name, [lhs, rhs])
    }

    pub fn load(&mut self, ptr: ValueId, name: impl Into<String>) -> ValueId {
        let ty = self
            .module
            .ty(ptr)
            .pointee()
            .expect("load from a non-pointer value")
            .clone();
        self.insert(InstrKind::Load, ty, name, [ptr])
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        self.insert(InstrKind::Store, Type::Void, "", [value, ptr]);
    }

    pub fn branch(&mut self, cond: ValueId, iftrue: ValueId, iffalse: ValueId) {
        self.insert(InstrKind::Branch, Type::Void, "", [cond, iftrue, iffalse]);
    }

    pub fn jump(&mut self, target: ValueId) {
        self.insert(InstrKind::Jump, Type::Void, "", [target]);
    }

    pub fn call(
        &mut self,
        callee: ValueId,
        args: Vec<ValueId>,
        name: impl Into<String>,
    ) -> ValueId {
        let ret = self
            .module
            .ty(callee)
            .return_ty()
            .expect("call of a non-function value")
            .clone();
        self.insert(
            InstrKind::Call,
            ret,
            name,
            std::iter::once(callee).chain(args),
        )
    }

    pub fn ret(&mut self, value: Option<ValueId>) {
        self.insert(InstrKind::Ret, Type::Void, "", value);
    }

    /// Emits a single `getelementptr`. The result type is found by walking
    /// the base's pointee through the trailing indices: the first index steps
    /// through the pointer, every further one steps into an array level.
    pub fn gep(
        &mut self,
        base: ValueId,
        indices: Vec1<ValueId>,
        name: impl Into<String>,
    ) -> ValueId {
        let mut walked = self
            .module
            .ty(base)
            .pointee()
            .expect("gep base is not a pointer")
            .clone();
        for _ in 1..indices.len() {
            walked = walked
                .element()
                .expect("gep indexes into a non-array type")
                .clone();
        }
        self.insert(
            InstrKind::GetElementPtr,
            Type::pointer_to(walked),
            name,
            std::iter::once(base).chain(indices),
        )
    }

    pub fn zext(&mut self, value: ValueId, to: Type, name: impl Into<String>) -> ValueId {
        self.insert(InstrKind::Zext, to, name, [value])
    }

    pub fn trunc(&mut self, value: ValueId, to: Type, name: impl Into<String>) -> ValueId {
        self.insert(InstrKind::Trunc, to, name, [value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gep_walks_nested_array_types() {
        let mut module = Module::new();
        let f = module.add_function("f", Type::I32, vec![], false);
        let base_ty = Type::array_of(2, Type::array_of(3, Type::I32));
        let mut builder = Builder::new(&mut module);
        builder.set_function(f);
        let entry = builder.create_block("entry");
        builder.set_block(entry);
        let slot = builder.alloca(base_ty, "a_addr_0");
        let zero = builder.module_mut().const_int(0);
        let one = builder.module_mut().const_int(1);
        let gep = builder.gep(slot, vec1::vec1![zero, one], "gep_1");
        assert_eq!(
            module.ty(gep),
            &Type::pointer_to(Type::array_of(3, Type::I32)),
        );
    }

    #[test]
    fn operand_edges_are_symmetric() {
        let mut module = Module::new();
        let f = module.add_function("f", Type::I32, vec![], false);
        let mut builder = Builder::new(&mut module);
        builder.set_function(f);
        let entry = builder.create_block("entry");
        builder.set_block(entry);
        let slot = builder.alloca(Type::I32, "x_addr_0");
        let three = builder.module_mut().const_int(3);
        builder.store(three, slot);
        let load = builder.load(slot, "load_x_1");
        builder.ret(Some(load));

        // The alloca is used by the store (operand 1) and the load (operand 0).
        let uses = module.value(slot).uses();
        assert_eq!(uses.len(), 2);
        assert!(uses.iter().all(|u| module.operand(u.user, u.operand_index) == Some(slot)));
    }
}
