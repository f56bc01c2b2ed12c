use crate::instruction::InstrKind;
use crate::ty::Type;
use crate::value::{Use, ValueData, ValueId, ValueKind};
use generational_arena::Arena;

/// A whole program: an ordered list of globals and an ordered list of
/// functions, all living in one value arena.
///
/// Ownership flows module → function → block → instruction through id lists;
/// operand lists and use lists are non-owning cross references. The only way
/// to rewire an operand edge is [`set_operand`](Module::set_operand), which
/// keeps both sides of the edge in sync.
#[derive(Debug, Default)]
pub struct Module {
    values: Arena<ValueData>,
    globals: Vec<ValueId>,
    functions: Vec<ValueId>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn globals(&self) -> &[ValueId] {
        &self.globals
    }

    pub fn functions(&self) -> &[ValueId] {
        &self.functions
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        self.values
            .get(id.0)
            .expect("use of a value that was removed from the module")
    }

    fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        self.values
            .get_mut(id.0)
            .expect("use of a value that was removed from the module")
    }

    pub fn ty(&self, id: ValueId) -> &Type {
        self.value(id).ty()
    }

    pub fn name(&self, id: ValueId) -> &str {
        self.value(id).name()
    }

    /// The integer payload of a `ConstInt`, or `None` for any other value.
    pub fn const_int_value(&self, id: ValueId) -> Option<i32> {
        match self.value(id).kind() {
            ValueKind::ConstInt(v) => Some(*v),
            _ => None,
        }
    }

    // ---- creation -------------------------------------------------------

    fn insert(&mut self, data: ValueData) -> ValueId {
        ValueId(self.values.insert(data))
    }

    /// An `i32` integer constant.
    pub fn const_int(&mut self, value: i32) -> ValueId {
        self.const_int_of(Type::I32, value)
    }

    pub fn const_int_of(&mut self, ty: Type, value: i32) -> ValueId {
        self.insert(ValueData::new(
            ty,
            value.to_string(),
            ValueKind::ConstInt(value),
        ))
    }

    /// A constant array literal; `elements` become the operands in order.
    pub fn const_array(&mut self, ty: Type, elements: Vec<ValueId>) -> ValueId {
        let id = self.insert(ValueData::new(ty, String::new(), ValueKind::ConstArray));
        for element in elements {
            self.add_operand(id, Some(element));
        }
        id
    }

    /// A global holding a `pointee` and optionally initialized; the global
    /// value itself has pointer type. A `None` initializer means
    /// zero-initialized.
    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        pointee: Type,
        init: Option<ValueId>,
        is_const: bool,
    ) -> ValueId {
        let id = self.insert(ValueData::new(
            Type::pointer_to(pointee),
            name.into(),
            ValueKind::Global { is_const },
        ));
        self.add_operand(id, init);
        self.globals.push(id);
        id
    }

    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        ret: Type,
        param_tys: Vec<Type>,
        is_builtin: bool,
    ) -> ValueId {
        let ty = Type::function(ret, param_tys.clone());
        let id = self.insert(ValueData::new(
            ty,
            name.into(),
            ValueKind::Function {
                params: Vec::new(),
                blocks: Vec::new(),
                is_builtin,
            },
        ));
        let params = param_tys
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.insert(ValueData::new(
                    ty,
                    format!("a{index}"),
                    ValueKind::Param { index },
                ))
            })
            .collect();
        match &mut self.value_mut(id).kind {
            ValueKind::Function { params: p, .. } => *p = params,
            _ => unreachable!(),
        }
        self.functions.push(id);
        id
    }

    pub fn params(&self, function: ValueId) -> &[ValueId] {
        match self.value(function).kind() {
            ValueKind::Function { params, .. } => params,
            _ => panic!("params of non-function value"),
        }
    }

    pub fn blocks(&self, function: ValueId) -> &[ValueId] {
        match self.value(function).kind() {
            ValueKind::Function { blocks, .. } => blocks,
            _ => panic!("blocks of non-function value"),
        }
    }

    pub fn is_builtin(&self, function: ValueId) -> bool {
        match self.value(function).kind() {
            ValueKind::Function { is_builtin, .. } => *is_builtin,
            _ => panic!("builtin flag of non-function value"),
        }
    }

    /// The entry block is the first block of the function.
    pub fn entry_block(&self, function: ValueId) -> Option<ValueId> {
        self.blocks(function).first().copied()
    }

    pub fn create_block(&mut self, function: ValueId, name: impl Into<String>) -> ValueId {
        let id = self.insert(ValueData::new(
            Type::Label,
            name.into(),
            ValueKind::Block {
                parent: function,
                instructions: Vec::new(),
            },
        ));
        match &mut self.value_mut(function).kind {
            ValueKind::Function { blocks, .. } => blocks.push(id),
            _ => panic!("create_block on non-function value"),
        }
        id
    }

    pub fn block_instructions(&self, block: ValueId) -> &[ValueId] {
        match self.value(block).kind() {
            ValueKind::Block { instructions, .. } => instructions,
            _ => panic!("instructions of non-block value"),
        }
    }

    /// Creates an instruction value that is not yet part of any block.
    pub fn new_instr(&mut self, op: InstrKind, ty: Type, name: impl Into<String>) -> ValueId {
        self.insert(ValueData::new(
            ty,
            name.into(),
            ValueKind::Instruction { op, parent: None },
        ))
    }

    pub fn append_instr(&mut self, block: ValueId, instr: ValueId) {
        match &mut self.value_mut(block).kind {
            ValueKind::Block { instructions, .. } => instructions.push(instr),
            _ => panic!("append_instr on non-block value"),
        }
        match &mut self.value_mut(instr).kind {
            ValueKind::Instruction { parent, .. } => *parent = Some(block),
            _ => panic!("append_instr of non-instruction value"),
        }
    }

    /// Creates a φ and inserts it at the start of `block`, after any φs
    /// already there.
    pub fn insert_phi(&mut self, block: ValueId, ty: Type, name: impl Into<String>) -> ValueId {
        let phi = self.insert(ValueData::new(
            ty,
            name.into(),
            ValueKind::Instruction {
                op: InstrKind::Phi,
                parent: Some(block),
            },
        ));
        let at = self
            .block_instructions(block)
            .iter()
            .position(|&i| !self.value(i).is_phi())
            .unwrap_or_else(|| self.block_instructions(block).len());
        match &mut self.value_mut(block).kind {
            ValueKind::Block { instructions, .. } => instructions.insert(at, phi),
            _ => panic!("insert_phi on non-block value"),
        }
        phi
    }

    /// Appends `(value, block)` to a φ's incoming list.
    pub fn add_phi_incoming(&mut self, phi: ValueId, value: ValueId, block: ValueId) {
        debug_assert!(self.value(phi).is_phi());
        self.add_operand(phi, Some(value));
        self.add_operand(phi, Some(block));
    }

    /// The incoming value a φ selects when control arrives from `block`.
    pub fn phi_incoming_for(&self, phi: ValueId, block: ValueId) -> Option<ValueId> {
        let operands = self.value(phi).operands();
        operands
            .chunks(2)
            .find(|pair| pair.get(1).copied().flatten() == Some(block))
            .and_then(|pair| pair[0])
    }

    // ---- the use graph --------------------------------------------------

    pub fn operand(&self, user: ValueId, index: usize) -> Option<ValueId> {
        self.value(user).operands().get(index).copied().flatten()
    }

    pub fn add_operand(&mut self, user: ValueId, value: Option<ValueId>) {
        let index = self.value(user).operands().len();
        self.value_mut(user).operands.push(None);
        self.set_operand(user, index, value);
    }

    /// The single graph-mutation primitive: points operand `index` of `user`
    /// at `value`, detaching the previous edge (if any) from its target's use
    /// list and registering the new one.
    pub fn set_operand(&mut self, user: ValueId, index: usize, value: Option<ValueId>) {
        let old = self.value(user).operands()[index];
        if old == value {
            return;
        }
        if let Some(old) = old {
            let uses = &mut self.value_mut(old).uses;
            let at = uses
                .iter()
                .position(|u| u.user == user && u.operand_index == index)
                .expect("use list out of sync with operand list");
            uses.remove(at);
        }
        if let Some(new) = value {
            self.value_mut(new).uses.push(Use {
                user,
                operand_index: index,
            });
        }
        self.value_mut(user).operands[index] = value;
    }

    /// Rewires every use of `old` to point at `new`. Afterwards `old`'s use
    /// list is empty.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        while let Some(&u) = self.value(old).uses().last() {
            self.set_operand(u.user, u.operand_index, Some(new));
        }
    }

    /// Removes an instruction: detaches all operand edges, unlinks it from
    /// its block, and frees the value. The instruction must itself be unused.
    pub fn erase_instr(&mut self, instr: ValueId) {
        for index in 0..self.value(instr).operands().len() {
            self.set_operand(instr, index, None);
        }
        assert!(
            self.value(instr).uses().is_empty(),
            "erasing instruction `{}` that still has uses",
            self.name(instr),
        );
        if let Some(block) = self.value(instr).parent_block() {
            match &mut self.value_mut(block).kind {
                ValueKind::Block { instructions, .. } => {
                    instructions.retain(|&i| i != instr);
                }
                _ => unreachable!(),
            }
        }
        self.values.remove(instr.0);
    }
}
