//! MIPS code generation for a MARS-style simulator with syscall I/O.

mod function_generator;
#[cfg(test)]
mod test;

use function_generator::FunctionGenerator;
use llvm_ir as ir;
use mips_ir as mir;
use mips_ir::instr;
use vec1::Vec1;

pub fn build_from_module(module: &ir::Module) -> mir::Root {
    Generator::new(module).generate()
}

struct Generator<'i> {
    module: &'i ir::Module,
    root: mir::Root,
}

impl<'i> Generator<'i> {
    fn new(module: &'i ir::Module) -> Self {
        Self {
            module,
            root: mir::Root::new(),
        }
    }

    fn generate(mut self) -> mir::Root {
        self.add_globals();

        // Program entry: run main, then the exit syscall.
        self.root.add_instr(instr::jal(mir::Label::from("_main")));
        self.root.add_instr(instr::li(mir::Reg::V0, 10));
        self.root.add_instr(instr::syscall());
        self.root.add_blank();

        for &function in self.module.functions() {
            if self.module.is_builtin(function) {
                continue;
            }
            FunctionGenerator::new(self.module, &mut self.root, function).generate();
        }
        self.root
    }

    fn add_globals(&mut self) {
        for &global in self.module.globals() {
            let label = mir::Label::from(format!("_{}", self.module.name(global)));
            let data = match self.module.operand(global, 0) {
                Some(init) => {
                    let mut directives = Vec::new();
                    self.flatten_constant(init, &mut directives);
                    match Vec1::try_from_vec(directives) {
                        Ok(directives) => mir::GlobalData::with_directives(label, directives),
                        // A zero-length aggregate still needs its label.
                        Err(_) => mir::GlobalData::new(label, mir::DataDirective::Space(0)),
                    }
                }
                None => {
                    let pointee = self.module.ty(global).pointee().unwrap();
                    mir::GlobalData::new(label, mir::DataDirective::Space(size_of(pointee) as u32))
                }
            };
            self.root.add_data(data);
        }
    }

    /// One directive per scalar leaf, in row-major order.
    fn flatten_constant(&self, constant: ir::ValueId, out: &mut Vec<mir::DataDirective>) {
        match self.module.value(constant).kind() {
            ir::ValueKind::ConstInt(value) => {
                if self.module.ty(constant).is_i8() {
                    out.push(mir::DataDirective::Byte(*value));
                } else {
                    out.push(mir::DataDirective::Word(*value));
                }
            }
            ir::ValueKind::ConstArray => {
                for element in self.module.value(constant).operands() {
                    self.flatten_constant(element.expect("constant array hole"), out);
                }
            }
            _ => panic!("global initializer is not a constant"),
        }
    }
}

pub(crate) fn size_of(ty: &ir::Type) -> i32 {
    match ty {
        ir::Type::I8 => 1,
        ir::Type::Array(len, element) => *len as i32 * size_of(element),
        _ => 4,
    }
}
