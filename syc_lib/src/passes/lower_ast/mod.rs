//! AST-directed IR generation.
//!
//! The generator replays the scope map the semantic analyzer recorded, so
//! every name resolves to the same symbol the analysis saw. A missing symbol
//! or a shape mismatch here is a bug in an earlier phase and panics.

mod expr;
mod ext_decl;
mod stmt;

use crate::ast;
use crate::symbol::{ScopeId, SymbolRef, SymbolTables};
use llvm_ir::{Builder, Module, Type, ValueId};

pub fn build_ir_from_ast(unit: &ast::CompUnit, tables: &mut SymbolTables) -> Module {
    let mut module = Module::new();
    {
        let mut gen = IrGen {
            builder: Builder::new(&mut module),
            tables,
            scope: SymbolTables::GLOBAL,
            loop_stack: Vec::new(),
            tmp_counter: 0,
            current_function_name: String::new(),
        };
        gen.declare_library_functions();
        gen.run(unit);
    }
    module
}

struct IrGen<'m, 't> {
    builder: Builder<'m>,
    tables: &'t mut SymbolTables,
    scope: ScopeId,
    /// Innermost-last `(continue target, break target)` pairs.
    loop_stack: Vec<(ValueId, ValueId)>,
    tmp_counter: usize,
    current_function_name: String,
}

impl IrGen<'_, '_> {
    fn fresh_name(&mut self, prefix: impl AsRef<str>) -> String {
        let name = format!("{}_{}", prefix.as_ref(), self.tmp_counter);
        self.tmp_counter += 1;
        name
    }

    fn lookup(&self, name: &str) -> Option<SymbolRef> {
        self.tables.lookup(self.scope, name)
    }

    fn symbol_value(&self, name: &str) -> ValueId {
        let sym = self
            .lookup(name)
            .unwrap_or_else(|| panic!("symbol `{name}` not found after semantic analysis"));
        self.tables
            .symbol(sym)
            .value
            .unwrap_or_else(|| panic!("symbol `{name}` has no IR value yet"))
    }

    /// The library functions the language exposes, declared up front and
    /// attached to their root-scope symbols.
    fn declare_library_functions(&mut self) {
        let i32p = Type::pointer_to(Type::I32);
        let i8p = Type::pointer_to(Type::I8);
        let decls: Vec<(&str, Type, Vec<Type>)> = vec![
            ("getint", Type::I32, vec![]),
            ("getch", Type::I32, vec![]),
            ("getarray", Type::I32, vec![i32p.clone()]),
            ("putint", Type::Void, vec![Type::I32]),
            ("putch", Type::Void, vec![Type::I32]),
            ("putarray", Type::Void, vec![Type::I32, i32p]),
            ("putstr", Type::Void, vec![i8p]),
            ("starttime", Type::Void, vec![]),
            ("stoptime", Type::Void, vec![]),
        ];
        for (name, ret, params) in decls {
            let func = self.builder.module_mut().add_function(name, ret, params, true);
            let sym = self
                .tables
                .lookup(SymbolTables::GLOBAL, name)
                .expect("library function missing from the root scope");
            self.tables.symbol_mut(sym).value = Some(func);
        }
    }

    fn run(&mut self, unit: &ast::CompUnit) {
        for item in &unit.items {
            match item {
                ast::Item::Decl(decl) => self.gen_decl(decl),
                ast::Item::Func(func) => self.gen_func(func),
            }
        }
    }

    fn gen_func(&mut self, func: &ast::FuncDef) {
        self.tmp_counter = 0;
        self.current_function_name = func.name.clone();

        let param_tys: Vec<Type> = func
            .params
            .iter()
            .map(|p| {
                if p.is_array {
                    Type::pointer_to(Type::I32)
                } else {
                    Type::I32
                }
            })
            .collect();
        let ret = if func.ret_void { Type::Void } else { Type::I32 };
        let function =
            self.builder
                .module_mut()
                .add_function(func.name.clone(), ret, param_tys, false);
        if let Some(sym) = self.tables.lookup(SymbolTables::GLOBAL, &func.name) {
            self.tables.symbol_mut(sym).value = Some(function);
        }

        self.builder.set_function(function);
        let entry = self.builder.create_block("entry");
        self.builder.set_block(entry);

        let outer = self.scope;
        self.scope = self.tables.scope_of_block(func.body.id);

        // Parameters spill through entry-block slots so they behave like any
        // other local.
        let params = self.builder.module().params(function).to_vec();
        for (param, value) in func.params.iter().zip(params) {
            let ty = self.builder.module().ty(value).clone();
            let name = self.fresh_name(format!("{}_addr", param.name));
            let slot = self.builder.alloca(ty, name);
            self.builder.store(value, slot);
            let sym = self
                .tables
                .scope(self.scope)
                .find_local(&param.name)
                .map(|index| SymbolRef {
                    scope: self.scope,
                    index,
                });
            if let Some(sym) = sym {
                self.tables.symbol_mut(sym).value = Some(slot);
            }
        }

        for item in &func.body.items {
            self.gen_block_item(item);
        }

        if !self.last_instr_is_ret() {
            if func.ret_void {
                self.builder.ret(None);
            } else {
                let zero = self.builder.module_mut().const_int(0);
                self.builder.ret(Some(zero));
            }
        }

        self.scope = outer;
    }

    fn last_instr_is_ret(&self) -> bool {
        let block = self.builder.block();
        self.builder
            .module()
            .block_instructions(block)
            .last()
            .is_some_and(|&i| {
                matches!(
                    self.builder.module().value(i).instr_kind(),
                    Some(llvm_ir::InstrKind::Ret)
                )
            })
    }

    /// Pure compile-time evaluator. Any identifier that does not resolve to
    /// a known constant contributes 0, mirroring the contexts this is used
    /// in (dimension expressions and global initializers must be constant
    /// for the program to be meaningful).
    fn eval_const(&self, expr: &ast::Expr) -> i32 {
        match expr {
            ast::Expr::Number(value) => *value,
            ast::Expr::Unary(op, inner) => {
                let value = self.eval_const(inner);
                match op {
                    ast::UnaryOp::Plus => value,
                    ast::UnaryOp::Neg => value.wrapping_neg(),
                    ast::UnaryOp::Not => i32::from(value == 0),
                }
            }
            ast::Expr::Binary(op, lhs, rhs) => {
                let l = self.eval_const(lhs);
                let r = self.eval_const(rhs);
                match op {
                    ast::BinOp::Add => l.wrapping_add(r),
                    ast::BinOp::Sub => l.wrapping_sub(r),
                    ast::BinOp::Mul => l.wrapping_mul(r),
                    ast::BinOp::Div => {
                        if r == 0 {
                            0
                        } else {
                            l.wrapping_div(r)
                        }
                    }
                    ast::BinOp::Mod => {
                        if r == 0 {
                            0
                        } else {
                            l.wrapping_rem(r)
                        }
                    }
                    ast::BinOp::Lt => i32::from(l < r),
                    ast::BinOp::Gt => i32::from(l > r),
                    ast::BinOp::Le => i32::from(l <= r),
                    ast::BinOp::Ge => i32::from(l >= r),
                    ast::BinOp::Eq => i32::from(l == r),
                    ast::BinOp::Ne => i32::from(l != r),
                }
            }
            ast::Expr::LVal(lval) => {
                let Some(sym) = self.lookup(&lval.name) else { return 0 };
                let symbol = self.tables.symbol(sym);
                if lval.indices.is_empty() {
                    if symbol.is_const {
                        return symbol.const_val.unwrap_or(0);
                    }
                    return 0;
                }
                // Constant array element read with in-bounds folded indices.
                if lval.indices.len() != symbol.dims.len() {
                    return 0;
                }
                let mut flat: i64 = 0;
                let mut stride: i64 = 1;
                for (index, dim) in lval
                    .indices
                    .iter()
                    .zip(&symbol.dims)
                    .rev()
                {
                    let idx = self.eval_const(index) as i64;
                    if idx < 0 || idx >= *dim as i64 {
                        return 0;
                    }
                    flat += idx * stride;
                    stride *= *dim as i64;
                }
                symbol
                    .array_values
                    .get(flat as usize)
                    .copied()
                    .unwrap_or(0)
            }
            ast::Expr::Call { .. } => 0,
        }
    }
}
