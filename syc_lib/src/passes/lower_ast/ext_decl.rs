//! Declaration lowering: globals, locals, const and static variables, and
//! array initializers.

use super::IrGen;
use crate::ast;
use crate::symbol::{SymbolRef, SymbolTables};
use llvm_ir::{Type, ValueId};
use vec1::Vec1;

impl IrGen<'_, '_> {
    pub(super) fn gen_decl(&mut self, decl: &ast::Decl) {
        for def in &decl.defs {
            self.gen_def(decl, def);
        }
    }

    fn gen_def(&mut self, decl: &ast::Decl, def: &ast::VarDef) {
        let Some(index) = self.tables.scope(self.scope).find_local(&def.name) else {
            // Redefinitions leave only the first symbol behind; nothing to do
            // for the duplicate definition.
            return;
        };
        let sym = SymbolRef {
            scope: self.scope,
            index,
        };
        if self.tables.symbol(sym).value.is_some() {
            return;
        }

        let dims: Vec<i32> = def.dims.iter().map(|d| self.eval_const(d).max(0)).collect();
        self.tables.symbol_mut(sym).dims = dims.clone();

        let mut ty = Type::I32;
        for &dim in dims.iter().rev() {
            ty = Type::array_of(dim as usize, ty);
        }
        let total: usize = dims.iter().map(|&d| d as usize).product();
        let strides = row_major_strides(&dims);

        let is_global = self.scope == SymbolTables::GLOBAL;
        let lifted = is_global || decl.is_static;

        if dims.is_empty() {
            self.gen_scalar_def(decl, def, sym, lifted, is_global);
        } else if lifted {
            self.gen_lifted_array_def(decl, def, sym, ty, total);
        } else {
            self.gen_local_array_def(decl, def, sym, ty, total, &strides);
        }
    }

    fn gen_scalar_def(
        &mut self,
        decl: &ast::Decl,
        def: &ast::VarDef,
        sym: SymbolRef,
        lifted: bool,
        is_global: bool,
    ) {
        let init_expr = match &def.init {
            Some(ast::InitVal::Expr(expr)) => Some(expr),
            Some(ast::InitVal::List(_)) | None => None,
        };

        if decl.is_const || lifted {
            let value = init_expr.map(|e| self.eval_const(e)).unwrap_or(0);
            if init_expr.is_some() {
                self.tables.symbol_mut(sym).const_val = Some(value);
            }
            if lifted {
                let name = if is_global {
                    def.name.clone()
                } else {
                    let func = self.current_function_name.clone();
                    self.fresh_name(format!("{func}.{}", def.name))
                };
                let init = self.builder.module_mut().const_int(value);
                let global = self.builder.module_mut().add_global(
                    name,
                    Type::I32,
                    Some(init),
                    decl.is_const,
                );
                self.tables.symbol_mut(sym).value = Some(global);
            } else {
                // Local const scalar: a slot holding the folded value.
                let name = self.fresh_name(format!("{}_addr", def.name));
                let slot = self.builder.alloca(Type::I32, name);
                let init = self.builder.module_mut().const_int(value);
                self.builder.store(init, slot);
                self.tables.symbol_mut(sym).value = Some(slot);
            }
            return;
        }

        let name = self.fresh_name(format!("{}_addr", def.name));
        let slot = self.builder.alloca(Type::I32, name);
        self.tables.symbol_mut(sym).value = Some(slot);
        if let Some(expr) = init_expr {
            let value = self.gen_expr(expr);
            self.builder.store(value, slot);
        }
    }

    /// Globals and local statics: the definition becomes a module global with
    /// a fully folded initializer.
    fn gen_lifted_array_def(
        &mut self,
        decl: &ast::Decl,
        def: &ast::VarDef,
        sym: SymbolRef,
        ty: Type,
        total: usize,
    ) {
        let is_global = self.scope == SymbolTables::GLOBAL;
        let name = if is_global {
            def.name.clone()
        } else {
            let func = self.current_function_name.clone();
            self.fresh_name(format!("{func}.{}", def.name))
        };

        let init = match &def.init {
            Some(init) => {
                let mut values: Vec<i32> = flatten_init(init)
                    .into_iter()
                    .map(|e| self.eval_const(e))
                    .collect();
                values.resize(total, 0);
                self.tables.symbol_mut(sym).array_values = values.clone();
                let mut pos = 0;
                Some(self.make_const_tree(&ty, &values, &mut pos))
            }
            None => None,
        };
        let global = self
            .builder
            .module_mut()
            .add_global(name, ty, init, decl.is_const);
        self.tables.symbol_mut(sym).value = Some(global);
    }

    fn gen_local_array_def(
        &mut self,
        decl: &ast::Decl,
        def: &ast::VarDef,
        sym: SymbolRef,
        ty: Type,
        total: usize,
        strides: &[i32],
    ) {
        let name = self.fresh_name(format!("{}_addr", def.name));
        let slot = self.builder.alloca(ty, name);
        self.tables.symbol_mut(sym).value = Some(slot);

        let Some(init) = &def.init else { return };
        let exprs = flatten_init(init);

        if decl.is_const {
            let mut values: Vec<i32> = exprs.iter().map(|e| self.eval_const(e)).collect();
            values.resize(total, 0);
            self.tables.symbol_mut(sym).array_values = values.clone();
            for (i, &value) in values.iter().enumerate() {
                let element = self.builder.module_mut().const_int(value);
                self.store_array_element(slot, strides, i, element);
            }
        } else {
            for i in 0..total {
                let value = match exprs.get(i) {
                    Some(expr) => self.gen_expr(expr),
                    None => self.builder.module_mut().const_int(0),
                };
                self.store_array_element(slot, strides, i, value);
            }
        }
    }

    /// Addresses element `flat` of the array slot in row-major order and
    /// stores `value` into it.
    fn store_array_element(
        &mut self,
        slot: ValueId,
        strides: &[i32],
        flat: usize,
        value: ValueId,
    ) {
        let mut indices = Vec::with_capacity(strides.len() + 1);
        let zero = self.builder.module_mut().const_int(0);
        indices.push(zero);
        let mut rest = flat as i32;
        for &stride in strides {
            let idx = self.builder.module_mut().const_int(rest / stride);
            indices.push(idx);
            rest %= stride;
        }
        let name = self.fresh_name("gep");
        let ptr = self.builder.gep(
            slot,
            Vec1::try_from_vec(indices).expect("array element address needs indices"),
            name,
        );
        self.builder.store(value, ptr);
    }

    fn make_const_tree(&mut self, ty: &Type, values: &[i32], pos: &mut usize) -> ValueId {
        match ty {
            Type::Array(len, element) => {
                let elements: Vec<ValueId> = (0..*len)
                    .map(|_| self.make_const_tree(element, values, pos))
                    .collect();
                self.builder.module_mut().const_array(ty.clone(), elements)
            }
            _ => {
                let value = values.get(*pos).copied().unwrap_or(0);
                *pos += 1;
                self.builder.module_mut().const_int(value)
            }
        }
    }
}

/// Flattens a (possibly nested) initializer list into its leaf expressions
/// in source order.
fn flatten_init(init: &ast::InitVal) -> Vec<&ast::Expr> {
    let mut out = Vec::new();
    fn walk<'a>(init: &'a ast::InitVal, out: &mut Vec<&'a ast::Expr>) {
        match init {
            ast::InitVal::Expr(expr) => out.push(expr),
            ast::InitVal::List(items) => {
                for item in items {
                    walk(item, out);
                }
            }
        }
    }
    walk(init, &mut out);
    out
}

/// Row-major strides: for dims `[2, 3]` the strides are `[3, 1]`.
fn row_major_strides(dims: &[i32]) -> Vec<i32> {
    let mut strides = vec![1; dims.len()];
    for k in (0..dims.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * dims[k + 1].max(1);
    }
    strides
}
