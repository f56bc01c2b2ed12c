//! Expression, lvalue, and short-circuit condition lowering.

use super::IrGen;
use crate::ast;
use llvm_ir::{BinaryOp, IcmpCond, Type, ValueId};
use vec1::Vec1;

impl IrGen<'_, '_> {
    pub(super) fn gen_expr(&mut self, expr: &ast::Expr) -> ValueId {
        match expr {
            ast::Expr::Number(value) => self.builder.module_mut().const_int(*value),
            ast::Expr::LVal(lval) => self.gen_lval(lval, false),
            ast::Expr::Call { name, args, .. } => {
                let func = self.symbol_value(name);
                let args: Vec<ValueId> = args.iter().map(|arg| self.gen_expr(arg)).collect();
                let call_name = self.fresh_name("call");
                self.builder.call(func, args, call_name)
            }
            ast::Expr::Unary(op, inner) => match op {
                ast::UnaryOp::Plus => self.gen_expr(inner),
                ast::UnaryOp::Neg => {
                    let value = self.gen_expr(inner);
                    let zero = self.builder.module_mut().const_int(0);
                    let name = self.fresh_name("neg");
                    self.builder.binary(BinaryOp::Sub, zero, value, name)
                }
                ast::UnaryOp::Not => {
                    let value = self.gen_expr(inner);
                    let zero = self.builder.module_mut().const_int(0);
                    let name = self.fresh_name("not");
                    let cmp = self.builder.icmp(IcmpCond::Eq, value, zero, name);
                    let zext_name = self.fresh_name("zext");
                    self.builder.zext(cmp, Type::I32, zext_name)
                }
            },
            ast::Expr::Binary(op, lhs, rhs) => {
                let l = self.gen_expr(lhs);
                let r = self.gen_expr(rhs);
                match op {
                    ast::BinOp::Add => self.gen_binary(BinaryOp::Add, l, r),
                    ast::BinOp::Sub => self.gen_binary(BinaryOp::Sub, l, r),
                    ast::BinOp::Mul => self.gen_binary(BinaryOp::Mul, l, r),
                    ast::BinOp::Div => self.gen_binary(BinaryOp::Sdiv, l, r),
                    ast::BinOp::Mod => self.gen_binary(BinaryOp::Srem, l, r),
                    ast::BinOp::Lt => self.gen_icmp(IcmpCond::Slt, l, r, "tmp_rel"),
                    ast::BinOp::Gt => self.gen_icmp(IcmpCond::Sgt, l, r, "tmp_rel"),
                    ast::BinOp::Le => self.gen_icmp(IcmpCond::Sle, l, r, "tmp_rel"),
                    ast::BinOp::Ge => self.gen_icmp(IcmpCond::Sge, l, r, "tmp_rel"),
                    ast::BinOp::Eq => self.gen_icmp(IcmpCond::Eq, l, r, "tmp_eq"),
                    ast::BinOp::Ne => self.gen_icmp(IcmpCond::Ne, l, r, "tmp_eq"),
                }
            }
        }
    }

    fn gen_binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let name = self.fresh_name("tmp");
        self.builder.binary(op, lhs, rhs, name)
    }

    /// Comparison chains can mix `i1` and `i32` (e.g. `a < b < c`); widen the
    /// narrow side first.
    fn gen_icmp(&mut self, cond: IcmpCond, mut lhs: ValueId, mut rhs: ValueId, prefix: &str) -> ValueId {
        let lhs_i1 = self.builder.module().ty(lhs).is_i1();
        let rhs_i1 = self.builder.module().ty(rhs).is_i1();
        if lhs_i1 && !rhs_i1 {
            let name = self.fresh_name("zext");
            lhs = self.builder.zext(lhs, Type::I32, name);
        } else if rhs_i1 && !lhs_i1 {
            let name = self.fresh_name("zext");
            rhs = self.builder.zext(rhs, Type::I32, name);
        }
        let name = self.fresh_name(prefix);
        self.builder.icmp(cond, lhs, rhs, name)
    }

    /// Resolves an lvalue to a pointer (write) or its loaded value (read),
    /// decaying unsubscripted arrays to a pointer to their first element.
    pub(super) fn gen_lval(&mut self, lval: &ast::LVal, is_write: bool) -> ValueId {
        let mut ptr = self.symbol_value(&lval.name);

        if !lval.indices.is_empty() {
            let mut indices: Vec<ValueId> =
                lval.indices.iter().map(|index| self.gen_expr(index)).collect();
            let pointee = self
                .builder
                .module()
                .ty(ptr)
                .pointee()
                .expect("lvalue base is not a pointer")
                .clone();
            if pointee.is_array() {
                // Step through the pointer before indexing the array.
                let zero = self.builder.module_mut().const_int(0);
                indices.insert(0, zero);
            } else if pointee.is_pointer() {
                // An array parameter: the slot holds the base pointer.
                let name = self.fresh_name("ptr_load");
                ptr = self.builder.load(ptr, name);
            }
            let name = self.fresh_name("gep");
            ptr = self.builder.gep(
                ptr,
                Vec1::try_from_vec(indices).expect("subscripted lvalue has indices"),
                name,
            );
        } else if self
            .builder
            .module()
            .ty(ptr)
            .pointee()
            .is_some_and(Type::is_array)
        {
            return self.decay_to_first_element(ptr);
        }

        if is_write {
            return ptr;
        }

        let pointee = self
            .builder
            .module()
            .ty(ptr)
            .pointee()
            .expect("lvalue read from a non-pointer")
            .clone();
        if pointee.is_array() {
            // Partially indexed array: the value is a pointer to its first
            // element.
            self.decay_to_first_element(ptr)
        } else {
            let name = self.fresh_name(format!("load_{}", lval.name));
            self.builder.load(ptr, name)
        }
    }

    fn decay_to_first_element(&mut self, ptr: ValueId) -> ValueId {
        let zero = self.builder.module_mut().const_int(0);
        let zero2 = self.builder.module_mut().const_int(0);
        let name = self.fresh_name("gep_decay");
        self.builder.gep(ptr, vec1::vec1![zero, zero2], name)
    }

    /// Short-circuit lowering: evaluate the condition with an inherited
    /// truth target and falsehood target.
    pub(super) fn gen_cond(&mut self, cond: &ast::Cond, on_true: ValueId, on_false: ValueId) {
        match cond {
            ast::Cond::LOr(lhs, rhs) => {
                let next = {
                    let name = self.fresh_name("or_next");
                    self.builder.create_block(name)
                };
                self.gen_cond(lhs, on_true, next);
                self.builder.set_block(next);
                self.gen_cond(rhs, on_true, on_false);
            }
            ast::Cond::LAnd(lhs, rhs) => {
                let next = {
                    let name = self.fresh_name("and_next");
                    self.builder.create_block(name)
                };
                self.gen_cond(lhs, next, on_false);
                self.builder.set_block(next);
                self.gen_cond(rhs, on_true, on_false);
            }
            ast::Cond::Expr(expr) => {
                let mut value = self.gen_expr(expr);
                if self.builder.module().ty(value).is_i32() {
                    let zero = self.builder.module_mut().const_int(0);
                    let name = self.fresh_name("cond");
                    value = self.builder.icmp(IcmpCond::Ne, value, zero, name);
                }
                self.builder.branch(value, on_true, on_false);
            }
        }
    }
}
