//! Statement lowering: control flow, loops, printf expansion.

use super::IrGen;
use crate::ast;

impl IrGen<'_, '_> {
    pub(super) fn gen_block_item(&mut self, item: &ast::BlockItem) {
        match item {
            ast::BlockItem::Decl(decl) => self.gen_decl(decl),
            ast::BlockItem::Stmt(stmt) => self.gen_stmt(stmt),
        }
    }

    pub(super) fn gen_stmt(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::Assign { lval, value } => {
                let ptr = self.gen_lval(lval, true);
                let value = self.gen_expr(value);
                self.builder.store(value, ptr);
            }
            ast::Stmt::Expr(expr) => {
                if let Some(expr) = expr {
                    self.gen_expr(expr);
                }
            }
            ast::Stmt::Block(block) => {
                let outer = self.scope;
                self.scope = self.tables.scope_of_block(block.id);
                for item in &block.items {
                    self.gen_block_item(item);
                }
                self.scope = outer;
            }
            ast::Stmt::If { cond, then, els } => self.gen_if(cond, then, els.as_deref()),
            ast::Stmt::While { cond, body } => self.gen_while(cond, body),
            ast::Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.gen_for(init.as_ref(), cond.as_ref(), step.as_ref(), body),
            ast::Stmt::Break { .. } => {
                if let Some(&(_, break_target)) = self.loop_stack.last() {
                    self.builder.jump(break_target);
                }
            }
            ast::Stmt::Continue { .. } => {
                if let Some(&(continue_target, _)) = self.loop_stack.last() {
                    self.builder.jump(continue_target);
                }
            }
            ast::Stmt::Return { value, .. } => {
                let value = value.as_ref().map(|expr| self.gen_expr(expr));
                self.builder.ret(value);
            }
            ast::Stmt::Printf { format, args, .. } => self.gen_printf(format, args),
        }
    }

    fn gen_if(&mut self, cond: &ast::Cond, then: &ast::Stmt, els: Option<&ast::Stmt>) {
        let true_block = {
            let name = self.fresh_name("if_true");
            self.builder.create_block(name)
        };
        let false_block = {
            let name = self.fresh_name("if_false");
            self.builder.create_block(name)
        };
        let next_block = {
            let name = self.fresh_name("if_next");
            self.builder.create_block(name)
        };

        self.gen_cond(cond, true_block, false_block);

        self.builder.set_block(true_block);
        self.gen_stmt(then);
        if !self.last_instr_is_ret() {
            self.builder.jump(next_block);
        }

        self.builder.set_block(false_block);
        if let Some(els) = els {
            self.gen_stmt(els);
        }
        if !self.last_instr_is_ret() {
            self.builder.jump(next_block);
        }

        self.builder.set_block(next_block);
    }

    fn gen_while(&mut self, cond: &ast::Cond, body: &ast::Stmt) {
        let cond_block = {
            let name = self.fresh_name("while_cond");
            self.builder.create_block(name)
        };
        let body_block = {
            let name = self.fresh_name("while_body");
            self.builder.create_block(name)
        };
        let next_block = {
            let name = self.fresh_name("while_next");
            self.builder.create_block(name)
        };

        self.builder.jump(cond_block);
        self.builder.set_block(cond_block);
        self.gen_cond(cond, body_block, next_block);

        self.loop_stack.push((cond_block, next_block));
        self.builder.set_block(body_block);
        self.gen_stmt(body);
        if !self.last_instr_is_ret() {
            self.builder.jump(cond_block);
        }
        self.loop_stack.pop();

        self.builder.set_block(next_block);
    }

    fn gen_for(
        &mut self,
        init: Option<&ast::ForStmt>,
        cond: Option<&ast::Cond>,
        step: Option<&ast::ForStmt>,
        body: &ast::Stmt,
    ) {
        if let Some(init) = init {
            self.gen_for_clause(init);
        }

        let cond_block = {
            let name = self.fresh_name("for_cond");
            self.builder.create_block(name)
        };
        let body_block = {
            let name = self.fresh_name("for_body");
            self.builder.create_block(name)
        };
        let step_block = {
            let name = self.fresh_name("for_step");
            self.builder.create_block(name)
        };
        let next_block = {
            let name = self.fresh_name("for_next");
            self.builder.create_block(name)
        };

        self.builder.jump(cond_block);
        self.builder.set_block(cond_block);
        match cond {
            Some(cond) => self.gen_cond(cond, body_block, next_block),
            None => self.builder.jump(body_block),
        }

        self.loop_stack.push((step_block, next_block));
        self.builder.set_block(body_block);
        self.gen_stmt(body);
        if !self.last_instr_is_ret() {
            self.builder.jump(step_block);
        }
        self.loop_stack.pop();

        self.builder.set_block(step_block);
        if let Some(step) = step {
            self.gen_for_clause(step);
        }
        self.builder.jump(cond_block);

        self.builder.set_block(next_block);
    }

    fn gen_for_clause(&mut self, clause: &ast::ForStmt) {
        for (lval, value) in &clause.assigns {
            let ptr = self.gen_lval(lval, true);
            let value = self.gen_expr(value);
            self.builder.store(value, ptr);
        }
    }

    /// `printf` is expanded at generation time into `putch`/`putint` calls;
    /// no format string ever reaches the IR.
    fn gen_printf(&mut self, format: &str, args: &[ast::Expr]) {
        let args: Vec<_> = args.iter().map(|arg| self.gen_expr(arg)).collect();
        let mut next_arg = 0;

        let bytes = format.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c == b'%' && i + 1 < bytes.len() {
                match bytes[i + 1] {
                    b'd' => {
                        if let Some(&arg) = args.get(next_arg) {
                            next_arg += 1;
                            self.call_library("putint", vec![arg]);
                        }
                        i += 2;
                    }
                    b'c' => {
                        if let Some(&arg) = args.get(next_arg) {
                            next_arg += 1;
                            self.call_library("putch", vec![arg]);
                        }
                        i += 2;
                    }
                    b'%' => {
                        self.put_char(b'%' as i32);
                        i += 2;
                    }
                    _ => {
                        // Stray `%`: emit it literally and continue with the
                        // following character.
                        self.put_char(b'%' as i32);
                        i += 1;
                    }
                }
            } else if c == b'\\' && i + 1 < bytes.len() {
                let code = match bytes[i + 1] {
                    b'n' => 10,
                    b't' => 9,
                    b'"' => 34,
                    b'\\' => 92,
                    b'0' => 0,
                    other => other as i32,
                };
                self.put_char(code);
                i += 2;
            } else {
                self.put_char(c as i32);
                i += 1;
            }
        }
    }

    fn put_char(&mut self, code: i32) {
        let value = self.builder.module_mut().const_int(code);
        self.call_library("putch", vec![value]);
    }

    fn call_library(&mut self, name: &str, args: Vec<llvm_ir::ValueId>) {
        let func = self.symbol_value(name);
        let call_name = self.fresh_name("call");
        self.builder.call(func, args, call_name);
    }
}
