//! Lowers the CST into the typed AST, assigning every block its `BlockId`.

use crate::ast::{self, BlockId};
use crate::cst::{CstNode, Node, NonTerm};
use crate::token::{Token, TokenKind};

pub fn lower(cst: &Node) -> ast::CompUnit {
    Lowerer { next_block: 0 }.lower_comp_unit(cst)
}

fn child_nodes<'a>(node: &'a Node, kind: NonTerm) -> impl Iterator<Item = &'a Node> {
    node.children.iter().filter_map(move |child| match child {
        CstNode::Node(n) if n.kind == kind => Some(n),
        _ => None,
    })
}

fn child_node<'a>(node: &'a Node, kind: NonTerm) -> Option<&'a Node> {
    child_nodes(node, kind).next()
}

fn child_tokens(node: &Node) -> impl Iterator<Item = &Token> {
    node.children.iter().filter_map(|child| match child {
        CstNode::Token(token) => Some(token),
        _ => None,
    })
}

fn child_token(node: &Node, kind: TokenKind) -> Option<&Token> {
    child_tokens(node).find(|t| t.kind == kind)
}

fn parse_int(text: &str) -> i32 {
    // `2147483648` appears as the operand of unary minus; parse wide and
    // wrap.
    text.parse::<i64>().unwrap_or(0) as i32
}

struct Lowerer {
    next_block: usize,
}

impl Lowerer {
    fn fresh_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    fn lower_comp_unit(&mut self, cst: &Node) -> ast::CompUnit {
        let mut items = Vec::new();
        for child in &cst.children {
            let CstNode::Node(node) = child else { continue };
            match node.kind {
                NonTerm::Decl => {
                    if let Some(decl) = self.lower_decl_wrapper(node) {
                        items.push(ast::Item::Decl(decl));
                    }
                }
                NonTerm::FuncDef => items.push(ast::Item::Func(self.lower_func(node, false))),
                NonTerm::MainFuncDef => items.push(ast::Item::Func(self.lower_func(node, true))),
                _ => {}
            }
        }
        ast::CompUnit { items }
    }

    fn lower_decl_wrapper(&mut self, decl: &Node) -> Option<ast::Decl> {
        let inner = decl.children.iter().find_map(|child| match child {
            CstNode::Node(n) if matches!(n.kind, NonTerm::ConstDecl | NonTerm::VarDecl) => Some(n),
            _ => None,
        })?;
        Some(self.lower_decl(inner))
    }

    fn lower_decl(&mut self, node: &Node) -> ast::Decl {
        let is_const = node.kind == NonTerm::ConstDecl;
        let is_static = child_token(node, TokenKind::StaticKw).is_some();
        let def_kind = if is_const {
            NonTerm::ConstDef
        } else {
            NonTerm::VarDef
        };
        let defs = child_nodes(node, def_kind)
            .map(|def| self.lower_def(def))
            .collect();
        ast::Decl {
            is_const,
            is_static,
            defs,
        }
    }

    fn lower_def(&mut self, def: &Node) -> ast::VarDef {
        let (name, line) = match child_token(def, TokenKind::Ident) {
            Some(token) => (token.text.clone(), token.line),
            None => (String::new(), 0),
        };
        let dims = child_nodes(def, NonTerm::ConstExp)
            .map(|ce| self.lower_const_exp(ce))
            .collect();
        let init = def
            .children
            .iter()
            .find_map(|child| match child {
                CstNode::Node(n)
                    if matches!(n.kind, NonTerm::InitVal | NonTerm::ConstInitVal) =>
                {
                    Some(n)
                }
                _ => None,
            })
            .map(|iv| self.lower_init_val(iv));
        ast::VarDef {
            name,
            line,
            dims,
            init,
        }
    }

    fn lower_init_val(&mut self, node: &Node) -> ast::InitVal {
        if child_token(node, TokenKind::LBrace).is_some() {
            let items = node
                .children
                .iter()
                .filter_map(|child| match child {
                    CstNode::Node(n)
                        if matches!(n.kind, NonTerm::InitVal | NonTerm::ConstInitVal) =>
                    {
                        Some(self.lower_init_val(n))
                    }
                    _ => None,
                })
                .collect();
            ast::InitVal::List(items)
        } else if let Some(exp) = child_node(node, NonTerm::Exp) {
            ast::InitVal::Expr(self.lower_exp(exp))
        } else if let Some(ce) = child_node(node, NonTerm::ConstExp) {
            ast::InitVal::Expr(self.lower_const_exp(ce))
        } else {
            ast::InitVal::Expr(ast::Expr::Number(0))
        }
    }

    fn lower_func(&mut self, node: &Node, is_main: bool) -> ast::FuncDef {
        let ret_void = child_node(node, NonTerm::FuncType)
            .and_then(|ft| child_token(ft, TokenKind::VoidKw))
            .is_some();
        let (name, line) = if is_main {
            match child_token(node, TokenKind::MainKw) {
                Some(token) => ("main".to_owned(), token.line),
                None => ("main".to_owned(), 0),
            }
        } else {
            match child_token(node, TokenKind::Ident) {
                Some(token) => (token.text.clone(), token.line),
                None => (String::new(), 0),
            }
        };
        let params = child_node(node, NonTerm::FuncFParams)
            .map(|fps| {
                child_nodes(fps, NonTerm::FuncFParam)
                    .map(|fp| {
                        let (name, line) = match child_token(fp, TokenKind::Ident) {
                            Some(token) => (token.text.clone(), token.line),
                            None => (String::new(), 0),
                        };
                        ast::FuncParam {
                            name,
                            line,
                            is_array: child_token(fp, TokenKind::LBracket).is_some(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        let body = match child_node(node, NonTerm::Block) {
            Some(block) => self.lower_block(block),
            None => ast::Block {
                id: self.fresh_block_id(),
                items: Vec::new(),
                end_line: line,
            },
        };
        ast::FuncDef {
            ret_void: ret_void && !is_main,
            name,
            line,
            params,
            body,
            is_main,
        }
    }

    fn lower_block(&mut self, node: &Node) -> ast::Block {
        let id = self.fresh_block_id();
        let mut items = Vec::new();
        for item in child_nodes(node, NonTerm::BlockItem) {
            for child in &item.children {
                let CstNode::Node(n) = child else { continue };
                match n.kind {
                    NonTerm::Decl => {
                        if let Some(decl) = self.lower_decl_wrapper(n) {
                            items.push(ast::BlockItem::Decl(decl));
                        }
                    }
                    NonTerm::Stmt => items.push(ast::BlockItem::Stmt(self.lower_stmt(n))),
                    _ => {}
                }
            }
        }
        let end_line = child_tokens(node)
            .filter(|t| t.kind == TokenKind::RBrace)
            .last()
            .map(|t| t.line)
            .or_else(|| node.last_token_line())
            .unwrap_or(0);
        ast::Block {
            id,
            items,
            end_line,
        }
    }

    fn lower_stmt(&mut self, node: &Node) -> ast::Stmt {
        let first_token_kind = node.children.first().and_then(|child| match child {
            CstNode::Token(token) => Some(token.kind),
            _ => None,
        });
        if let Some(kind) = first_token_kind {
            match kind {
                TokenKind::IfKw => {
                    let cond = child_node(node, NonTerm::Cond)
                        .map(|c| self.lower_cond(c))
                        .unwrap_or(ast::Cond::Expr(ast::Expr::Number(0)));
                    let mut stmts = child_nodes(node, NonTerm::Stmt);
                    let then = stmts
                        .next()
                        .map(|s| self.lower_stmt(s))
                        .unwrap_or(ast::Stmt::Expr(None));
                    let els = stmts.next().map(|s| Box::new(self.lower_stmt(s)));
                    return ast::Stmt::If {
                        cond,
                        then: Box::new(then),
                        els,
                    };
                }
                TokenKind::WhileKw => {
                    let cond = child_node(node, NonTerm::Cond)
                        .map(|c| self.lower_cond(c))
                        .unwrap_or(ast::Cond::Expr(ast::Expr::Number(0)));
                    let body = child_node(node, NonTerm::Stmt)
                        .map(|s| self.lower_stmt(s))
                        .unwrap_or(ast::Stmt::Expr(None));
                    return ast::Stmt::While {
                        cond,
                        body: Box::new(body),
                    };
                }
                TokenKind::ForKw => return self.lower_for(node),
                TokenKind::BreakKw => {
                    return ast::Stmt::Break {
                        line: child_token(node, TokenKind::BreakKw)
                            .map(|t| t.line)
                            .unwrap_or(0),
                    };
                }
                TokenKind::ContinueKw => {
                    return ast::Stmt::Continue {
                        line: child_token(node, TokenKind::ContinueKw)
                            .map(|t| t.line)
                            .unwrap_or(0),
                    };
                }
                TokenKind::ReturnKw => {
                    let line = child_token(node, TokenKind::ReturnKw)
                        .map(|t| t.line)
                        .unwrap_or(0);
                    let value = child_node(node, NonTerm::Exp).map(|e| self.lower_exp(e));
                    return ast::Stmt::Return { value, line };
                }
                TokenKind::PrintfKw => {
                    let line = child_token(node, TokenKind::PrintfKw)
                        .map(|t| t.line)
                        .unwrap_or(0);
                    let format = child_token(node, TokenKind::StrConst)
                        .map(|t| strip_quotes(&t.text))
                        .unwrap_or_default();
                    let args = child_nodes(node, NonTerm::Exp)
                        .map(|e| self.lower_exp(e))
                        .collect();
                    return ast::Stmt::Printf { format, args, line };
                }
                TokenKind::Semicolon => return ast::Stmt::Expr(None),
                _ => {}
            }
        }
        if let Some(lval) = child_node(node, NonTerm::LVal) {
            // `LVal '=' Exp ';'`
            let value = child_node(node, NonTerm::Exp)
                .map(|e| self.lower_exp(e))
                .unwrap_or(ast::Expr::Number(0));
            return ast::Stmt::Assign {
                lval: self.lower_lval(lval),
                value,
            };
        }
        if let Some(block) = child_node(node, NonTerm::Block) {
            return ast::Stmt::Block(self.lower_block(block));
        }
        if let Some(exp) = child_node(node, NonTerm::Exp) {
            return ast::Stmt::Expr(Some(self.lower_exp(exp)));
        }
        ast::Stmt::Expr(None)
    }

    fn lower_for(&mut self, node: &Node) -> ast::Stmt {
        // `for '(' [ForStmt] ';' [Cond] ';' [ForStmt] ')' Stmt`: the clause
        // before the first `;` is the init, the one after the second is the
        // step.
        let mut init = None;
        let mut step = None;
        let mut semicolons = 0;
        for child in &node.children {
            match child {
                CstNode::Token(token) if token.kind == TokenKind::Semicolon => semicolons += 1,
                CstNode::Node(n) if n.kind == NonTerm::ForStmt => {
                    let clause = self.lower_for_clause(n);
                    if semicolons == 0 {
                        init = Some(clause);
                    } else {
                        step = Some(clause);
                    }
                }
                _ => {}
            }
        }
        let cond = child_node(node, NonTerm::Cond).map(|c| self.lower_cond(c));
        let body = child_node(node, NonTerm::Stmt)
            .map(|s| self.lower_stmt(s))
            .unwrap_or(ast::Stmt::Expr(None));
        ast::Stmt::For {
            init,
            cond,
            step,
            body: Box::new(body),
        }
    }

    fn lower_for_clause(&mut self, node: &Node) -> ast::ForStmt {
        let mut assigns = Vec::new();
        let mut pending: Option<ast::LVal> = None;
        for child in &node.children {
            let CstNode::Node(n) = child else { continue };
            match n.kind {
                NonTerm::LVal => pending = Some(self.lower_lval(n)),
                NonTerm::Exp => {
                    if let Some(lval) = pending.take() {
                        assigns.push((lval, self.lower_exp(n)));
                    }
                }
                _ => {}
            }
        }
        ast::ForStmt { assigns }
    }

    fn lower_lval(&mut self, node: &Node) -> ast::LVal {
        let (name, line) = match child_token(node, TokenKind::Ident) {
            Some(token) => (token.text.clone(), token.line),
            None => (String::new(), 0),
        };
        let indices = child_nodes(node, NonTerm::Exp)
            .map(|e| self.lower_exp(e))
            .collect();
        ast::LVal {
            name,
            line,
            indices,
        }
    }

    fn lower_cond(&mut self, node: &Node) -> ast::Cond {
        match child_node(node, NonTerm::LOrExp) {
            Some(lor) => self.lower_l_or(lor),
            None => ast::Cond::Expr(ast::Expr::Number(0)),
        }
    }

    fn lower_l_or(&mut self, node: &Node) -> ast::Cond {
        if let Some(inner_or) = child_node(node, NonTerm::LOrExp) {
            let lhs = self.lower_l_or(inner_or);
            let rhs = child_node(node, NonTerm::LAndExp)
                .map(|land| self.lower_l_and(land))
                .unwrap_or(ast::Cond::Expr(ast::Expr::Number(0)));
            ast::Cond::LOr(Box::new(lhs), Box::new(rhs))
        } else if let Some(land) = child_node(node, NonTerm::LAndExp) {
            self.lower_l_and(land)
        } else {
            ast::Cond::Expr(ast::Expr::Number(0))
        }
    }

    fn lower_l_and(&mut self, node: &Node) -> ast::Cond {
        if let Some(inner_and) = child_node(node, NonTerm::LAndExp) {
            let lhs = self.lower_l_and(inner_and);
            let rhs = child_node(node, NonTerm::EqExp)
                .map(|eq| ast::Cond::Expr(self.lower_eq(eq)))
                .unwrap_or(ast::Cond::Expr(ast::Expr::Number(0)));
            ast::Cond::LAnd(Box::new(lhs), Box::new(rhs))
        } else if let Some(eq) = child_node(node, NonTerm::EqExp) {
            ast::Cond::Expr(self.lower_eq(eq))
        } else {
            ast::Cond::Expr(ast::Expr::Number(0))
        }
    }

    fn lower_exp(&mut self, node: &Node) -> ast::Expr {
        match child_node(node, NonTerm::AddExp) {
            Some(add) => self.lower_add(add),
            None => ast::Expr::Number(0),
        }
    }

    fn lower_const_exp(&mut self, node: &Node) -> ast::Expr {
        self.lower_exp(node)
    }

    fn lower_eq(&mut self, node: &Node) -> ast::Expr {
        if let Some(inner) = child_node(node, NonTerm::EqExp) {
            let op = match child_token(node, TokenKind::EqEq) {
                Some(_) => ast::BinOp::Eq,
                None => ast::BinOp::Ne,
            };
            let lhs = self.lower_eq(inner);
            let rhs = child_node(node, NonTerm::RelExp)
                .map(|r| self.lower_rel(r))
                .unwrap_or(ast::Expr::Number(0));
            ast::Expr::Binary(op, Box::new(lhs), Box::new(rhs))
        } else if let Some(rel) = child_node(node, NonTerm::RelExp) {
            self.lower_rel(rel)
        } else {
            ast::Expr::Number(0)
        }
    }

    fn lower_rel(&mut self, node: &Node) -> ast::Expr {
        if let Some(inner) = child_node(node, NonTerm::RelExp) {
            let op = child_tokens(node)
                .find_map(|t| match t.kind {
                    TokenKind::Less => Some(ast::BinOp::Lt),
                    TokenKind::Greater => Some(ast::BinOp::Gt),
                    TokenKind::LessEq => Some(ast::BinOp::Le),
                    TokenKind::GreaterEq => Some(ast::BinOp::Ge),
                    _ => None,
                })
                .unwrap_or(ast::BinOp::Lt);
            let lhs = self.lower_rel(inner);
            let rhs = child_node(node, NonTerm::AddExp)
                .map(|a| self.lower_add(a))
                .unwrap_or(ast::Expr::Number(0));
            ast::Expr::Binary(op, Box::new(lhs), Box::new(rhs))
        } else if let Some(add) = child_node(node, NonTerm::AddExp) {
            self.lower_add(add)
        } else {
            ast::Expr::Number(0)
        }
    }

    fn lower_add(&mut self, node: &Node) -> ast::Expr {
        if let Some(inner) = child_node(node, NonTerm::AddExp) {
            let op = match child_token(node, TokenKind::Plus) {
                Some(_) => ast::BinOp::Add,
                None => ast::BinOp::Sub,
            };
            let lhs = self.lower_add(inner);
            let rhs = child_node(node, NonTerm::MulExp)
                .map(|m| self.lower_mul(m))
                .unwrap_or(ast::Expr::Number(0));
            ast::Expr::Binary(op, Box::new(lhs), Box::new(rhs))
        } else if let Some(mul) = child_node(node, NonTerm::MulExp) {
            self.lower_mul(mul)
        } else {
            ast::Expr::Number(0)
        }
    }

    fn lower_mul(&mut self, node: &Node) -> ast::Expr {
        if let Some(inner) = child_node(node, NonTerm::MulExp) {
            let op = child_tokens(node)
                .find_map(|t| match t.kind {
                    TokenKind::Star => Some(ast::BinOp::Mul),
                    TokenKind::Slash => Some(ast::BinOp::Div),
                    TokenKind::Percent => Some(ast::BinOp::Mod),
                    _ => None,
                })
                .unwrap_or(ast::BinOp::Mul);
            let lhs = self.lower_mul(inner);
            let rhs = child_node(node, NonTerm::UnaryExp)
                .map(|u| self.lower_unary(u))
                .unwrap_or(ast::Expr::Number(0));
            ast::Expr::Binary(op, Box::new(lhs), Box::new(rhs))
        } else if let Some(unary) = child_node(node, NonTerm::UnaryExp) {
            self.lower_unary(unary)
        } else {
            ast::Expr::Number(0)
        }
    }

    fn lower_unary(&mut self, node: &Node) -> ast::Expr {
        if let Some(op_node) = child_node(node, NonTerm::UnaryOp) {
            let op = child_tokens(op_node)
                .find_map(|t| match t.kind {
                    TokenKind::Plus => Some(ast::UnaryOp::Plus),
                    TokenKind::Minus => Some(ast::UnaryOp::Neg),
                    TokenKind::Not => Some(ast::UnaryOp::Not),
                    _ => None,
                })
                .unwrap_or(ast::UnaryOp::Plus);
            let inner = child_node(node, NonTerm::UnaryExp)
                .map(|u| self.lower_unary(u))
                .unwrap_or(ast::Expr::Number(0));
            return ast::Expr::Unary(op, Box::new(inner));
        }
        if let Some(callee) = child_token(node, TokenKind::Ident) {
            // `Ident '(' [FuncRParams] ')'`
            let args = child_node(node, NonTerm::FuncRParams)
                .map(|ps| {
                    child_nodes(ps, NonTerm::Exp)
                        .map(|e| self.lower_exp(e))
                        .collect()
                })
                .unwrap_or_default();
            return ast::Expr::Call {
                name: callee.text.clone(),
                line: callee.line,
                args,
            };
        }
        match child_node(node, NonTerm::PrimaryExp) {
            Some(primary) => self.lower_primary(primary),
            None => ast::Expr::Number(0),
        }
    }

    fn lower_primary(&mut self, node: &Node) -> ast::Expr {
        if let Some(exp) = child_node(node, NonTerm::Exp) {
            return self.lower_exp(exp);
        }
        if let Some(lval) = child_node(node, NonTerm::LVal) {
            return ast::Expr::LVal(self.lower_lval(lval));
        }
        if let Some(number) = child_node(node, NonTerm::Number) {
            let value = child_token(number, TokenKind::IntConst)
                .map(|t| parse_int(&t.text))
                .unwrap_or(0);
            return ast::Expr::Number(value);
        }
        ast::Expr::Number(0)
    }
}

fn strip_quotes(text: &str) -> String {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{lex::lex, parse::parse};

    fn lower_source(source: &str) -> ast::CompUnit {
        let mut recorder = crate::diagnostic::ErrorRecorder::new();
        let tokens = lex(source, &mut recorder);
        let cst = parse(&tokens, &mut recorder);
        lower(&cst)
    }

    #[test]
    fn binary_chains_are_left_associative() {
        let unit = lower_source("int main() { return 1 - 2 - 3; }");
        let ast::Item::Func(func) = &unit.items[0] else { panic!() };
        let ast::BlockItem::Stmt(ast::Stmt::Return { value: Some(expr), .. }) =
            &func.body.items[0]
        else {
            panic!("expected return statement");
        };
        // (1 - 2) - 3
        let ast::Expr::Binary(ast::BinOp::Sub, lhs, rhs) = expr else { panic!() };
        assert!(matches!(**rhs, ast::Expr::Number(3)));
        assert!(matches!(
            **lhs,
            ast::Expr::Binary(ast::BinOp::Sub, _, _)
        ));
    }

    #[test]
    fn conditions_keep_their_short_circuit_shape() {
        let unit = lower_source("int main() { if (1 || 2 && 3) return 1; return 0; }");
        let ast::Item::Func(func) = &unit.items[0] else { panic!() };
        let ast::BlockItem::Stmt(ast::Stmt::If { cond, .. }) = &func.body.items[0] else {
            panic!("expected if statement");
        };
        let ast::Cond::LOr(lhs, rhs) = cond else { panic!("expected ||") };
        assert!(matches!(**lhs, ast::Cond::Expr(_)));
        assert!(matches!(**rhs, ast::Cond::LAnd(_, _)));
    }

    #[test]
    fn blocks_get_distinct_ids() {
        let unit = lower_source("int main() { { int a; } { int b; } return 0; }");
        let ast::Item::Func(func) = &unit.items[0] else { panic!() };
        let mut ids = vec![func.body.id];
        for item in &func.body.items {
            if let ast::BlockItem::Stmt(ast::Stmt::Block(block)) = item {
                ids.push(block.id);
            }
        }
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn for_clauses_land_in_init_and_step() {
        let unit = lower_source("int main() { int i; for (i = 0; i < 3; i = i + 1) { } return 0; }");
        let ast::Item::Func(func) = &unit.items[0] else { panic!() };
        let ast::BlockItem::Stmt(ast::Stmt::For { init, cond, step, .. }) = &func.body.items[1]
        else {
            panic!("expected for statement");
        };
        assert_eq!(init.as_ref().unwrap().assigns.len(), 1);
        assert!(cond.is_some());
        assert_eq!(step.as_ref().unwrap().assigns.len(), 1);
    }
}
