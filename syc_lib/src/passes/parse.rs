//! Recursive-descent parser producing the CST.
//!
//! Recovery is deliberately narrow: a missing `;`, `)` or `]` is recorded
//! (codes i/j/k) on the line of the last token parsed so far and parsing
//! continues as if the token had been present. Anything else is consumed as
//! a raw leaf so the parser always terminates.

use crate::cst::{CstNode, Node, NonTerm};
use crate::diagnostic::{ErrorKind, ErrorRecorder};
use crate::token::{Token, TokenKind};

pub fn parse(tokens: &[Token], recorder: &mut ErrorRecorder) -> Node {
    Parser::new(tokens, recorder).parse_comp_unit()
}

struct Parser<'t, 'r> {
    tokens: &'t [Token],
    pos: usize,
    recorder: &'r mut ErrorRecorder,
}

impl<'t, 'r> Parser<'t, 'r> {
    fn new(tokens: &'t [Token], recorder: &'r mut ErrorRecorder) -> Self {
        assert!(
            matches!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof)),
            "token stream must end in EOF",
        );
        Self {
            tokens,
            pos: 0,
            recorder,
        }
    }

    fn peek(&self, k: usize) -> &Token {
        self.tokens
            .get(self.pos + k)
            .unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn kind(&self, k: usize) -> TokenKind {
        self.peek(k).kind
    }

    fn read(&mut self) -> Token {
        let token = self.peek(0).clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn read_into(&mut self, node: &mut Node) {
        let token = self.read();
        node.push_token(token);
    }

    fn error_line(&self, node: &Node) -> u32 {
        node.last_token_line().unwrap_or_else(|| self.peek(0).line)
    }

    fn expect_semicolon(&mut self, node: &mut Node) {
        if self.kind(0) == TokenKind::Semicolon {
            self.read_into(node);
        } else {
            let line = self.error_line(node);
            self.recorder
                .record(ErrorKind::MissingSemicolon, line, self.peek(0).span);
        }
    }

    fn expect_rparen(&mut self, node: &mut Node) {
        if self.kind(0) == TokenKind::RParen {
            self.read_into(node);
        } else {
            let line = self.error_line(node);
            self.recorder
                .record(ErrorKind::MissingRightParen, line, self.peek(0).span);
        }
    }

    fn expect_rbracket(&mut self, node: &mut Node) {
        if self.kind(0) == TokenKind::RBracket {
            self.read_into(node);
        } else {
            let line = self.error_line(node);
            self.recorder
                .record(ErrorKind::MissingRightBracket, line, self.peek(0).span);
        }
    }

    // ---- top level ------------------------------------------------------

    fn parse_comp_unit(&mut self) -> Node {
        let mut root = Node::new(NonTerm::CompUnit);
        loop {
            match self.kind(0) {
                TokenKind::ConstKw => {
                    let mut decl = Node::new(NonTerm::Decl);
                    decl.push_node(self.parse_const_decl());
                    root.push_node(decl);
                }
                TokenKind::StaticKw => {
                    let mut decl = Node::new(NonTerm::Decl);
                    decl.push_node(self.parse_var_decl());
                    root.push_node(decl);
                }
                TokenKind::IntKw if self.kind(1) == TokenKind::MainKw => break,
                TokenKind::IntKw | TokenKind::VoidKw
                    if self.kind(1) == TokenKind::Ident && self.kind(2) == TokenKind::LParen =>
                {
                    root.push_node(self.parse_func_def());
                }
                TokenKind::IntKw => {
                    let mut decl = Node::new(NonTerm::Decl);
                    decl.push_node(self.parse_var_decl());
                    root.push_node(decl);
                }
                TokenKind::Eof => break,
                _ => {
                    // Unexpected top-level token; keep it as a leaf so the
                    // parser makes progress.
                    let token = self.read();
                    root.children.push(CstNode::Token(token));
                }
            }
        }
        if self.kind(0) == TokenKind::IntKw && self.kind(1) == TokenKind::MainKw {
            root.push_node(self.parse_main_func_def());
        }
        root
    }

    fn parse_main_func_def(&mut self) -> Node {
        let mut node = Node::new(NonTerm::MainFuncDef);
        self.read_into(&mut node); // int
        self.read_into(&mut node); // main
        if self.kind(0) == TokenKind::LParen {
            self.read_into(&mut node);
        }
        self.expect_rparen(&mut node);
        node.push_node(self.parse_block());
        node
    }

    fn parse_func_def(&mut self) -> Node {
        let mut node = Node::new(NonTerm::FuncDef);
        let mut func_type = Node::new(NonTerm::FuncType);
        self.read_into(&mut func_type); // int | void
        node.push_node(func_type);
        if self.kind(0) == TokenKind::Ident {
            self.read_into(&mut node);
        }
        if self.kind(0) == TokenKind::LParen {
            self.read_into(&mut node);
        }
        if self.kind(0) != TokenKind::RParen && self.starts_func_f_param() {
            node.push_node(self.parse_func_f_params());
        }
        self.expect_rparen(&mut node);
        node.push_node(self.parse_block());
        node
    }

    fn starts_func_f_param(&self) -> bool {
        self.kind(0) == TokenKind::IntKw
    }

    fn parse_func_f_params(&mut self) -> Node {
        let mut node = Node::new(NonTerm::FuncFParams);
        loop {
            node.push_node(self.parse_func_f_param());
            if self.kind(0) == TokenKind::Comma {
                self.read_into(&mut node);
            } else {
                break;
            }
        }
        node
    }

    fn parse_func_f_param(&mut self) -> Node {
        let mut node = Node::new(NonTerm::FuncFParam);
        let mut btype = Node::new(NonTerm::BType);
        if self.kind(0) == TokenKind::IntKw {
            self.read_into(&mut btype);
        }
        node.push_node(btype);
        if self.kind(0) == TokenKind::Ident {
            self.read_into(&mut node);
        }
        if self.kind(0) == TokenKind::LBracket {
            self.read_into(&mut node);
            self.expect_rbracket(&mut node);
        }
        node
    }

    // ---- declarations ---------------------------------------------------

    fn parse_const_decl(&mut self) -> Node {
        let mut node = Node::new(NonTerm::ConstDecl);
        self.read_into(&mut node); // const
        let mut btype = Node::new(NonTerm::BType);
        if self.kind(0) == TokenKind::IntKw {
            self.read_into(&mut btype);
        }
        node.push_node(btype);
        loop {
            node.push_node(self.parse_const_def());
            if self.kind(0) == TokenKind::Comma {
                self.read_into(&mut node);
            } else {
                break;
            }
        }
        self.expect_semicolon(&mut node);
        node
    }

    fn parse_const_def(&mut self) -> Node {
        let mut node = Node::new(NonTerm::ConstDef);
        if self.kind(0) == TokenKind::Ident {
            self.read_into(&mut node);
        }
        while self.kind(0) == TokenKind::LBracket {
            self.read_into(&mut node);
            node.push_node(self.parse_const_exp());
            self.expect_rbracket(&mut node);
        }
        if self.kind(0) == TokenKind::Assign {
            self.read_into(&mut node);
            node.push_node(self.parse_const_init_val());
        }
        node
    }

    fn parse_const_init_val(&mut self) -> Node {
        let mut node = Node::new(NonTerm::ConstInitVal);
        if self.kind(0) == TokenKind::LBrace {
            self.read_into(&mut node);
            if self.kind(0) != TokenKind::RBrace {
                loop {
                    node.push_node(self.parse_const_init_val());
                    if self.kind(0) == TokenKind::Comma {
                        self.read_into(&mut node);
                    } else {
                        break;
                    }
                }
            }
            if self.kind(0) == TokenKind::RBrace {
                self.read_into(&mut node);
            }
        } else {
            node.push_node(self.parse_const_exp());
        }
        node
    }

    fn parse_var_decl(&mut self) -> Node {
        let mut node = Node::new(NonTerm::VarDecl);
        if self.kind(0) == TokenKind::StaticKw {
            self.read_into(&mut node);
        }
        let mut btype = Node::new(NonTerm::BType);
        if self.kind(0) == TokenKind::IntKw {
            self.read_into(&mut btype);
        }
        node.push_node(btype);
        loop {
            node.push_node(self.parse_var_def());
            if self.kind(0) == TokenKind::Comma {
                self.read_into(&mut node);
            } else {
                break;
            }
        }
        self.expect_semicolon(&mut node);
        node
    }

    fn parse_var_def(&mut self) -> Node {
        let mut node = Node::new(NonTerm::VarDef);
        if self.kind(0) == TokenKind::Ident {
            self.read_into(&mut node);
        }
        while self.kind(0) == TokenKind::LBracket {
            self.read_into(&mut node);
            node.push_node(self.parse_const_exp());
            self.expect_rbracket(&mut node);
        }
        if self.kind(0) == TokenKind::Assign {
            self.read_into(&mut node);
            node.push_node(self.parse_init_val());
        }
        node
    }

    fn parse_init_val(&mut self) -> Node {
        let mut node = Node::new(NonTerm::InitVal);
        if self.kind(0) == TokenKind::LBrace {
            self.read_into(&mut node);
            if self.kind(0) != TokenKind::RBrace {
                loop {
                    node.push_node(self.parse_init_val());
                    if self.kind(0) == TokenKind::Comma {
                        self.read_into(&mut node);
                    } else {
                        break;
                    }
                }
            }
            if self.kind(0) == TokenKind::RBrace {
                self.read_into(&mut node);
            }
        } else {
            node.push_node(self.parse_exp());
        }
        node
    }

    // ---- statements -----------------------------------------------------

    fn parse_block(&mut self) -> Node {
        let mut node = Node::new(NonTerm::Block);
        if self.kind(0) == TokenKind::LBrace {
            self.read_into(&mut node);
        }
        while self.kind(0) != TokenKind::RBrace && self.kind(0) != TokenKind::Eof {
            let mut item = Node::new(NonTerm::BlockItem);
            match self.kind(0) {
                TokenKind::ConstKw => {
                    let mut decl = Node::new(NonTerm::Decl);
                    decl.push_node(self.parse_const_decl());
                    item.push_node(decl);
                }
                TokenKind::IntKw | TokenKind::StaticKw => {
                    let mut decl = Node::new(NonTerm::Decl);
                    decl.push_node(self.parse_var_decl());
                    item.push_node(decl);
                }
                _ => item.push_node(self.parse_stmt()),
            }
            node.push_node(item);
        }
        if self.kind(0) == TokenKind::RBrace {
            self.read_into(&mut node);
        }
        node
    }

    /// `true` if the statement starting here is `LVal '=' ...` rather than an
    /// expression statement: an `=` can only be the assignment operator, so
    /// scan ahead for one before the statement ends.
    fn starts_assign(&self) -> bool {
        if self.kind(0) != TokenKind::Ident {
            return false;
        }
        let mut k = 0;
        loop {
            match self.kind(k) {
                TokenKind::Assign => return true,
                TokenKind::Semicolon
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::Eof => return false,
                _ => k += 1,
            }
        }
    }

    fn parse_stmt(&mut self) -> Node {
        let mut node = Node::new(NonTerm::Stmt);
        match self.kind(0) {
            TokenKind::IfKw => {
                self.read_into(&mut node);
                if self.kind(0) == TokenKind::LParen {
                    self.read_into(&mut node);
                }
                node.push_node(self.parse_cond());
                self.expect_rparen(&mut node);
                node.push_node(self.parse_stmt());
                if self.kind(0) == TokenKind::ElseKw {
                    self.read_into(&mut node);
                    node.push_node(self.parse_stmt());
                }
            }
            TokenKind::WhileKw => {
                self.read_into(&mut node);
                if self.kind(0) == TokenKind::LParen {
                    self.read_into(&mut node);
                }
                node.push_node(self.parse_cond());
                self.expect_rparen(&mut node);
                node.push_node(self.parse_stmt());
            }
            TokenKind::ForKw => {
                self.read_into(&mut node);
                if self.kind(0) == TokenKind::LParen {
                    self.read_into(&mut node);
                }
                if self.kind(0) != TokenKind::Semicolon {
                    node.push_node(self.parse_for_stmt());
                }
                self.expect_semicolon(&mut node);
                if self.kind(0) != TokenKind::Semicolon {
                    node.push_node(self.parse_cond());
                }
                self.expect_semicolon(&mut node);
                if self.kind(0) != TokenKind::RParen {
                    node.push_node(self.parse_for_stmt());
                }
                self.expect_rparen(&mut node);
                node.push_node(self.parse_stmt());
            }
            TokenKind::BreakKw | TokenKind::ContinueKw => {
                self.read_into(&mut node);
                self.expect_semicolon(&mut node);
            }
            TokenKind::ReturnKw => {
                self.read_into(&mut node);
                if self.kind(0) != TokenKind::Semicolon && self.kind(0) != TokenKind::RBrace {
                    node.push_node(self.parse_exp());
                }
                self.expect_semicolon(&mut node);
            }
            TokenKind::PrintfKw => {
                self.read_into(&mut node);
                if self.kind(0) == TokenKind::LParen {
                    self.read_into(&mut node);
                }
                if self.kind(0) == TokenKind::StrConst {
                    self.read_into(&mut node);
                }
                while self.kind(0) == TokenKind::Comma {
                    self.read_into(&mut node);
                    node.push_node(self.parse_exp());
                }
                self.expect_rparen(&mut node);
                self.expect_semicolon(&mut node);
            }
            TokenKind::LBrace => {
                node.push_node(self.parse_block());
            }
            TokenKind::Semicolon => {
                self.read_into(&mut node);
            }
            _ if self.starts_assign() => {
                node.push_node(self.parse_lval());
                if self.kind(0) == TokenKind::Assign {
                    self.read_into(&mut node);
                }
                node.push_node(self.parse_exp());
                self.expect_semicolon(&mut node);
            }
            TokenKind::Ident
            | TokenKind::IntConst
            | TokenKind::LParen
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Not => {
                node.push_node(self.parse_exp());
                self.expect_semicolon(&mut node);
            }
            _ => {
                // Unknown statement head: consume it so parsing advances.
                self.read_into(&mut node);
                if self.kind(0) == TokenKind::Semicolon {
                    self.read_into(&mut node);
                }
            }
        }
        node
    }

    fn parse_for_stmt(&mut self) -> Node {
        let mut node = Node::new(NonTerm::ForStmt);
        loop {
            node.push_node(self.parse_lval());
            if self.kind(0) == TokenKind::Assign {
                self.read_into(&mut node);
                node.push_node(self.parse_exp());
            }
            if self.kind(0) == TokenKind::Comma {
                self.read_into(&mut node);
            } else {
                break;
            }
        }
        node
    }

    // ---- expressions ----------------------------------------------------

    fn parse_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::Exp);
        node.push_node(self.parse_add_exp());
        node
    }

    fn parse_const_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::ConstExp);
        node.push_node(self.parse_add_exp());
        node
    }

    fn parse_cond(&mut self) -> Node {
        let mut node = Node::new(NonTerm::Cond);
        node.push_node(self.parse_l_or_exp());
        node
    }

    fn parse_lval(&mut self) -> Node {
        let mut node = Node::new(NonTerm::LVal);
        if self.kind(0) == TokenKind::Ident {
            self.read_into(&mut node);
        }
        while self.kind(0) == TokenKind::LBracket {
            self.read_into(&mut node);
            node.push_node(self.parse_exp());
            self.expect_rbracket(&mut node);
        }
        node
    }

    fn parse_primary_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::PrimaryExp);
        match self.kind(0) {
            TokenKind::LParen => {
                self.read_into(&mut node);
                node.push_node(self.parse_exp());
                self.expect_rparen(&mut node);
            }
            TokenKind::Ident => {
                node.push_node(self.parse_lval());
            }
            TokenKind::IntConst => {
                let mut number = Node::new(NonTerm::Number);
                self.read_into(&mut number);
                node.push_node(number);
            }
            _ => {
                self.read_into(&mut node);
            }
        }
        node
    }

    fn parse_unary_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::UnaryExp);
        match self.kind(0) {
            TokenKind::Plus | TokenKind::Minus | TokenKind::Not => {
                let mut op = Node::new(NonTerm::UnaryOp);
                self.read_into(&mut op);
                node.push_node(op);
                node.push_node(self.parse_unary_exp());
            }
            TokenKind::Ident if self.kind(1) == TokenKind::LParen => {
                self.read_into(&mut node); // callee
                self.read_into(&mut node); // (
                if self.kind(0) != TokenKind::RParen {
                    node.push_node(self.parse_func_r_params());
                }
                self.expect_rparen(&mut node);
            }
            _ => {
                node.push_node(self.parse_primary_exp());
            }
        }
        node
    }

    fn parse_func_r_params(&mut self) -> Node {
        let mut node = Node::new(NonTerm::FuncRParams);
        loop {
            node.push_node(self.parse_exp());
            if self.kind(0) == TokenKind::Comma {
                self.read_into(&mut node);
            } else {
                break;
            }
        }
        node
    }

    fn parse_mul_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::MulExp);
        node.push_node(self.parse_unary_exp());
        while matches!(
            self.kind(0),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        ) {
            let mut outer = Node::new(NonTerm::MulExp);
            outer.push_node(node);
            self.read_into(&mut outer);
            outer.push_node(self.parse_unary_exp());
            node = outer;
        }
        node
    }

    fn parse_add_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::AddExp);
        node.push_node(self.parse_mul_exp());
        while matches!(self.kind(0), TokenKind::Plus | TokenKind::Minus) {
            let mut outer = Node::new(NonTerm::AddExp);
            outer.push_node(node);
            self.read_into(&mut outer);
            outer.push_node(self.parse_mul_exp());
            node = outer;
        }
        node
    }

    fn parse_rel_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::RelExp);
        node.push_node(self.parse_add_exp());
        while matches!(
            self.kind(0),
            TokenKind::Less | TokenKind::Greater | TokenKind::LessEq | TokenKind::GreaterEq
        ) {
            let mut outer = Node::new(NonTerm::RelExp);
            outer.push_node(node);
            self.read_into(&mut outer);
            outer.push_node(self.parse_add_exp());
            node = outer;
        }
        node
    }

    fn parse_eq_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::EqExp);
        node.push_node(self.parse_rel_exp());
        while matches!(self.kind(0), TokenKind::EqEq | TokenKind::NotEq) {
            let mut outer = Node::new(NonTerm::EqExp);
            outer.push_node(node);
            self.read_into(&mut outer);
            outer.push_node(self.parse_rel_exp());
            node = outer;
        }
        node
    }

    fn parse_l_and_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::LAndExp);
        node.push_node(self.parse_eq_exp());
        while self.kind(0) == TokenKind::And {
            let mut outer = Node::new(NonTerm::LAndExp);
            outer.push_node(node);
            self.read_into(&mut outer);
            outer.push_node(self.parse_eq_exp());
            node = outer;
        }
        node
    }

    fn parse_l_or_exp(&mut self) -> Node {
        let mut node = Node::new(NonTerm::LOrExp);
        node.push_node(self.parse_l_and_exp());
        while self.kind(0) == TokenKind::Or {
            let mut outer = Node::new(NonTerm::LOrExp);
            outer.push_node(node);
            self.read_into(&mut outer);
            outer.push_node(self.parse_l_and_exp());
            node = outer;
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::write_post_order;
    use crate::passes::lex::lex;

    fn parse_source(source: &str) -> (Node, ErrorRecorder) {
        let mut recorder = ErrorRecorder::new();
        let tokens = lex(source, &mut recorder);
        let cst = parse(&tokens, &mut recorder);
        (cst, recorder)
    }

    /// The CST's leaves reproduce the lexed token stream.
    #[test]
    fn round_trips_token_text() {
        let source = "const int N = 4;\nint a[N];\nint main() { int i; for (i = 0; i < N; i = i + 1) { a[i] = i * 2; } return a[3]; }\n";
        let mut recorder = ErrorRecorder::new();
        let tokens = lex(source, &mut recorder);
        let cst = parse(&tokens, &mut recorder);
        assert!(!recorder.has_errors());

        let leaf_text: Vec<&str> = cst.tokens().iter().map(|t| t.text.as_str()).collect();
        let stream_text: Vec<&str> = tokens
            .iter()
            .take_while(|t| t.kind != TokenKind::Eof)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(leaf_text, stream_text);
    }

    #[test]
    fn post_order_suppresses_synthetic_nodes() {
        let (cst, _) = parse_source("int main() { return 0; }");
        let dump = write_post_order(&cst);
        assert!(dump.contains("<MainFuncDef>"));
        assert!(dump.contains("<CompUnit>"));
        assert!(!dump.contains("<BlockItem>"));
        assert!(!dump.contains("<Decl>"));
        assert!(!dump.contains("<BType>"));
        // Post order: the statement label comes before the function label.
        let stmt = dump.find("<Stmt>").unwrap();
        let main_fn = dump.find("<MainFuncDef>").unwrap();
        assert!(stmt < main_fn);
    }

    #[test]
    fn missing_semicolon_is_code_i_on_the_prior_line() {
        let (_, recorder) = parse_source("int main() {\n    int a = 1\n    return a;\n}\n");
        assert_eq!(recorder.to_error_file(), "2 i\n");
    }

    #[test]
    fn missing_rparen_is_code_j() {
        let (_, recorder) = parse_source("int main() {\n    int a = (1 + 2;\n    return a;\n}\n");
        assert!(recorder
            .errors()
            .iter()
            .any(|e| e.kind == ErrorKind::MissingRightParen && e.line == 2));
    }

    #[test]
    fn missing_rbracket_is_code_k() {
        let (_, recorder) = parse_source("int main() {\n    int a[2;\n    return 0;\n}\n");
        assert!(recorder
            .errors()
            .iter()
            .any(|e| e.kind == ErrorKind::MissingRightBracket && e.line == 2));
    }

    #[test]
    fn parses_while_and_nested_calls() {
        let (cst, recorder) =
            parse_source("int f(int x) { return x; }\nint main() { while (f(1) < 2) { break; } return 0; }\n");
        assert!(!recorder.has_errors());
        let dump = write_post_order(&cst);
        assert!(dump.contains("WHILETK while"));
        assert!(dump.contains("<FuncRParams>"));
    }
}
