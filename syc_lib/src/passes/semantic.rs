//! Semantic analysis: builds the scope tree, records the b–h/l/m error
//! categories, and leaves behind the symbol metadata the IR generator needs.

use crate::ast::{self, BlockItem, Stmt};
use crate::diagnostic::{ErrorKind, ErrorRecorder, Span};
use crate::symbol::{ParamKind, ScopeId, Symbol, SymbolKind, SymbolTables};

pub fn analyze(unit: &ast::CompUnit, recorder: &mut ErrorRecorder) -> SymbolTables {
    let mut analyzer = Analyzer {
        tables: SymbolTables::new(),
        recorder,
        loop_depth: 0,
        current_ret_void: false,
    };
    analyzer.register_builtins();
    analyzer.run(unit);
    analyzer.tables
}

struct Analyzer<'r> {
    tables: SymbolTables,
    recorder: &'r mut ErrorRecorder,
    loop_depth: usize,
    current_ret_void: bool,
}

impl Analyzer<'_> {
    fn record(&mut self, kind: ErrorKind, line: u32) {
        self.recorder.record(kind, line, Span::default());
    }

    /// The library functions, visible from every scope like any other
    /// function.
    fn register_builtins(&mut self) {
        let builtins: &[(&str, bool, &[ParamKind])] = &[
            ("getint", false, &[]),
            ("getch", false, &[]),
            ("getarray", false, &[ParamKind::IntArray]),
            ("putint", true, &[ParamKind::Int]),
            ("putch", true, &[ParamKind::Int]),
            ("putarray", true, &[ParamKind::Int, ParamKind::IntArray]),
            ("putstr", true, &[ParamKind::IntArray]),
            ("starttime", true, &[]),
            ("stoptime", true, &[]),
        ];
        for &(name, ret_void, params) in builtins {
            let mut symbol = Symbol::new(name, SymbolKind::Func, 0);
            symbol.is_builtin = true;
            symbol.ret_void = ret_void;
            symbol.param_kinds = params.to_vec();
            self.tables
                .insert(SymbolTables::GLOBAL, symbol)
                .expect("builtin registered twice");
        }
    }

    fn run(&mut self, unit: &ast::CompUnit) {
        for item in &unit.items {
            match item {
                ast::Item::Decl(decl) => self.check_decl(SymbolTables::GLOBAL, decl),
                ast::Item::Func(func) => self.check_func(func),
            }
        }
    }

    fn check_func(&mut self, func: &ast::FuncDef) {
        if !func.is_main {
            let mut symbol = Symbol::new(func.name.clone(), SymbolKind::Func, func.line);
            symbol.ret_void = func.ret_void;
            symbol.param_kinds = func
                .params
                .iter()
                .map(|p| {
                    if p.is_array {
                        ParamKind::IntArray
                    } else {
                        ParamKind::Int
                    }
                })
                .collect();
            if self.tables.insert(SymbolTables::GLOBAL, symbol).is_err() {
                self.record(ErrorKind::Redefinition, func.line);
            }
        }

        // One scope for parameters and the body block together.
        let scope = self.tables.create_scope(SymbolTables::GLOBAL);
        self.tables.map_block(func.body.id, scope);
        self.current_ret_void = func.ret_void;

        for param in &func.params {
            let kind = if param.is_array {
                SymbolKind::Array
            } else {
                SymbolKind::Var
            };
            let mut symbol = Symbol::new(param.name.clone(), kind, param.line);
            symbol.dim_count = usize::from(param.is_array);
            if self.tables.insert(scope, symbol).is_err() {
                self.record(ErrorKind::Redefinition, param.line);
            }
        }

        for item in &func.body.items {
            self.check_block_item(scope, item);
        }

        if !func.ret_void && !ends_in_value_return(&func.body) {
            self.record(ErrorKind::MissingReturn, func.body.end_line);
        }
    }

    fn check_decl(&mut self, scope: ScopeId, decl: &ast::Decl) {
        for def in &decl.defs {
            for dim in &def.dims {
                self.check_expr(scope, dim);
            }
            let kind = if def.dims.is_empty() {
                SymbolKind::Var
            } else {
                SymbolKind::Array
            };
            let mut symbol = Symbol::new(def.name.clone(), kind, def.line);
            symbol.is_const = decl.is_const;
            symbol.is_static = decl.is_static;
            symbol.dim_count = def.dims.len();
            if self.tables.insert(scope, symbol).is_err() {
                self.record(ErrorKind::Redefinition, def.line);
            }
            if let Some(init) = &def.init {
                self.check_init(scope, init);
            }
        }
    }

    fn check_init(&mut self, scope: ScopeId, init: &ast::InitVal) {
        match init {
            ast::InitVal::Expr(expr) => self.check_expr(scope, expr),
            ast::InitVal::List(items) => {
                for item in items {
                    self.check_init(scope, item);
                }
            }
        }
    }

    fn check_block_item(&mut self, scope: ScopeId, item: &BlockItem) {
        match item {
            BlockItem::Decl(decl) => self.check_decl(scope, decl),
            BlockItem::Stmt(stmt) => self.check_stmt(scope, stmt),
        }
    }

    fn check_stmt(&mut self, scope: ScopeId, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { lval, value } => {
                self.check_assign(scope, lval);
                self.check_expr(scope, value);
            }
            Stmt::Expr(expr) => {
                if let Some(expr) = expr {
                    self.check_expr(scope, expr);
                }
            }
            Stmt::Block(block) => {
                let inner = self.tables.create_scope(scope);
                self.tables.map_block(block.id, inner);
                for item in &block.items {
                    self.check_block_item(inner, item);
                }
            }
            Stmt::If { cond, then, els } => {
                self.check_cond(scope, cond);
                self.check_stmt(scope, then);
                if let Some(els) = els {
                    self.check_stmt(scope, els);
                }
            }
            Stmt::While { cond, body } => {
                self.check_cond(scope, cond);
                self.loop_depth += 1;
                self.check_stmt(scope, body);
                self.loop_depth -= 1;
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                for clause in [init, step].into_iter().flatten() {
                    for (lval, value) in &clause.assigns {
                        self.check_assign(scope, lval);
                        self.check_expr(scope, value);
                    }
                }
                if let Some(cond) = cond {
                    self.check_cond(scope, cond);
                }
                self.loop_depth += 1;
                self.check_stmt(scope, body);
                self.loop_depth -= 1;
            }
            Stmt::Break { line } | Stmt::Continue { line } => {
                if self.loop_depth == 0 {
                    self.record(ErrorKind::StrayLoopJump, *line);
                }
            }
            Stmt::Return { value, line } => {
                if self.current_ret_void && value.is_some() {
                    self.record(ErrorKind::ReturnValueInVoid, *line);
                }
                if let Some(value) = value {
                    self.check_expr(scope, value);
                }
            }
            Stmt::Printf { format, args, line } => {
                let slots = count_format_slots(format);
                if slots != args.len() {
                    self.record(ErrorKind::PrintfArgMismatch, *line);
                }
                for arg in args {
                    self.check_expr(scope, arg);
                }
            }
        }
    }

    fn check_assign(&mut self, scope: ScopeId, lval: &ast::LVal) {
        match self.tables.lookup(scope, &lval.name) {
            None => self.record(ErrorKind::Undefined, lval.line),
            Some(sym) => {
                if self.tables.symbol(sym).is_const {
                    self.record(ErrorKind::AssignToConst, lval.line);
                }
            }
        }
        for index in &lval.indices {
            self.check_expr(scope, index);
        }
    }

    fn check_cond(&mut self, scope: ScopeId, cond: &ast::Cond) {
        match cond {
            ast::Cond::LOr(lhs, rhs) | ast::Cond::LAnd(lhs, rhs) => {
                self.check_cond(scope, lhs);
                self.check_cond(scope, rhs);
            }
            ast::Cond::Expr(expr) => self.check_expr(scope, expr),
        }
    }

    fn check_expr(&mut self, scope: ScopeId, expr: &ast::Expr) {
        match expr {
            ast::Expr::Number(_) => {}
            ast::Expr::LVal(lval) => {
                if self.tables.lookup(scope, &lval.name).is_none() {
                    self.record(ErrorKind::Undefined, lval.line);
                }
                for index in &lval.indices {
                    self.check_expr(scope, index);
                }
            }
            ast::Expr::Call { name, line, args } => {
                let Some(sym) = self.tables.lookup(scope, name) else {
                    self.record(ErrorKind::Undefined, *line);
                    for arg in args {
                        self.check_expr(scope, arg);
                    }
                    return;
                };
                let symbol = self.tables.symbol(sym);
                if symbol.kind == SymbolKind::Func {
                    let expected = symbol.param_kinds.clone();
                    if args.len() != expected.len() {
                        self.record(ErrorKind::ArgCountMismatch, *line);
                    } else {
                        for (arg, kind) in args.iter().zip(expected) {
                            let arg_is_array = self.expr_is_array(scope, arg);
                            if arg_is_array != (kind == ParamKind::IntArray) {
                                self.record(ErrorKind::ArgKindMismatch, *line);
                                break;
                            }
                        }
                    }
                }
                for arg in args {
                    self.check_expr(scope, arg);
                }
            }
            ast::Expr::Unary(_, inner) => self.check_expr(scope, inner),
            ast::Expr::Binary(_, lhs, rhs) => {
                self.check_expr(scope, lhs);
                self.check_expr(scope, rhs);
            }
        }
    }

    /// Whether an argument expression denotes an array (and therefore decays
    /// to a pointer). A subscripted array counts as a scalar element here.
    fn expr_is_array(&self, scope: ScopeId, expr: &ast::Expr) -> bool {
        match expr {
            ast::Expr::LVal(lval) => {
                if !lval.indices.is_empty() {
                    return false;
                }
                self.tables
                    .lookup(scope, &lval.name)
                    .map(|sym| self.tables.symbol(sym).kind == SymbolKind::Array)
                    .unwrap_or(false)
            }
            ast::Expr::Unary(_, inner) => self.expr_is_array(scope, inner),
            ast::Expr::Binary(_, lhs, rhs) => {
                self.expr_is_array(scope, lhs) || self.expr_is_array(scope, rhs)
            }
            _ => false,
        }
    }
}

/// `%d` and `%c` both consume an argument; `%%` is a literal percent.
fn count_format_slots(format: &str) -> usize {
    let bytes = format.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'%' {
            match bytes[i + 1] {
                b'd' | b'c' => {
                    count += 1;
                    i += 2;
                    continue;
                }
                b'%' => {
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        i += 1;
    }
    count
}

/// The "reaches the end without a return" rule: the body's last item must be
/// a `return` with a value.
fn ends_in_value_return(body: &ast::Block) -> bool {
    matches!(
        body.items.last(),
        Some(BlockItem::Stmt(Stmt::Return { value: Some(_), .. }))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{lex::lex, lower_cst, parse::parse};

    fn analyze_source(source: &str) -> (SymbolTables, ErrorRecorder) {
        let mut recorder = ErrorRecorder::new();
        let tokens = lex(source, &mut recorder);
        let cst = parse(&tokens, &mut recorder);
        let unit = lower_cst::lower(&cst);
        let tables = analyze(&unit, &mut recorder);
        (tables, recorder)
    }

    #[test]
    fn redefinition_in_same_scope_is_b() {
        let (_, recorder) = analyze_source("int main() {\n    int x;\n    int x;\n    return 0;\n}\n");
        assert_eq!(recorder.to_error_file(), "3 b\n");
    }

    #[test]
    fn shadowing_in_inner_scope_is_fine() {
        let (_, recorder) = analyze_source("int main() {\n    int x;\n    { int x; }\n    return 0;\n}\n");
        assert!(!recorder.has_errors());
    }

    #[test]
    fn undefined_name_is_c() {
        let (_, recorder) = analyze_source("int main() {\n    return y;\n}\n");
        assert_eq!(recorder.to_error_file(), "2 c\n");
    }

    #[test]
    fn arg_count_mismatch_is_d() {
        let (_, recorder) = analyze_source(
            "int f(int a) { return a; }\nint main() {\n    return f(1, 2);\n}\n",
        );
        assert_eq!(recorder.to_error_file(), "3 d\n");
    }

    #[test]
    fn array_for_scalar_is_e() {
        let (_, recorder) = analyze_source(
            "int f(int a) { return a; }\nint main() {\n    int arr[3];\n    return f(arr);\n}\n",
        );
        assert_eq!(recorder.to_error_file(), "4 e\n");
    }

    #[test]
    fn element_of_array_is_a_scalar_argument() {
        let (_, recorder) = analyze_source(
            "int f(int a) { return a; }\nint main() {\n    int arr[3];\n    return f(arr[0]);\n}\n",
        );
        assert!(!recorder.has_errors());
    }

    #[test]
    fn return_value_in_void_is_f() {
        let (_, recorder) =
            analyze_source("void f() {\n    return 1;\n}\nint main() {\n    return 0;\n}\n");
        assert_eq!(recorder.to_error_file(), "2 f\n");
    }

    #[test]
    fn missing_return_is_g_at_closing_brace() {
        let (_, recorder) = analyze_source("int f() {\n}\nint main() {\n    return 0;\n}\n");
        assert_eq!(recorder.to_error_file(), "2 g\n");
    }

    #[test]
    fn assign_to_const_is_h() {
        let (_, recorder) =
            analyze_source("int main() {\n    const int c = 1;\n    c = 2;\n    return 0;\n}\n");
        assert_eq!(recorder.to_error_file(), "3 h\n");
    }

    #[test]
    fn printf_mismatch_is_l() {
        let (_, recorder) =
            analyze_source("int main() {\n    printf(\"%d %d\\n\", 1);\n    return 0;\n}\n");
        assert_eq!(recorder.to_error_file(), "2 l\n");
    }

    #[test]
    fn percent_c_consumes_an_argument_and_double_percent_does_not() {
        let (_, recorder) = analyze_source(
            "int main() {\n    printf(\"%c %% %d\\n\", 65, 1);\n    return 0;\n}\n",
        );
        assert!(!recorder.has_errors());
    }

    #[test]
    fn break_outside_loop_is_m() {
        let (_, recorder) = analyze_source("int main() {\n    break;\n    return 0;\n}\n");
        assert_eq!(recorder.to_error_file(), "2 m\n");
    }

    #[test]
    fn symbol_file_lists_scopes_in_order() {
        let (tables, recorder) = analyze_source(
            "const int N = 3;\nint g;\nint f(int a, int b[]) {\n    static int s;\n    return a;\n}\nint main() {\n    int x[2];\n    { const int y = 1; }\n    return 0;\n}\n",
        );
        assert!(!recorder.has_errors());
        let dump = tables.to_symbol_file();
        let expected = "\
1 N ConstInt
1 g Int
1 f IntFunc
2 a Int
2 b IntArray
2 s StaticInt
3 x IntArray
4 y ConstInt
";
        assert_eq!(dump, expected);
    }
}
