//! The staged pipeline: lex → parse → lower → analyze → IR → passes → MIPS.

use crate::codegen;
use crate::cst;
use crate::diagnostic::ErrorRecorder;
use crate::passes;

/// The terminal stage: dumps are produced for every stage up to and
/// including this one.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Lexer,
    Parser,
    Symbol,
    Llvm,
    #[default]
    Mips,
}

pub struct CompileOpts {
    stage: Stage,
    optimize: bool,
}

pub struct CompileOptsBuilder {
    stage: Stage,
    optimize: bool,
}

impl Default for CompileOptsBuilder {
    fn default() -> Self {
        Self {
            stage: Stage::default(),
            optimize: true,
        }
    }
}

impl CompileOptsBuilder {
    /// Compile to MIPS with mem2reg on.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Toggle the mem2reg pipeline (and with it the before/after dumps).
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn build(self) -> CompileOpts {
        CompileOpts {
            stage: self.stage,
            optimize: self.optimize,
        }
    }
}

pub struct CompileOutput {
    /// `(file name, contents)` pairs for the produced dumps. Empty when the
    /// run recorded user errors: then only `error.txt` applies.
    pub files: Vec<(&'static str, String)>,
    pub recorder: ErrorRecorder,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        !self.recorder.has_errors()
    }

    fn gated(mut self) -> Self {
        if self.recorder.has_errors() {
            self.files.clear();
        }
        self
    }
}

pub fn compile(source: &str, opts: &CompileOpts) -> CompileOutput {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut recorder = ErrorRecorder::new();
    let mut files = Vec::new();

    let tokens = passes::lex::lex(source, &mut recorder);
    files.push(("lexer.txt", passes::lex::write_token_dump(&tokens)));
    if opts.stage == Stage::Lexer {
        return CompileOutput { files, recorder }.gated();
    }

    let parse_tree = passes::parse::parse(&tokens, &mut recorder);
    files.push(("parser.txt", cst::write_post_order(&parse_tree)));
    if opts.stage == Stage::Parser {
        return CompileOutput { files, recorder }.gated();
    }

    let unit = passes::lower_cst::lower(&parse_tree);
    let mut tables = passes::semantic::analyze(&unit, &mut recorder);
    files.push(("symbol.txt", tables.to_symbol_file()));
    if opts.stage == Stage::Symbol || recorder.has_errors() {
        return CompileOutput { files, recorder }.gated();
    }

    let mut module = passes::lower_ast::build_ir_from_ast(&unit, &mut tables);
    if opts.optimize {
        files.push(("llvm_ir_before.txt", module.to_string()));
        if opts.stage == Stage::Mips {
            let before = codegen::mips::build_from_module(&module);
            files.push(("mips_before.txt", before.to_string()));
        }
        llvm_ir::passes::default_pipeline().run(&mut module);
        files.push(("llvm_ir_after.txt", module.to_string()));
    } else {
        files.push(("llvm_ir.txt", module.to_string()));
    }
    if opts.stage == Stage::Llvm {
        return CompileOutput { files, recorder };
    }

    let mips = codegen::mips::build_from_module(&module).to_string();
    if opts.optimize {
        files.push(("mips_after.txt", mips.clone()));
    }
    files.push(("mips.txt", mips));

    CompileOutput { files, recorder }
}
