use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use syc_lib::compile::{self, CompileOpts, CompileOptsBuilder};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Lexer,
    Parser,
    Symbol,
    Llvm,
    Mips,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkippablePasses {
    Mem2Reg,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The input source file.
    #[arg(default_value = "testfile.txt")]
    pub input_path: PathBuf,

    /// The last stage to run; dumps are written for every stage up to it.
    #[arg(short = 's', long, value_name = "STAGE", value_enum)]
    stage: Option<Stage>,

    /// Zero or more passes to skip.
    #[arg(long = "skip", value_name = "PASS", value_enum)]
    skips: Vec<SkippablePasses>,

    /// Directory the output files are written into.
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,
}

impl Args {
    pub fn input_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

pub fn read_input_source(args: &Args) -> anyhow::Result<String> {
    if !args.input_path.exists() {
        bail!("Input file `{}` doesn't exist", args.input_path.display());
    }
    std::fs::read_to_string(&args.input_path)
        .with_context(|| format!("Failed to read input file `{}`", args.input_path.display()))
}

pub fn extract_compile_opts(args: &Args) -> CompileOpts {
    let opts = CompileOptsBuilder::new();

    let opts = if let Some(stage) = args.stage {
        let stage = match stage {
            Stage::Lexer => compile::Stage::Lexer,
            Stage::Parser => compile::Stage::Parser,
            Stage::Symbol => compile::Stage::Symbol,
            Stage::Llvm => compile::Stage::Llvm,
            Stage::Mips => compile::Stage::Mips,
        };
        opts.stage(stage)
    } else {
        opts
    };

    opts.optimize(!args.skips.contains(&SkippablePasses::Mem2Reg))
        .build()
}
