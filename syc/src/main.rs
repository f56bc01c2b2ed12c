mod cli;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use syc_lib::compile::compile;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    let source = cli::read_input_source(&args)?;
    let opts = cli::extract_compile_opts(&args);

    let res = compile(&source, &opts);

    // A fresh run must not leave a stale error file behind.
    let error_path = args.out_dir.join("error.txt");
    let _ = std::fs::remove_file(&error_path);

    if !res.succeeded() {
        report::eprint_errors(&args.input_name(), &source, &res.recorder);
        std::fs::write(&error_path, res.recorder.to_error_file())
            .with_context(|| format!("Failed to write `{}`", error_path.display()))?;
        // User errors are a reported outcome, not a process failure.
        return Ok(());
    }

    for (name, contents) in &res.files {
        let path = args.out_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write `{}`", path.display()))?;
    }

    Ok(())
}
