//! Module-level transformation passes.

mod mem2reg;

pub use mem2reg::Mem2Reg;

use crate::module::Module;

pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&mut self, module: &mut Module);
}

/// Applies an ordered list of passes to a module.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn run(&mut self, module: &mut Module) {
        for pass in &mut self.passes {
            pass.run(module);
        }
    }
}

/// The default pipeline: mem2reg only.
pub fn default_pipeline() -> PassManager {
    let mut manager = PassManager::new();
    manager.add_pass(Box::new(Mem2Reg::new()));
    manager
}
