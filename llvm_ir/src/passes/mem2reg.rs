//! Promotion of scalar stack slots to SSA registers.
//!
//! The classical recipe: build the CFG over reachable blocks, compute
//! dominator sets, immediate dominators and dominance frontiers, place φs
//! where a promoted slot's stores meet (Cytron et al.), then rename along the
//! dominator tree. Reads of a slot that was never stored resolve to a zero
//! constant of the slot's type.

use crate::instruction::InstrKind;
use crate::module::Module;
use crate::passes::Pass;
use crate::ty::Type;
use crate::value::ValueId;
use std::collections::{BTreeMap, BTreeSet};

pub struct Mem2Reg {
    phi_counter: usize,
}

impl Mem2Reg {
    pub fn new() -> Self {
        Self { phi_counter: 0 }
    }
}

impl Default for Mem2Reg {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for Mem2Reg {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn run(&mut self, module: &mut Module) {
        for function in module.functions().to_vec() {
            if module.is_builtin(function) || module.blocks(function).is_empty() {
                continue;
            }
            self.run_on_function(module, function);
        }
    }
}

/// Successor/predecessor maps over the blocks reachable from the entry, in
/// discovery order.
struct Cfg {
    blocks: Vec<ValueId>,
    succ: BTreeMap<ValueId, Vec<ValueId>>,
    pred: BTreeMap<ValueId, Vec<ValueId>>,
}

impl Cfg {
    fn build(module: &Module, function: ValueId) -> Self {
        let entry = module.entry_block(function).unwrap();
        let mut cfg = Cfg {
            blocks: Vec::new(),
            succ: BTreeMap::new(),
            pred: BTreeMap::new(),
        };
        let mut stack = vec![entry];
        let mut visited = BTreeSet::from([entry]);
        while let Some(block) = stack.pop() {
            cfg.blocks.push(block);
            cfg.succ.entry(block).or_default();
            cfg.pred.entry(block).or_default();
            for target in block_successors(module, block) {
                cfg.succ.entry(block).or_default().push(target);
                cfg.pred.entry(target).or_default().push(block);
                if visited.insert(target) {
                    stack.push(target);
                }
            }
        }
        cfg
    }
}

fn block_successors(module: &Module, block: ValueId) -> Vec<ValueId> {
    let Some(&terminator) = module.block_instructions(block).last() else {
        return Vec::new();
    };
    match module.value(terminator).instr_kind() {
        Some(InstrKind::Branch) => vec![
            module.operand(terminator, 1).unwrap(),
            module.operand(terminator, 2).unwrap(),
        ],
        Some(InstrKind::Jump) => vec![module.operand(terminator, 0).unwrap()],
        _ => Vec::new(),
    }
}

impl Mem2Reg {
    fn run_on_function(&mut self, module: &mut Module, function: ValueId) {
        truncate_after_first_terminator(module, function);

        let cfg = Cfg::build(module, function);
        if cfg.blocks.is_empty() {
            return;
        }
        let entry = module.entry_block(function).unwrap();
        let dom = compute_dominators(&cfg, entry);
        let idom = compute_idom(&cfg, entry, &dom);
        let children = dom_tree_children(&cfg, &idom);
        let df = dominance_frontier(&cfg, &idom, &children);

        // Promotable stack slots, in instruction order.
        let mut promotable = Vec::new();
        for &block in &cfg.blocks {
            for &instr in module.block_instructions(block) {
                if module.value(instr).is_alloca() && is_promotable(module, instr) {
                    promotable.push(instr);
                }
            }
        }
        if promotable.is_empty() {
            return;
        }
        let promotable_set: BTreeSet<ValueId> = promotable.iter().copied().collect();

        // φ placement. `phi_owner` maps each inserted φ back to its slot.
        let mut phi_owner: BTreeMap<ValueId, ValueId> = BTreeMap::new();
        for &slot in &promotable {
            let def_blocks: BTreeSet<ValueId> = module
                .value(slot)
                .uses()
                .iter()
                .filter_map(|u| {
                    let user = module.value(u.user);
                    match user.instr_kind() {
                        Some(InstrKind::Store) if u.operand_index == 1 => user.parent_block(),
                        _ => None,
                    }
                })
                .collect();
            let pointee = module.ty(slot).pointee().unwrap().clone();

            let mut worklist: Vec<ValueId> = def_blocks.iter().copied().collect();
            let mut has_phi: BTreeSet<ValueId> = BTreeSet::new();
            while let Some(block) = worklist.pop() {
                for &frontier in df.get(&block).into_iter().flatten() {
                    if !has_phi.insert(frontier) {
                        continue;
                    }
                    let phi =
                        module.insert_phi(frontier, pointee.clone(), format!("phi{}", self.phi_counter));
                    self.phi_counter += 1;
                    phi_owner.insert(phi, slot);
                    if !def_blocks.contains(&frontier) {
                        worklist.push(frontier);
                    }
                }
            }
        }

        // Renaming along the dominator tree. Stacks bottom out at zero so
        // reads of a never-stored slot are deterministic.
        let mut stacks: BTreeMap<ValueId, Vec<ValueId>> = BTreeMap::new();
        for &slot in &promotable {
            let pointee = module.ty(slot).pointee().unwrap().clone();
            let zero = zero_of(module, &pointee);
            stacks.insert(slot, vec![zero]);
        }
        rename(
            module,
            entry,
            &cfg,
            &children,
            &phi_owner,
            &promotable_set,
            &mut stacks,
        );

        // Remove slots nothing refers to anymore.
        for slot in promotable {
            if module.value(slot).uses().is_empty() {
                module.erase_instr(slot);
            }
        }
    }
}

/// The IR generator may leave dead instructions behind an early `br`/`ret`
/// (e.g. after lowering `break`). Those tails would confuse every analysis
/// that treats the last instruction as the terminator, so they are detached
/// and dropped up front.
fn truncate_after_first_terminator(module: &mut Module, function: ValueId) {
    for block in module.blocks(function).to_vec() {
        let instructions = module.block_instructions(block).to_vec();
        let Some(first_term) = instructions
            .iter()
            .position(|&i| module.value(i).is_terminator())
        else {
            continue;
        };
        for &dead in instructions[first_term + 1..].iter().rev() {
            module.erase_instr(dead);
        }
    }
}

/// A slot is promotable iff it holds a scalar and every user is a load from
/// it or a store to it.
fn is_promotable(module: &Module, slot: ValueId) -> bool {
    let pointee = module.ty(slot).pointee().unwrap();
    if pointee.is_array() {
        return false;
    }
    module.value(slot).uses().iter().all(|u| {
        match module.value(u.user).instr_kind() {
            Some(InstrKind::Load) => u.operand_index == 0,
            Some(InstrKind::Store) => u.operand_index == 1,
            _ => false,
        }
    })
}

fn zero_of(module: &mut Module, ty: &Type) -> ValueId {
    module.const_int_of(ty.clone(), 0)
}

fn compute_dominators(cfg: &Cfg, entry: ValueId) -> BTreeMap<ValueId, BTreeSet<ValueId>> {
    let all: BTreeSet<ValueId> = cfg.blocks.iter().copied().collect();
    let mut dom: BTreeMap<ValueId, BTreeSet<ValueId>> = cfg
        .blocks
        .iter()
        .map(|&b| {
            if b == entry {
                (b, BTreeSet::from([b]))
            } else {
                (b, all.clone())
            }
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &block in &cfg.blocks {
            if block == entry {
                continue;
            }
            let mut preds = cfg.pred[&block].iter();
            let mut new_dom = match preds.next() {
                Some(first) => dom[first].clone(),
                None => BTreeSet::new(),
            };
            for pred in preds {
                new_dom.retain(|b| dom[pred].contains(b));
            }
            new_dom.insert(block);
            if new_dom != dom[&block] {
                dom.insert(block, new_dom);
                changed = true;
            }
        }
    }
    dom
}

/// The immediate dominator is the strict dominator that every other strict
/// dominator dominates, i.e. the closest one.
fn compute_idom(
    cfg: &Cfg,
    entry: ValueId,
    dom: &BTreeMap<ValueId, BTreeSet<ValueId>>,
) -> BTreeMap<ValueId, Option<ValueId>> {
    let mut idom: BTreeMap<ValueId, Option<ValueId>> = BTreeMap::new();
    idom.insert(entry, None);
    for &block in &cfg.blocks {
        if block == entry {
            continue;
        }
        let candidates: Vec<ValueId> = dom[&block].iter().copied().filter(|&d| d != block).collect();
        let best = candidates.iter().copied().find(|&c| {
            candidates
                .iter()
                .all(|&other| other == c || dom[&c].contains(&other))
        });
        idom.insert(block, best);
    }
    idom
}

fn dom_tree_children(
    cfg: &Cfg,
    idom: &BTreeMap<ValueId, Option<ValueId>>,
) -> BTreeMap<ValueId, Vec<ValueId>> {
    let mut children: BTreeMap<ValueId, Vec<ValueId>> =
        cfg.blocks.iter().map(|&b| (b, Vec::new())).collect();
    for &block in &cfg.blocks {
        if let Some(Some(parent)) = idom.get(&block) {
            children.get_mut(parent).unwrap().push(block);
        }
    }
    children
}

fn dominance_frontier(
    cfg: &Cfg,
    idom: &BTreeMap<ValueId, Option<ValueId>>,
    children: &BTreeMap<ValueId, Vec<ValueId>>,
) -> BTreeMap<ValueId, BTreeSet<ValueId>> {
    let mut df: BTreeMap<ValueId, BTreeSet<ValueId>> =
        cfg.blocks.iter().map(|&b| (b, BTreeSet::new())).collect();

    // Local part: successors this block does not immediately dominate.
    for &block in &cfg.blocks {
        for &succ in &cfg.succ[&block] {
            if idom[&succ] != Some(block) {
                df.get_mut(&block).unwrap().insert(succ);
            }
        }
    }

    // Upward part, iterated to a fixpoint.
    let mut changed = true;
    while changed {
        changed = false;
        for &block in &cfg.blocks {
            for &child in &children[&block] {
                let inherited: Vec<ValueId> = df[&child]
                    .iter()
                    .copied()
                    .filter(|w| idom[w] != Some(block) && !df[&block].contains(w))
                    .collect();
                if !inherited.is_empty() {
                    df.get_mut(&block).unwrap().extend(inherited);
                    changed = true;
                }
            }
        }
    }
    df
}

fn leading_phis(module: &Module, block: ValueId) -> Vec<ValueId> {
    module
        .block_instructions(block)
        .iter()
        .copied()
        .take_while(|&i| module.value(i).is_phi())
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn rename(
    module: &mut Module,
    block: ValueId,
    cfg: &Cfg,
    children: &BTreeMap<ValueId, Vec<ValueId>>,
    phi_owner: &BTreeMap<ValueId, ValueId>,
    promotable: &BTreeSet<ValueId>,
    stacks: &mut BTreeMap<ValueId, Vec<ValueId>>,
) {
    let mut pushed: BTreeMap<ValueId, usize> = BTreeMap::new();

    for phi in leading_phis(module, block) {
        if let Some(&slot) = phi_owner.get(&phi) {
            stacks.get_mut(&slot).unwrap().push(phi);
            *pushed.entry(slot).or_default() += 1;
        }
    }

    for instr in module.block_instructions(block).to_vec() {
        match module.value(instr).instr_kind() {
            Some(InstrKind::Load) => {
                let ptr = module.operand(instr, 0).unwrap();
                if promotable.contains(&ptr) {
                    let top = *stacks[&ptr].last().unwrap();
                    module.replace_all_uses_with(instr, top);
                    module.erase_instr(instr);
                }
            }
            Some(InstrKind::Store) => {
                let ptr = module.operand(instr, 1).unwrap();
                if promotable.contains(&ptr) {
                    let value = module.operand(instr, 0).unwrap();
                    stacks.get_mut(&ptr).unwrap().push(value);
                    *pushed.entry(ptr).or_default() += 1;
                    module.erase_instr(instr);
                }
            }
            _ => {}
        }
    }

    for &succ in &cfg.succ[&block] {
        for phi in leading_phis(module, succ) {
            if let Some(&slot) = phi_owner.get(&phi) {
                let top = *stacks[&slot].last().unwrap();
                module.add_phi_incoming(phi, top, block);
            }
        }
    }

    for &child in &children[&block] {
        rename(module, child, cfg, children, phi_owner, promotable, stacks);
    }

    for (slot, count) in pushed {
        let stack = stacks.get_mut(&slot).unwrap();
        stack.truncate(stack.len() - count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::instruction::{BinaryOp, IcmpCond};

    fn count_opcodes(module: &Module, function: ValueId) -> (usize, usize, usize, usize) {
        let (mut allocas, mut loads, mut stores, mut phis) = (0, 0, 0, 0);
        for &block in module.blocks(function) {
            for &instr in module.block_instructions(block) {
                match module.value(instr).instr_kind().unwrap() {
                    InstrKind::Alloca => allocas += 1,
                    InstrKind::Load => loads += 1,
                    InstrKind::Store => stores += 1,
                    InstrKind::Phi => phis += 1,
                    _ => {}
                }
            }
        }
        (allocas, loads, stores, phis)
    }

    /// `int a; a = 3; a = a + 4; return a;`: straight-line promotion leaves
    /// no memory traffic and no φ.
    #[test]
    fn promotes_straight_line_slot() {
        let mut module = Module::new();
        let f = module.add_function("main", Type::I32, vec![], false);
        let mut b = Builder::new(&mut module);
        b.set_function(f);
        let entry = b.create_block("entry");
        b.set_block(entry);
        let slot = b.alloca(Type::I32, "a_addr_0");
        let three = b.module_mut().const_int(3);
        b.store(three, slot);
        let load = b.load(slot, "load_a_1");
        let four = b.module_mut().const_int(4);
        let sum = b.binary(BinaryOp::Add, load, four, "tmp_2");
        b.store(sum, slot);
        let load2 = b.load(slot, "load_a_3");
        b.ret(Some(load2));

        assert_eq!(count_opcodes(&module, f), (1, 2, 2, 0));
        Mem2Reg::new().run(&mut module);
        assert_eq!(count_opcodes(&module, f), (0, 0, 0, 0));

        // The ret now consumes the add directly.
        let ret = *module.block_instructions(entry).last().unwrap();
        assert_eq!(module.operand(ret, 0), Some(sum));
    }

    /// A diamond whose arms store different values needs exactly one φ at the
    /// join, with one incoming per predecessor.
    #[test]
    fn places_phi_at_join() {
        let mut module = Module::new();
        let f = module.add_function("f", Type::I32, vec![Type::I32], false);
        let param = module.params(f)[0];
        let mut b = Builder::new(&mut module);
        b.set_function(f);
        let entry = b.create_block("entry");
        let then = b.create_block("cond_true_0");
        let els = b.create_block("cond_false_1");
        let join = b.create_block("cond_next_2");
        b.set_block(entry);
        let slot = b.alloca(Type::I32, "x_addr_0");
        let zero = b.module_mut().const_int(0);
        let cond = b.icmp(IcmpCond::Ne, param, zero, "cond_1");
        b.branch(cond, then, els);
        b.set_block(then);
        let one = b.module_mut().const_int(1);
        b.store(one, slot);
        b.jump(join);
        b.set_block(els);
        let two = b.module_mut().const_int(2);
        b.store(two, slot);
        b.jump(join);
        b.set_block(join);
        let out = b.load(slot, "load_x_2");
        b.ret(Some(out));

        Mem2Reg::new().run(&mut module);

        let (allocas, loads, stores, phis) = count_opcodes(&module, f);
        assert_eq!((allocas, loads, stores), (0, 0, 0));
        assert_eq!(phis, 1);

        let phi = module.block_instructions(join)[0];
        assert!(module.value(phi).is_phi());
        assert_eq!(module.phi_incoming_for(phi, then), Some(one));
        assert_eq!(module.phi_incoming_for(phi, els), Some(two));
        let ret = *module.block_instructions(join).last().unwrap();
        assert_eq!(module.operand(ret, 0), Some(phi));
    }

    /// Reads of a never-stored slot become the zero constant.
    #[test]
    fn uninitialized_read_becomes_zero() {
        let mut module = Module::new();
        let f = module.add_function("f", Type::I32, vec![], false);
        let mut b = Builder::new(&mut module);
        b.set_function(f);
        let entry = b.create_block("entry");
        b.set_block(entry);
        let slot = b.alloca(Type::I32, "x_addr_0");
        let load = b.load(slot, "load_x_1");
        b.ret(Some(load));

        Mem2Reg::new().run(&mut module);

        let ret = *module.block_instructions(entry).last().unwrap();
        let value = module.operand(ret, 0).unwrap();
        assert_eq!(module.const_int_value(value), Some(0));
    }

    /// Array slots and slots whose address escapes (into a gep here) stay in
    /// memory.
    #[test]
    fn skips_non_promotable_slots() {
        let mut module = Module::new();
        let f = module.add_function("f", Type::I32, vec![], false);
        let mut b = Builder::new(&mut module);
        b.set_function(f);
        let entry = b.create_block("entry");
        b.set_block(entry);
        let arr = b.alloca(Type::array_of(4, Type::I32), "a_addr_0");
        let zero = b.module_mut().const_int(0);
        let zero2 = b.module_mut().const_int(0);
        let gep = b.gep(arr, vec1::vec1![zero, zero2], "gep_1");
        let load = b.load(gep, "load_2");
        b.ret(Some(load));

        Mem2Reg::new().run(&mut module);

        let (allocas, loads, ..) = count_opcodes(&module, f);
        assert_eq!(allocas, 1);
        assert_eq!(loads, 1);
    }

    /// Dead instructions behind the first terminator are dropped before
    /// analysis, and the CFG edges that remain are unchanged by the pass.
    #[test]
    fn truncates_dead_tails_and_preserves_cfg() {
        let mut module = Module::new();
        let f = module.add_function("f", Type::Void, vec![], false);
        let mut b = Builder::new(&mut module);
        b.set_function(f);
        let entry = b.create_block("entry");
        let next = b.create_block("while_next_0");
        b.set_block(entry);
        let slot = b.alloca(Type::I32, "i_addr_0");
        b.jump(next);
        // Unreachable tail, as `break` lowering leaves behind.
        let five = b.module_mut().const_int(5);
        b.store(five, slot);
        b.jump(next);
        b.set_block(next);
        b.ret(None);

        let edges_before: Vec<_> = module
            .blocks(f)
            .iter()
            .map(|&block| (block, block_successors(&module, block)))
            .collect();

        Mem2Reg::new().run(&mut module);

        assert_eq!(module.block_instructions(entry).len(), 1);
        let edges_after: Vec<_> = module
            .blocks(f)
            .iter()
            .map(|&block| (block, block_successors(&module, block)))
            .collect();
        assert_eq!(edges_before, edges_after);
    }

    /// Running the pass a second time leaves the module unchanged.
    #[test]
    fn idempotent() {
        let mut module = Module::new();
        let f = module.add_function("f", Type::I32, vec![Type::I32], false);
        let param = module.params(f)[0];
        let mut b = Builder::new(&mut module);
        b.set_function(f);
        let entry = b.create_block("entry");
        b.set_block(entry);
        let slot = b.alloca(Type::I32, "x_addr_0");
        b.store(param, slot);
        let load = b.load(slot, "load_x_1");
        b.ret(Some(load));

        Mem2Reg::new().run(&mut module);
        let once = module.to_string();
        Mem2Reg::new().run(&mut module);
        assert_eq!(module.to_string(), once);
    }
}
