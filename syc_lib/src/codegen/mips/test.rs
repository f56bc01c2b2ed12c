use super::build_from_module;
use llvm_ir::{BinaryOp, Builder, IcmpCond, Module, Type};

fn new_function(module: &mut Module, name: &str, params: Vec<Type>) -> llvm_ir::ValueId {
    module.add_function(name, Type::I32, params, false)
}

#[test]
fn program_prologue_runs_main_then_exits() {
    let mut module = Module::new();
    let main = new_function(&mut module, "main", vec![]);
    let mut b = Builder::new(&mut module);
    b.set_function(main);
    let entry = b.create_block("entry");
    b.set_block(entry);
    let zero = b.module_mut().const_int(0);
    b.ret(Some(zero));

    let text = build_from_module(&module).to_string();
    let jal = text.find("jal _main").unwrap();
    let exit = text.find("li $v0, 10").unwrap();
    let label = text.find("_main:").unwrap();
    assert!(jal < exit);
    assert!(exit < label);
}

#[test]
fn div_and_rem_use_lo_and_hi() {
    let mut module = Module::new();
    let f = new_function(&mut module, "f", vec![Type::I32, Type::I32]);
    let [a, b_param] = module.params(f) else { panic!() };
    let (a, b_param) = (*a, *b_param);
    let mut b = Builder::new(&mut module);
    b.set_function(f);
    let entry = b.create_block("entry");
    b.set_block(entry);
    let q = b.binary(BinaryOp::Sdiv, a, b_param, "tmp_0");
    let r = b.binary(BinaryOp::Srem, a, b_param, "tmp_1");
    let s = b.binary(BinaryOp::Add, q, r, "tmp_2");
    b.ret(Some(s));

    let text = build_from_module(&module).to_string();
    assert_eq!(text.matches("div $t0, $t1").count(), 2);
    assert!(text.contains("mflo $t2"));
    assert!(text.contains("mfhi $t2"));
}

#[test]
fn icmp_selection_matches_the_template() {
    let conds = [
        (IcmpCond::Eq, vec!["xor $t2, $t0, $t1", "sltiu $t2, $t2, 1"]),
        (IcmpCond::Ne, vec!["xor $t2, $t0, $t1", "sltu $t2, $zero, $t2"]),
        (IcmpCond::Sgt, vec!["slt $t2, $t1, $t0"]),
        (IcmpCond::Sge, vec!["slt $t2, $t0, $t1", "xori $t2, $t2, 1"]),
        (IcmpCond::Slt, vec!["slt $t2, $t0, $t1"]),
        (IcmpCond::Sle, vec!["slt $t2, $t1, $t0", "xori $t2, $t2, 1"]),
    ];
    for (cond, expected) in conds {
        let mut module = Module::new();
        let f = new_function(&mut module, "f", vec![Type::I32, Type::I32]);
        let a = module.params(f)[0];
        let c = module.params(f)[1];
        let mut b = Builder::new(&mut module);
        b.set_function(f);
        let entry = b.create_block("entry");
        b.set_block(entry);
        let cmp = b.icmp(cond, a, c, "cond_0");
        let wide = b.zext(cmp, Type::I32, "zext_1");
        b.ret(Some(wide));

        let text = build_from_module(&module).to_string();
        for line in expected {
            assert!(text.contains(line), "{cond:?} should emit `{line}`:\n{text}");
        }
    }
}

/// `zext(trunc(x to i1) to i32)` masks to the low bit: the trunc emits the
/// `andi`, the zext is a plain move through the slot.
#[test]
fn trunc_then_zext_is_and_1() {
    let mut module = Module::new();
    let f = new_function(&mut module, "f", vec![Type::I32]);
    let x = module.params(f)[0];
    let mut b = Builder::new(&mut module);
    b.set_function(f);
    let entry = b.create_block("entry");
    b.set_block(entry);
    let narrow = b.trunc(x, Type::I1, "trunc_0");
    let wide = b.zext(narrow, Type::I32, "zext_1");
    b.ret(Some(wide));

    let text = build_from_module(&module).to_string();
    assert!(text.contains("andi $t0, $t0, 1"));
}

#[test]
fn gep_scales_each_index_by_the_walked_level() {
    let mut module = Module::new();
    let f = new_function(&mut module, "f", vec![Type::I32]);
    let i = module.params(f)[0];
    let mut b = Builder::new(&mut module);
    b.set_function(f);
    let entry = b.create_block("entry");
    b.set_block(entry);
    let arr = b.alloca(Type::array_of(2, Type::array_of(3, Type::I32)), "a_addr_0");
    let zero = b.module_mut().const_int(0);
    let one = b.module_mut().const_int(1);
    let gep = b.gep(arr, vec1::vec1![zero, one, i], "gep_1");
    let value = b.load(gep, "load_2");
    b.ret(Some(value));

    let text = build_from_module(&module).to_string();
    // Level sizes: the whole [2 x [3 x i32]] is 24 bytes, a row 12, an
    // element 4.
    assert!(text.contains("li $t2, 24"));
    assert!(text.contains("li $t2, 12"));
    assert!(text.contains("li $t2, 4"));
}

#[test]
fn frame_size_is_rounded_to_eight() {
    let mut module = Module::new();
    let f = new_function(&mut module, "f", vec![Type::I32]);
    let x = module.params(f)[0];
    let mut b = Builder::new(&mut module);
    b.set_function(f);
    let entry = b.create_block("entry");
    b.set_block(entry);
    let one = b.module_mut().const_int(1);
    let sum = b.binary(BinaryOp::Add, x, one, "tmp_0");
    b.ret(Some(sum));

    let text = build_from_module(&module).to_string();
    // 8 (saved regs) + 4 (arg slot) + 4 (tmp) = 16 already a multiple of 8.
    assert!(text.contains("addiu $sp, $sp, -16"));
}

#[test]
fn builtin_calls_inline_their_syscalls() {
    let mut module = Module::new();
    let getint = module.add_function("getint", Type::I32, vec![], true);
    let putint = module.add_function("putint", Type::Void, vec![Type::I32], true);
    let getarray = module.add_function(
        "getarray",
        Type::I32,
        vec![Type::pointer_to(Type::I32)],
        true,
    );
    let main = new_function(&mut module, "main", vec![]);
    let mut b = Builder::new(&mut module);
    b.set_function(main);
    let entry = b.create_block("entry");
    b.set_block(entry);
    let n = b.call(getint, vec![], "call_0");
    b.call(putint, vec![n], "call_1");
    let arr = b.alloca(Type::array_of(4, Type::I32), "a_addr_2");
    let zero = b.module_mut().const_int(0);
    let zero2 = b.module_mut().const_int(0);
    let base = b.gep(arr, vec1::vec1![zero, zero2], "gep_decay_3");
    b.call(getarray, vec![base], "call_4");
    let zero3 = b.module_mut().const_int(0);
    b.ret(Some(zero3));

    let text = build_from_module(&module).to_string();
    assert!(text.contains("li $v0, 5"));
    assert!(text.contains("li $v0, 1"));
    // getarray has no syscall number; it is an external routine.
    assert!(text.contains("jal getarray"));
    assert!(!text.contains("jal _getarray"));
}
