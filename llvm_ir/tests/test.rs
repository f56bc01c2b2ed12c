use llvm_ir::{BinaryOp, Builder, Module, Type};

/// Builds `define i32 @main() { entry: ret i32 0 }` and checks the dump shape.
#[test]
fn dumps_minimal_function() {
    let mut module = Module::new();
    let main = module.add_function("main", Type::I32, vec![], false);
    let mut builder = Builder::new(&mut module);
    builder.set_function(main);
    let entry = builder.create_block("entry");
    builder.set_block(entry);
    let zero = builder.module_mut().const_int(0);
    builder.ret(Some(zero));

    let text = module.to_string();
    assert!(text.contains("define i32 @main() {"));
    assert!(text.contains("entry:"));
    assert!(text.contains("  ret i32 0"));
}

#[test]
fn declares_builtins_without_bodies() {
    let mut module = Module::new();
    module.add_function("getint", Type::I32, vec![], true);
    module.add_function(
        "putarray",
        Type::Void,
        vec![Type::I32, Type::pointer_to(Type::I32)],
        true,
    );

    let text = module.to_string();
    assert!(text.contains("declare i32 @getint()"));
    assert!(text.contains("declare void @putarray(i32, i32*)"));
}

#[test]
fn replace_all_uses_rewires_every_edge() {
    let mut module = Module::new();
    let f = module.add_function("f", Type::I32, vec![Type::I32], false);
    let param = module.params(f)[0];
    let mut builder = Builder::new(&mut module);
    builder.set_function(f);
    let entry = builder.create_block("entry");
    builder.set_block(entry);
    let one = builder.module_mut().const_int(1);
    let a = builder.binary(BinaryOp::Add, param, one, "tmp_0");
    let b = builder.binary(BinaryOp::Mul, a, a, "tmp_1");
    builder.ret(Some(b));

    let two = module.const_int(2);
    module.replace_all_uses_with(a, two);

    assert!(module.value(a).uses().is_empty());
    assert_eq!(module.operand(b, 0), Some(two));
    assert_eq!(module.operand(b, 1), Some(two));
    assert_eq!(module.value(two).uses().len(), 2);
}

#[test]
fn erasing_detaches_operand_edges() {
    let mut module = Module::new();
    let f = module.add_function("f", Type::Void, vec![Type::I32], false);
    let param = module.params(f)[0];
    let mut builder = Builder::new(&mut module);
    builder.set_function(f);
    let entry = builder.create_block("entry");
    builder.set_block(entry);
    let slot = builder.alloca(Type::I32, "x_addr_0");
    builder.store(param, slot);
    builder.ret(None);

    let store = module.block_instructions(entry)[1];
    module.erase_instr(store);

    assert!(module.value(slot).uses().is_empty());
    assert!(module.value(param).uses().is_empty());
    assert_eq!(module.block_instructions(entry).len(), 2);
}

/// Globals print with their initializer shape; zero-initialized aggregates
/// print as `zeroinitializer`.
#[test]
fn global_initializer_forms() {
    let mut module = Module::new();
    let one = module.const_int(1);
    let two = module.const_int(2);
    let arr_ty = Type::array_of(2, Type::I32);
    let init = module.const_array(arr_ty.clone(), vec![one, two]);
    module.add_global("a", arr_ty, Some(init), true);
    module.add_global("b", Type::I32, None, false);

    let text = module.to_string();
    assert!(text.contains("@a = constant [2 x i32] [i32 1, i32 2]"));
    assert!(text.contains("@b = global i32 zeroinitializer"));
}
