use syc_lib::compile::{compile, CompileOptsBuilder, Stage};

fn compile_ok(source: &str) -> Vec<(&'static str, String)> {
    let opts = CompileOptsBuilder::new().build();
    let res = compile(source, &opts);
    assert!(
        res.succeeded(),
        "unexpected errors: {}",
        res.recorder.to_error_file(),
    );
    res.files
}

fn file<'f>(files: &'f [(&'static str, String)], name: &str) -> &'f str {
    files
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, contents)| contents.as_str())
        .unwrap_or_else(|| panic!("no `{name}` produced"))
}

fn error_file(source: &str) -> String {
    let opts = CompileOptsBuilder::new().build();
    let res = compile(source, &opts);
    assert!(res.files.is_empty(), "error runs produce no success dumps");
    res.recorder.to_error_file()
}

#[test]
fn empty_main_compiles_to_mips() {
    let files = compile_ok("int main(){return 0;}");
    let mips = file(&files, "mips.txt");
    assert!(mips.contains("_main:"));
    assert!(mips.contains("jal _main"));
    assert!(mips.contains("jr $ra"));
    assert!(mips.contains("li $v0, 10"));
}

#[test]
fn single_illegal_symbol() {
    let source = "int main(){int a; a = 1 & 2; return 0;}";
    assert_eq!(error_file(source), "1 a\n");
}

#[test]
fn redefinition_reports_second_line() {
    let source = "int main(){\nint x;\nint x;\nreturn 0;}";
    assert_eq!(error_file(source), "3 b\n");
}

#[test]
fn missing_return_reports_closing_brace() {
    let source = "int f(){\n}\nint main(){return 0;}";
    assert_eq!(error_file(source), "2 g\n");
}

#[test]
fn printf_mismatch() {
    let source = "int main(){\nprintf(\"%d %d\\n\", 1);\nreturn 0;}";
    assert_eq!(error_file(source), "2 l\n");
}

#[test]
fn error_lines_are_ascending_and_unique() {
    let source = "int main(){\nint x;\nint x;\ny = 1;\nbreak;\nreturn 0;}";
    let errors = error_file(source);
    let lines: Vec<u32> = errors
        .lines()
        .map(|l| l.split_whitespace().next().unwrap().parse().unwrap())
        .collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(lines, sorted);
    for line in errors.lines() {
        let code = line.split_whitespace().nth(1).unwrap();
        assert_eq!(code.len(), 1);
        assert!(('a'..='m').contains(&code.chars().next().unwrap()));
    }
}

/// §8 scenario: before mem2reg one alloca, two stores and a load; after, the
/// slot is gone and the `ret` consumes the `add` directly.
#[test]
fn mem2reg_promotes_the_local() {
    let files = compile_ok("int main(){ int a; a = 3; a = a + 4; return a; }");

    let before = file(&files, "llvm_ir_before.txt");
    assert_eq!(before.matches("alloca").count(), 1);
    assert_eq!(before.matches("store").count(), 2);
    // `a + 4` and `return a` each read the slot.
    assert_eq!(before.matches(" = load ").count(), 2);

    let after = file(&files, "llvm_ir_after.txt");
    assert!(!after.contains("alloca"));
    assert!(!after.contains("store"));
    assert!(!after.contains("load"));
    assert!(after.contains("add i32 3, 4"));
    assert!(after.contains("ret i32 %tmp"));
}

/// Passing `int arr[N]` to `int f(int a[])` emits a pointer to the first
/// element, not a load of it.
#[test]
fn array_argument_decays_to_pointer() {
    let files = compile_ok(
        "int f(int a[]) { return a[0]; }\nint main() { int arr[4]; return f(arr); }\n",
    );
    let ir = file(&files, "llvm_ir_before.txt");
    let call_line = ir
        .lines()
        .find(|l| l.contains("call i32 @f"))
        .expect("call to f");
    assert!(call_line.contains("i32* %gep_decay"));
    assert!(ir.contains("getelementptr [4 x i32], [4 x i32]* %arr_addr"));
}

/// `b()` must only run when `a()` returned zero: the second call lives in
/// the `or_next` block, behind the short-circuit edge.
#[test]
fn logical_or_short_circuits() {
    let files = compile_ok(
        "int a() { return 1; }\nint b() { return 0; }\nint main() { if (a() || b()) { return 1; } return 0; }\n",
    );
    let ir = file(&files, "llvm_ir_before.txt");
    let main_at = ir.find("define i32 @main").unwrap();
    let main_ir = &ir[main_at..];
    let call_a = main_ir.find("call i32 @a()").expect("call to a");
    let or_next = main_ir.find("or_next").expect("or_next block");
    let call_b = main_ir.find("call i32 @b()").expect("call to b");
    assert!(call_a < or_next);
    // The call to b is inside the or_next block, after its label line.
    let label_line_end = main_ir[or_next..].find(":\n").unwrap() + or_next;
    assert!(call_b > label_line_end);
    // The branch after a() targets the true block directly, skipping b().
    let branch = main_ir[call_a..].find("br i1").unwrap() + call_a;
    assert!(branch < or_next);
}

/// `const int N = 4; int a[N];` folds the dimension into the array type.
#[test]
fn const_dimension_folds() {
    let files = compile_ok("const int N = 4;\nint a[N];\nint main() { return a[1]; }\n");
    let ir = file(&files, "llvm_ir_before.txt");
    assert!(ir.contains("@a = global [4 x i32] zeroinitializer"));
    let mips = file(&files, "mips.txt");
    assert!(mips.contains("_a: .space 16"));
}

#[test]
fn const_array_element_read_folds_in_dimensions() {
    // `b`'s size folds through a const-array element read.
    let files = compile_ok(
        "const int dims[2] = {3, 5};\nint b[dims[0]];\nint main() { return 0; }\n",
    );
    let ir = file(&files, "llvm_ir_before.txt");
    assert!(ir.contains("@b = global [3 x i32] zeroinitializer"));
}

#[test]
fn global_initializers_are_emitted_in_order() {
    let files = compile_ok(
        "int g = 7;\nconst int arr[2][2] = {{1, 2}, {3}};\nint main() { return g; }\n",
    );
    let ir = file(&files, "llvm_ir_before.txt");
    assert!(ir.contains("@g = global i32 7"));
    assert!(ir.contains(
        "@arr = constant [2 x [2 x i32]] [[2 x i32] [i32 1, i32 2], [2 x i32] [i32 3, i32 0]]"
    ));
    let mips = file(&files, "mips.txt");
    assert!(mips.contains("_g: .word 7"));
    let arr_at = mips.find("_arr:").unwrap();
    let tail = &mips[arr_at..];
    let words: Vec<&str> = tail.lines().skip(1).take(4).map(str::trim).collect();
    assert_eq!(words, vec![".word 1", ".word 2", ".word 3", ".word 0"]);
}

#[test]
fn printf_expands_to_putch_and_putint() {
    let files = compile_ok("int main() { printf(\"a%d\\n\", 5); return 0; }\n");
    let ir = file(&files, "llvm_ir_before.txt");
    // 'a', the argument, then the newline.
    assert!(ir.contains("call void @putch(i32 97)"));
    assert!(ir.contains("call void @putint(i32 5)"));
    assert!(ir.contains("call void @putch(i32 10)"));
    let mips = file(&files, "mips.txt");
    // putint and putch inline their syscalls.
    assert!(mips.contains("li $v0, 1"));
    assert!(mips.contains("li $v0, 11"));
}

#[test]
fn local_static_lifts_to_a_mangled_global() {
    let files = compile_ok(
        "int count() { static int n = 0; n = n + 1; return n; }\nint main() { count(); return count(); }\n",
    );
    let ir = file(&files, "llvm_ir_before.txt");
    assert!(ir.contains("@count.n_0 = global i32 0"));
    let mips = file(&files, "mips.txt");
    assert!(mips.contains("_count.n_0: .word 0"));
}

#[test]
fn stage_gating_stops_early() {
    let opts = CompileOptsBuilder::new().stage(Stage::Lexer).build();
    let res = compile("int main(){return 0;}", &opts);
    assert!(res.succeeded());
    let names: Vec<&str> = res.files.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["lexer.txt"]);

    let opts = CompileOptsBuilder::new().stage(Stage::Symbol).build();
    let res = compile("int main(){return 0;}", &opts);
    let names: Vec<&str> = res.files.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["lexer.txt", "parser.txt", "symbol.txt"]);
}

#[test]
fn unoptimized_run_writes_plain_dumps() {
    let opts = CompileOptsBuilder::new().optimize(false).build();
    let res = compile("int main(){return 0;}", &opts);
    let names: Vec<&str> = res.files.iter().map(|(n, _)| *n).collect();
    assert_eq!(
        names,
        vec!["lexer.txt", "parser.txt", "symbol.txt", "llvm_ir.txt", "mips.txt"],
    );
}

/// While loops: `break` leaves through the loop's next block; the loop shape
/// survives into MIPS labels.
#[test]
fn while_loop_with_break_and_continue() {
    let files = compile_ok(
        "int main() {\n    int i; int s;\n    i = 0; s = 0;\n    while (1) {\n        i = i + 1;\n        if (i > 10) { break; }\n        if (i % 2) { continue; }\n        s = s + i;\n    }\n    return s;\n}\n",
    );
    let mips = file(&files, "mips.txt");
    assert!(mips.contains("L_main_while_cond_"));
    assert!(mips.contains("L_main_while_next_"));
}

/// After mem2reg a loop's joined variable lives in a φ whose edge copies
/// appear in the MIPS output.
#[test]
fn phi_lowering_emits_edge_blocks() {
    let files = compile_ok(
        "int main() {\n    int i;\n    int s;\n    i = 0;\n    s = 0;\n    for (i = 0; i < 4; i = i + 1) {\n        s = s + i;\n    }\n    return s;\n}\n",
    );
    let after = file(&files, "llvm_ir_after.txt");
    assert!(after.contains("phi i32"));
    let mips = file(&files, "mips_after.txt");
    assert!(mips.contains("_phi_edge_"));
}

/// Arguments beyond the fourth travel on the stack.
#[test]
fn five_arguments_use_the_stack() {
    let files = compile_ok(
        "int f(int a, int b, int c, int d, int e) { return a + e; }\nint main() { return f(1, 2, 3, 4, 5); }\n",
    );
    let mips = file(&files, "mips.txt");
    assert!(mips.contains("addiu $sp, $sp, -4"));
    assert!(mips.contains("sw $t0, 0($sp)"));
    assert!(mips.contains("move $a3, $t0"));
}
