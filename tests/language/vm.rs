//! Integration tests for the VM
//!
//! Tests whole programs through compile and run, and the VM's handling of
//! state that outlives a single run.

use monkey_foundation::{ErrorKind, Overflow};
use monkey_language::{Builtins, Compiler, Value, Vm, VmConfig, compile, parse, vm};

fn run(source: &str) -> Value {
    vm::eval(source).unwrap()
}

fn ints(values: &[i64]) -> Value {
    Value::array(values.iter().copied().map(Value::Int))
}

// =============================================================================
// Programs
// =============================================================================

#[test]
fn map_and_reduce() {
    let prelude = "
        let map = fn(arr, f) {
            let iter = fn(arr, acc) {
                if (len(arr) == 0) { acc } else { iter(rest(arr), push(acc, f(first(arr)))) }
            };
            iter(arr, []);
        };
        let reduce = fn(arr, initial, f) {
            let iter = fn(arr, result) {
                if (len(arr) == 0) { result } else { iter(rest(arr), f(result, first(arr))) }
            };
            iter(arr, initial);
        };
    ";

    assert_eq!(
        run(&format!("{prelude} map([1, 2, 3, 4], fn(x) {{ x * x }});")),
        ints(&[1, 4, 9, 16])
    );
    assert_eq!(
        run(&format!(
            "{prelude} reduce([1, 2, 3, 4, 5], 0, fn(acc, x) {{ acc + x }});"
        )),
        Value::Int(15)
    );
}

#[test]
fn hashes_of_functions() {
    let source = r#"
        let ops = {"add": fn(a, b) { a + b }, "mul": fn(a, b) { a * b }};
        ops["add"](2, 3) * ops["mul"](4, 5)
    "#;
    assert_eq!(run(source), Value::Int(100));
}

#[test]
fn closures_capture_values_at_creation() {
    let source = "
        let makeCounter = fn(start) { fn(step) { start + step } };
        let fromTen = makeCounter(10);
        let fromTwenty = makeCounter(20);
        [fromTen(1), fromTwenty(1), fromTen(5)]
    ";
    assert_eq!(run(source), ints(&[11, 21, 15]));
}

#[test]
fn mutual_shadowing_in_nested_scopes() {
    let source = "
        let x = 1;
        let f = fn(x) { let g = fn(x) { x * 100 }; g(x + 1) + x };
        f(5) + x
    ";
    assert_eq!(run(source), Value::Int(606));
}

#[test]
fn recursion_through_a_closure_name() {
    let source = "
        let wrapper = fn() {
            let countDown = fn(x) { if (x == 0) { 0 } else { countDown(x - 1) } };
            countDown(50);
        };
        wrapper();
    ";
    assert_eq!(run(source), Value::Int(0));
}

#[test]
fn runtime_errors_are_values() {
    assert_eq!(
        run(r#"let f = fn() { "a" - "b" }; f()"#),
        Value::error("unknown operator: String - String")
    );
    assert_eq!(
        run("[1, 2][true]"),
        Value::error("index operator not supported: Array")
    );
    assert_eq!(
        run("len(1)"),
        Value::error("argument to \"len\" not supported, got Integer")
    );
}

// =============================================================================
// Globals across runs
// =============================================================================

#[test]
fn globals_survive_between_runs() {
    let builtins = Builtins::standard();
    let mut compiler = Compiler::new(&builtins);

    compiler
        .compile(&parse("let counter = fn(n) { n + 1 }; let start = 41;").unwrap())
        .unwrap();
    let mut first = Vm::new(compiler.bytecode(), builtins.clone());
    first.run().unwrap();
    let globals = first.into_globals();

    compiler.compile(&parse("counter(start)").unwrap()).unwrap();
    let mut second = Vm::with_globals(
        compiler.bytecode(),
        builtins,
        globals,
        VmConfig::default(),
    );
    second.run().unwrap();
    assert_eq!(second.last_popped(), Value::Int(42));
}

// =============================================================================
// Bounds
// =============================================================================

#[test]
fn deep_but_bounded_recursion_succeeds() {
    let source = "
        let sum = fn(n) { if (n == 0) { 0 } else { n + sum(n - 1) } };
        sum(300);
    ";
    assert_eq!(run(source), Value::Int(45_150));
}

#[test]
fn unbounded_recursion_overflows_the_frame_stack() {
    let bytecode = compile("let f = fn(n) { f(n + 1) }; f(0);").unwrap();
    let config = VmConfig::default().with_max_frames(64);
    let mut vm = Vm::with_globals(bytecode, Builtins::standard(), Vec::new(), config);

    let error = vm.run().unwrap_err();
    assert!(error.is_fatal());
    assert!(matches!(
        error.kind,
        ErrorKind::StackOverflow(Overflow::Frames { limit: 64 })
    ));
}

#[test]
fn wide_expressions_overflow_a_small_operand_stack() {
    let bytecode = compile("[1, 2, 3, 4, 5, 6, 7, 8]").unwrap();
    let config = VmConfig::default().with_stack_size(4);
    let mut vm = Vm::with_globals(bytecode, Builtins::standard(), Vec::new(), config);

    let error = vm.run().unwrap_err();
    assert!(matches!(
        error.kind,
        ErrorKind::StackOverflow(Overflow::Operand { limit: 4 })
    ));
}
