//! Integration tests for sessions
//!
//! Tests incremental evaluation the way the REPL drives it: one input at a
//! time, with every earlier definition still in scope.

use monkey_language::{Value, VmConfig};
use monkey_runtime::{Engine, Session};

const ENGINES: [Engine; 2] = [Engine::Vm, Engine::Eval];

fn feed(session: &mut Session, inputs: &[&str]) -> Value {
    let mut last = Value::Null;
    for input in inputs {
        last = session.eval(input).unwrap().value;
    }
    last
}

#[test]
fn definitions_build_on_each_other() {
    let inputs = [
        "let map = fn(arr, f) { let iter = fn(arr, acc) { if (len(arr) == 0) { acc } else { iter(rest(arr), push(acc, f(first(arr)))) } }; iter(arr, []); };",
        "let double = fn(x) { x * 2 };",
        "let xs = map([1, 2, 3], double);",
        "xs[0] + xs[1] + xs[2]",
    ];
    for engine in ENGINES {
        let mut session = Session::new(engine);
        assert_eq!(feed(&mut session, &inputs), Value::Int(12), "{engine}");
    }
}

#[test]
fn redefinition_replaces_a_binding() {
    for engine in ENGINES {
        let mut session = Session::new(engine);
        let value = feed(&mut session, &["let x = 1;", "let x = x + 10;", "x"]);
        assert_eq!(value, Value::Int(11), "{engine}");
    }
}

#[test]
fn closures_outlive_the_input_that_made_them() {
    for engine in ENGINES {
        let mut session = Session::new(engine);
        let value = feed(
            &mut session,
            &[
                "let adder = fn(n) { fn(x) { x + n } };",
                "let addFive = adder(5);",
                "addFive(37)",
            ],
        );
        assert_eq!(value, Value::Int(42), "{engine}");
    }
}

#[test]
fn runtime_error_values_do_not_poison_the_session() {
    for engine in ENGINES {
        let mut session = Session::new(engine);
        let error = session.eval("1 + true").unwrap().value;
        assert_eq!(error, Value::error("type mismatch: Integer + Boolean"));
        assert_eq!(feed(&mut session, &["let y = 2;", "y * y"]), Value::Int(4));
    }
}

#[test]
fn a_bad_input_does_not_shift_global_slots() {
    let mut session = Session::new(Engine::Vm);
    feed(&mut session, &["let a = 1;"]);
    assert!(session.eval("let b = 2; let c = missing;").is_err());
    assert_eq!(session.globals().len(), 1);
    assert_eq!(feed(&mut session, &["let b = 20;", "a + b"]), Value::Int(21));
}

#[test]
fn fatal_vm_errors_surface_as_errors() {
    let config = VmConfig::default().with_max_frames(16);
    let mut session = Session::new(Engine::Vm).with_config(config);
    let error = session
        .eval("let loop = fn() { loop() }; loop();")
        .unwrap_err();
    assert!(error.is_fatal());
    assert!(error.to_string().contains("stack overflow"));
}

#[test]
fn output_and_disassembly_are_per_input() {
    let mut session = Session::new(Engine::Vm).with_disassembly(true);
    let evaluation = session.eval(r#"puts("x")"#).unwrap();
    assert_eq!(evaluation.output, ["x"]);
    let listing = evaluation.disassembly.unwrap();
    assert!(listing.contains("OpGetBuiltin 1"));
    assert!(listing.contains("OpCall 1"));

    let mut session = Session::new(Engine::Eval).with_disassembly(true);
    assert_eq!(session.eval("1").unwrap().disassembly, None);
}

#[test]
fn output_before_a_fatal_error_is_not_lost() {
    let source = r#"puts("before"); let f = fn() { 1(2) }; f();"#;

    let mut session = Session::new(Engine::Vm);
    assert!(session.eval(source).unwrap_err().is_fatal());
    assert_eq!(session.take_output(), ["before"]);

    let mut session = Session::new(Engine::Eval);
    let evaluation = session.eval(source).unwrap();
    assert_eq!(evaluation.output, ["before"]);
    assert_eq!(evaluation.value, Value::error("calling non-function: Integer"));
}
