//! Tests for the VM.

use monkey_foundation::ObjectType;

use super::*;
use crate::code::{Instructions, make};
use crate::compiler::Compiler;
use crate::object::HashKey;
use crate::parser::parse;

fn eval_test(source: &str) -> Value {
    eval(source).unwrap_or_else(|e| panic!("eval failed for {source}: {e}"))
}

fn eval_err(source: &str) -> Error {
    eval(source).expect_err("expected a fatal error")
}

fn ints(values: &[i64]) -> Value {
    Value::array(values.iter().copied().map(Value::Int))
}

fn run_raw(instructions: Vec<Vec<u8>>, constants: Vec<Value>) -> Result<Vm> {
    let bytecode = Bytecode {
        instructions: instructions.into_iter().collect::<Instructions>(),
        constants,
        num_globals: 0,
    };
    let mut vm = Vm::new(bytecode, Builtins::standard());
    vm.run().map(|()| vm)
}

#[test]
fn eval_integer_arithmetic() {
    let cases = [
        ("1", 1),
        ("1 + 2", 3),
        ("1 - 2", -1),
        ("4 / 2", 2),
        ("50 / 2 * 2 + 10 - 5", 55),
        ("5 * (2 + 10)", 60),
        ("-5", -5),
        ("-50 + 100 + -50", 0),
        ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
    ];
    for (source, expected) in cases {
        assert_eq!(eval_test(source), Value::Int(expected), "{source}");
    }
}

#[test]
fn eval_boolean_expressions() {
    let cases = [
        ("true", true),
        ("1 < 2", true),
        ("1 > 2", false),
        ("1 == 1", true),
        ("1 != 1", false),
        ("true != false", true),
        ("(1 < 2) == true", true),
        ("!true", false),
        ("!!5", true),
        ("!(if (false) { 5; })", true),
    ];
    for (source, expected) in cases {
        assert_eq!(eval_test(source), Value::Bool(expected), "{source}");
    }
}

#[test]
fn eval_conditionals() {
    assert_eq!(eval_test("if (true) { 10 }"), Value::Int(10));
    assert_eq!(eval_test("if (1 < 2) { 10 } else { 20 }"), Value::Int(10));
    assert_eq!(eval_test("if (1 > 2) { 10 } else { 20 }"), Value::Int(20));
    assert_eq!(eval_test("if (1 > 2) { 10 }"), Value::Null);
    assert_eq!(eval_test("if (false) { 10 }"), Value::Null);
    assert_eq!(
        eval_test("if ((if (false) { 10 })) { 10 } else { 20 }"),
        Value::Int(20)
    );
    assert_eq!(eval_test("if (true) { let x = 1; }"), Value::Null);
}

#[test]
fn eval_global_let_statements() {
    assert_eq!(eval_test("let one = 1; one"), Value::Int(1));
    assert_eq!(
        eval_test("let one = 1; let two = one + one; one + two"),
        Value::Int(3)
    );
    assert_eq!(eval_test("let x = 1; let x = x + 1; x"), Value::Int(2));
}

#[test]
fn eval_strings() {
    assert_eq!(eval_test(r#""monkey""#), Value::string("monkey"));
    assert_eq!(
        eval_test(r#""mon" + "key" + "banana""#),
        Value::string("monkeybanana")
    );
    assert_eq!(eval_test(r#""a" == "a""#), Value::Bool(true));
}

#[test]
fn eval_arrays_and_hashes() {
    assert_eq!(eval_test("[]"), ints(&[]));
    assert_eq!(eval_test("[1 + 2, 3 * 4, 5 + 6]"), ints(&[3, 12, 11]));
    assert_eq!(eval_test("{}"), Value::hash([]));
    assert_eq!(
        eval_test("{1 + 1: 2 * 2, 3 + 3: 4 * 4}"),
        Value::hash([
            (HashKey::Int(2), Value::Int(4)),
            (HashKey::Int(6), Value::Int(16)),
        ])
    );
}

#[test]
fn eval_index_expressions() {
    let cases = [
        ("[1, 2, 3][1]", Value::Int(2)),
        ("[[1, 1, 1]][0][0]", Value::Int(1)),
        ("[][0]", Value::Null),
        ("[1, 2, 3][99]", Value::Null),
        ("[1][-1]", Value::Null),
        ("{1: 1, 2: 2}[1]", Value::Int(1)),
        ("{1: 1}[0]", Value::Null),
        ("{}[0]", Value::Null),
    ];
    for (source, expected) in cases {
        assert_eq!(eval_test(source), expected, "{source}");
    }
}

#[test]
fn eval_function_calls() {
    let cases = [
        ("let f = fn() { 5 + 10; }; f();", Value::Int(15)),
        (
            "let one = fn() { 1; }; let two = fn() { 2; }; one() + two()",
            Value::Int(3),
        ),
        (
            "let a = fn() { 1 }; let b = fn() { a() + 1 }; let c = fn() { b() + 1 }; c();",
            Value::Int(3),
        ),
        ("let earlyExit = fn() { return 99; 100; }; earlyExit();", Value::Int(99)),
        ("let noReturn = fn() { }; noReturn();", Value::Null),
        (
            "let returnsOne = fn() { 1; }; let returner = fn() { returnsOne; }; returner()();",
            Value::Int(1),
        ),
    ];
    for (source, expected) in cases {
        assert_eq!(eval_test(source), expected, "{source}");
    }
}

#[test]
fn eval_locals_and_arguments() {
    assert_eq!(
        eval_test("let oneAndTwo = fn() { let one = 1; let two = 2; one + two; }; oneAndTwo();"),
        Value::Int(3)
    );
    assert_eq!(
        eval_test(
            "let seed = 50; \
             let minusOne = fn() { let num = 1; seed - num; }; \
             let minusTwo = fn() { let num = 2; seed - num; }; \
             minusOne() + minusTwo();"
        ),
        Value::Int(97)
    );
    assert_eq!(
        eval_test("let sum = fn(a, b) { let c = a + b; c; }; sum(1, 2) + sum(3, 4);"),
        Value::Int(10)
    );
}

#[test]
fn wrong_argument_count_is_fatal() {
    let error = eval_err("fn() { 1; }(1);");
    assert!(error.is_fatal());
    assert_eq!(error.to_string(), "wrong number of arguments: want=0, got=1");

    let error = eval_err("fn(a, b) { a + b; }(1);");
    assert!(matches!(
        error.kind,
        ErrorKind::ArityMismatch {
            expected: 2,
            actual: 1
        }
    ));
}

#[test]
fn eval_builtins() {
    let cases = [
        (r#"len("")"#, Value::Int(0)),
        (r#"len("four")"#, Value::Int(4)),
        ("len([1, 2, 3])", Value::Int(3)),
        ("len(1)", Value::error("argument to \"len\" not supported, got Integer")),
        (
            r#"len("one", "two")"#,
            Value::error("wrong number of arguments. got=2, want=1"),
        ),
        (r#"puts("hello", "world!")"#, Value::Null),
        ("first([1, 2, 3])", Value::Int(1)),
        ("first([])", Value::Null),
        ("first(1)", Value::error("argument to \"first\" must be Array, got Integer")),
        ("last([1, 2, 3])", Value::Int(3)),
        ("rest([1, 2, 3])", ints(&[2, 3])),
        ("rest([])", Value::Null),
        ("push([], 1)", ints(&[1])),
        ("push(1, 1)", Value::error("argument to \"push\" must be Array, got Integer")),
    ];
    for (source, expected) in cases {
        assert_eq!(eval_test(source), expected, "{source}");
    }
}

#[test]
fn puts_output_is_captured() {
    let bytecode = crate::compiler::compile(r#"puts("hello"); puts(1, [2]);"#).unwrap();
    let mut vm = Vm::new(bytecode, Builtins::standard());
    vm.run().unwrap();
    assert_eq!(vm.output(), ["hello", "1", "[2]"]);
    assert_eq!(vm.take_output().len(), 3);
    assert!(vm.output().is_empty());
}

#[test]
fn eval_closures() {
    let cases = [
        (
            "let newClosure = fn(a) { fn() { a; }; }; let closure = newClosure(99); closure();",
            99,
        ),
        (
            "let newAdder = fn(a, b) { fn(c) { a + b + c }; }; let adder = newAdder(1, 2); adder(8);",
            11,
        ),
        (
            "let newAdderOuter = fn(a, b) { let c = a + b; fn(d) { let e = d + c; fn(f) { e + f; }; }; }; \
             let newAdderInner = newAdderOuter(1, 2); let adder = newAdderInner(3); adder(8);",
            14,
        ),
        (
            "let a = 1; let newAdderOuter = fn(b) { fn(c) { fn(d) { a + b + c + d }; }; }; \
             let newAdderInner = newAdderOuter(2); let adder = newAdderInner(3); adder(8);",
            14,
        ),
        (
            "let newClosure = fn(a, b) { let one = fn() { a; }; let two = fn() { b; }; fn() { one() + two(); }; }; \
             let closure = newClosure(9, 90); closure();",
            99,
        ),
    ];
    for (source, expected) in cases {
        assert_eq!(eval_test(source), Value::Int(expected), "{source}");
    }
}

#[test]
fn eval_recursive_functions() {
    let count_down = "let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };";
    assert_eq!(eval_test(&format!("{count_down} countDown(1);")), Value::Int(0));
    assert_eq!(
        eval_test(&format!("{count_down} let wrapper = fn() {{ countDown(1); }}; wrapper();")),
        Value::Int(0)
    );
    assert_eq!(
        eval_test(
            "let wrapper = fn() { \
               let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } }; \
               countDown(1); \
             }; wrapper();"
        ),
        Value::Int(0)
    );
}

#[test]
fn eval_recursive_fibonacci() {
    let source = "let fibonacci = fn(x) { \
                    if (x == 0) { return 0; } \
                    if (x == 1) { return 1; } \
                    fibonacci(x - 1) + fibonacci(x - 2); \
                  }; fibonacci(15);";
    assert_eq!(eval_test(source), Value::Int(610));
}

#[test]
fn runtime_errors_are_values() {
    let cases = [
        ("1 + true", "type mismatch: Integer + Boolean"),
        ("true + false", "unknown operator: Boolean + Boolean"),
        ("-true", "unknown operator: -Boolean"),
        ("5 / 0", "division by zero"),
        (r#""a" - "b""#, "unknown operator: String - String"),
        ("{[1]: 2}", "unusable as hash key: Array"),
        ("{1: 2}[[]]", "unusable as hash key: Array"),
        ("1[0]", "index operator not supported: Integer"),
        ("let e = 1 + true; e + 5", "type mismatch: Integer + Boolean"),
        ("let e = 1 + true; -e", "type mismatch: Integer + Boolean"),
    ];
    for (source, message) in cases {
        assert_eq!(eval_test(source), Value::error(message), "{source}");
    }
}

#[test]
fn each_operator_opcode_applies_its_own_operator() {
    let mismatch = |op: &str| Value::error(format!("type mismatch: Integer {op} Boolean"));
    let cases = [
        (Opcode::Add, mismatch("+")),
        (Opcode::Sub, mismatch("-")),
        (Opcode::Mul, mismatch("*")),
        (Opcode::Div, mismatch("/")),
        (Opcode::Equal, Value::Bool(false)),
        (Opcode::NotEqual, Value::Bool(true)),
        (Opcode::GreaterThan, mismatch(">")),
    ];
    for (opcode, expected) in cases {
        let vm = run_raw(
            vec![
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(opcode, &[]),
                make(Opcode::Pop, &[]),
            ],
            vec![Value::Int(1), Value::Bool(true)],
        )
        .unwrap();
        assert_eq!(vm.last_popped(), expected, "{opcode:?}");
    }

    for (opcode, operator) in [(Opcode::Minus, "-"), (Opcode::Bang, "!")] {
        let vm = run_raw(
            vec![make(Opcode::Constant, &[0]), make(opcode, &[]), make(Opcode::Pop, &[])],
            vec![Value::string("s")],
        )
        .unwrap();
        let expected = if operator == "!" {
            Value::Bool(false)
        } else {
            Value::error("unknown operator: -String")
        };
        assert_eq!(vm.last_popped(), expected);
    }
}

#[test]
fn equality_uses_identity_for_collections() {
    assert_eq!(eval_test("let a = [1]; a == a"), Value::Bool(true));
    assert_eq!(eval_test("[1] == [1]"), Value::Bool(false));
    assert_eq!(eval_test("{} != {}"), Value::Bool(true));
    assert_eq!(eval_test("let f = fn() { 1 }; f == f"), Value::Bool(true));
}

#[test]
fn integer_overflow_wraps() {
    assert_eq!(
        eval_test("9223372036854775807 + 1"),
        Value::Int(i64::MIN)
    );
}

#[test]
fn top_level_return_ends_the_run() {
    assert_eq!(eval_test("return 5; 10;"), Value::Int(5));
    assert_eq!(eval_test("if (true) { return 1; } 2;"), Value::Int(1));
}

#[test]
fn stack_is_balanced_after_statements() {
    let bytecode = crate::compiler::compile("1; 2; let x = fn(a) { a }; x(3);").unwrap();
    let mut vm = Vm::new(bytecode, Builtins::standard());
    vm.run().unwrap();
    assert_eq!(vm.stack_top(), None);
    assert_eq!(vm.last_popped(), Value::Int(3));
}

#[test]
fn unbounded_recursion_overflows_frames() {
    let error = eval_err("let f = fn() { f() }; f();");
    assert!(error.is_fatal());
    assert!(matches!(
        error.kind,
        ErrorKind::StackOverflow(Overflow::Frames { limit: 1024 })
    ));
}

#[test]
fn operand_stack_is_bounded() {
    let bytecode = crate::compiler::compile("[1, 2, 3, 4, 5]").unwrap();
    let config = VmConfig::default().with_stack_size(4);
    let mut vm = Vm::with_globals(bytecode, Builtins::standard(), Vec::new(), config);
    let error = vm.run().unwrap_err();
    assert!(matches!(
        error.kind,
        ErrorKind::StackOverflow(Overflow::Operand { limit: 4 })
    ));
}

#[test]
fn globals_persist_between_runs() {
    let builtins = Builtins::standard();
    let mut compiler = Compiler::new(&builtins);
    compiler.compile(&parse("let x = 5;").unwrap()).unwrap();
    let mut vm = Vm::new(compiler.bytecode(), builtins.clone());
    vm.run().unwrap();
    let globals = vm.into_globals();

    let (table, constants) = compiler.into_state();
    let mut compiler = Compiler::with_state(table, constants);
    compiler.compile(&parse("x * 2").unwrap()).unwrap();
    let mut vm = Vm::with_globals(compiler.into_bytecode(), builtins, globals, VmConfig::default());
    vm.run().unwrap();
    assert_eq!(vm.last_popped(), Value::Int(10));
}

#[test]
fn calling_a_non_function_is_fatal() {
    let error = eval_err("let x = 1; x(2);");
    assert!(error.is_fatal());
    assert!(matches!(
        error.kind,
        ErrorKind::NotCallable(ObjectType::Integer)
    ));
    assert_eq!(error.to_string(), "calling non-function: Integer");
}

#[test]
fn unknown_opcode_is_fatal() {
    let error = run_raw(vec![vec![250]], Vec::new()).unwrap_err();
    assert!(error.is_fatal());
    assert!(matches!(error.kind, ErrorKind::UnknownOpcode(250)));
}

#[test]
fn truncated_operand_is_fatal() {
    let error = run_raw(vec![vec![Opcode::Constant as u8, 0]], vec![Value::Int(1)]).unwrap_err();
    assert!(matches!(
        error.kind,
        ErrorKind::MalformedInstruction { offset: 0 }
    ));
}

#[test]
fn missing_constant_is_fatal() {
    let error = run_raw(vec![make(Opcode::Constant, &[3])], Vec::new()).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::InvalidConstant { index: 3 }));
}

#[test]
fn free_variable_count_must_match() {
    let function = CompiledFunction {
        instructions: [make(Opcode::GetFree, &[0]), make(Opcode::ReturnValue, &[])]
            .into_iter()
            .collect(),
        num_free: 1,
        ..CompiledFunction::default()
    };
    let error = run_raw(
        vec![make(Opcode::Closure, &[0, 0])],
        vec![Value::CompiledFunction(Rc::new(function))],
    )
    .unwrap_err();
    assert!(error.is_fatal());
    assert!(matches!(
        error.kind,
        ErrorKind::FreeVariableMismatch {
            expected: 1,
            actual: 0
        }
    ));
}

#[test]
fn pop_on_empty_stack_underflows() {
    let error = run_raw(vec![make(Opcode::Pop, &[])], Vec::new()).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::StackUnderflow));
}
