//! Integration tests for the compiler
//!
//! Tests the shape of compiled programs: constant pools, function metadata,
//! and error reporting.

use monkey_foundation::ErrorKind;
use monkey_language::{
    Builtins, Compiler, Instructions, Opcode, Value, compile, lookup, make, parse, read_operands,
};

fn functions(constants: &[Value]) -> Vec<&monkey_language::CompiledFunction> {
    constants
        .iter()
        .filter_map(|c| match c {
            Value::CompiledFunction(f) => Some(f.as_ref()),
            _ => None,
        })
        .collect()
}

/// Decodes an instruction stream into opcodes and operands.
fn decode(instructions: &Instructions) -> Vec<(String, Vec<usize>)> {
    let bytes = instructions.as_bytes();
    let mut decoded = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let def = lookup(bytes[i]).unwrap();
        let (operands, read) = read_operands(&def, &bytes[i + 1..]).unwrap();
        decoded.push((def.name.to_string(), operands));
        i += 1 + read;
    }
    decoded
}

// =============================================================================
// Functions and closures
// =============================================================================

#[test]
fn function_metadata_is_recorded() {
    let bytecode = compile(
        "
        let outer = fn(a, b) {
            let c = a + b;
            fn(d) { a + c + d }
        };
        ",
    )
    .unwrap();

    let functions = functions(&bytecode.constants);
    assert_eq!(functions.len(), 2);

    let inner = functions[0];
    assert_eq!(inner.num_parameters, 1);
    assert_eq!(inner.num_locals, 1);
    assert_eq!(inner.num_free, 2);

    let outer = functions[1];
    assert_eq!(outer.num_parameters, 2);
    assert_eq!(outer.num_locals, 3);
    assert_eq!(outer.num_free, 0);
    assert_eq!(outer.name.as_deref(), Some("outer"));
}

#[test]
fn closures_load_free_variables_before_the_closure() {
    let bytecode = compile("fn(a) { fn(b) { a + b } }").unwrap();
    let outer = functions(&bytecode.constants)[1];
    assert_eq!(
        decode(&outer.instructions),
        [
            ("OpGetLocal".to_string(), vec![0]),
            ("OpClosure".to_string(), vec![0, 1]),
            ("OpReturnValue".to_string(), vec![]),
        ]
    );
}

#[test]
fn every_instruction_stream_decodes_cleanly() {
    let bytecode = compile(
        r#"
        let map = fn(arr, f) {
            let iter = fn(arr, acc) {
                if (len(arr) == 0) { acc } else { iter(rest(arr), push(acc, f(first(arr)))) }
            };
            iter(arr, []);
        };
        let h = {"a": 1, true: [1, 2], 3: fn(x) { x }};
        map([1, 2, 3], fn(x) { x * 2 })[h[3](0)];
        "#,
    )
    .unwrap();

    assert!(!decode(&bytecode.instructions).is_empty());
    for function in functions(&bytecode.constants) {
        let decoded = decode(&function.instructions);
        let last = decoded.last().map(|(name, _)| name.as_str());
        assert!(
            matches!(last, Some("OpReturnValue" | "OpReturn")),
            "function ends with {last:?}"
        );
    }
}

#[test]
fn builtins_resolve_at_any_depth() {
    let bytecode = compile("fn() { fn() { len([]) } }").unwrap();
    let innermost = functions(&bytecode.constants)[0];
    assert_eq!(
        decode(&innermost.instructions)[0],
        ("OpGetBuiltin".to_string(), vec![0])
    );
}

// =============================================================================
// Incremental compilation
// =============================================================================

#[test]
fn state_carries_over_between_programs() {
    let builtins = Builtins::standard();
    let mut compiler = Compiler::new(&builtins);
    compiler.compile(&parse("let a = 1; let b = 2;").unwrap()).unwrap();
    let (symbols, constants) = compiler.into_state();

    let mut compiler = Compiler::with_state(symbols, constants);
    compiler.compile(&parse("let c = a + b;").unwrap()).unwrap();
    let bytecode = compiler.into_bytecode();

    assert_eq!(bytecode.num_globals, 3);
    assert_eq!(bytecode.constants, [Value::Int(1), Value::Int(2)]);
    let expected: Instructions = [
        make(Opcode::GetGlobal, &[0]),
        make(Opcode::GetGlobal, &[1]),
        make(Opcode::Add, &[]),
        make(Opcode::SetGlobal, &[2]),
    ]
    .into_iter()
    .collect();
    assert_eq!(bytecode.instructions, expected);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn all_undefined_names_are_reported() {
    let error = compile("let a = b;\nlet c = fn() { d };\nlet e = 1;\ne;").unwrap_err();
    let errors = error.into_errors();
    assert_eq!(errors.len(), 2);
    assert!(matches!(&errors[0].kind, ErrorKind::UndefinedVariable(name) if name == "b"));
    assert!(matches!(&errors[1].kind, ErrorKind::UndefinedVariable(name) if name == "d"));
}

#[test]
fn compile_errors_are_not_fatal_vm_errors() {
    let error = compile("x").unwrap_err();
    assert!(!error.is_fatal());
}

#[test]
fn too_many_call_arguments() {
    let arguments = vec!["1"; 256].join(", ");
    let error = compile(&format!("len({arguments})")).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::LimitExceeded { .. }));
}
