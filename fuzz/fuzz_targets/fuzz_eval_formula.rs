#![no_main]

use std::sync::OnceLock;

use chrono::TimeZone;
use libfuzzer_sys::fuzz_target;

use formula_row::{
    BaseType, Compiler, DataType, EvalContext, EvalError, IntrinsicRegistry, Row,
    Schema,
};

const MAX_FORMULA_CHARS: usize = 256;
const MAX_INPUT_BYTES: usize = MAX_FORMULA_CHARS * 4;

fn truncate_to_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn registry() -> &'static IntrinsicRegistry {
    static REGISTRY: OnceLock<IntrinsicRegistry> = OnceLock::new();
    REGISTRY.get_or_init(IntrinsicRegistry::builtin)
}

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_FORMULA_CHARS);

    let schema = Schema::new()
        .with_property("n", DataType::NUMBER)
        .with_property("s", DataType::STRING)
        .with_property("d", DataType::DATE)
        .with_property("xs", DataType::set(BaseType::Number))
        .with_property("ss", DataType::set(BaseType::String));
    let now = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let row = Row::new()
        .with("n", 3.5)
        .with("s", "text")
        .with("d", now)
        .with("xs", vec![1.0, -2.0, 8.0])
        .with("ss", vec!["a", "b"]);

    let compiler = Compiler::new(registry());
    let Ok(compiled) = compiler.compile(formula, &schema) else {
        return;
    };

    match compiled.invoke(&EvalContext::at(now), &row) {
        Ok(value) => assert!(
            value.conforms_to(compiled.data_type()),
            "{formula:?} produced {value} for static type {}",
            compiled.data_type()
        ),
        // Well-typed programs never trip the VM's own consistency checks.
        Err(EvalError::Program(msg)) => panic!("{formula:?}: {msg}"),
        Err(_) => {}
    }
});
