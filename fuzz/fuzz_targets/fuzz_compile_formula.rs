#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;

use formula_row::{
    tokenize, BaseType, Compiler, DataType, IntrinsicRegistry, Schema,
};

const MAX_FORMULA_CHARS: usize = 512;
const MAX_INPUT_BYTES: usize = MAX_FORMULA_CHARS * 4; // max UTF-8 bytes per char

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

fn schema() -> Schema {
    Schema::new()
        .with_property("n", DataType::NUMBER)
        .with_property("s", DataType::STRING)
        .with_property("d", DataType::DATE)
        .with_property("b", DataType::BOOL)
        .with_property("a.xs", DataType::set(BaseType::Number))
        .with_property("a.ds", DataType::set(BaseType::Date))
}

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };
    let input = String::from_utf8_lossy(data);
    let formula = truncate_to_chars(&input, MAX_FORMULA_CHARS);

    let Ok(tokens) = tokenize(formula) else {
        return;
    };
    let mut offset = 0;
    for token in &tokens {
        assert_eq!(token.span.start, offset, "tokens must be contiguous");
        offset = token.span.end();
    }
    assert_eq!(offset, formula.len(), "tokens must cover the input");

    let compiler = Compiler::new(registry());
    if let Ok(compiled) = compiler.compile_tokens(formula, &tokens, &schema()) {
        // Disassembly must render every emitted instruction.
        let listing = compiled.program().to_string();
        assert_eq!(listing.lines().count(), compiled.program().instrs().len());
    }
});
