use crate::bytecode::{Assembler, Instruction};
use crate::compiler::TypedExpression;
use crate::error::{CompileError, TypeError};
use crate::functions::{
    IntrinsicKind, IntrinsicRegistry, IntrinsicSpec, NativeSignature, Volatility,
};
use crate::types::NativeType;

pub(super) fn register(registry: &mut IntrinsicRegistry) {
    // Number first; the other element bases follow in a fixed order.
    for element in [
        NativeType::F64,
        NativeType::String,
        NativeType::DateTime,
        NativeType::Bool,
    ] {
        registry.define(NativeSignature {
            name: "Filter",
            params: vec![
                NativeType::vec(element.clone()),
                NativeType::func(vec![element.clone()], NativeType::Bool),
            ],
            returns: NativeType::vec(element),
            volatility: Volatility::NonVolatile,
            kind: IntrinsicKind::HigherOrder(lower_filter),
        });
    }
}

fn malformed(spec: &IntrinsicSpec, reason: &str) -> CompileError {
    TypeError::MalformedLowering {
        name: spec.name,
        reason: reason.to_string(),
    }
    .into()
}

/// `Filter(source, x => body)` becomes an inline loop:
///
/// ```text
/// make_set 0
/// <source>
/// iter_begin
/// iter_next x       ; else -> iter_end
/// <body>
/// jump_false +2
/// load_local x
/// append_set
/// jump_back         ; -> iter_next
/// iter_end
/// ```
fn lower_filter(
    spec: &IntrinsicSpec,
    args: Vec<TypedExpression>,
) -> Result<TypedExpression, CompileError> {
    let [source, predicate]: [TypedExpression; 2] = args
        .try_into()
        .map_err(|_| malformed(spec, "expected a source set and a predicate"))?;
    if !source.bound_variables.is_empty() {
        return Err(malformed(spec, "source set is a lambda"));
    }
    let variable = match predicate.bound_variables.as_slice() {
        [variable] => variable.slot,
        _ => return Err(malformed(spec, "predicate must bind exactly one variable")),
    };

    let mut body = predicate.code;
    body.push(Instruction::jump_if_false(2));
    body.push(Instruction::load_local(variable));
    body.push(Instruction::append_set());

    let mut asm = Assembler::with_capacity(source.code.len() + body.len() + 5);
    asm.emit(Instruction::make_set(0))
        .splice(source.code)
        .each_element(variable, body);
    Ok(TypedExpression::new(asm.finish(), spec.return_type.clone()))
}
