use crate::artifact::EvalContext;
use crate::error::EvalError;
use crate::functions::bool_set_arg;
use crate::functions::{IntrinsicKind, IntrinsicRegistry, NativeSignature, Volatility};
use crate::types::NativeType;
use crate::value::Value;

pub(super) fn register(registry: &mut IntrinsicRegistry) {
    let folds: [(&'static str, fn(&EvalContext, &[Value]) -> Result<Value, EvalError>); 3] =
        [("Any", any_fn), ("All", all_fn), ("None", none_fn)];
    for (name, implementation) in folds {
        registry.define(NativeSignature {
            name,
            params: vec![NativeType::vec(NativeType::Bool)],
            returns: NativeType::Bool,
            volatility: Volatility::NonVolatile,
            kind: IntrinsicKind::Direct(implementation),
        });
    }
}

fn any_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let flags = bool_set_arg("Any", args, 0)?;
    Ok(Value::Bool(flags.into_iter().any(|b| b)))
}

fn all_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let flags = bool_set_arg("All", args, 0)?;
    Ok(Value::Bool(flags.into_iter().all(|b| b)))
}

fn none_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let flags = bool_set_arg("None", args, 0)?;
    Ok(Value::Bool(!flags.into_iter().any(|b| b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(values: &[bool]) -> Vec<Value> {
        vec![Value::from(values.to_vec())]
    }

    #[test]
    fn folds_follow_boolean_identities() {
        let ctx = EvalContext::default();
        assert_eq!(all_fn(&ctx, &flags(&[true, false])), Ok(Value::Bool(false)));
        assert_eq!(all_fn(&ctx, &flags(&[true, true])), Ok(Value::Bool(true)));
        assert_eq!(any_fn(&ctx, &flags(&[true, false])), Ok(Value::Bool(true)));
        assert_eq!(none_fn(&ctx, &flags(&[false, false])), Ok(Value::Bool(true)));
        assert_eq!(none_fn(&ctx, &flags(&[false, true])), Ok(Value::Bool(false)));
    }

    #[test]
    fn empty_sets() {
        let ctx = EvalContext::default();
        assert_eq!(any_fn(&ctx, &flags(&[])), Ok(Value::Bool(false)));
        assert_eq!(all_fn(&ctx, &flags(&[])), Ok(Value::Bool(true)));
        assert_eq!(none_fn(&ctx, &flags(&[])), Ok(Value::Bool(true)));
    }
}
