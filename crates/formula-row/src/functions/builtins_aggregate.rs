use crate::artifact::EvalContext;
use crate::error::EvalError;
use crate::functions::{number_set_arg, text_set_arg};
use crate::functions::{IntrinsicKind, IntrinsicRegistry, NativeSignature, Volatility};
use crate::types::NativeType;
use crate::value::Value;

pub(super) fn register(registry: &mut IntrinsicRegistry) {
    let numbers = || vec![NativeType::vec(NativeType::F64)];

    registry.define(NativeSignature {
        name: "OrderedAscending",
        params: numbers(),
        returns: NativeType::Bool,
        volatility: Volatility::NonVolatile,
        kind: IntrinsicKind::Direct(ordered_ascending_fn),
    });
    registry.define(NativeSignature {
        name: "Sum",
        params: numbers(),
        returns: NativeType::F64,
        volatility: Volatility::NonVolatile,
        kind: IntrinsicKind::Direct(sum_fn),
    });
    registry.define(NativeSignature {
        name: "Avg",
        params: numbers(),
        returns: NativeType::F64,
        volatility: Volatility::NonVolatile,
        kind: IntrinsicKind::Direct(avg_fn),
    });
    registry.define(NativeSignature {
        name: "Concat",
        params: vec![NativeType::vec(NativeType::String)],
        returns: NativeType::String,
        volatility: Volatility::NonVolatile,
        kind: IntrinsicKind::Direct(concat_fn),
    });
}

/// Non-decreasing: equal neighbours are still in order.
fn ordered_ascending_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let values = number_set_arg("OrderedAscending", args, 0)?;
    Ok(Value::Bool(values.windows(2).all(|w| !(w[1] < w[0]))))
}

fn sum_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let values = number_set_arg("Sum", args, 0)?;
    Ok(Value::Number(values.iter().sum()))
}

fn avg_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let values = number_set_arg("Avg", args, 0)?;
    if values.is_empty() {
        return Err(EvalError::EmptyAggregate { function: "Avg" });
    }
    let total: f64 = values.iter().sum();
    Ok(Value::Number(total / values.len() as f64))
}

fn concat_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let parts = text_set_arg("Concat", args, 0)?;
    Ok(Value::Text(parts.concat()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Vec<Value> {
        vec![Value::from(values.to_vec())]
    }

    #[test]
    fn ordered_ascending_allows_ties() {
        let ctx = EvalContext::default();
        assert_eq!(
            ordered_ascending_fn(&ctx, &numbers(&[4.0, 6.0, 8.0])),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            ordered_ascending_fn(&ctx, &numbers(&[4.0, 9.0, 8.0])),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            ordered_ascending_fn(&ctx, &numbers(&[2.0, 2.0])),
            Ok(Value::Bool(true))
        );
        assert_eq!(ordered_ascending_fn(&ctx, &numbers(&[])), Ok(Value::Bool(true)));
    }

    #[test]
    fn sum_and_avg() {
        let ctx = EvalContext::default();
        assert_eq!(sum_fn(&ctx, &numbers(&[1.0, 2.5])), Ok(Value::Number(3.5)));
        assert_eq!(sum_fn(&ctx, &numbers(&[])), Ok(Value::Number(0.0)));
        assert_eq!(avg_fn(&ctx, &numbers(&[1.0, 2.0])), Ok(Value::Number(1.5)));
        assert_eq!(
            avg_fn(&ctx, &numbers(&[])),
            Err(EvalError::EmptyAggregate { function: "Avg" })
        );
    }

    #[test]
    fn concat_has_no_separator() {
        let ctx = EvalContext::default();
        let args = vec![Value::from(vec!["ab", "", "c"])];
        assert_eq!(concat_fn(&ctx, &args), Ok(Value::Text("abc".into())));
    }

    #[test]
    fn wrong_element_kind_is_reported() {
        let ctx = EvalContext::default();
        let args = vec![Value::from(vec!["x"])];
        assert!(matches!(
            sum_fn(&ctx, &args),
            Err(EvalError::ArgumentMismatch { function: "Sum", index: 0, .. })
        ));
    }
}
