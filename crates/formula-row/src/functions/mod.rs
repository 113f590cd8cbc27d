//! Intrinsic (built-in) function registry.
//!
//! The registry is an explicit value: [`IntrinsicRegistry::builtin`] builds the standard catalogue
//! once and the embedding application hands it to every [`Compiler`](crate::Compiler). After
//! construction it is only read, so one registry can back any number of concurrent compilations.
//!
//! Names are matched case-insensitively. One name may carry several overloads; the compiler tries
//! them in registration order and the first whose arity and argument types match wins, so the
//! order in which built-ins are defined below is part of the public contract.

use std::collections::HashMap;
use std::fmt;

use crate::artifact::EvalContext;
use crate::compiler::TypedExpression;
use crate::error::{CompileError, EvalError, TypeError};
use crate::types::{DataType, NativeType};
use crate::value::Value;

mod builtins_aggregate;
mod builtins_date_time;
mod builtins_higher_order;
mod builtins_logical;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
    NonVolatile,
    /// The result may differ between invocations with identical inputs (e.g. `Now()`).
    Volatile,
}

/// Run-time implementation: a pure function of already-evaluated, already-typed arguments.
pub type DirectImpl = fn(&EvalContext, &[Value]) -> Result<Value, EvalError>;

/// Compile-time implementation: receives the compiled arguments (a lambda argument still carries
/// its bound variable) and returns the lowered expression that replaces the call.
pub type LoweringImpl =
    fn(&IntrinsicSpec, Vec<TypedExpression>) -> Result<TypedExpression, CompileError>;

#[derive(Clone, Copy)]
pub enum IntrinsicKind {
    Direct(DirectImpl),
    HigherOrder(LoweringImpl),
}

impl fmt::Debug for IntrinsicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrinsicKind::Direct(_) => f.write_str("Direct"),
            IntrinsicKind::HigherOrder(_) => f.write_str("HigherOrder"),
        }
    }
}

/// An intrinsic declared with Rust-native parameter shapes, before registration.
#[derive(Debug, Clone)]
pub struct NativeSignature {
    pub name: &'static str,
    pub params: Vec<NativeType>,
    pub returns: NativeType,
    pub volatility: Volatility,
    pub kind: IntrinsicKind,
}

/// A registered overload.
#[derive(Debug, Clone)]
pub struct IntrinsicSpec {
    pub name: &'static str,
    pub params: Vec<DataType>,
    pub return_type: DataType,
    pub volatility: Volatility,
    pub kind: IntrinsicKind,
}

impl fmt::Display for IntrinsicSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IntrinsicRegistry {
    specs: Vec<IntrinsicSpec>,
    by_name: HashMap<String, Vec<usize>>,
}

impl IntrinsicRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard catalogue.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtins_aggregate::register(&mut registry);
        builtins_logical::register(&mut registry);
        builtins_date_time::register(&mut registry);
        builtins_higher_order::register(&mut registry);
        registry
    }

    /// Convert and register `sig` as the next overload of its name.
    pub fn try_define(&mut self, sig: NativeSignature) -> Result<(), TypeError> {
        let params = sig
            .params
            .iter()
            .map(DataType::from_native)
            .collect::<Result<Vec<_>, _>>()?;
        let return_type = DataType::from_native(&sig.returns)?;
        let idx = self.specs.len();
        self.specs.push(IntrinsicSpec {
            name: sig.name,
            params,
            return_type,
            volatility: sig.volatility,
            kind: sig.kind,
        });
        self.by_name
            .entry(sig.name.to_ascii_uppercase())
            .or_default()
            .push(idx);
        Ok(())
    }

    /// Register a built-in whose signature is known to be valid. Invalid signatures are logged and
    /// skipped.
    pub(crate) fn define(&mut self, sig: NativeSignature) {
        let name = sig.name;
        if let Err(err) = self.try_define(sig) {
            debug_assert!(false, "invalid built-in signature for {name}: {err}");
            log::error!("skipping built-in {name}: {err}");
        }
    }

    /// Overloads registered under `name`, in registration order. Empty if unknown.
    pub fn lookup(&self, name: &str) -> Vec<&IntrinsicSpec> {
        self.by_name
            .get(&name.to_ascii_uppercase())
            .map(|idxs| idxs.iter().map(|&i| &self.specs[i]).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_ascii_uppercase())
    }

    /// Every overload in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &IntrinsicSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn mismatch(
    function: &'static str,
    index: usize,
    expected: &'static str,
    found: &Value,
) -> EvalError {
    EvalError::ArgumentMismatch {
        function,
        index,
        expected,
        found: found.kind_name().to_string(),
    }
}

fn arg<'a>(
    function: &'static str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a Value, EvalError> {
    args.get(index).ok_or_else(|| EvalError::ArgumentMismatch {
        function,
        index,
        expected: "an argument",
        found: "nothing".to_string(),
    })
}

pub(crate) fn number_arg(
    function: &'static str,
    args: &[Value],
    index: usize,
) -> Result<f64, EvalError> {
    let v = arg(function, args, index)?;
    v.as_number()
        .ok_or_else(|| mismatch(function, index, "number", v))
}

pub(crate) fn date_arg(
    function: &'static str,
    args: &[Value],
    index: usize,
) -> Result<chrono::DateTime<chrono::Utc>, EvalError> {
    let v = arg(function, args, index)?;
    v.as_date().ok_or_else(|| mismatch(function, index, "date", v))
}

fn set_arg<'a>(
    function: &'static str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a [Value], EvalError> {
    let v = arg(function, args, index)?;
    v.as_set().ok_or_else(|| mismatch(function, index, "set", v))
}

pub(crate) fn number_set_arg(
    function: &'static str,
    args: &[Value],
    index: usize,
) -> Result<Vec<f64>, EvalError> {
    set_arg(function, args, index)?
        .iter()
        .map(|v| {
            v.as_number()
                .ok_or_else(|| mismatch(function, index, "set of number", v))
        })
        .collect()
}

pub(crate) fn bool_set_arg(
    function: &'static str,
    args: &[Value],
    index: usize,
) -> Result<Vec<bool>, EvalError> {
    set_arg(function, args, index)?
        .iter()
        .map(|v| {
            v.as_bool()
                .ok_or_else(|| mismatch(function, index, "set of bool", v))
        })
        .collect()
}

pub(crate) fn text_set_arg<'a>(
    function: &'static str,
    args: &'a [Value],
    index: usize,
) -> Result<Vec<&'a str>, EvalError> {
    set_arg(function, args, index)?
        .iter()
        .map(|v| {
            v.as_text()
                .ok_or_else(|| mismatch(function, index, "set of string", v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BaseType;

    #[test]
    fn lookup_is_case_insensitive_and_ordered() {
        let registry = IntrinsicRegistry::builtin();
        let diff = registry.lookup("dIfF");
        assert_eq!(diff.len(), 2);
        assert_eq!(diff[0].params, vec![DataType::NUMBER, DataType::NUMBER]);
        assert_eq!(diff[1].params, vec![DataType::DATE, DataType::DATE]);
        assert!(registry.lookup("Nope").is_empty());
    }

    #[test]
    fn builtin_catalogue_is_complete() {
        let registry = IntrinsicRegistry::builtin();
        for name in [
            "OrderedAscending",
            "Sum",
            "Avg",
            "Concat",
            "Any",
            "All",
            "None",
            "Diff",
            "Now",
            "Filter",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        // 7 single-overload aggregates, 2 Diff, Now, 4 Filter.
        assert_eq!(registry.len(), 14);
    }

    #[test]
    fn filter_is_a_lowering_over_numbers_first() {
        let registry = IntrinsicRegistry::builtin();
        let filter = registry.lookup("filter");
        assert!(matches!(filter[0].kind, IntrinsicKind::HigherOrder(_)));
        assert_eq!(
            filter[0].params,
            vec![
                DataType::set(BaseType::Number),
                DataType::function(vec![DataType::NUMBER], DataType::BOOL),
            ]
        );
        assert_eq!(filter[0].return_type, DataType::set(BaseType::Number));
    }

    #[test]
    fn invalid_native_shapes_are_rejected() {
        fn never(_: &EvalContext, _: &[Value]) -> Result<Value, EvalError> {
            Ok(Value::Bool(true))
        }
        let mut registry = IntrinsicRegistry::new();
        let err = registry
            .try_define(NativeSignature {
                name: "Nested",
                params: vec![NativeType::vec(NativeType::vec(NativeType::F64))],
                returns: NativeType::Bool,
                volatility: Volatility::NonVolatile,
                kind: IntrinsicKind::Direct(never),
            })
            .unwrap_err();
        assert!(matches!(err, TypeError::UnsupportedNativeType { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn only_now_is_volatile() {
        let registry = IntrinsicRegistry::builtin();
        let volatile: Vec<_> = registry
            .iter()
            .filter(|s| s.volatility == Volatility::Volatile)
            .map(|s| s.name)
            .collect();
        assert_eq!(volatile, vec!["Now"]);
    }
}
