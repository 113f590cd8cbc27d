use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bytecode::{Program, Vm};
use crate::error::EvalError;
use crate::schema::DataRow;
use crate::types::DataType;
use crate::value::Value;

/// Per-invocation runtime context.
///
/// `now_utc` pins the clock seen by `Now()`. When it is `None` every call reads the wall clock,
/// so formulas calling `Now()` are volatile: two invocations may disagree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalContext {
    pub now_utc: Option<DateTime<Utc>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose clock is frozen at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now_utc: Some(now) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now_utc.unwrap_or_else(Utc::now)
    }
}

/// A compiled formula, ready to be invoked against rows.
///
/// Immutable once built; clones share the program. Invocation allocates its own VM, so one
/// `CompiledFormula` can be invoked from many threads at once.
#[derive(Clone, Debug)]
pub struct CompiledFormula {
    program: Arc<Program>,
    data_type: DataType,
}

impl CompiledFormula {
    pub(crate) fn new(program: Program, data_type: DataType) -> Self {
        Self {
            program: Arc::new(program),
            data_type,
        }
    }

    /// Static type of the formula's result.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn source(&self) -> &str {
        self.program.source()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Whether the formula calls an intrinsic whose result can change between invocations.
    pub fn is_volatile(&self) -> bool {
        self.program.is_volatile()
    }

    pub fn invoke(&self, ctx: &EvalContext, row: &dyn DataRow) -> Result<Value, EvalError> {
        let mut vm = Vm::with_capacity(16);
        vm.eval(&self.program, ctx, row)
    }
}
