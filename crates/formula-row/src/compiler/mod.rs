//! Recursive-descent compiler.
//!
//! Parsing, type inference, overload resolution and lowering happen in one pass: every term is
//! resolved straight into a [`TypedExpression`] whose code fragment is spliced into its parent.
//! There is no intermediate syntax tree.

use std::sync::Arc;

use crate::artifact::CompiledFormula;
use crate::bytecode::{Instruction, Program};
use crate::error::{CompileResult, SyntaxError};
use crate::functions::IntrinsicRegistry;
use crate::lexer::{tokenize, Token};
use crate::options::CompileOptions;
use crate::schema::Schema;
use crate::types::DataType;

mod overload;
mod state;

use state::CompilationState;

/// A lambda parameter bound while its body is compiled. At run time it is the local `slot`.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub slot: u32,
    pub name: Arc<str>,
    pub data_type: DataType,
}

/// A compiled term: its code fragment and static type.
///
/// `bound_variables` is non-empty only for a lambda, where it carries the parameter the enclosing
/// higher-order lowering must bind on each iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedExpression {
    pub code: Vec<Instruction>,
    pub data_type: DataType,
    pub bound_variables: Vec<Variable>,
}

impl TypedExpression {
    pub fn new(code: Vec<Instruction>, data_type: DataType) -> Self {
        Self {
            code,
            data_type,
            bound_variables: Vec::new(),
        }
    }

    /// A lambda over `parameter`.
    pub fn lambda(code: Vec<Instruction>, parameter: Variable, return_type: DataType) -> Self {
        let data_type = DataType::function(vec![parameter.data_type.clone()], return_type);
        Self {
            code,
            data_type,
            bound_variables: vec![parameter],
        }
    }
}

/// Compiles formula text against a schema using an intrinsic registry.
///
/// Holds only shared, read-only state; one `Compiler` can be used from many threads.
#[derive(Clone, Copy, Debug)]
pub struct Compiler<'r> {
    registry: &'r IntrinsicRegistry,
    options: CompileOptions,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r IntrinsicRegistry) -> Self {
        Self {
            registry,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn registry(&self) -> &'r IntrinsicRegistry {
        self.registry
    }

    pub fn compile(&self, text: &str, schema: &Schema) -> CompileResult<CompiledFormula> {
        let tokens = tokenize(text)?;
        self.compile_tokens(text, &tokens, schema)
    }

    /// Compile an already tokenized formula. `tokens` must be the tokenization of `text`.
    pub fn compile_tokens(
        &self,
        text: &str,
        tokens: &[Token],
        schema: &Schema,
    ) -> CompileResult<CompiledFormula> {
        let program = Program::new(Arc::from(text));
        let mut state = CompilationState::new(
            text,
            tokens,
            schema,
            self.registry,
            self.options,
            program,
        );
        let expr = state.resolve_term(None)?;
        if let Some(token) = state.cursor.peek() {
            return Err(SyntaxError::TrailingInput { span: token.span }.into());
        }
        debug_assert!(
            expr.bound_variables.is_empty(),
            "a lambda cannot be compiled without an expected function type"
        );

        let mut program = state.into_program();
        program.instrs = expr.code;
        log::debug!(
            "compiled {text:?}: {} ({} instructions)",
            expr.data_type,
            program.instrs.len()
        );
        Ok(CompiledFormula::new(program, expr.data_type))
    }
}
