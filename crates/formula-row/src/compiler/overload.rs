//! Overload resolution: speculative compilation of a call against each candidate signature.

use crate::bytecode::{Assembler, FuncSlot, Instruction};
use crate::error::{CompileError, CompileResult, SyntaxError, TypeError};
use crate::functions::{IntrinsicKind, IntrinsicSpec};
use crate::lexer::{Span, TokenKind};
use crate::types::DataType;

use super::state::{CachedArgument, CompilationState};
use super::TypedExpression;

/// Why a candidate was rejected.
enum Rejection {
    /// Arguments parsed, but their count or types do not fit the signature.
    Mismatch(Vec<DataType>),
    /// The call could not be compiled under this candidate at all.
    Failed(CompileError),
}

impl From<CompileError> for Rejection {
    fn from(err: CompileError) -> Self {
        Rejection::Failed(err)
    }
}

impl From<SyntaxError> for Rejection {
    fn from(err: SyntaxError) -> Self {
        Rejection::Failed(err.into())
    }
}

impl CompilationState<'_> {
    /// Try every overload of `name` in registration order; the first that compiles and type-checks
    /// wins. The cursor and program tables are rewound after each rejected candidate.
    ///
    /// Only the last candidate is always parsed to the closing paren, so that a failed call can
    /// report every argument type. Earlier ones stop at their first mismatched argument.
    pub(super) fn resolve_call(
        &mut self,
        name: &str,
        span: Span,
    ) -> CompileResult<TypedExpression> {
        let registry = self.registry;
        let candidates = registry.lookup(name);
        let mut last = None;
        for (i, spec) in candidates.iter().enumerate() {
            let exhaustive = i + 1 == candidates.len();
            let checkpoint = self.program.checkpoint();
            self.cursor.save_state();
            match self.try_compile_candidate(spec, exhaustive) {
                Ok(expr) => {
                    self.cursor.discard_state();
                    return Ok(expr);
                }
                Err(rejection) => {
                    self.cursor.restore_state();
                    self.program.rollback(checkpoint);
                    match &rejection {
                        Rejection::Mismatch(arguments) => log::trace!(
                            "{name} at {span}: candidate {spec} rejected for ({})",
                            display_types(arguments)
                        ),
                        Rejection::Failed(err) => {
                            log::trace!("{name} at {span}: candidate {spec} failed: {err}")
                        }
                    }
                    last = Some(rejection);
                }
            }
        }

        match last {
            Some(Rejection::Failed(err)) => Err(err),
            Some(Rejection::Mismatch(arguments)) => Err(TypeError::NoMatchingOverload {
                name: name.to_string(),
                arguments,
            }
            .into()),
            None => Err(TypeError::UnresolvedIdentifier {
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn try_compile_candidate(
        &mut self,
        spec: &IntrinsicSpec,
        exhaustive: bool,
    ) -> Result<TypedExpression, Rejection> {
        self.cursor.expect(TokenKind::OpenParen)?;
        let args = self.argument_list(spec, exhaustive)?;

        let arguments: Vec<DataType> = args.iter().map(|a| a.data_type.clone()).collect();
        let fits = args.len() == spec.params.len()
            && spec
                .params
                .iter()
                .zip(&arguments)
                .all(|(param, arg)| param.is_compatible(arg));
        if !fits {
            return Err(Rejection::Mismatch(arguments));
        }

        match spec.kind {
            IntrinsicKind::Direct(implementation) => {
                let argc = args.len();
                let mut asm = Assembler::with_capacity(
                    args.iter().map(|a| a.code.len()).sum::<usize>() + 1,
                );
                for arg in args {
                    if !arg.bound_variables.is_empty() {
                        return Err(Rejection::Mismatch(arguments));
                    }
                    asm.splice(arg.code);
                }
                let func = self.program.add_func(FuncSlot {
                    name: spec.name,
                    volatility: spec.volatility,
                    implementation,
                });
                asm.emit(Instruction::call(func, argc));
                Ok(TypedExpression::new(asm.finish(), spec.return_type.clone()))
            }
            IntrinsicKind::HigherOrder(lower) => Ok(lower(spec, args)?),
        }
    }

    /// Arguments up to and including the closing paren. Each argument is compiled with the
    /// candidate's parameter type as its hint. Unless `exhaustive`, stops with a mismatch at the
    /// first argument that cannot fit `spec`.
    fn argument_list(
        &mut self,
        spec: &IntrinsicSpec,
        exhaustive: bool,
    ) -> Result<Vec<TypedExpression>, Rejection> {
        let mut args = Vec::with_capacity(spec.params.len());
        if self.cursor.peek_kind() == Some(TokenKind::CloseParen) {
            self.cursor.take();
            return Ok(args);
        }
        loop {
            if args.len() >= self.options.max_arguments {
                return Err(SyntaxError::TooManyArguments {
                    name: spec.name.to_string(),
                    limit: self.options.max_arguments,
                }
                .into());
            }
            let param = spec.params.get(args.len());
            let arg = self.argument(param)?;
            let fits = param.is_some_and(|p| p.is_compatible(&arg.data_type));
            args.push(arg);
            if !fits && !exhaustive {
                return Err(Rejection::Mismatch(
                    args.iter().map(|a| a.data_type.clone()).collect(),
                ));
            }
            match self.cursor.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.cursor.take();
                }
                Some(TokenKind::CloseParen) => {
                    self.cursor.take();
                    return Ok(args);
                }
                _ => return Err(self.unexpected(TokenKind::CloseParen).into()),
            }
        }
    }

    /// Compile one argument against `param`.
    ///
    /// Only a lambda depends on its hint, and a lambda only compiles against a function type.
    /// Any other argument compiles the same under every candidate, so it is compiled once per
    /// start position and table state, and replayed for later candidates.
    fn argument(&mut self, param: Option<&DataType>) -> CompileResult<TypedExpression> {
        if param.is_some_and(DataType::is_function) {
            return self.resolve_term(param);
        }

        let key = (self.cursor.position(), self.program.checkpoint());
        if let Some(cached) = self.arguments.get(&key) {
            self.program.replay(&cached.tables);
            self.cursor.seek(cached.resume);
            return Ok(cached.expr.clone());
        }

        let expr = self.resolve_term(param)?;
        let cached = CachedArgument {
            expr: expr.clone(),
            resume: self.cursor.position(),
            tables: self.program.entries_since(key.1),
        };
        self.arguments.insert(key, cached);
        Ok(expr)
    }
}

fn display_types(types: &[DataType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
