use std::collections::HashMap;
use std::sync::Arc;

use crate::bytecode::{Assembler, Checkpoint, Instruction, Program, TableDelta};
use crate::cursor::TokenCursor;
use crate::error::{CompileError, CompileResult, SyntaxError, TypeError};
use crate::functions::IntrinsicRegistry;
use crate::lexer::{Span, Token, TokenKind};
use crate::options::CompileOptions;
use crate::schema::Schema;
use crate::types::DataType;
use crate::value::Value;

use super::{TypedExpression, Variable};

const DOTTED_NAME: &[TokenKind] = &[TokenKind::Identifier, TokenKind::DotOperator];

/// Everything one `compile` call threads through the descent. Private to that call.
pub(crate) struct CompilationState<'a> {
    pub(super) source: &'a str,
    pub(super) cursor: TokenCursor<'a>,
    pub(super) schema: &'a Schema,
    pub(super) registry: &'a IntrinsicRegistry,
    pub(super) options: CompileOptions,
    pub(super) program: Program,
    /// Arguments already compiled by an earlier overload candidate, keyed by where they start.
    pub(super) arguments: HashMap<(usize, Checkpoint), CachedArgument>,
    scopes: Vec<HashMap<String, Variable>>,
    depth: usize,
}

/// A compiled argument together with everything needed to reuse it: the cursor position after
/// it and the table entries it added.
pub(super) struct CachedArgument {
    pub(super) expr: TypedExpression,
    pub(super) resume: usize,
    pub(super) tables: TableDelta,
}

impl<'a> CompilationState<'a> {
    pub(super) fn new(
        source: &'a str,
        tokens: &'a [Token],
        schema: &'a Schema,
        registry: &'a IntrinsicRegistry,
        options: CompileOptions,
        program: Program,
    ) -> Self {
        Self {
            source,
            cursor: TokenCursor::new(tokens),
            schema,
            registry,
            options,
            program,
            arguments: HashMap::new(),
            scopes: Vec::new(),
            depth: 0,
        }
    }

    pub(super) fn into_program(self) -> Program {
        self.program
    }

    /// Compile the next term. `expected` is a hint, consulted only by lambdas, which need to know
    /// the function type they are compiled against.
    pub(crate) fn resolve_term(
        &mut self,
        expected: Option<&DataType>,
    ) -> CompileResult<TypedExpression> {
        if self.depth >= self.options.max_depth {
            return Err(SyntaxError::NestingTooDeep {
                limit: self.options.max_depth,
            }
            .into());
        }
        self.depth += 1;
        let result = self.resolve_term_inner(expected);
        self.depth -= 1;
        result
    }

    fn resolve_term_inner(
        &mut self,
        expected: Option<&DataType>,
    ) -> CompileResult<TypedExpression> {
        let Some(token) = self.cursor.peek() else {
            return Err(SyntaxError::UnexpectedEnd {
                expected: "a term".to_string(),
            }
            .into());
        };
        match token.kind {
            TokenKind::Identifier => self.resolve_identifier(expected),
            TokenKind::OpenBracket => self.resolve_set(expected),
            TokenKind::NumericLiteral => {
                self.cursor.take();
                let text = token.text(self.source);
                let n: f64 = text.parse().map_err(|_| SyntaxError::InvalidNumber {
                    text: text.to_string(),
                    span: token.span,
                })?;
                Ok(self.constant(Value::Number(n), DataType::NUMBER))
            }
            TokenKind::StringLiteral => {
                self.cursor.take();
                let text = token.text(self.source);
                let inner = text
                    .strip_prefix('\'')
                    .and_then(|t| t.strip_suffix('\''))
                    .unwrap_or_default();
                Ok(self.constant(Value::Text(inner.to_string()), DataType::STRING))
            }
            TokenKind::TrueLiteral | TokenKind::FalseLiteral => {
                self.cursor.take();
                let b = token.kind == TokenKind::TrueLiteral;
                Ok(self.constant(Value::Bool(b), DataType::BOOL))
            }
            found => Err(SyntaxError::ExpectedTerm {
                found,
                span: token.span,
            }
            .into()),
        }
    }

    fn constant(&mut self, value: Value, data_type: DataType) -> TypedExpression {
        let idx = self.program.add_const(value);
        TypedExpression::new(vec![Instruction::push_const(idx)], data_type)
    }

    /// Error for a missing `expected` token at the current position.
    pub(super) fn unexpected(&self, expected: TokenKind) -> CompileError {
        match self.cursor.peek() {
            Some(token) => SyntaxError::UnexpectedToken {
                expected,
                found: token.kind,
                span: token.span,
            },
            None => SyntaxError::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
        .into()
    }

    /// Consume `Identifier (DotOperator Identifier)*` and flatten it to one dotted name.
    fn dotted_name(&mut self) -> CompileResult<(String, Span)> {
        let source = self.source;
        let mut name = String::new();
        let mut span: Option<Span> = None;
        let mut want = TokenKind::Identifier;
        for token in self.cursor.take_while(DOTTED_NAME) {
            if token.kind != want {
                return Err(SyntaxError::UnexpectedToken {
                    expected: want,
                    found: token.kind,
                    span: token.span,
                }
                .into());
            }
            name.push_str(token.text(source));
            span = Some(match span {
                Some(s) => Span::new(s.start, token.span.end() - s.start),
                None => token.span,
            });
            want = match want {
                TokenKind::Identifier => TokenKind::DotOperator,
                _ => TokenKind::Identifier,
            };
        }
        match span {
            Some(span) if want == TokenKind::DotOperator => Ok((name, span)),
            _ => Err(self.unexpected(TokenKind::Identifier)),
        }
    }

    fn resolve_identifier(
        &mut self,
        expected: Option<&DataType>,
    ) -> CompileResult<TypedExpression> {
        let (name, span) = self.dotted_name()?;

        if let Some(variable) = self.lookup_variable(&name) {
            return Ok(TypedExpression::new(
                vec![Instruction::load_local(variable.slot)],
                variable.data_type.clone(),
            ));
        }

        if self.registry.contains(&name) {
            return self.resolve_call(&name, span);
        }

        if self.cursor.peek_kind() == Some(TokenKind::LambdaOperator) {
            return self.resolve_lambda(name, expected);
        }

        match self.schema.lookup(&name) {
            Some(property) => {
                let slot = self
                    .program
                    .add_property(&property.name, &property.data_type);
                Ok(TypedExpression::new(
                    vec![Instruction::load_property(slot)],
                    property.data_type.clone(),
                ))
            }
            None => Err(TypeError::UnresolvedIdentifier { name }.into()),
        }
    }

    fn lookup_variable(&self, name: &str) -> Option<&Variable> {
        let key = name.to_ascii_uppercase();
        self.scopes.iter().rev().find_map(|scope| scope.get(&key))
    }

    /// `parameter => body`, compiled against the single-parameter function type `expected`.
    fn resolve_lambda(
        &mut self,
        parameter: String,
        expected: Option<&DataType>,
    ) -> CompileResult<TypedExpression> {
        let (parameter_type, return_type) = match expected {
            Some(DataType::Function {
                parameters,
                return_type,
            }) if parameters.len() == 1 => (parameters[0].clone(), return_type.as_ref()),
            _ => {
                return Err(TypeError::UnexpectedLambda {
                    parameter,
                    expected: expected.cloned(),
                }
                .into())
            }
        };
        self.cursor.expect(TokenKind::LambdaOperator)?;

        let name: Arc<str> = Arc::from(parameter.as_str());
        let variable = Variable {
            slot: self.program.alloc_local(name.clone()),
            name,
            data_type: parameter_type,
        };
        self.scopes.push(HashMap::from([(
            parameter.to_ascii_uppercase(),
            variable.clone(),
        )]));
        let body = self.resolve_term(Some(return_type));
        self.scopes.pop();
        let body = body?;
        if !body.bound_variables.is_empty() {
            return Err(TypeError::UnexpectedLambda {
                parameter: body.bound_variables[0].name.to_string(),
                expected: Some(return_type.clone()),
            }
            .into());
        }

        Ok(TypedExpression::lambda(body.code, variable, body.data_type))
    }

    /// `[e1, e2, ...]`: the first element fixes the element type.
    fn resolve_set(&mut self, expected: Option<&DataType>) -> CompileResult<TypedExpression> {
        self.cursor.expect(TokenKind::OpenBracket)?;
        let hint = expected.and_then(DataType::element);

        let first = self.resolve_term(hint.as_ref())?;
        let element_type = first.data_type.clone();
        let set_type = element_type
            .to_set()
            .ok_or_else(|| TypeError::NestedSet {
                found: element_type.clone(),
            })?;

        let mut asm = Assembler::with_capacity(first.code.len() + 2);
        asm.emit(Instruction::make_set(0))
            .splice(first.code)
            .emit(Instruction::append_set());

        loop {
            match self.cursor.peek_kind() {
                Some(TokenKind::Comma) => {
                    self.cursor.take();
                }
                Some(TokenKind::CloseBracket) => {
                    self.cursor.take();
                    break;
                }
                _ => return Err(self.unexpected(TokenKind::CloseBracket)),
            }
            let element = self.resolve_term(Some(&element_type))?;
            if !element.data_type.is_compatible(&element_type) {
                return Err(match element.data_type.is_set() {
                    Some(true) => TypeError::NestedSet {
                        found: element.data_type,
                    },
                    _ => TypeError::IncompatibleSetElement {
                        expected: element_type,
                        found: element.data_type,
                    },
                }
                .into());
            }
            asm.splice(element.code).emit(Instruction::append_set());
        }

        Ok(TypedExpression::new(asm.finish(), set_type))
    }
}
