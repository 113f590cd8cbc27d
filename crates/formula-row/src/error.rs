use crate::lexer::{Span, TokenKind};
use crate::types::DataType;

pub type CompileResult<T> = Result<T, CompileError>;

/// Failure while turning source text into tokens.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal at {span}: {text}")]
    UnterminatedString { span: Span, text: String },
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SyntaxError {
    #[error("expected {expected}, found {found} at {span}")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
        span: Span,
    },

    #[error("expected {expected}, found end of input")]
    UnexpectedEnd { expected: String },

    #[error("expected a term, found {found} at {span}")]
    ExpectedTerm { found: TokenKind, span: Span },

    #[error("invalid numeric literal {text:?} at {span}")]
    InvalidNumber { text: String, span: Span },

    #[error("unexpected input after formula at {span}")]
    TrailingInput { span: Span },

    #[error("formula nesting exceeds the limit of {limit}")]
    NestingTooDeep { limit: usize },

    #[error("call to {name} has more than {limit} arguments")]
    TooManyArguments { name: String, limit: usize },
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("unresolved identifier: {name}")]
    UnresolvedIdentifier { name: String },

    #[error("no overload of {name} accepts ({})", join_types(.arguments))]
    NoMatchingOverload {
        name: String,
        arguments: Vec<DataType>,
    },

    #[error("set elements must share one type: expected {expected}, found {found}")]
    IncompatibleSetElement { expected: DataType, found: DataType },

    #[error("sets cannot contain sets (found element of type {found})")]
    NestedSet { found: DataType },

    #[error("lambda parameter {parameter} used where {}", describe_expected(.expected))]
    UnexpectedLambda {
        parameter: String,
        expected: Option<DataType>,
    },

    #[error("native type {shape} has no formula equivalent")]
    UnsupportedNativeType { shape: String },

    #[error("intrinsic {name} lowering received malformed arguments: {reason}")]
    MalformedLowering { name: &'static str, reason: String },
}

/// Classification of a [`CompileError`], following the lexical/syntax/type taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileErrorKind {
    Lexical,
    Syntax,
    Type,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("lexical error: {0}")]
    Lexical(#[from] LexError),

    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),
}

impl CompileError {
    pub fn kind(&self) -> CompileErrorKind {
        match self {
            CompileError::Lexical(_) => CompileErrorKind::Lexical,
            CompileError::Syntax(_) => CompileErrorKind::Syntax,
            CompileError::Type(_) => CompileErrorKind::Type,
        }
    }
}

/// Failure while invoking a compiled formula against a row.
///
/// These are contract violations at the row or intrinsic boundary; they abort the single
/// invocation and are never retried.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("row has no value for property {name}")]
    MissingProperty { name: String },

    #[error("property {name} is declared as {expected} but the row holds {found}")]
    PropertyTypeMismatch {
        name: String,
        expected: DataType,
        found: String,
    },

    #[error("{function} expected {expected} for argument {index}, got {found}")]
    ArgumentMismatch {
        function: &'static str,
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("{function} of an empty set is undefined")]
    EmptyAggregate { function: &'static str },

    #[error("malformed program: {0}")]
    Program(String),
}

fn join_types(types: &[DataType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_expected(expected: &Option<DataType>) -> String {
    match expected {
        Some(ty) => format!("{ty} was expected"),
        None => "no function type was expected".to_string(),
    }
}
