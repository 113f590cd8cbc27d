#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Row-level formula compiler.
//!
//! Formulas are small typed expressions over the properties of a data row: literals, dotted
//! property names, homogeneous sets, calls to built-in intrinsics and single-parameter lambdas
//! passed to higher-order intrinsics:
//!
//! ```text
//! OrderedAscending([4, 6, 8])
//! Diff(order.shipped, order.placed)
//! Filter(scores, s => OrderedAscending([50, s]))
//! ```
//!
//! [`Compiler`] tokenizes the text, resolves every identifier against the [`Schema`] and the
//! [`IntrinsicRegistry`], picks intrinsic overloads by arity and argument type, and lowers the
//! result to stack bytecode. Higher-order intrinsics expand at compile time: a lambda never exists
//! at run time, its body is inlined into a loop. The resulting [`CompiledFormula`] is immutable
//! and can be invoked concurrently against any [`DataRow`].
//!
//! ```
//! use formula_row::{Compiler, EvalContext, IntrinsicRegistry, Row, Schema, Value};
//!
//! let registry = IntrinsicRegistry::builtin();
//! let formula = Compiler::new(&registry)
//!     .compile("Sum([1, 2, 3.5])", &Schema::new())
//!     .unwrap();
//! let value = formula.invoke(&EvalContext::default(), &Row::new()).unwrap();
//! assert_eq!(value, Value::Number(6.5));
//! ```

pub mod artifact;
pub mod bytecode;
pub mod cli;
pub mod compiler;
pub mod cursor;
pub mod error;
pub mod functions;
pub mod lexer;
pub mod options;
pub mod schema;
pub mod types;
pub mod value;

pub use artifact::{CompiledFormula, EvalContext};
pub use compiler::{Compiler, TypedExpression, Variable};
pub use cursor::TokenCursor;
pub use error::{
    CompileError, CompileErrorKind, CompileResult, EvalError, LexError, SyntaxError, TypeError,
};
pub use functions::{
    DirectImpl, IntrinsicKind, IntrinsicRegistry, IntrinsicSpec, LoweringImpl, NativeSignature,
    Volatility,
};
pub use lexer::{tokenize, Span, Token, TokenKind};
pub use options::CompileOptions;
pub use schema::{DataRow, Row, Schema, SchemaProperty};
pub use types::{BaseType, DataType, NativeType};
pub use value::Value;
