//! Static types of formula terms.
//!
//! A [`DataType`] is either a scalar (optionally lifted to a set) or a function type. Types are
//! only ever compared with [`DataType::is_compatible`]; there is no ordering and no implicit
//! widening between bases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Unknown,
    String,
    Number,
    Date,
    Bool,
}

impl BaseType {
    pub fn name(self) -> &'static str {
        match self {
            BaseType::Unknown => "unknown",
            BaseType::String => "string",
            BaseType::Number => "number",
            BaseType::Date => "date",
            BaseType::Bool => "bool",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Scalar { base: BaseType, is_set: bool },
    Function {
        parameters: Vec<DataType>,
        return_type: Box<DataType>,
    },
}

impl DataType {
    pub const NUMBER: DataType = DataType::scalar(BaseType::Number);
    pub const STRING: DataType = DataType::scalar(BaseType::String);
    pub const DATE: DataType = DataType::scalar(BaseType::Date);
    pub const BOOL: DataType = DataType::scalar(BaseType::Bool);

    pub const fn scalar(base: BaseType) -> Self {
        DataType::Scalar {
            base,
            is_set: false,
        }
    }

    pub const fn set(base: BaseType) -> Self {
        DataType::Scalar { base, is_set: true }
    }

    pub fn function(parameters: Vec<DataType>, return_type: DataType) -> Self {
        DataType::Function {
            parameters,
            return_type: Box::new(return_type),
        }
    }

    /// Base of a scalar or set type; `None` for function types.
    pub fn base(&self) -> Option<BaseType> {
        match self {
            DataType::Scalar { base, .. } => Some(*base),
            DataType::Function { .. } => None,
        }
    }

    /// Whether a scalar type is a set; `None` for function types.
    pub fn is_set(&self) -> Option<bool> {
        match self {
            DataType::Scalar { is_set, .. } => Some(*is_set),
            DataType::Function { .. } => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, DataType::Function { .. })
    }

    /// The set type whose elements are `self`. Sets do not nest and functions cannot be
    /// collected, so both yield `None`.
    pub fn to_set(&self) -> Option<DataType> {
        match self {
            DataType::Scalar {
                base,
                is_set: false,
            } => Some(DataType::set(*base)),
            _ => None,
        }
    }

    /// Element type of a set type.
    pub fn element(&self) -> Option<DataType> {
        match self {
            DataType::Scalar { base, is_set: true } => Some(DataType::scalar(*base)),
            _ => None,
        }
    }

    /// Structural compatibility: scalars match on base and set-ness, functions match
    /// parameter-wise and on their return type.
    pub fn is_compatible(&self, other: &DataType) -> bool {
        match (self, other) {
            (
                DataType::Scalar { base, is_set },
                DataType::Scalar {
                    base: other_base,
                    is_set: other_is_set,
                },
            ) => base == other_base && is_set == other_is_set,
            (
                DataType::Function {
                    parameters,
                    return_type,
                },
                DataType::Function {
                    parameters: other_parameters,
                    return_type: other_return,
                },
            ) => {
                parameters.len() == other_parameters.len()
                    && parameters
                        .iter()
                        .zip(other_parameters)
                        .all(|(a, b)| a.is_compatible(b))
                    && return_type.is_compatible(other_return)
            }
            _ => false,
        }
    }

    /// Map a Rust-side shape onto a formula type.
    pub fn from_native(native: &NativeType) -> Result<DataType, TypeError> {
        match native {
            NativeType::F64 => Ok(DataType::NUMBER),
            NativeType::String => Ok(DataType::STRING),
            NativeType::Bool => Ok(DataType::BOOL),
            NativeType::DateTime => Ok(DataType::DATE),
            NativeType::Vec(inner) => DataType::from_native(inner)?.to_set().ok_or_else(|| {
                TypeError::UnsupportedNativeType {
                    shape: native.to_string(),
                }
            }),
            NativeType::Fn(parameters, ret) => Ok(DataType::function(
                parameters
                    .iter()
                    .map(DataType::from_native)
                    .collect::<Result<_, _>>()?,
                DataType::from_native(ret)?,
            )),
        }
    }

    /// The Rust-side shape a value of this type takes.
    pub fn to_native(&self) -> NativeType {
        match self {
            DataType::Scalar { base, is_set } => {
                let scalar = match base {
                    BaseType::Number => NativeType::F64,
                    BaseType::String => NativeType::String,
                    BaseType::Bool => NativeType::Bool,
                    BaseType::Date => NativeType::DateTime,
                    // No native counterpart; render as the dynamic value type.
                    BaseType::Unknown => NativeType::String,
                };
                if *is_set {
                    NativeType::vec(scalar)
                } else {
                    scalar
                }
            }
            DataType::Function {
                parameters,
                return_type,
            } => NativeType::Fn(
                parameters.iter().map(DataType::to_native).collect(),
                Box::new(return_type.to_native()),
            ),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Scalar {
                base,
                is_set: false,
            } => write!(f, "{base}"),
            DataType::Scalar { base, is_set: true } => write!(f, "set<{base}>"),
            DataType::Function {
                parameters,
                return_type,
            } => {
                f.write_str("(")?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") => {return_type}")
            }
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    /// Parse a scalar or set type name: `number`, `string`, `date`, `bool`, or `set<...>` of one
    /// of those. Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        if let Some(inner) = lower
            .strip_prefix("set<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            let element: DataType = inner.parse()?;
            return element
                .to_set()
                .ok_or_else(|| format!("sets cannot nest: {s:?}"));
        }
        let base = match lower.as_str() {
            "number" => BaseType::Number,
            "string" | "text" => BaseType::String,
            "date" => BaseType::Date,
            "bool" | "boolean" => BaseType::Bool,
            _ => return Err(format!("unknown type name {s:?}")),
        };
        Ok(DataType::scalar(base))
    }
}

impl Serialize for DataType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rust-side shape of an intrinsic parameter, return value or row column.
///
/// Intrinsic signatures are declared in these terms and converted with
/// [`DataType::from_native`] when they are registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeType {
    F64,
    String,
    Bool,
    DateTime,
    Vec(Box<NativeType>),
    Fn(Vec<NativeType>, Box<NativeType>),
}

impl NativeType {
    pub fn vec(inner: NativeType) -> Self {
        NativeType::Vec(Box::new(inner))
    }

    pub fn func(parameters: Vec<NativeType>, ret: NativeType) -> Self {
        NativeType::Fn(parameters, Box::new(ret))
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::F64 => f.write_str("f64"),
            NativeType::String => f.write_str("String"),
            NativeType::Bool => f.write_str("bool"),
            NativeType::DateTime => f.write_str("DateTime<Utc>"),
            NativeType::Vec(inner) => write!(f, "Vec<{inner}>"),
            NativeType::Fn(parameters, ret) => {
                f.write_str("fn(")?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}
