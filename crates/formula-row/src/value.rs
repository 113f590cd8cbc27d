use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::types::{BaseType, DataType};

/// A runtime value. One variant per scalar base, plus a set wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Date(DateTime<Utc>),
    Set(Vec<Value>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Set(_) => "set",
        }
    }

    fn base(&self) -> Option<BaseType> {
        match self {
            Value::Number(_) => Some(BaseType::Number),
            Value::Text(_) => Some(BaseType::String),
            Value::Bool(_) => Some(BaseType::Bool),
            Value::Date(_) => Some(BaseType::Date),
            Value::Set(_) => None,
        }
    }

    /// Whether this value is a valid inhabitant of `ty`.
    ///
    /// This is the checked replacement for an unboxing cast at the row boundary: a set conforms
    /// when every element has the declared element base (so an empty set conforms to any set
    /// type). Function types have no runtime values.
    pub fn conforms_to(&self, ty: &DataType) -> bool {
        match (self, ty) {
            (Value::Set(items), DataType::Scalar { base, is_set: true }) => {
                items.iter().all(|item| item.base() == Some(*base))
            }
            (_, DataType::Scalar {
                base,
                is_set: false,
            }) => self.base() == Some(*base),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[Value]> {
        match self {
            Value::Set(items) => Some(items),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::Set(values.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Set(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::Text(s) => write!(f, "'{s}'")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_sets_conform_to_any_set_type() {
        let empty = Value::Set(Vec::new());
        assert!(empty.conforms_to(&DataType::set(BaseType::Number)));
        assert!(empty.conforms_to(&DataType::set(BaseType::String)));
        assert!(!empty.conforms_to(&DataType::NUMBER));
    }

    #[test]
    fn mixed_sets_do_not_conform() {
        let mixed = Value::Set(vec![Value::from(1.0), Value::from("a")]);
        assert!(!mixed.conforms_to(&DataType::set(BaseType::Number)));
    }

    #[test]
    fn display_quotes_text_inside_sets() {
        let v = Value::from(vec!["a", "b"]);
        assert_eq!(v.to_string(), "['a', 'b']");
        let d = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(Value::Date(d).to_string(), "2024-01-02T03:04:05Z");
    }
}
