//! Row-side collaborators: the schema the compiler resolves property identifiers against, and
//! the row a compiled formula reads at invocation time. Property names are matched
//! case-insensitively on both sides.

use std::collections::HashMap;

use crate::types::DataType;
use crate::value::Value;

fn fold_name(name: &str) -> String {
    name.to_ascii_uppercase()
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchemaProperty {
    pub name: String,
    pub data_type: DataType,
}

/// Ordered list of declared properties.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    properties: Vec<SchemaProperty>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.add_property(name, data_type);
        self
    }

    /// Declare a property. Redeclaring a name (in any casing) replaces its type.
    pub fn add_property(&mut self, name: impl Into<String>, data_type: DataType) {
        let name = name.into();
        let key = fold_name(&name);
        match self.by_name.get(&key) {
            Some(&idx) => {
                self.properties[idx] = SchemaProperty { name, data_type };
            }
            None => {
                self.by_name.insert(key, self.properties.len());
                self.properties.push(SchemaProperty { name, data_type });
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&SchemaProperty> {
        self.by_name
            .get(&fold_name(name))
            .map(|&idx| &self.properties[idx])
    }

    pub fn properties(&self) -> &[SchemaProperty] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
    }
}

/// A data row as seen by a compiled formula.
///
/// Implementations must resolve `name` case-insensitively. The row is only read during an
/// invocation and must not be mutated concurrently with one.
pub trait DataRow {
    fn get_property(&self, name: &str) -> Option<&Value>;
}

/// In-memory [`DataRow`] keyed by case-folded property name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(fold_name(name), value.into())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl DataRow for Row {
    fn get_property(&self, name: &str) -> Option<&Value> {
        self.values.get(&fold_name(name))
    }
}

impl DataRow for HashMap<String, Value> {
    fn get_property(&self, name: &str) -> Option<&Value> {
        self.get(name).or_else(|| {
            self.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BaseType;

    #[test]
    fn schema_lookup_ignores_case_and_keeps_declared_name() {
        let schema = Schema::new()
            .with_property("foo.Bar", DataType::NUMBER)
            .with_property("hireDate", DataType::DATE);
        let prop = schema.lookup("FOO.BAR").unwrap();
        assert_eq!(prop.name, "foo.Bar");
        assert_eq!(prop.data_type, DataType::NUMBER);
        assert!(schema.lookup("foo").is_none());
    }

    #[test]
    fn redeclaring_replaces_in_place() {
        let mut schema = Schema::new().with_property("a", DataType::NUMBER);
        schema.add_property("A", DataType::set(BaseType::Number));
        assert_eq!(schema.len(), 1);
        assert_eq!(
            schema.lookup("a").map(|p| &p.data_type),
            Some(&DataType::set(BaseType::Number))
        );
    }

    #[test]
    fn rows_ignore_case() {
        let row = Row::new().with("Foo.Bar", 42.0);
        assert_eq!(row.get_property("foo.bar"), Some(&Value::Number(42.0)));

        let mut map = HashMap::new();
        map.insert("Mixed".to_string(), Value::Bool(true));
        assert_eq!(map.get_property("MIXED"), Some(&Value::Bool(true)));
    }
}
