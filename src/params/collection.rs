use std::{fmt, mem};

use serde::{Deserialize, Serialize};

/// A single named entry of a `ParameterCollection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub values: Vec<f32>,
}

/// An ordered bundle of named values, used both for models and for gradients.
///
/// Cloning a collection is a deep copy, every snapshot handed across a task
/// boundary is independent of the one it was copied from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterCollection {
    entries: Vec<Entry>,
}

impl ParameterCollection {
    /// Creates a new empty `ParameterCollection`.
    ///
    /// # Returns
    /// A new `ParameterCollection` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder flavoured version of `insert`.
    ///
    /// # Arguments
    /// * `name` - The name of the entry.
    /// * `values` - The values of the entry.
    ///
    /// # Returns
    /// This same collection with the new entry.
    pub fn with(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.insert(name, values);
        self
    }

    /// Inserts a new entry, replacing the values of an existing entry with the same name.
    ///
    /// # Arguments
    /// * `name` - The name of the entry.
    /// * `values` - The values of the entry.
    ///
    /// # Returns
    /// The previous values of the entry if it was already present.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f32>) -> Option<Vec<f32>> {
        let name = name.into();

        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => Some(mem::replace(&mut entry.values, values)),
            None => {
                self.entries.push(Entry { name, values });
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.values.as_slice())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<f32>> {
        self.entries
            .iter_mut()
            .find(|entry| entry.name == name)
            .map(|entry| &mut entry.values)
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// The amount of entries in the collection.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The size of the values held by this collection.
    ///
    /// # Returns
    /// The amount of bytes occupied by all the values, names excluded.
    pub fn size_in_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.values.len() * mem::size_of::<f32>())
            .sum()
    }
}

impl fmt::Display for ParameterCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;

        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", entry.name, entry.values)?;
        }

        f.write_str("}")
    }
}

/// The kind of a value, as declared in a function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    List,
    Matrix,
    Scalar,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            DataKind::List => "list",
            DataKind::Matrix => "matrix",
            DataKind::Scalar => "scalar",
        };

        f.write_str(kind)
    }
}

/// A value produced by a registered function.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    List(ParameterCollection),
    Matrix(Vec<f32>),
    Scalar(f64),
}

impl Value {
    pub fn kind(&self) -> DataKind {
        match self {
            Value::List(_) => DataKind::List,
            Value::Matrix(_) => DataKind::Matrix,
            Value::Scalar(_) => DataKind::Scalar,
        }
    }
}

impl From<ParameterCollection> for Value {
    fn from(value: ParameterCollection) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_existing_entry() {
        let mut params = ParameterCollection::new().with("w", vec![1.0, 2.0]);

        let old = params.insert("w", vec![3.0]);
        assert_eq!(old, Some(vec![1.0, 2.0]));
        assert_eq!(params.get("w"), Some([3.0].as_slice()));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let params = ParameterCollection::new()
            .with("w2", vec![0.0])
            .with("b1", vec![0.0])
            .with("w1", vec![0.0]);

        let names: Vec<_> = params.names().collect();
        assert_eq!(names, ["w2", "b1", "w1"]);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = ParameterCollection::new().with("w", vec![1.0; 4]);
        let mut copy = original.clone();

        copy.get_mut("w").unwrap()[0] = 42.0;
        assert_eq!(original.get("w"), Some([1.0; 4].as_slice()));
    }

    #[test]
    fn test_size_in_bytes() {
        let params = ParameterCollection::new()
            .with("w", vec![0.0; 256])
            .with("b", vec![0.0; 4]);

        assert_eq!(params.size_in_bytes(), 260 * 4);
        assert_eq!(ParameterCollection::new().size_in_bytes(), 0);
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::from(ParameterCollection::new()).kind(), DataKind::List);
        assert_eq!(Value::Matrix(vec![]).kind(), DataKind::Matrix);
        assert_eq!(Value::Scalar(1.0).kind(), DataKind::Scalar);
    }
}
