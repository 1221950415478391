//! Topic payload schema
//!
//! A tree of named fields: leaves carry a data type, structs carry children.
//! Sources expose one schema per topic before any batch is pulled.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Leaf data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int64,
    UInt64,
    Float64,
    Utf8,
    List,
    /// Only nulls observed so far
    Null,
}

impl DataType {
    /// Widen two observed types into one that holds both.
    fn widen(self, other: DataType) -> DataType {
        use DataType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, t) | (t, Null) => t,
            (Int64, UInt64) | (UInt64, Int64) => Int64,
            (Float64, Int64 | UInt64) | (Int64 | UInt64, Float64) => Float64,
            _ => Utf8,
        }
    }

    fn of(value: &Value) -> DataType {
        match value {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Bool,
            Value::Number(n) if n.is_u64() => DataType::UInt64,
            Value::Number(n) if n.is_i64() => DataType::Int64,
            Value::Number(_) => DataType::Float64,
            Value::String(_) => DataType::Utf8,
            Value::Array(_) => DataType::List,
            // objects are structs, handled by the caller
            Value::Object(_) => DataType::Null,
        }
    }
}

/// Field kind: terminal leaf or nested struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Leaf(DataType),
    Struct(Vec<Field>),
}

/// Named schema field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn leaf(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Leaf(data_type),
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Struct(children),
        }
    }
}

/// Payload schema of a topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Infer a schema from a single JSON object payload.
    pub fn infer(payload: &Map<String, Value>) -> Self {
        Self {
            fields: infer_fields(payload),
        }
    }

    /// Merge another schema into this one.
    ///
    /// New fields are appended in first-seen order and leaf types widen. A
    /// field seen both as a leaf and as a struct keeps the struct shape; its
    /// scalar values flatten to null. Returns how many such conflicts were
    /// found, not counting leaves that only ever held null.
    pub fn merge(&mut self, other: &Schema) -> usize {
        merge_fields(&mut self.fields, &other.fields, "")
    }

    /// Dotted paths of every leaf, in schema order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_leaf_paths(&self.fields, "", &mut out);
        out
    }
}

fn infer_fields(payload: &Map<String, Value>) -> Vec<Field> {
    payload
        .iter()
        .map(|(name, value)| match value {
            Value::Object(children) => Field::group(name.clone(), infer_fields(children)),
            other => Field::leaf(name.clone(), DataType::of(other)),
        })
        .collect()
}

fn merge_fields(into: &mut Vec<Field>, from: &[Field], prefix: &str) -> usize {
    let mut conflicts = 0;
    for incoming in from {
        let Some(existing) = into.iter_mut().find(|f| f.name == incoming.name) else {
            into.push(incoming.clone());
            continue;
        };
        let path = if prefix.is_empty() {
            existing.name.clone()
        } else {
            format!("{prefix}.{}", existing.name)
        };
        match (&mut existing.kind, &incoming.kind) {
            (FieldKind::Leaf(a), FieldKind::Leaf(b)) => *a = a.widen(*b),
            (FieldKind::Struct(a), FieldKind::Struct(b)) => {
                conflicts += merge_fields(a, b, &path);
            }
            (FieldKind::Leaf(leaf), FieldKind::Struct(_)) => {
                if *leaf != DataType::Null {
                    conflicts += 1;
                    warn!(
                        field = %path,
                        data_type = ?leaf,
                        "field seen as both value and struct, its scalar values will be null"
                    );
                }
                existing.kind = incoming.kind.clone();
            }
            (FieldKind::Struct(_), FieldKind::Leaf(leaf)) => {
                if *leaf != DataType::Null {
                    conflicts += 1;
                    warn!(
                        field = %path,
                        data_type = ?leaf,
                        "field seen as both value and struct, its scalar values will be null"
                    );
                }
            }
        }
    }
    conflicts
}

fn collect_leaf_paths(fields: &[Field], prefix: &str, out: &mut Vec<String>) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        match &field.kind {
            FieldKind::Leaf(_) => out.push(path),
            FieldKind::Struct(children) => collect_leaf_paths(children, &path, out),
        }
    }
}
