//! Column flattening and field selection.
//!
//! A [`SchemaTree`] is built once per topic from the handle's schema. Field
//! selections resolve against it into an ordered set of leaves, and every
//! batch is then flattened by walking those leaf paths only.

use std::collections::HashMap;
use std::ops::Range;

use contracts::{Batch, ContractError, Field, FieldKind, Schema, TopicName, Value};
use serde_json::Map;

/// A flattened row: timestamp plus one cell per selected leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub timestamp_ns: u64,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
struct Leaf {
    path: String,
    segments: Vec<String>,
}

/// Resolved position of a dotted path in the tree
#[derive(Debug, Clone)]
enum Node {
    Leaf(usize),
    /// Contiguous run of leaf indices under a struct
    Group(Range<usize>),
}

/// Dotted-path index over a topic schema
///
/// Leaves are numbered in depth-first schema order, so every struct covers a
/// contiguous range of leaves.
#[derive(Debug, Clone, Default)]
pub struct SchemaTree {
    leaves: Vec<Leaf>,
    nodes: HashMap<String, Node>,
}

impl SchemaTree {
    pub fn build(schema: &Schema) -> Self {
        let mut tree = Self::default();
        tree.walk(&schema.fields, &mut Vec::new());
        tree
    }

    fn walk(&mut self, fields: &[Field], prefix: &mut Vec<String>) {
        for field in fields {
            prefix.push(field.name.clone());
            let path = prefix.join(".");
            match &field.kind {
                FieldKind::Leaf(_) => {
                    self.nodes.insert(path.clone(), Node::Leaf(self.leaves.len()));
                    self.leaves.push(Leaf {
                        path,
                        segments: prefix.clone(),
                    });
                }
                FieldKind::Struct(children) => {
                    let start = self.leaves.len();
                    self.walk(children, prefix);
                    self.nodes.insert(path, Node::Group(start..self.leaves.len()));
                }
            }
            prefix.pop();
        }
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Dotted leaf paths in schema order
    pub fn leaf_paths(&self) -> impl Iterator<Item = &str> {
        self.leaves.iter().map(|l| l.path.as_str())
    }

    /// Resolve requested fields into leaf indices, in schema order.
    ///
    /// An entry matching a leaf keeps that leaf; an entry matching a struct
    /// keeps all its leaf descendants. `None` or an empty list keeps
    /// everything.
    fn resolve(&self, topic: &TopicName, fields: Option<&[String]>) -> Result<Vec<usize>, ContractError> {
        let fields = match fields {
            Some(fields) if !fields.is_empty() => fields,
            _ => return Ok((0..self.leaves.len()).collect()),
        };

        let mut keep = vec![false; self.leaves.len()];
        for field in fields {
            match self.nodes.get(field.as_str()) {
                Some(Node::Leaf(idx)) => keep[*idx] = true,
                Some(Node::Group(range)) => keep[range.clone()].fill(true),
                None => return Err(ContractError::field_not_found(topic.as_str(), field.as_str())),
            }
        }

        Ok(keep
            .iter()
            .enumerate()
            .filter_map(|(idx, &k)| k.then_some(idx))
            .collect())
    }
}

/// Flattens one topic's batches into namespaced leaf columns
#[derive(Debug, Clone)]
pub struct ColumnFlattener {
    topic: TopicName,
    selected: Vec<Leaf>,
    column_names: Vec<String>,
}

impl ColumnFlattener {
    /// Build a flattener for `topic`, validating the field selection.
    ///
    /// # Errors
    /// [`ContractError::FieldNotFound`] naming the first unknown field.
    pub fn new(
        topic: TopicName,
        schema: &Schema,
        fields: Option<&[String]>,
    ) -> Result<Self, ContractError> {
        let tree = SchemaTree::build(schema);
        let selected: Vec<Leaf> = tree
            .resolve(&topic, fields)?
            .into_iter()
            .map(|idx| tree.leaves[idx].clone())
            .collect();
        let column_names = selected
            .iter()
            .map(|leaf| topic.column_name(&leaf.path))
            .collect();

        Ok(Self {
            topic,
            selected,
            column_names,
        })
    }

    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    /// Output column names (`"<topic>.<leaf-path>"`), in schema order
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Flatten a batch; cells missing from a payload become null.
    pub fn flatten(&self, batch: Batch) -> Vec<FlatRow> {
        batch
            .records
            .into_iter()
            .map(|mut record| FlatRow {
                timestamp_ns: record.timestamp_ns,
                values: self
                    .selected
                    .iter()
                    .map(|leaf| take_leaf(&mut record.payload, &leaf.segments))
                    .collect(),
            })
            .collect()
    }
}

/// Flatten `batch` of `topic` against `schema`, keeping `requested_fields`.
///
/// One-shot form of [`ColumnFlattener`]; the extractor keeps a flattener per
/// topic instead of resolving the selection for every batch.
pub fn flatten_and_select(
    batch: Batch,
    topic: &TopicName,
    schema: &Schema,
    requested_fields: Option<&[String]>,
) -> Result<(Vec<String>, Vec<FlatRow>), ContractError> {
    let flattener = ColumnFlattener::new(topic.clone(), schema, requested_fields)?;
    let rows = flattener.flatten(batch);
    Ok((flattener.column_names, rows))
}

// Leaf paths are distinct, so moving each value out never steals another leaf's cell.
fn take_leaf(payload: &mut Map<String, Value>, segments: &[String]) -> Value {
    let Some((last, parents)) = segments.split_last() else {
        return Value::Null;
    };
    let mut current = payload;
    for segment in parents {
        match current.get_mut(segment.as_str()) {
            Some(Value::Object(child)) => current = child,
            _ => return Value::Null,
        }
    }
    current.remove(last.as_str()).unwrap_or(Value::Null)
}
