//! Schema types for record frames.
//!
//! Schemas are a closed list of column kinds. Each kind has its own vector
//! backed column representation (see [`crate::frame::Column`]), chosen when a
//! frame is constructed, so row copies never dispatch on a dynamic type.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The kind of a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    Bool,
    Int32,
    Int64,
    UInt64,
    Float64,
    Utf8,
    Binary,
}

impl ColumnType {
    /// Whether values of this kind can be hashed to pick a shard.
    ///
    /// Floating point values have no total equality and cannot serve as
    /// partitioning keys.
    pub fn is_hashable(&self) -> bool {
        !matches!(self, ColumnType::Float64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Bool => "bool",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::UInt64 => "uint64",
            ColumnType::Float64 => "float64",
            ColumnType::Utf8 => "utf8",
            ColumnType::Binary => "binary",
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered list of column kinds. The first `prefix` columns form the key
/// that rows are partitioned and ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnType>,
    prefix: usize,
}

impl Schema {
    /// Create a schema keyed by its first column.
    pub fn new(columns: Vec<ColumnType>) -> Self {
        let prefix = columns.len().min(1);
        Self { columns, prefix }
    }

    /// Set the number of leading key columns.
    pub fn with_prefix(mut self, prefix: usize) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn columns(&self) -> &[ColumnType] {
        &self.columns
    }

    pub fn column(&self, i: usize) -> ColumnType {
        self.columns[i]
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn prefix(&self) -> usize {
        self.prefix
    }

    /// The key columns of this schema.
    pub fn key_columns(&self) -> &[ColumnType] {
        &self.columns[..self.prefix.min(self.columns.len())]
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, typ) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", typ)?;
        }
        write!(f, ")")
    }
}

/// Check that rows of `schema` can be repartitioned by key.
///
/// Returns a description of the problem when they cannot.
pub fn check_combinable(schema: &Schema) -> Result<(), String> {
    if schema.prefix() == 0 {
        return Err(format!("schema {} has no key columns", schema));
    }
    if schema.prefix() > schema.len() {
        return Err(format!(
            "schema {} declares {} key columns but has only {} columns",
            schema,
            schema.prefix(),
            schema.len()
        ));
    }
    for (i, typ) in schema.key_columns().iter().enumerate() {
        if !typ.is_hashable() {
            return Err(format!(
                "key column {} of schema {} has type {}, which cannot be hashed",
                i, schema, typ
            ));
        }
    }
    Ok(())
}

/// A single dynamically typed cell. Only used at API edges; bulk copies go
/// column to column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Bool(_) => ColumnType::Bool,
            Value::Int32(_) => ColumnType::Int32,
            Value::Int64(_) => ColumnType::Int64,
            Value::UInt64(_) => ColumnType::UInt64,
            Value::Float64(_) => ColumnType::Float64,
            Value::Utf8(_) => ColumnType::Utf8,
            Value::Binary(_) => ColumnType::Binary,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}
