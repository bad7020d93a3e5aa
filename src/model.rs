//! Schema object model: namespaces, columns, tables, and programs.
//!
//! These are the immutable entities a loaded snapshot is assembled from.
//! Names compare case-insensitively throughout, matching the engine's
//! default identifier semantics. Entity equality is defined by
//! [`Differences`]: two entities are equal iff their difference set is
//! empty.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;

use crate::collation::Collation;
use crate::diff::{Delta, Differences};
use crate::types::NativeType;

/// A schema namespace (`dbo`, `sales`, ...).
#[derive(Debug, Clone, Serialize)]
pub struct SchemaNamespace {
    id: i32,
    name: String,
}

impl SchemaNamespace {
    /// Creates a namespace from its catalog id and name.
    #[must_use]
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The catalog id.
    #[must_use]
    pub const fn id(&self) -> i32 {
        self.id
    }

    /// The namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for SchemaNamespace {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for SchemaNamespace {}

impl Hash for SchemaNamespace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.to_lowercase().hash(state);
    }
}

impl std::fmt::Display for SchemaNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// What sort of tabular object a [`TabularDefinition`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TabularKind {
    /// A base table.
    Table,
    /// A view.
    View,
    /// A user-defined table type.
    TableType,
}

impl TabularKind {
    /// Maps the catalog kind code. Unknown codes read as base tables with
    /// a diagnostic.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Table,
            1 => Self::View,
            2 => Self::TableType,
            other => {
                tracing::debug!("unknown tabular kind code {other}, assuming base table");
                Self::Table
            }
        }
    }
}

impl std::fmt::Display for TabularKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single column of a tabular object.
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    /// Zero-based ordinal within the owning object.
    pub ordinal: i32,
    /// Column name.
    pub name: String,
    /// Declared native type, already refined to the column's size.
    pub native_type: Arc<NativeType>,
    /// Whether the column admits nulls.
    pub is_nullable: bool,
    /// The column's collation, for character columns that declare one.
    pub collation: Option<Arc<Collation>>,
}

impl Differences for Column {
    fn compute_differences(&self, other: &Self) -> Delta {
        let mut delta = Delta::between(&self.name, &other.name);
        delta.record(
            "name",
            "string",
            &self.name.to_lowercase(),
            &other.name.to_lowercase(),
        );
        delta.record("ordinal", "i32", &self.ordinal, &other.ordinal);
        delta.record(
            "type",
            "native type",
            &self.native_type,
            &other.native_type,
        );
        delta.record("is_nullable", "bool", &self.is_nullable, &other.is_nullable);
        let left_collation = self.collation.as_deref().map_or("", Collation::name);
        let right_collation = other.collation.as_deref().map_or("", Collation::name);
        delta.record(
            "collation",
            "string",
            &left_collation.to_lowercase(),
            &right_collation.to_lowercase(),
        );
        delta
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.compute_differences(other).is_empty()
    }
}

/// A table, view, or table type with its full column list.
#[derive(Debug, Clone, Serialize)]
pub struct TabularDefinition {
    /// Owning namespace.
    pub namespace: Arc<SchemaNamespace>,
    /// Object name.
    pub name: String,
    /// What sort of tabular object this is.
    pub kind: TabularKind,
    /// Columns in ordinal order, contiguous from zero.
    pub columns: Vec<Column>,
    /// For [`TabularKind::TableType`], the native type this definition
    /// describes.
    pub table_type: Option<Arc<NativeType>>,
}

impl TabularDefinition {
    /// The namespace-qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace.name(), self.name)
    }

    /// Finds a column by case-insensitive name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl Differences for TabularDefinition {
    fn compute_differences(&self, other: &Self) -> Delta {
        let mut delta = Delta::between(self.full_name(), other.full_name());
        delta.record(
            "name",
            "string",
            &self.name.to_lowercase(),
            &other.name.to_lowercase(),
        );
        delta.record(
            "schema",
            "string",
            &self.namespace.name().to_lowercase(),
            &other.namespace.name().to_lowercase(),
        );
        delta.record("kind", "tabular kind", &self.kind, &other.kind);
        delta.record(
            "column_count",
            "usize",
            &self.columns.len(),
            &other.columns.len(),
        );
        for (left, right) in self.columns.iter().zip(&other.columns) {
            let column_delta = left.compute_differences(right);
            delta.differences.extend(column_delta.differences);
        }
        delta
    }
}

impl PartialEq for TabularDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.compute_differences(other).is_empty()
    }
}

/// What sort of callable a [`ProgramDefinition`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ProgramKind {
    /// A stored procedure.
    Procedure,
    /// A scalar-valued function.
    ScalarFunction,
    /// A table-valued function.
    TableFunction,
}

impl ProgramKind {
    /// Maps the catalog kind code. Unknown codes read as procedures with
    /// a diagnostic.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Procedure,
            2 => Self::ScalarFunction,
            3 => Self::TableFunction,
            other => {
                tracing::debug!("unknown program kind code {other}, assuming procedure");
                Self::Procedure
            }
        }
    }
}

impl std::fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Direction of a program parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterDirection {
    /// Supplied by the caller.
    Input,
    /// Produced by the program.
    Output,
    /// Both supplied and produced.
    InputOutput,
    /// The program's return value.
    ReturnValue,
}

impl ParameterDirection {
    /// Maps the catalog direction code. Unknown codes read as input with
    /// a diagnostic.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Input,
            1 => Self::Output,
            2 => Self::InputOutput,
            3 => Self::ReturnValue,
            other => {
                tracing::debug!("unknown parameter direction code {other}, assuming input");
                Self::Input
            }
        }
    }
}

impl std::fmt::Display for ParameterDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One declared parameter of a program.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramParameter {
    /// Ordinal as the catalog reports it; contiguous per program.
    pub ordinal: i32,
    /// Parameter name, including any sigil the engine reports.
    pub name: String,
    /// Declared native type, already refined to the parameter's size.
    pub native_type: Arc<NativeType>,
    /// Direction of data flow.
    pub direction: ParameterDirection,
    /// True for read-only table-valued parameters.
    pub is_readonly: bool,
}

impl Differences for ProgramParameter {
    fn compute_differences(&self, other: &Self) -> Delta {
        let mut delta = Delta::between(&self.name, &other.name);
        delta.record(
            "name",
            "string",
            &self.name.to_lowercase(),
            &other.name.to_lowercase(),
        );
        delta.record("ordinal", "i32", &self.ordinal, &other.ordinal);
        delta.record(
            "type",
            "native type",
            &self.native_type,
            &other.native_type,
        );
        delta.record(
            "direction",
            "direction",
            &self.direction,
            &other.direction,
        );
        delta.record("is_readonly", "bool", &self.is_readonly, &other.is_readonly);
        delta
    }
}

impl PartialEq for ProgramParameter {
    fn eq(&self, other: &Self) -> bool {
        self.compute_differences(other).is_empty()
    }
}

/// A callable program: procedure or function, with its parameter list.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramDefinition {
    /// Owning namespace.
    pub namespace: Arc<SchemaNamespace>,
    /// Program name.
    pub name: String,
    /// What sort of callable this is.
    pub kind: ProgramKind,
    /// Parameters in ordinal order; empty for parameterless programs.
    pub parameters: Vec<ProgramParameter>,
}

impl ProgramDefinition {
    /// The namespace-qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace.name(), self.name)
    }

    /// Finds a parameter by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ProgramParameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

impl Differences for ProgramDefinition {
    fn compute_differences(&self, other: &Self) -> Delta {
        let mut delta = Delta::between(self.full_name(), other.full_name());
        delta.record(
            "name",
            "string",
            &self.name.to_lowercase(),
            &other.name.to_lowercase(),
        );
        delta.record(
            "schema",
            "string",
            &self.namespace.name().to_lowercase(),
            &other.namespace.name().to_lowercase(),
        );
        delta.record("kind", "program kind", &self.kind, &other.kind);
        delta.record(
            "parameter_count",
            "usize",
            &self.parameters.len(),
            &other.parameters.len(),
        );
        for (left, right) in self.parameters.iter().zip(&other.parameters) {
            let parameter_delta = left.compute_differences(right);
            delta.differences.extend(parameter_delta.differences);
        }
        delta
    }
}

impl PartialEq for ProgramDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.compute_differences(other).is_empty()
    }
}
