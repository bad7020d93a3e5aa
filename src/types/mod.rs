//! Native type model and conversion entry points.
//!
//! A [`NativeType`] pairs a catalog type row with its conversion behavior:
//! a coarse [`TypeKind`], a wire-level [`DbTypeCode`], a promotion
//! precedence, and per-host-type caches of built conversion functions.
//! Types are always handled behind `Arc`; sized refinements of the same
//! base type share nothing but are cheap to create, and refining to the
//! size a type already has returns the same allocation.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::Serialize;

use crate::diff::{Delta, Differences};
use crate::error::ConversionError;
use crate::model::SchemaNamespace;
use crate::size::SizeSpec;
use crate::value::{HostType, Value};

pub mod catalog;

mod cast;

pub use cast::{CastFn, CastPolicy};

/// Coarse conversion category of a native type. Every type belongs to
/// exactly one kind, and the kind alone selects the conversion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    /// The catch-all variant kind; passes host values through unchanged.
    Variant,
    /// Byte-sequence types.
    Binary,
    /// Character types, narrow and national.
    String,
    /// Exact and approximate numerics.
    Number,
    /// Dates, times, and combinations thereof.
    DateTime,
    /// Opaque object types: unique identifiers and CLR types.
    Object,
    /// User-defined table types.
    Table,
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Wire-level type code of a native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum DbTypeCode {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    RowVersion,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Structured,
    Text,
    Time,
    TinyInt,
    Udt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Variant,
    Xml,
}

impl std::fmt::Display for DbTypeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One column of a table type's shape.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeColumn {
    /// The column's declared native type, already sized.
    pub native_type: Arc<NativeType>,
    /// Whether the column admits nulls.
    pub is_nullable: bool,
}

/// The column shape of a user-defined table type, in ordinal order.
///
/// Set exactly once during snapshot assembly, before the owning type is
/// published to any reader.
#[derive(Debug, Clone, Serialize)]
pub struct TableShape {
    /// Columns in ordinal order.
    pub columns: Vec<ShapeColumn>,
}

impl TableShape {
    /// Minimum number of cells a host row must supply: every column up to
    /// and including the last non-nullable one.
    #[must_use]
    pub fn min_arity(&self) -> usize {
        self.columns
            .iter()
            .rposition(|c| !c.is_nullable)
            .map_or(0, |i| i + 1)
    }
}

/// A native SQL type with its conversion machinery.
///
/// Equality is structural over name (case-insensitive), namespace, size,
/// flags, and classification, defined by [`Differences`].
#[derive(Serialize)]
pub struct NativeType {
    name: String,
    namespace: Arc<SchemaNamespace>,
    parent: Option<Arc<NativeType>>,
    size: SizeSpec,
    is_nullable: bool,
    is_user_defined: bool,
    is_clr: bool,
    is_table: bool,
    code: DbTypeCode,
    kind: TypeKind,
    precedence: i32,
    #[serde(skip)]
    table_shape: OnceLock<TableShape>,
    #[serde(skip)]
    accepts_cache: DashMap<HostType, bool>,
    #[serde(skip)]
    to_native: DashMap<HostType, Result<CastFn, ConversionError>>,
    #[serde(skip)]
    to_host: DashMap<HostType, Result<CastFn, ConversionError>>,
}

impl NativeType {
    /// Creates a type from its catalog row, classifying it in the process.
    ///
    /// Classification never fails: unrecognized system type names and
    /// user-defined types with no resolvable base degrade to the
    /// variable-length Unicode string classification with a diagnostic,
    /// and parentless CLR types classify as opaque objects.
    #[allow(clippy::fn_params_excessive_bools, clippy::too_many_arguments)]
    #[must_use]
    pub fn create(
        parent: Option<Arc<Self>>,
        namespace: Arc<SchemaNamespace>,
        name: impl Into<String>,
        size: SizeSpec,
        is_nullable: bool,
        is_user_defined: bool,
        is_clr: bool,
        is_table: bool,
    ) -> Arc<Self> {
        let name = name.into();
        let classified = if is_table {
            catalog::BuiltinType {
                code: DbTypeCode::Structured,
                kind: TypeKind::Table,
                precedence: 0,
            }
        } else if is_user_defined {
            if let Some(base) = &parent {
                catalog::BuiltinType {
                    code: base.code,
                    kind: base.kind,
                    precedence: base.precedence,
                }
            } else if is_clr {
                catalog::clr_object()
            } else {
                tracing::warn!(
                    "user-defined type '{name}' has no resolvable base type, \
                     treating as text"
                );
                catalog::fallback()
            }
        } else {
            catalog::builtin(&name.to_lowercase()).unwrap_or_else(|| {
                tracing::warn!("unrecognized system type '{name}', treating as text");
                catalog::fallback()
            })
        };
        Arc::new(Self {
            name,
            namespace,
            parent,
            size,
            is_nullable,
            is_user_defined,
            is_clr,
            is_table,
            code: classified.code,
            kind: classified.kind,
            precedence: classified.precedence,
            table_shape: OnceLock::new(),
            accepts_cache: DashMap::new(),
            to_native: DashMap::new(),
            to_host: DashMap::new(),
        })
    }

    /// The type's bare catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace the type belongs to.
    #[must_use]
    pub fn namespace(&self) -> &Arc<SchemaNamespace> {
        &self.namespace
    }

    /// The base type a user-defined alias derives from, when any.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// The namespace-qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace.name(), self.name)
    }

    /// The size/precision/scale triple.
    #[must_use]
    pub const fn size(&self) -> SizeSpec {
        self.size
    }

    /// The wire-level type code.
    #[must_use]
    pub const fn code(&self) -> DbTypeCode {
        self.code
    }

    /// The coarse conversion category.
    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Whether columns of this type default to nullable.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    /// Whether the type is user-defined.
    #[must_use]
    pub const fn is_user_defined(&self) -> bool {
        self.is_user_defined
    }

    /// Whether the type is hosted by the CLR.
    #[must_use]
    pub const fn is_clr(&self) -> bool {
        self.is_clr
    }

    /// Whether the type is a user-defined table type.
    #[must_use]
    pub const fn is_table(&self) -> bool {
        self.is_table
    }

    /// Promotion rank; the higher of two types wins when they must be
    /// unified. Table types rank by their column count.
    #[must_use]
    pub fn precedence(&self) -> i32 {
        if self.kind == TypeKind::Table {
            self.table_shape
                .get()
                .map_or(0, |s| i32::try_from(s.columns.len()).unwrap_or(i32::MAX))
        } else {
            self.precedence
        }
    }

    /// Picks the wider of two types by precedence, preferring `self` on a
    /// tie.
    #[must_use]
    pub fn wider<'a>(self: &'a Arc<Self>, other: &'a Arc<Self>) -> &'a Arc<Self> {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }

    /// The column shape, present only for assembled table types.
    #[must_use]
    pub fn table_shape(&self) -> Option<&TableShape> {
        self.table_shape.get()
    }

    /// Sets the column shape during snapshot assembly. Returns false if a
    /// shape was already set; the shape is write-once.
    pub(crate) fn set_table_shape(&self, shape: TableShape) -> bool {
        self.table_shape.set(shape).is_ok()
    }

    /// Returns this type refined to the given size.
    ///
    /// Refining to the size the type already carries returns the same
    /// allocation, so callers can rely on pointer identity for the
    /// common case of default-sized catalog types.
    #[must_use]
    pub fn refine_with_size(self: &Arc<Self>, size: SizeSpec) -> Arc<Self> {
        if self.size == size {
            return Arc::clone(self);
        }
        let refined = Self {
            name: self.name.clone(),
            namespace: Arc::clone(&self.namespace),
            parent: self.parent.clone(),
            size,
            is_nullable: self.is_nullable,
            is_user_defined: self.is_user_defined,
            is_clr: self.is_clr,
            is_table: self.is_table,
            code: self.code,
            kind: self.kind,
            precedence: self.precedence,
            table_shape: OnceLock::new(),
            accepts_cache: DashMap::new(),
            to_native: DashMap::new(),
            to_host: DashMap::new(),
        };
        if let Some(shape) = self.table_shape.get() {
            let _ = refined.table_shape.set(shape.clone());
        }
        Arc::new(refined)
    }

    /// Whether values of the given host type can convert to this type at
    /// all. Memoized per host type; individual values may still fail
    /// policy checks at cast time.
    #[must_use]
    pub fn accepts_host_type(&self, host: HostType) -> bool {
        *self
            .accepts_cache
            .entry(host)
            .or_insert_with(|| cast::accepts(self, host))
    }

    /// Converts a host value into this type's native representation.
    ///
    /// Null passes through unconditionally. The conversion function for
    /// the value's host type is built on first use and cached, including
    /// negative results.
    ///
    /// # Errors
    /// [`ConversionError::UnsupportedConversion`] when no conversion
    /// exists, or a policy-dependent error when the value would lose
    /// information under [`CastPolicy::Error`].
    pub fn cast_host_to_native(
        self: &Arc<Self>,
        value: &Value,
        policy: CastPolicy,
    ) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let host = value.host_type();
        let built = self
            .to_native
            .entry(host)
            .or_insert_with(|| cast::build_host_to_native(self, host))
            .clone();
        let caster = built?;
        caster(value, policy)
    }

    /// Converts a stored native value back to the requested host type.
    ///
    /// Reads are total: the pairing fails at construction unless every
    /// possible stored value converts losslessly.
    ///
    /// # Errors
    /// [`ConversionError::UnsupportedConversion`] when reading back as
    /// `host` could lose information.
    pub fn cast_native_to_host(
        self: &Arc<Self>,
        value: &Value,
        host: HostType,
        policy: CastPolicy,
    ) -> Result<Value, ConversionError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let built = self
            .to_host
            .entry(host)
            .or_insert_with(|| cast::build_native_to_host(self, host))
            .clone();
        let caster = built?;
        caster(value, policy)
    }
}

impl Differences for NativeType {
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
        delta.record(
            "max_length",
            "i16",
            &self.size.max_length,
            &other.size.max_length,
        );
        delta.record(
            "precision",
            "u8",
            &self.size.precision,
            &other.size.precision,
        );
        delta.record("scale", "u8", &self.size.scale, &other.size.scale);
        delta.record("is_nullable", "bool", &self.is_nullable, &other.is_nullable);
        delta.record(
            "is_user_defined",
            "bool",
            &self.is_user_defined,
            &other.is_user_defined,
        );
        delta.record("is_clr", "bool", &self.is_clr, &other.is_clr);
        delta.record("is_table", "bool", &self.is_table, &other.is_table);
        delta.record("code", "type code", &self.code, &other.code);
        delta.record("kind", "type kind", &self.kind, &other.kind);
        delta
    }
}

impl PartialEq for NativeType {
    fn eq(&self, other: &Self) -> bool {
        self.compute_differences(other).is_empty()
    }
}

impl std::fmt::Debug for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeType")
            .field("name", &self.full_name())
            .field("size", &self.size)
            .field("code", &self.code)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.full_name(), self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dbo() -> Arc<SchemaNamespace> {
        Arc::new(SchemaNamespace::new(1, "dbo"))
    }

    fn system(name: &str, size: SizeSpec) -> Arc<NativeType> {
        NativeType::create(None, dbo(), name, size, true, false, false, false)
    }

    #[test]
    fn test_system_type_classification() {
        let int = system("int", SizeSpec::of_length(4));
        assert_eq!(int.code(), DbTypeCode::Int);
        assert_eq!(int.kind(), TypeKind::Number);
        assert_eq!(int.full_name(), "dbo.int");
    }

    #[test]
    fn test_unrecognized_system_type_degrades_to_text() {
        let odd = system("geography", SizeSpec::unlimited());
        assert_eq!(odd.code(), DbTypeCode::NVarChar);
        assert_eq!(odd.kind(), TypeKind::String);
    }

    #[test]
    fn test_user_defined_type_inherits_base_classification() {
        let base = system("int", SizeSpec::of_length(4));
        let alias = NativeType::create(
            Some(Arc::clone(&base)),
            dbo(),
            "WidgetId",
            SizeSpec::of_length(4),
            false,
            true,
            false,
            false,
        );
        assert_eq!(alias.code(), DbTypeCode::Int);
        assert_eq!(alias.kind(), TypeKind::Number);
        assert_eq!(alias.precedence(), base.precedence());
    }

    #[test]
    fn test_parentless_clr_type_is_object() {
        let clr = NativeType::create(
            None,
            dbo(),
            "Point",
            SizeSpec::unlimited(),
            true,
            true,
            true,
            false,
        );
        assert_eq!(clr.kind(), TypeKind::Object);
        assert_eq!(clr.code(), DbTypeCode::Udt);
    }

    #[test]
    fn test_parentless_non_clr_udt_degrades_to_text() {
        let orphan = NativeType::create(
            None,
            dbo(),
            "Mystery",
            SizeSpec::of_length(10),
            true,
            true,
            false,
            false,
        );
        assert_eq!(orphan.kind(), TypeKind::String);
    }

    #[test]
    fn test_refine_with_same_size_returns_same_allocation() {
        let varchar = system("varchar", SizeSpec::of_length(50));
        let same = varchar.refine_with_size(SizeSpec::of_length(50));
        assert!(Arc::ptr_eq(&varchar, &same));
    }

    #[test]
    fn test_refine_with_new_size_is_fresh() {
        let varchar = system("varchar", SizeSpec::of_length(50));
        let narrower = varchar.refine_with_size(SizeSpec::of_length(5));
        assert!(!Arc::ptr_eq(&varchar, &narrower));
        assert_eq!(narrower.size(), SizeSpec::of_length(5));
        assert_eq!(narrower.code(), varchar.code());
    }

    #[test]
    fn test_accepts_host_type_widening_only() {
        let int = system("int", SizeSpec::of_length(4));
        assert!(int.accepts_host_type(HostType::Int32));
        assert!(int.accepts_host_type(HostType::Int16));
        assert!(int.accepts_host_type(HostType::Bool));
        assert!(!int.accepts_host_type(HostType::Int64));
        assert!(!int.accepts_host_type(HostType::Text));
        // Memoized path returns the same answer.
        assert!(!int.accepts_host_type(HostType::Int64));
    }

    #[test]
    fn test_table_shape_is_write_once() {
        let table = NativeType::create(
            None,
            dbo(),
            "WidgetList",
            SizeSpec::default(),
            false,
            true,
            false,
            true,
        );
        assert_eq!(table.kind(), TypeKind::Table);
        assert!(table.table_shape().is_none());
        let shape = TableShape {
            columns: vec![
                ShapeColumn {
                    native_type: system("int", SizeSpec::of_length(4)),
                    is_nullable: false,
                },
                ShapeColumn {
                    native_type: system("nvarchar", SizeSpec::of_length(100)),
                    is_nullable: true,
                },
            ],
        };
        assert!(table.set_table_shape(shape.clone()));
        assert!(!table.set_table_shape(shape));
        assert_eq!(table.precedence(), 2);
        assert_eq!(
            table.table_shape().map(TableShape::min_arity),
            Some(1)
        );
    }

    #[test]
    fn test_equality_is_structural() {
        let a = system("int", SizeSpec::of_length(4));
        let b = system("INT", SizeSpec::of_length(4));
        assert_eq!(*a, *b);
        let c = system("int", SizeSpec::of_length(8));
        assert_ne!(*a, *c);
    }
}
