//! Built-in native type catalogue.
//!
//! Fixed, data-only tables: the well-known relational type names with
//! their wire code, kind, and precedence; the valid value range of each
//! temporal kind; and the default native type for each host value type.
//! The exact entries are part of the contract — callers rely on them for
//! classification and type-promotion decisions.

use crate::value::HostType;
use chrono::{NaiveDate, NaiveDateTime};

use super::{DbTypeCode, TypeKind};

/// Classification triple for one built-in type name.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinType {
    /// Wire-level type code.
    pub code: DbTypeCode,
    /// Coarse conversion category.
    pub kind: TypeKind,
    /// Promotion rank; higher wins when two types must be unified.
    pub precedence: i32,
}

const fn b(code: DbTypeCode, kind: TypeKind, precedence: i32) -> BuiltinType {
    BuiltinType {
        code,
        kind,
        precedence,
    }
}

/// Looks up a built-in type by its lowercase catalog name.
#[must_use]
pub fn builtin(name: &str) -> Option<BuiltinType> {
    use DbTypeCode as C;
    use TypeKind as K;
    let entry = match name {
        "bigint" => b(C::BigInt, K::Number, 17),
        "binary" => b(C::Binary, K::Binary, 2),
        "bit" => b(C::Bit, K::Number, 13),
        "char" => b(C::Char, K::String, 4),
        "date" => b(C::Date, K::DateTime, 24),
        "datetime" => b(C::DateTime, K::DateTime, 26),
        "datetime2" => b(C::DateTime2, K::DateTime, 27),
        "datetimeoffset" => b(C::DateTimeOffset, K::DateTime, 28),
        "decimal" | "numeric" => b(C::Decimal, K::Number, 20),
        "float" => b(C::Float, K::Number, 22),
        "image" => b(C::Image, K::Binary, 10),
        "int" => b(C::Int, K::Number, 16),
        "money" => b(C::Money, K::Number, 19),
        "nchar" => b(C::NChar, K::String, 6),
        "ntext" => b(C::NText, K::String, 12),
        "nvarchar" | "sysname" => b(C::NVarChar, K::String, 7),
        "real" => b(C::Real, K::Number, 21),
        "rowversion" | "timestamp" => b(C::RowVersion, K::Binary, 9),
        "smalldatetime" => b(C::SmallDateTime, K::DateTime, 25),
        "smallint" => b(C::SmallInt, K::Number, 15),
        "smallmoney" => b(C::SmallMoney, K::Number, 18),
        "sql_variant" => b(C::Variant, K::Variant, 30),
        "text" => b(C::Text, K::String, 11),
        "time" => b(C::Time, K::DateTime, 23),
        "tinyint" => b(C::TinyInt, K::Number, 14),
        "uniqueidentifier" => b(C::UniqueIdentifier, K::Object, 8),
        "varbinary" => b(C::VarBinary, K::Binary, 3),
        "varchar" => b(C::VarChar, K::String, 5),
        "xml" => b(C::Xml, K::String, 29),
        _ => return None,
    };
    Some(entry)
}

/// The classification an unresolvable type safely degrades to: a
/// variable-length Unicode string.
#[must_use]
pub const fn fallback() -> BuiltinType {
    b(DbTypeCode::NVarChar, TypeKind::String, 7)
}

/// Classification of CLR-hosted user types with no base type.
#[must_use]
pub const fn clr_object() -> BuiltinType {
    b(DbTypeCode::Udt, TypeKind::Object, 31)
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, milli: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|date| date.and_hms_milli_opt(h, mi, s, milli))
        .unwrap_or(NaiveDateTime::MIN)
}

/// The valid value range of a temporal kind, inclusive on both ends.
///
/// `time` has no range (every time of day is valid) and non-temporal
/// codes return `None`.
#[must_use]
pub fn temporal_range(code: DbTypeCode) -> Option<(NaiveDateTime, NaiveDateTime)> {
    match code {
        DbTypeCode::DateTime => Some((
            at(1753, 1, 1, 0, 0, 0, 0),
            at(9999, 12, 31, 23, 59, 59, 997),
        )),
        DbTypeCode::SmallDateTime => {
            Some((at(1900, 1, 1, 0, 0, 0, 0), at(2079, 6, 6, 23, 59, 0, 0)))
        }
        DbTypeCode::Date | DbTypeCode::DateTime2 | DbTypeCode::DateTimeOffset => {
            Some((at(1, 1, 1, 0, 0, 0, 0), at(9999, 12, 31, 23, 59, 59, 999)))
        }
        _ => None,
    }
}

/// The default native type name for a host value type, used when a caller
/// supplies a value with no explicitly declared native type.
#[must_use]
pub const fn default_native_type_for(host: HostType) -> Option<&'static str> {
    match host {
        HostType::Bool => Some("bit"),
        HostType::UInt8 => Some("tinyint"),
        HostType::Int16 => Some("smallint"),
        HostType::Int32 => Some("int"),
        HostType::Int64 => Some("bigint"),
        HostType::Float32 => Some("real"),
        HostType::Float64 => Some("float"),
        HostType::Text | HostType::Json => Some("nvarchar"),
        HostType::Bytes => Some("varbinary"),
        HostType::Date => Some("date"),
        HostType::Time => Some("time"),
        HostType::DateTime => Some("datetime2"),
        HostType::DateTimeOffset => Some("datetimeoffset"),
        HostType::Uuid => Some("uniqueidentifier"),
        HostType::Null | HostType::Rows => None,
    }
}

/// True for the narrow (single-byte) character codes, whose values must
/// pass a representability check before conversion.
#[must_use]
pub const fn is_narrow_character(code: DbTypeCode) -> bool {
    matches!(code, DbTypeCode::Char | DbTypeCode::VarChar | DbTypeCode::Text)
}
