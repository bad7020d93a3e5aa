//! Host-side value model.
//!
//! [`Value`] is the closed set of host-language values the marshalling
//! layer converts to and from native SQL values. [`HostType`] is its
//! type-level discriminant, used as the key for per-type converter caches.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

/// A single row of a table-valued host sequence.
pub type Row = Vec<Value>;

/// A host value passing through the marshalling layer.
///
/// Table-valued data is carried as `Rows(Option<..>)`: `None` is the
/// canonical "no rows supplied" marker, distinct from an empty row
/// collection. Converting an empty host sequence always yields `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean, marshalled to and from the single-bit native kind.
    Bool(bool),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float; also carries decimal/money values.
    Float64(f64),
    /// Unicode text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Calendar date without time.
    Date(NaiveDate),
    /// Time of day without date.
    Time(NaiveTime),
    /// Date and time without offset.
    DateTime(NaiveDateTime),
    /// Date and time with a fixed UTC offset.
    DateTimeOffset(DateTime<FixedOffset>),
    /// Globally unique identifier.
    Uuid(Uuid),
    /// Structured host data; serialization fallback input for binary and
    /// object kinds.
    Json(serde_json::Value),
    /// Table-valued data. `None` is the canonical absence-of-rows marker.
    Rows(Option<Vec<Row>>),
}

/// Type-level discriminant of [`Value`], used as a converter-cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HostType {
    /// See [`Value::Null`].
    Null,
    /// See [`Value::Bool`].
    Bool,
    /// See [`Value::UInt8`].
    UInt8,
    /// See [`Value::Int16`].
    Int16,
    /// See [`Value::Int32`].
    Int32,
    /// See [`Value::Int64`].
    Int64,
    /// See [`Value::Float32`].
    Float32,
    /// See [`Value::Float64`].
    Float64,
    /// See [`Value::Text`].
    Text,
    /// See [`Value::Bytes`].
    Bytes,
    /// See [`Value::Date`].
    Date,
    /// See [`Value::Time`].
    Time,
    /// See [`Value::DateTime`].
    DateTime,
    /// See [`Value::DateTimeOffset`].
    DateTimeOffset,
    /// See [`Value::Uuid`].
    Uuid,
    /// See [`Value::Json`].
    Json,
    /// See [`Value::Rows`].
    Rows,
}

impl HostType {
    /// Stable name used in diagnostics and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::UInt8 => "u8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::DateTimeOffset => "datetimeoffset",
            Self::Uuid => "uuid",
            Self::Json => "json",
            Self::Rows => "rows",
        }
    }

    /// True for the numeric host types.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::UInt8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Float32
                | Self::Float64
        )
    }
}

impl std::fmt::Display for HostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Returns the type-level discriminant of this value.
    #[must_use]
    pub const fn host_type(&self) -> HostType {
        match self {
            Self::Null => HostType::Null,
            Self::Bool(_) => HostType::Bool,
            Self::UInt8(_) => HostType::UInt8,
            Self::Int16(_) => HostType::Int16,
            Self::Int32(_) => HostType::Int32,
            Self::Int64(_) => HostType::Int64,
            Self::Float32(_) => HostType::Float32,
            Self::Float64(_) => HostType::Float64,
            Self::Text(_) => HostType::Text,
            Self::Bytes(_) => HostType::Bytes,
            Self::Date(_) => HostType::Date,
            Self::Time(_) => HostType::Time,
            Self::DateTime(_) => HostType::DateTime,
            Self::DateTimeOffset(_) => HostType::DateTimeOffset,
            Self::Uuid(_) => HostType::Uuid,
            Self::Json(_) => HostType::Json,
            Self::Rows(_) => HostType::Rows,
        }
    }

    /// True for SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value as text where a textual form exists.
    ///
    /// Used by character-kind casters; bytes and row sets have no textual
    /// rendering and return `None`.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { "1".to_string() } else { "0".to_string() }),
            Self::UInt8(v) => Some(v.to_string()),
            Self::Int16(v) => Some(v.to_string()),
            Self::Int32(v) => Some(v.to_string()),
            Self::Int64(v) => Some(v.to_string()),
            Self::Float32(v) => Some(v.to_string()),
            Self::Float64(v) => Some(v.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Bytes(_) | Self::Rows(_) => None,
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => Some(t.format("%H:%M:%S%.f").to_string()),
            Self::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Self::DateTimeOffset(dt) => Some(dt.to_rfc3339()),
            Self::Uuid(u) => Some(u.hyphenated().to_string()),
            Self::Json(j) => Some(j.to_string()),
        }
    }
}
