//! Conversion-function factory.
//!
//! Builds the cached conversion functions between host values and native
//! SQL values, one per (native type, host type) pair. Construction may
//! fail with [`ConversionError::UnsupportedConversion`]; that negative
//! result is cached by the owning [`NativeType`] so later attempts fail
//! fast. Applying a built caster enforces the type's length, precision,
//! encoding, and range constraints under the caller's [`CastPolicy`].

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;

use crate::error::ConversionError;
use crate::value::{HostType, Value};

use super::catalog;
use super::{DbTypeCode, NativeType, TypeKind};

/// Governs behavior when a conversion would lose information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CastPolicy {
    /// Convert without remark.
    Silent,
    /// Convert, emitting a diagnostic for each lossy step.
    Warn,
    /// Fail instead of losing information.
    Error,
}

/// A built conversion function, cheap to clone and share.
pub type CastFn =
    Arc<dyn Fn(&Value, CastPolicy) -> Result<Value, ConversionError> + Send + Sync>;

/// Decides whether a native type accepts values of a host type at all.
///
/// This is the value-independent pre-check backing
/// [`NativeType::accepts_host_type`]; individual values may still fail
/// policy checks at cast time.
pub(crate) fn accepts(ty: &NativeType, host: HostType) -> bool {
    if host == HostType::Null {
        return true;
    }
    match ty.kind() {
        TypeKind::Number => numeric_accepts(ty.code(), host),
        TypeKind::String => value_has_text_form(host),
        TypeKind::Binary | TypeKind::Variant => host != HostType::Rows,
        TypeKind::DateTime => temporal_accepts(ty.code(), host),
        TypeKind::Object => object_accepts(ty.code(), host),
        TypeKind::Table => host == HostType::Rows && ty.table_shape().is_some(),
    }
}

fn value_has_text_form(host: HostType) -> bool {
    !matches!(host, HostType::Bytes | HostType::Rows | HostType::Null)
}

fn numeric_accepts(code: DbTypeCode, host: HostType) -> bool {
    use HostType as H;
    match code {
        DbTypeCode::Bit => matches!(host, H::Bool),
        DbTypeCode::TinyInt => matches!(host, H::Bool | H::UInt8),
        DbTypeCode::SmallInt => matches!(host, H::Bool | H::UInt8 | H::Int16),
        DbTypeCode::Int => matches!(host, H::Bool | H::UInt8 | H::Int16 | H::Int32),
        DbTypeCode::BigInt => {
            matches!(host, H::Bool | H::UInt8 | H::Int16 | H::Int32 | H::Int64)
        }
        DbTypeCode::Real => matches!(host, H::Float32 | H::UInt8 | H::Int16),
        DbTypeCode::Float => {
            matches!(host, H::Float32 | H::Float64 | H::UInt8 | H::Int16 | H::Int32)
        }
        DbTypeCode::Decimal | DbTypeCode::Money | DbTypeCode::SmallMoney => host.is_numeric(),
        _ => false,
    }
}

fn temporal_accepts(code: DbTypeCode, host: HostType) -> bool {
    use HostType as H;
    match code {
        DbTypeCode::Date => matches!(host, H::Date),
        DbTypeCode::Time => matches!(host, H::Time),
        DbTypeCode::DateTime | DbTypeCode::DateTime2 | DbTypeCode::SmallDateTime => {
            matches!(host, H::DateTime | H::Date)
        }
        DbTypeCode::DateTimeOffset => matches!(host, H::DateTimeOffset | H::DateTime | H::Date),
        _ => false,
    }
}

fn object_accepts(code: DbTypeCode, host: HostType) -> bool {
    use HostType as H;
    if code == DbTypeCode::UniqueIdentifier {
        matches!(host, H::Uuid | H::Text)
    } else {
        matches!(host, H::Bytes | H::Json)
    }
}

fn unsupported(ty: &NativeType, host: HostType) -> ConversionError {
    ConversionError::UnsupportedConversion {
        native: ty.full_name(),
        host: host.name(),
    }
}

/// Builds the host-to-native conversion function for one host type.
pub(crate) fn build_host_to_native(
    ty: &Arc<NativeType>,
    host: HostType,
) -> Result<CastFn, ConversionError> {
    // The catch-all variant kind passes any scalar host value through
    // unchanged instead of rejecting it.
    if ty.kind() == TypeKind::Variant {
        return if host == HostType::Rows {
            Err(unsupported(ty, host))
        } else {
            Ok(Arc::new(|value, _| Ok(value.clone())))
        };
    }
    if !accepts(ty, host) {
        return Err(unsupported(ty, host));
    }
    match ty.kind() {
        TypeKind::Number => Ok(build_numeric_in(ty)),
        TypeKind::String => Ok(build_string_in(ty)),
        TypeKind::Binary => Ok(build_binary_in(ty)),
        TypeKind::DateTime => Ok(build_temporal_in(ty)),
        TypeKind::Object => Ok(build_object_in(ty)),
        TypeKind::Table => build_table_in(ty, host),
        TypeKind::Variant => Ok(Arc::new(|value, _| Ok(value.clone()))),
    }
}

/// Builds the native-to-host conversion function for one host type.
///
/// Reads must be total over the declared type, so any pairing that could
/// lose information fails here rather than producing a partial caster.
pub(crate) fn build_native_to_host(
    ty: &Arc<NativeType>,
    host: HostType,
) -> Result<CastFn, ConversionError> {
    use DbTypeCode as C;
    use HostType as H;
    if ty.kind() == TypeKind::Variant {
        return Ok(Arc::new(|value, _| Ok(value.clone())));
    }
    let allowed = match ty.code() {
        C::Bit => matches!(host, H::Bool),
        C::TinyInt => matches!(
            host,
            H::UInt8 | H::Int16 | H::Int32 | H::Int64 | H::Float32 | H::Float64
        ),
        C::SmallInt => matches!(host, H::Int16 | H::Int32 | H::Int64 | H::Float32 | H::Float64),
        C::Int => matches!(host, H::Int32 | H::Int64 | H::Float64),
        C::BigInt => matches!(host, H::Int64),
        C::Real => matches!(host, H::Float32 | H::Float64),
        C::Float | C::Decimal | C::Money | C::SmallMoney => matches!(host, H::Float64),
        C::Char | C::VarChar | C::Text | C::NChar | C::NVarChar | C::NText | C::Xml => {
            matches!(host, H::Text)
        }
        C::Binary | C::VarBinary | C::Image | C::RowVersion | C::Udt => {
            matches!(host, H::Bytes)
        }
        C::Date => matches!(host, H::Date | H::DateTime),
        C::Time => matches!(host, H::Time),
        C::DateTime | C::DateTime2 | C::SmallDateTime => matches!(host, H::DateTime),
        C::DateTimeOffset => matches!(host, H::DateTimeOffset),
        C::UniqueIdentifier => matches!(host, H::Uuid | H::Text),
        C::Structured => matches!(host, H::Rows),
        C::Variant => true,
    };
    if !allowed {
        return Err(unsupported(ty, host));
    }
    let native = ty.full_name();
    Ok(Arc::new(move |value, _| {
        if value.is_null() {
            return Ok(Value::Null);
        }
        widen_to_host(value, host).ok_or_else(|| ConversionError::FatalInternal {
            native: native.clone(),
            context: format!(
                "stored value of host type {} cannot widen to {host}",
                value.host_type()
            ),
        })
    }))
}

/// Lossless widening from a stored native representation to a host type.
fn widen_to_host(value: &Value, host: HostType) -> Option<Value> {
    use HostType as H;
    if value.host_type() == host {
        return Some(value.clone());
    }
    match (value, host) {
        (Value::UInt8(v), H::Int16) => Some(Value::Int16(i16::from(*v))),
        (Value::UInt8(v), H::Int32) => Some(Value::Int32(i32::from(*v))),
        (Value::UInt8(v), H::Int64) => Some(Value::Int64(i64::from(*v))),
        (Value::UInt8(v), H::Float32) => Some(Value::Float32(f32::from(*v))),
        (Value::UInt8(v), H::Float64) => Some(Value::Float64(f64::from(*v))),
        (Value::Int16(v), H::Int32) => Some(Value::Int32(i32::from(*v))),
        (Value::Int16(v), H::Int64) => Some(Value::Int64(i64::from(*v))),
        (Value::Int16(v), H::Float32) => Some(Value::Float32(f32::from(*v))),
        (Value::Int16(v), H::Float64) => Some(Value::Float64(f64::from(*v))),
        (Value::Int32(v), H::Int64) => Some(Value::Int64(i64::from(*v))),
        (Value::Int32(v), H::Float64) => Some(Value::Float64(f64::from(*v))),
        (Value::Float32(v), H::Float64) => Some(Value::Float64(f64::from(*v))),
        (Value::Date(d), H::DateTime) => {
            Some(Value::DateTime(d.and_hms_opt(0, 0, 0)?))
        }
        (Value::Uuid(u), H::Text) => Some(Value::Text(u.hyphenated().to_string())),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::UInt8(v) => Some(i64::from(*v)),
        Value::Int16(v) => Some(i64::from(*v)),
        Value::Int32(v) => Some(i64::from(*v)),
        Value::Int64(v) => Some(*v),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(f64::from(*v)),
        Value::Float64(v) => Some(*v),
        other => as_i64(other).map(|v| v as f64),
    }
}

fn internal(native: &str, context: impl Into<String>) -> ConversionError {
    ConversionError::FatalInternal {
        native: native.to_string(),
        context: context.into(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_numeric_in(ty: &Arc<NativeType>) -> CastFn {
    let code = ty.code();
    let native = ty.full_name();
    let size = ty.size();
    Arc::new(move |value, policy| {
        match code {
            DbTypeCode::Bit => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                _ => Err(internal(&native, "non-boolean input for bit")),
            },
            DbTypeCode::TinyInt => as_i64(value)
                .map(|v| Value::UInt8(v as u8))
                .ok_or_else(|| internal(&native, "non-integer input")),
            DbTypeCode::SmallInt => as_i64(value)
                .map(|v| Value::Int16(v as i16))
                .ok_or_else(|| internal(&native, "non-integer input")),
            DbTypeCode::Int => as_i64(value)
                .map(|v| Value::Int32(v as i32))
                .ok_or_else(|| internal(&native, "non-integer input")),
            DbTypeCode::BigInt => as_i64(value)
                .map(Value::Int64)
                .ok_or_else(|| internal(&native, "non-integer input")),
            DbTypeCode::Real => match value {
                Value::Float32(v) => Ok(Value::Float32(*v)),
                other => as_f64(other)
                    .map(|v| Value::Float32(v as f32))
                    .ok_or_else(|| internal(&native, "non-numeric input")),
            },
            DbTypeCode::Float => as_f64(value)
                .map(Value::Float64)
                .ok_or_else(|| internal(&native, "non-numeric input")),
            DbTypeCode::Decimal => {
                let v = as_f64(value).ok_or_else(|| internal(&native, "non-numeric input"))?;
                bound_decimal(&native, v, size.precision, size.scale, policy).map(Value::Float64)
            }
            DbTypeCode::Money => {
                let v = as_f64(value).ok_or_else(|| internal(&native, "non-numeric input"))?;
                bound_range(&native, v, -922_337_203_685_477.580_7, 922_337_203_685_477.580_7, policy)
                    .map(Value::Float64)
            }
            DbTypeCode::SmallMoney => {
                let v = as_f64(value).ok_or_else(|| internal(&native, "non-numeric input"))?;
                bound_range(&native, v, -214_748.364_7, 214_748.364_7, policy).map(Value::Float64)
            }
            _ => Err(internal(&native, "non-numeric code in numeric caster")),
        }
    })
}

/// Bounds a decimal value to its declared precision and scale.
fn bound_decimal(
    native: &str,
    v: f64,
    precision: u8,
    scale: u8,
    policy: CastPolicy,
) -> Result<f64, ConversionError> {
    if precision == 0 || scale > precision {
        return Ok(v);
    }
    let integral_digits = i32::from(precision - scale);
    let limit = 10f64.powi(integral_digits);
    let step = 10f64.powi(-i32::from(scale));
    let max = limit - step;
    if v.abs() >= limit {
        bound_range(native, v, -max, max, policy)
    } else {
        Ok(v)
    }
}

fn bound_range(
    native: &str,
    v: f64,
    min: f64,
    max: f64,
    policy: CastPolicy,
) -> Result<f64, ConversionError> {
    if v >= min && v <= max {
        return Ok(v);
    }
    let bound = v.clamp(min, max);
    match policy {
        CastPolicy::Error => Err(ConversionError::OutOfRange {
            native: native.to_string(),
            value: v.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }),
        CastPolicy::Warn => {
            tracing::warn!("value {v} for {native} bound to {bound}");
            Ok(bound)
        }
        CastPolicy::Silent => Ok(bound),
    }
}

/// Character limit derived from the catalog byte length: narrow types
/// store one byte per character, national types two.
fn char_limit(ty: &NativeType) -> Option<usize> {
    let max_length = ty.size().max_length;
    if max_length <= 0 {
        return None;
    }
    if catalog::is_narrow_character(ty.code()) {
        Some(max_length as usize)
    } else {
        Some((max_length as usize) / 2)
    }
}

fn build_string_in(ty: &Arc<NativeType>) -> CastFn {
    let native = ty.full_name();
    let narrow = catalog::is_narrow_character(ty.code());
    let limit = char_limit(ty);
    Arc::new(move |value, policy| {
        let mut text = value
            .to_text()
            .ok_or_else(|| internal(&native, "input has no textual form"))?;
        // Known limitation: code points above U+00FF are treated as
        // unrepresentable in narrow types regardless of the column's
        // actual code page.
        if narrow && text.chars().any(|c| c as u32 > 0xFF) {
            match policy {
                CastPolicy::Error => {
                    return Err(ConversionError::UnrepresentableCharacters {
                        native: native.clone(),
                    });
                }
                CastPolicy::Warn => {
                    tracing::warn!(
                        "value for {native} contains characters outside its narrow encoding"
                    );
                }
                CastPolicy::Silent => {}
            }
        }
        if let Some(limit) = limit {
            let actual = text.chars().count();
            if actual > limit {
                match policy {
                    CastPolicy::Error => {
                        return Err(ConversionError::WouldTruncate {
                            native: native.clone(),
                            limit,
                            actual,
                        });
                    }
                    CastPolicy::Warn => {
                        tracing::warn!(
                            "value of length {actual} for {native} truncated to {limit}"
                        );
                        text = text.chars().take(limit).collect();
                    }
                    CastPolicy::Silent => {
                        text = text.chars().take(limit).collect();
                    }
                }
            }
        }
        Ok(Value::Text(text))
    })
}

#[allow(clippy::cast_sign_loss)]
fn build_binary_in(ty: &Arc<NativeType>) -> CastFn {
    let native = ty.full_name();
    let max_length = ty.size().max_length;
    let limit = (max_length > 0).then_some(max_length as usize);
    Arc::new(move |value, policy| {
        // Byte sequences pass through; every other host value is carried
        // via generic serialization.
        let mut bytes = match value {
            Value::Bytes(b) => b.clone(),
            other => serde_json::to_vec(other)
                .map_err(|e| internal(&native, format!("serialization failed: {e}")))?,
        };
        if let Some(limit) = limit {
            let actual = bytes.len();
            if actual > limit {
                match policy {
                    CastPolicy::Error => {
                        return Err(ConversionError::WouldTruncate {
                            native: native.clone(),
                            limit,
                            actual,
                        });
                    }
                    CastPolicy::Warn => {
                        tracing::warn!(
                            "binary value of length {actual} for {native} truncated to {limit}"
                        );
                        bytes.truncate(limit);
                    }
                    CastPolicy::Silent => bytes.truncate(limit),
                }
            }
        }
        Ok(Value::Bytes(bytes))
    })
}

fn to_naive(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Date(d) => d.and_hms_opt(0, 0, 0),
        Value::DateTime(dt) => Some(*dt),
        Value::DateTimeOffset(dt) => Some(dt.naive_local()),
        _ => None,
    }
}

/// Binds a temporal value into its kind's valid range. Silent and Warn
/// clamp to the nearest boundary; Error fails instead of clamping.
fn bind_temporal(
    native: &str,
    code: DbTypeCode,
    dt: NaiveDateTime,
    policy: CastPolicy,
) -> Result<NaiveDateTime, ConversionError> {
    let Some((min, max)) = catalog::temporal_range(code) else {
        return Ok(dt);
    };
    if dt >= min && dt <= max {
        return Ok(dt);
    }
    let bound = if dt < min { min } else { max };
    match policy {
        CastPolicy::Error => Err(ConversionError::OutOfRange {
            native: native.to_string(),
            value: dt.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }),
        CastPolicy::Warn => {
            tracing::warn!("temporal value {dt} for {native} bound to {bound}");
            Ok(bound)
        }
        CastPolicy::Silent => Ok(bound),
    }
}

fn build_temporal_in(ty: &Arc<NativeType>) -> CastFn {
    let code = ty.code();
    let native = ty.full_name();
    Arc::new(move |value, policy| {
        if code == DbTypeCode::Time {
            return match value {
                Value::Time(t) => Ok(Value::Time(*t)),
                _ => Err(internal(&native, "non-time input for time")),
            };
        }
        let naive = to_naive(value).ok_or_else(|| internal(&native, "non-temporal input"))?;
        let bound = bind_temporal(&native, code, naive, policy)?;
        match code {
            DbTypeCode::Date => Ok(Value::Date(bound.date())),
            DbTypeCode::DateTimeOffset => {
                let offset = match value {
                    Value::DateTimeOffset(dt) => *dt.offset(),
                    _ => FixedOffset::east_opt(0)
                        .ok_or_else(|| internal(&native, "zero offset unavailable"))?,
                };
                let rebound: DateTime<FixedOffset> = offset
                    .from_local_datetime(&bound)
                    .single()
                    .ok_or_else(|| internal(&native, "ambiguous local datetime"))?;
                Ok(Value::DateTimeOffset(rebound))
            }
            _ => Ok(Value::DateTime(bound)),
        }
    })
}

fn build_object_in(ty: &Arc<NativeType>) -> CastFn {
    let code = ty.code();
    let native = ty.full_name();
    Arc::new(move |value, _| {
        if code == DbTypeCode::UniqueIdentifier {
            return match value {
                Value::Uuid(u) => Ok(Value::Uuid(*u)),
                Value::Text(s) => s.parse().map(Value::Uuid).map_err(|_| {
                    ConversionError::UnsupportedConversion {
                        native: native.clone(),
                        host: HostType::Text.name(),
                    }
                }),
                _ => Err(internal(&native, "non-uuid input")),
            };
        }
        match value {
            Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
            Value::Json(j) => serde_json::to_vec(j)
                .map(Value::Bytes)
                .map_err(|e| internal(&native, format!("serialization failed: {e}"))),
            _ => Err(internal(&native, "unsupported object input")),
        }
    })
}

fn build_table_in(ty: &Arc<NativeType>, host: HostType) -> Result<CastFn, ConversionError> {
    let shape = ty.table_shape().ok_or_else(|| unsupported(ty, host))?.clone();
    let native = ty.full_name();
    let min_arity = shape.min_arity();
    let column_count = shape.columns.len();
    Ok(Arc::new(move |value, policy| {
        let rows = match value {
            Value::Rows(rows) => rows,
            _ => return Err(internal(&native, "non-row input for table type")),
        };
        let Some(rows) = rows else {
            return Ok(Value::Rows(None));
        };
        // An empty host sequence collapses to the canonical no-rows
        // marker, mirroring the native "no rows supplied" semantics.
        if rows.is_empty() {
            return Ok(Value::Rows(None));
        }
        let null = Value::Null;
        let mut converted = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() < min_arity || row.len() > column_count {
                return Err(ConversionError::UnsupportedConversion {
                    native: native.clone(),
                    host: HostType::Rows.name(),
                });
            }
            let mut out = Vec::with_capacity(column_count);
            for (i, column) in shape.columns.iter().enumerate() {
                let cell = row.get(i).unwrap_or(&null);
                if cell.is_null() && !column.is_nullable {
                    return Err(internal(
                        &native,
                        format!("row {row_index} supplies null for non-nullable column {i}"),
                    ));
                }
                out.push(column.native_type.cast_host_to_native(cell, policy)?);
            }
            converted.push(out);
        }
        Ok(Value::Rows(Some(converted)))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaNamespace;
    use crate::size::SizeSpec;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn dbo() -> Arc<SchemaNamespace> {
        Arc::new(SchemaNamespace::new(1, "dbo"))
    }

    fn builtin_type(name: &str, size: SizeSpec) -> Arc<NativeType> {
        NativeType::create(None, dbo(), name, size, false, false, false, false)
    }

    #[test]
    fn test_int_round_trip_is_lossless() {
        let int = builtin_type("int", SizeSpec::of_length(4));
        let written = int
            .cast_host_to_native(&Value::Int32(123_456), CastPolicy::Silent)
            .expect("int accepts i32");
        let read = int
            .cast_native_to_host(&written, HostType::Int32, CastPolicy::Silent)
            .expect("i32 read is total");
        assert_eq!(read, Value::Int32(123_456));
    }

    #[test]
    fn test_truncation_policy_matrix() {
        let varchar5 = builtin_type("varchar", SizeSpec::of_length(5));
        let input = Value::Text("abcdefgh".to_string());

        let silent = varchar5
            .cast_host_to_native(&input, CastPolicy::Silent)
            .expect("silent truncates");
        assert_eq!(silent, Value::Text("abcde".to_string()));

        let warn = varchar5
            .cast_host_to_native(&input, CastPolicy::Warn)
            .expect("warn truncates");
        assert_eq!(warn, silent);

        let err = varchar5
            .cast_host_to_native(&input, CastPolicy::Error)
            .expect_err("error policy refuses to truncate");
        assert!(matches!(
            err,
            ConversionError::WouldTruncate {
                limit: 5,
                actual: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_national_length_counts_two_bytes_per_char() {
        // nvarchar(10 bytes) holds five characters.
        let nvarchar = builtin_type("nvarchar", SizeSpec::of_length(10));
        let out = nvarchar
            .cast_host_to_native(&Value::Text("abcdefgh".to_string()), CastPolicy::Silent)
            .expect("silent truncates");
        assert_eq!(out, Value::Text("abcde".to_string()));
    }

    #[test]
    fn test_narrow_kind_rejects_wide_characters_under_error() {
        let varchar = builtin_type("varchar", SizeSpec::of_length(50));
        let input = Value::Text("naïve ☃".to_string());
        let err = varchar
            .cast_host_to_native(&input, CastPolicy::Error)
            .expect_err("snowman is not narrow");
        assert!(matches!(
            err,
            ConversionError::UnrepresentableCharacters { .. }
        ));
        // Warn and Silent still convert.
        assert!(varchar
            .cast_host_to_native(&input, CastPolicy::Silent)
            .is_ok());
    }

    #[test]
    fn test_wide_kind_accepts_any_characters() {
        let nvarchar = builtin_type("nvarchar", SizeSpec::unlimited());
        let out = nvarchar
            .cast_host_to_native(&Value::Text("☃".to_string()), CastPolicy::Error)
            .expect("nvarchar holds anything");
        assert_eq!(out, Value::Text("☃".to_string()));
    }

    #[test]
    fn test_temporal_boundary_passes_unchanged() {
        let date = builtin_type("date", SizeSpec::of_length(3));
        let min = NaiveDate::from_ymd_opt(1, 1, 1).expect("valid");
        for policy in [CastPolicy::Silent, CastPolicy::Warn, CastPolicy::Error] {
            let out = date
                .cast_host_to_native(&Value::Date(min), policy)
                .expect("boundary is valid");
            assert_eq!(out, Value::Date(min));
        }
    }

    #[test]
    fn test_temporal_clamping_outside_boundary() {
        let datetime = builtin_type("datetime", SizeSpec::of_length(8));
        let before_min = NaiveDate::from_ymd_opt(1752, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .expect("valid");
        let min = NaiveDate::from_ymd_opt(1753, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid");

        let clamped = datetime
            .cast_host_to_native(&Value::DateTime(before_min), CastPolicy::Silent)
            .expect("silent clamps");
        assert_eq!(clamped, Value::DateTime(min));

        let warned = datetime
            .cast_host_to_native(&Value::DateTime(before_min), CastPolicy::Warn)
            .expect("warn clamps");
        assert_eq!(warned, Value::DateTime(min));

        let err = datetime
            .cast_host_to_native(&Value::DateTime(before_min), CastPolicy::Error)
            .expect_err("error refuses to clamp");
        assert!(matches!(err, ConversionError::OutOfRange { .. }));
    }

    #[test]
    fn test_decimal_precision_bound() {
        // decimal(5, 2): integral part limited to three digits.
        let decimal = builtin_type("decimal", SizeSpec::of_decimal(5, 2));
        let ok = decimal
            .cast_host_to_native(&Value::Float64(999.99), CastPolicy::Error)
            .expect("in range");
        assert_eq!(ok, Value::Float64(999.99));

        let err = decimal
            .cast_host_to_native(&Value::Float64(1000.0), CastPolicy::Error)
            .expect_err("overflows precision");
        assert!(matches!(err, ConversionError::OutOfRange { .. }));

        let clamped = decimal
            .cast_host_to_native(&Value::Float64(1000.0), CastPolicy::Silent)
            .expect("silent clamps");
        assert_eq!(clamped, Value::Float64(999.99));
    }

    #[test]
    fn test_variant_passes_anything_through() {
        let variant = builtin_type("sql_variant", SizeSpec::default());
        let out = variant
            .cast_host_to_native(&Value::Uuid(uuid::Uuid::nil()), CastPolicy::Error)
            .expect("variant is the catch-all");
        assert_eq!(out, Value::Uuid(uuid::Uuid::nil()));
    }

    #[test]
    fn test_unsupported_conversion_is_cached_negative() {
        let int = builtin_type("int", SizeSpec::of_length(4));
        let first = int
            .cast_host_to_native(&Value::Text("7".to_string()), CastPolicy::Silent)
            .expect_err("text into int is unsupported");
        assert!(matches!(first, ConversionError::UnsupportedConversion { .. }));

        // The failed build is stored in the converter map.
        let entry = int
            .to_native
            .get(&HostType::Text)
            .expect("negative result cached");
        assert!(entry.is_err());
        drop(entry);

        // Later attempts consult the cache instead of rebuilding: swap in
        // a sentinel error and observe it surface unchanged.
        int.to_native.insert(
            HostType::Text,
            Err(ConversionError::FatalInternal {
                native: int.full_name(),
                context: "sentinel".to_string(),
            }),
        );
        let second = int
            .cast_host_to_native(&Value::Text("8".to_string()), CastPolicy::Silent)
            .expect_err("cached result is reused");
        assert!(
            matches!(second, ConversionError::FatalInternal { context, .. } if context == "sentinel")
        );
    }

    #[test]
    fn test_read_back_narrowing_is_rejected() {
        let bigint = builtin_type("bigint", SizeSpec::of_length(8));
        let err = bigint
            .cast_native_to_host(&Value::Int64(1), HostType::Int32, CastPolicy::Silent)
            .expect_err("reads must be total");
        assert!(matches!(err, ConversionError::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_uniqueidentifier_parses_text() {
        let guid = builtin_type("uniqueidentifier", SizeSpec::of_length(16));
        let id = uuid::Uuid::new_v4();
        let out = guid
            .cast_host_to_native(&Value::Text(id.hyphenated().to_string()), CastPolicy::Silent)
            .expect("well-formed guid text");
        assert_eq!(out, Value::Uuid(id));

        let err = guid
            .cast_host_to_native(&Value::Text("not-a-guid".to_string()), CastPolicy::Silent)
            .expect_err("malformed guid text");
        assert!(matches!(err, ConversionError::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_binary_serialization_fallback() {
        let varbinary = builtin_type("varbinary", SizeSpec::unlimited());
        let out = varbinary
            .cast_host_to_native(&Value::Int32(7), CastPolicy::Silent)
            .expect("serializable host value");
        assert!(matches!(out, Value::Bytes(_)));
    }

    #[test]
    fn test_null_passes_through_every_kind() {
        for name in ["int", "varchar", "datetime", "varbinary", "sql_variant"] {
            let ty = builtin_type(name, SizeSpec::default());
            let out = ty
                .cast_host_to_native(&Value::Null, CastPolicy::Error)
                .expect("null passes through");
            assert_eq!(out, Value::Null);
        }
    }
}
