//! Raw metadata ingestion.
//!
//! One fixed T-SQL batch returns six ordered result sets: namespaces,
//! collations, the server/database collation selection, native types,
//! program parameters, and table/view columns. [`read_metadata`] drains a
//! [`ResultStream`] into flat row records; all cross-referencing and
//! validation happens later during snapshot assembly.

use crate::error::LoadError;
use crate::executor::ResultStream;

/// Minimum supported server major version.
pub(crate) const MIN_SUPPORTED_MAJOR: u32 = 11;

/// The fixed metadata batch. Result set order is part of the contract
/// between this module and [`read_metadata`].
pub(crate) const METADATA_BATCH: &str = r"
SELECT s.schema_id, s.name
FROM sys.schemas AS s
ORDER BY s.schema_id;

SELECT c.name,
       CONVERT(int, COLLATIONPROPERTY(c.name, 'CodePage')),
       CONVERT(int, COLLATIONPROPERTY(c.name, 'LCID')),
       CONVERT(int, COLLATIONPROPERTY(c.name, 'ComparisonStyle')),
       CONVERT(tinyint, COLLATIONPROPERTY(c.name, 'Version'))
FROM sys.fn_helpcollations() AS c;

SELECT CONVERT(nvarchar(128), SERVERPROPERTY('Collation')),
       CONVERT(nvarchar(128), DATABASEPROPERTYEX(DB_NAME(), 'Collation'));

SELECT t.user_type_id, t.schema_id, t.name,
       NULLIF(bt.user_type_id, t.user_type_id),
       t.max_length, t.precision, t.scale,
       t.is_nullable, t.is_user_defined,
       CONVERT(bit, t.is_assembly_type),
       t.is_table_type
FROM sys.types AS t
LEFT JOIN sys.types AS bt
    ON bt.user_type_id = t.system_type_id AND t.is_user_defined = 1
ORDER BY t.is_user_defined, t.user_type_id;

SELECT CONVERT(tinyint, CASE o.type WHEN 'P' THEN 1 WHEN 'FN' THEN 2 ELSE 3 END),
       o.schema_id, o.name,
       p.parameter_id, NULLIF(p.name, ''), p.user_type_id,
       p.max_length, p.precision, p.scale,
       CONVERT(tinyint, CASE WHEN p.parameter_id = 0 THEN 3
                             WHEN p.is_output = 1 THEN 2 ELSE 0 END),
       p.is_readonly
FROM sys.objects AS o
LEFT JOIN sys.parameters AS p ON p.object_id = o.object_id
WHERE o.type IN ('P', 'FN', 'IF', 'TF')
ORDER BY o.schema_id, o.name, p.parameter_id;

SELECT CONVERT(tinyint, CASE WHEN tt.type_table_object_id IS NOT NULL THEN 2
                             WHEN o.type = 'V' THEN 1 ELSE 0 END),
       COALESCE(o.schema_id, tt.schema_id), COALESCE(o.name, tt.name),
       tt.user_type_id,
       c.column_id - 1, c.name, c.user_type_id,
       c.max_length, c.precision, c.scale, c.is_nullable,
       c.collation_name
FROM sys.columns AS c
LEFT JOIN sys.objects AS o
    ON o.object_id = c.object_id AND o.type IN ('U', 'V')
LEFT JOIN sys.table_types AS tt ON tt.type_table_object_id = c.object_id
WHERE o.object_id IS NOT NULL OR tt.type_table_object_id IS NOT NULL
ORDER BY COALESCE(o.schema_id, tt.schema_id), COALESCE(o.name, tt.name), c.column_id;
";

/// One schema namespace row.
#[derive(Debug, Clone)]
pub(crate) struct NamespaceRow {
    pub id: i32,
    pub name: String,
}

/// One collation row.
#[derive(Debug, Clone)]
pub(crate) struct CollationRow {
    pub name: String,
    pub code_page: i32,
    pub locale_id: i32,
    pub flags: i32,
    pub version: u8,
}

/// The single server/database collation selection row.
#[derive(Debug, Clone)]
pub(crate) struct CollationSelectionRow {
    pub server_collation: String,
    pub database_collation: String,
}

/// One native type row. `parent_id` references an earlier row of this
/// same result set; bases arrive before dependents.
#[derive(Debug, Clone)]
pub(crate) struct NativeTypeRow {
    pub id: i32,
    pub namespace_id: i32,
    pub name: String,
    pub parent_id: Option<i32>,
    pub max_length: i16,
    pub precision: u8,
    pub scale: u8,
    pub is_nullable: bool,
    pub is_user_defined: bool,
    pub is_clr: bool,
    pub is_table: bool,
}

/// One flat program parameter row. A row with no parameter name marks a
/// parameterless program and contributes no parameter.
#[derive(Debug, Clone)]
pub(crate) struct ParameterRow {
    pub kind: u8,
    pub namespace_id: i32,
    pub program_name: String,
    pub ordinal: i32,
    pub name: Option<String>,
    pub type_id: Option<i32>,
    pub max_length: i16,
    pub precision: u8,
    pub scale: u8,
    pub direction: u8,
    pub is_readonly: bool,
}

/// One flat table/view/table-type column row.
#[derive(Debug, Clone)]
pub(crate) struct ColumnRow {
    pub kind: u8,
    pub namespace_id: i32,
    pub table_name: String,
    pub table_type_id: Option<i32>,
    pub ordinal: i32,
    pub name: String,
    pub type_id: i32,
    pub max_length: i16,
    pub precision: u8,
    pub scale: u8,
    pub is_nullable: bool,
    pub collation: Option<String>,
}

/// Everything [`read_metadata`] drains from one batch execution.
#[derive(Debug, Clone)]
pub(crate) struct RawMetadata {
    pub namespaces: Vec<NamespaceRow>,
    pub collations: Vec<CollationRow>,
    pub selection: CollationSelectionRow,
    pub types: Vec<NativeTypeRow>,
    pub parameters: Vec<ParameterRow>,
    pub columns: Vec<ColumnRow>,
}

/// Extracts the leading major version from a server version string such
/// as `"16.0.1000.6"`.
pub(crate) fn extract_major_version(version: &str) -> Option<u32> {
    version
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Rejects servers older than the minimum supported major version.
pub(crate) fn ensure_supported_version(version: &str) -> Result<(), LoadError> {
    match extract_major_version(version) {
        Some(major) if major >= MIN_SUPPORTED_MAJOR => Ok(()),
        _ => Err(LoadError::UnsupportedServerVersion {
            version: version.to_string(),
            minimum: MIN_SUPPORTED_MAJOR,
        }),
    }
}

async fn expect_result_set(
    stream: &mut dyn ResultStream,
    name: &'static str,
) -> Result<(), LoadError> {
    if stream.advance_result().await? {
        Ok(())
    } else {
        Err(LoadError::unknown(format!(
            "metadata batch ended before the {name} result set"
        )))
    }
}

fn opt_i32(stream: &dyn ResultStream, ordinal: usize) -> Result<Option<i32>, LoadError> {
    if stream.is_null(ordinal) {
        Ok(None)
    } else {
        stream.get_i32(ordinal).map(Some)
    }
}

fn opt_string(stream: &dyn ResultStream, ordinal: usize) -> Result<Option<String>, LoadError> {
    if stream.is_null(ordinal) {
        Ok(None)
    } else {
        stream.get_string(ordinal).map(Some)
    }
}

/// Drains the six metadata result sets into flat row records.
///
/// # Errors
/// [`LoadError::UnexpectedExtraRow`] when the collation selection yields
/// more than one row; [`LoadError::Unknown`] when the batch is shaped
/// wrong; driver failures pass through.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) async fn read_metadata(
    stream: &mut dyn ResultStream,
) -> Result<RawMetadata, LoadError> {
    expect_result_set(stream, "namespace").await?;
    let mut namespaces = Vec::new();
    while stream.advance_row().await? {
        namespaces.push(NamespaceRow {
            id: stream.get_i32(0)?,
            name: stream.get_string(1)?,
        });
    }

    expect_result_set(stream, "collation").await?;
    let mut collations = Vec::new();
    while stream.advance_row().await? {
        collations.push(CollationRow {
            name: stream.get_string(0)?,
            code_page: stream.get_i32(1)?,
            locale_id: stream.get_i32(2)?,
            flags: stream.get_i32(3)?,
            version: stream.get_u8(4)?,
        });
    }

    expect_result_set(stream, "collation selection").await?;
    if !stream.advance_row().await? {
        return Err(LoadError::unknown(
            "collation selection returned no rows",
        ));
    }
    let selection = CollationSelectionRow {
        server_collation: stream.get_string(0)?,
        database_collation: stream.get_string(1)?,
    };
    if stream.advance_row().await? {
        return Err(LoadError::UnexpectedExtraRow {
            result_set: "collation selection",
        });
    }

    expect_result_set(stream, "native type").await?;
    let mut types = Vec::new();
    while stream.advance_row().await? {
        types.push(NativeTypeRow {
            id: stream.get_i32(0)?,
            namespace_id: stream.get_i32(1)?,
            name: stream.get_string(2)?,
            parent_id: opt_i32(stream, 3)?,
            max_length: stream.get_i16(4)?,
            precision: stream.get_u8(5)?,
            scale: stream.get_u8(6)?,
            is_nullable: stream.get_bool(7)?,
            is_user_defined: stream.get_bool(8)?,
            is_clr: stream.get_bool(9)?,
            is_table: stream.get_bool(10)?,
        });
    }

    expect_result_set(stream, "program parameter").await?;
    let mut parameters = Vec::new();
    while stream.advance_row().await? {
        parameters.push(ParameterRow {
            kind: stream.get_u8(0)?,
            namespace_id: stream.get_i32(1)?,
            program_name: stream.get_string(2)?,
            ordinal: stream.get_i32(3)?,
            name: opt_string(stream, 4)?,
            type_id: opt_i32(stream, 5)?,
            max_length: if stream.is_null(6) { 0 } else { stream.get_i16(6)? },
            precision: if stream.is_null(7) { 0 } else { stream.get_u8(7)? },
            scale: if stream.is_null(8) { 0 } else { stream.get_u8(8)? },
            direction: if stream.is_null(9) { 0 } else { stream.get_u8(9)? },
            is_readonly: !stream.is_null(10) && stream.get_bool(10)?,
        });
    }

    expect_result_set(stream, "column").await?;
    let mut columns = Vec::new();
    while stream.advance_row().await? {
        columns.push(ColumnRow {
            kind: stream.get_u8(0)?,
            namespace_id: stream.get_i32(1)?,
            table_name: stream.get_string(2)?,
            table_type_id: opt_i32(stream, 3)?,
            ordinal: stream.get_i32(4)?,
            name: stream.get_string(5)?,
            type_id: stream.get_i32(6)?,
            max_length: stream.get_i16(7)?,
            precision: stream.get_u8(8)?,
            scale: stream.get_u8(9)?,
            is_nullable: stream.get_bool(10)?,
            collation: opt_string(stream, 11)?,
        });
    }

    tracing::debug!(
        namespaces = namespaces.len(),
        collations = collations.len(),
        types = types.len(),
        parameter_rows = parameters.len(),
        column_rows = columns.len(),
        "metadata batch drained"
    );

    Ok(RawMetadata {
        namespaces,
        collations,
        selection,
        types,
        parameters,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fixture::FixtureExecutor;
    use crate::executor::QueryExecutor;
    use crate::value::Value;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn minimal_script() -> Vec<Vec<Vec<Value>>> {
        vec![
            vec![vec![Value::Int32(1), text("dbo")]],
            vec![vec![
                text("Latin1_General_CI_AS"),
                Value::Int32(1252),
                Value::Int32(1033),
                Value::Int32(1),
                Value::UInt8(2),
            ]],
            vec![vec![text("Latin1_General_CI_AS"), text("Latin1_General_CI_AS")]],
            vec![vec![
                Value::Int32(10),
                Value::Int32(1),
                text("int"),
                Value::Null,
                Value::Int16(4),
                Value::UInt8(10),
                Value::UInt8(0),
                Value::Bool(false),
                Value::Bool(false),
                Value::Bool(false),
                Value::Bool(false),
            ]],
            vec![],
            vec![],
        ]
    }

    #[tokio::test]
    async fn test_read_metadata_happy_path() {
        let executor = FixtureExecutor::new("16.0.1000", minimal_script());
        let mut stream = executor.execute("test", METADATA_BATCH).await.expect("execute");
        let raw = read_metadata(stream.as_mut()).await.expect("read");

        assert_eq!(raw.namespaces.len(), 1);
        assert_eq!(raw.namespaces[0].name, "dbo");
        assert_eq!(raw.collations.len(), 1);
        assert_eq!(raw.selection.server_collation, "Latin1_General_CI_AS");
        assert_eq!(raw.types.len(), 1);
        assert_eq!(raw.types[0].name, "int");
        assert!(raw.types[0].parent_id.is_none());
        assert!(raw.parameters.is_empty());
        assert!(raw.columns.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_batch_is_an_error() {
        let executor = FixtureExecutor::new("16.0", vec![vec![], vec![]]);
        let mut stream = executor.execute("test", METADATA_BATCH).await.expect("execute");
        let err = read_metadata(stream.as_mut()).await.expect_err("too few sets");
        assert!(matches!(err, LoadError::Unknown { .. }));
    }

    #[tokio::test]
    async fn test_extra_selection_row_is_rejected() {
        let mut script = minimal_script();
        script[2].push(vec![text("other"), text("other")]);
        let executor = FixtureExecutor::new("16.0", script);
        let mut stream = executor.execute("test", METADATA_BATCH).await.expect("execute");
        let err = read_metadata(stream.as_mut()).await.expect_err("extra row");
        assert!(matches!(
            err,
            LoadError::UnexpectedExtraRow {
                result_set: "collation selection"
            }
        ));
    }

    #[test]
    fn test_extract_major_version() {
        assert_eq!(extract_major_version("16.0.1000.6"), Some(16));
        assert_eq!(extract_major_version("11.0"), Some(11));
        assert_eq!(extract_major_version("garbage"), None);
    }

    #[test]
    fn test_version_gate() {
        assert!(ensure_supported_version("16.0.1000").is_ok());
        assert!(ensure_supported_version("11.0.2100").is_ok());
        let err = ensure_supported_version("10.50.1600").expect_err("too old");
        assert!(matches!(
            err,
            LoadError::UnsupportedServerVersion { minimum: 11, .. }
        ));
    }
}
