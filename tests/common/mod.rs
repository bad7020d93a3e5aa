//! Shared fixture-script builders for the integration tests.
#![allow(dead_code)]

use schemacast::Value;

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub fn namespace_row(id: i32, name: &str) -> Vec<Value> {
    vec![Value::Int32(id), text(name)]
}

pub fn collation_row(name: &str, code_page: i32, lcid: i32, flags: i32, version: u8) -> Vec<Value> {
    vec![
        text(name),
        Value::Int32(code_page),
        Value::Int32(lcid),
        Value::Int32(flags),
        Value::UInt8(version),
    ]
}

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
pub fn type_row(
    id: i32,
    namespace_id: i32,
    name: &str,
    parent_id: Option<i32>,
    max_length: i16,
    precision: u8,
    scale: u8,
    is_user_defined: bool,
    is_table: bool,
) -> Vec<Value> {
    vec![
        Value::Int32(id),
        Value::Int32(namespace_id),
        text(name),
        parent_id.map_or(Value::Null, Value::Int32),
        Value::Int16(max_length),
        Value::UInt8(precision),
        Value::UInt8(scale),
        Value::Bool(false),
        Value::Bool(is_user_defined),
        Value::Bool(false),
        Value::Bool(is_table),
    ]
}

pub fn program_marker_row(kind: u8, namespace_id: i32, program_name: &str) -> Vec<Value> {
    vec![
        Value::UInt8(kind),
        Value::Int32(namespace_id),
        text(program_name),
        Value::Int32(0),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
    ]
}

#[allow(clippy::too_many_arguments)]
pub fn parameter_row(
    kind: u8,
    namespace_id: i32,
    program_name: &str,
    ordinal: i32,
    name: &str,
    type_id: i32,
    max_length: i16,
    direction: u8,
) -> Vec<Value> {
    vec![
        Value::UInt8(kind),
        Value::Int32(namespace_id),
        text(program_name),
        Value::Int32(ordinal),
        text(name),
        Value::Int32(type_id),
        Value::Int16(max_length),
        Value::UInt8(0),
        Value::UInt8(0),
        Value::UInt8(direction),
        Value::Bool(false),
    ]
}

#[allow(clippy::too_many_arguments)]
pub fn column_row(
    kind: u8,
    namespace_id: i32,
    table_name: &str,
    table_type_id: Option<i32>,
    ordinal: i32,
    name: &str,
    type_id: i32,
    max_length: i16,
    is_nullable: bool,
    collation: Option<&str>,
) -> Vec<Value> {
    vec![
        Value::UInt8(kind),
        Value::Int32(namespace_id),
        text(table_name),
        table_type_id.map_or(Value::Null, Value::Int32),
        Value::Int32(ordinal),
        text(name),
        Value::Int32(type_id),
        Value::Int16(max_length),
        Value::UInt8(0),
        Value::UInt8(0),
        Value::Bool(is_nullable),
        collation.map_or(Value::Null, text),
    ]
}

/// The scenario script: `dbo` namespace, one collation used as server and
/// database default, system types `int`/`varchar`/`nvarchar`/`datetime`,
/// the `dbo.WidgetList` table type, a parameterless `dbo.GetAll`, and the
/// `dbo.Widgets` table.
pub fn standard_script() -> Vec<Vec<Vec<Value>>> {
    vec![
        vec![namespace_row(1, "dbo")],
        vec![collation_row("Latin1_General_CI_AS", 1252, 1033, 0x1, 2)],
        vec![vec![text("Latin1_General_CI_AS"), text("Latin1_General_CI_AS")]],
        vec![
            type_row(10, 1, "int", None, 4, 10, 0, false, false),
            type_row(11, 1, "varchar", None, 8000, 0, 0, false, false),
            type_row(12, 1, "nvarchar", None, 8000, 0, 0, false, false),
            type_row(13, 1, "datetime", None, 8, 23, 3, false, false),
            type_row(20, 1, "WidgetList", None, -1, 0, 0, true, true),
        ],
        vec![
            program_marker_row(1, 1, "GetAll"),
            parameter_row(1, 1, "AddWidget", 1, "@Name", 12, 200, 0),
        ],
        vec![
            column_row(0, 1, "Widgets", None, 0, "Id", 10, 4, false, None),
            column_row(
                0,
                1,
                "Widgets",
                None,
                1,
                "Name",
                12,
                200,
                true,
                Some("Latin1_General_CI_AS"),
            ),
            column_row(2, 1, "WidgetList", Some(20), 0, "Id", 10, 4, false, None),
            column_row(2, 1, "WidgetList", Some(20), 1, "Note", 12, 100, true, None),
        ],
    ]
}
