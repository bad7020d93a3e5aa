//! Schema introspection and type marshalling for SQL Server-family
//! engines.
//!
//! This crate loads an immutable snapshot of a database's structural
//! metadata (namespaces, collations, native and user-defined types,
//! stored programs, tables and views) and provides policy-governed
//! bidirectional conversion between host values and native SQL types,
//! enforcing each type's length, precision, and encoding constraints.
//!
//! # Security Guarantees
//! - Connection identities are redacted before appearing in errors or logs
//! - All metadata queries are read-only
//! - The wire protocol stays behind the [`QueryExecutor`] seam
//!
//! # Architecture
//! - One [`SchemaCache`] per connection identity, deduplicated through the
//!   process-wide [`Registry`], with mutually exclusive async loading
//! - Content-addressed [`SchemaSnapshot`]s: structurally identical loads
//!   collapse to one shared instance
//! - Per-type concurrent caches of built conversion functions, including
//!   cached negative results

pub mod cache;
pub mod collation;
pub mod diff;
pub mod error;
pub mod executor;
pub mod logging;
pub mod model;
pub mod registry;
pub mod size;
pub mod snapshot;
pub mod types;
pub mod value;

mod loader;

// Re-export commonly used types
pub use cache::{CacheConfig, SchemaCache};
pub use collation::{Collation, CollationVersion, CompareFlags, Encoding};
pub use diff::{Delta, Difference, Differences};
pub use error::{
    ConversionError, LoadError, Result, SchemaError, UsageError, redact_connection_identity,
};
pub use executor::{QueryExecutor, ResultStream};
pub use logging::init_logging;
pub use model::{
    Column, ParameterDirection, ProgramDefinition, ProgramKind, ProgramParameter,
    SchemaNamespace, TabularDefinition, TabularKind,
};
pub use registry::Registry;
pub use size::{MAX_LENGTH_UNLIMITED, SizeSpec};
pub use snapshot::{LoadedSnapshot, SchemaSnapshot};
pub use types::{CastFn, CastPolicy, DbTypeCode, NativeType, ShapeColumn, TableShape, TypeKind};
pub use value::{HostType, Row, Value};
