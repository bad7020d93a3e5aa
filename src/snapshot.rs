//! Immutable, content-addressed schema snapshots.
//!
//! [`SchemaSnapshot::assemble`] turns the flat rows of one metadata batch
//! into a fully cross-referenced graph: namespaces, collations, native
//! types, programs, and tabular definitions, each indexed by both full
//! and bare name and iterable in full-name order. The snapshot's identity
//! is a SHA-256 hash over its sorted structural content; structurally
//! identical snapshots collapse to one shared instance through the
//! [`Registry`]. Any failure aborts the whole assembly; no partial
//! snapshot is ever published.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::collation::Collation;
use crate::error::LoadError;
use crate::executor::QueryExecutor;
use crate::loader::{self, ColumnRow, ParameterRow, RawMetadata};
use crate::model::{
    Column, ParameterDirection, ProgramDefinition, ProgramKind, ProgramParameter,
    SchemaNamespace, TabularDefinition, TabularKind,
};
use crate::registry::Registry;
use crate::size::SizeSpec;
use crate::types::{NativeType, ShapeColumn, TableShape};

/// One immutable load of schema metadata.
///
/// Equality is by content id: two snapshots are equal iff their
/// structural hashes match, and interned snapshots with equal ids are the
/// same allocation.
#[derive(Serialize)]
pub struct SchemaSnapshot {
    id: String,
    server_version: String,
    namespaces: Vec<Arc<SchemaNamespace>>,
    collations: Vec<Arc<Collation>>,
    server_collation: Arc<Collation>,
    database_collation: Arc<Collation>,
    types_sorted: Vec<Arc<NativeType>>,
    programs_sorted: Vec<Arc<ProgramDefinition>>,
    tables_sorted: Vec<Arc<TabularDefinition>>,
    #[serde(skip)]
    types_by_name: HashMap<String, Arc<NativeType>>,
    #[serde(skip)]
    programs_by_name: HashMap<String, Arc<ProgramDefinition>>,
    #[serde(skip)]
    tables_by_name: HashMap<String, Arc<TabularDefinition>>,
    #[serde(skip)]
    table_definitions: HashMap<String, Arc<TabularDefinition>>,
}

impl SchemaSnapshot {
    /// The snapshot's structural content id (hex SHA-256).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version string the server reported at load time.
    #[must_use]
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Namespaces in catalog id order.
    #[must_use]
    pub fn namespaces(&self) -> &[Arc<SchemaNamespace>] {
        &self.namespaces
    }

    /// Collations in name order.
    #[must_use]
    pub fn collations(&self) -> &[Arc<Collation>] {
        &self.collations
    }

    /// The server's default collation.
    #[must_use]
    pub fn server_collation(&self) -> &Arc<Collation> {
        &self.server_collation
    }

    /// The database's default collation.
    #[must_use]
    pub fn database_collation(&self) -> &Arc<Collation> {
        &self.database_collation
    }

    /// Native types in full-name order.
    #[must_use]
    pub fn types(&self) -> &[Arc<NativeType>] {
        &self.types_sorted
    }

    /// Programs in full-name order.
    #[must_use]
    pub fn programs(&self) -> &[Arc<ProgramDefinition>] {
        &self.programs_sorted
    }

    /// Tables, views, and table types in full-name order.
    #[must_use]
    pub fn tables(&self) -> &[Arc<TabularDefinition>] {
        &self.tables_sorted
    }

    /// Looks up a native type by full or bare name, case-insensitively.
    #[must_use]
    pub fn type_by_name(&self, name: &str) -> Option<&Arc<NativeType>> {
        self.types_by_name.get(&name.to_lowercase())
    }

    /// Looks up a program by full or bare name, case-insensitively.
    #[must_use]
    pub fn program_by_name(&self, name: &str) -> Option<&Arc<ProgramDefinition>> {
        self.programs_by_name.get(&name.to_lowercase())
    }

    /// Looks up a tabular definition by full or bare name,
    /// case-insensitively.
    #[must_use]
    pub fn table_by_name(&self, name: &str) -> Option<&Arc<TabularDefinition>> {
        self.tables_by_name.get(&name.to_lowercase())
    }

    /// The full tabular definition behind a table type.
    ///
    /// The table type ↔ definition cross-link is held here as a lookup
    /// rather than on the type itself.
    #[must_use]
    pub fn table_definition_of(&self, ty: &NativeType) -> Option<&Arc<TabularDefinition>> {
        if !ty.is_table() {
            return None;
        }
        self.table_definitions.get(&ty.full_name().to_lowercase())
    }

    /// Runs the metadata batch against an executor and assembles an
    /// interned snapshot.
    ///
    /// # Errors
    /// Any [`LoadError`]: version gate, driver failure, or assembly
    /// failure.
    pub(crate) async fn load(
        executor: &dyn QueryExecutor,
        connection: &str,
        registry: &Registry,
    ) -> Result<Arc<Self>, LoadError> {
        let version = executor.server_version(connection).await?;
        loader::ensure_supported_version(&version)?;
        let mut stream = executor.execute(connection, loader::METADATA_BATCH).await?;
        let raw = loader::read_metadata(stream.as_mut()).await?;
        Self::assemble(&raw, &version, registry)
    }

    /// Assembles the flat metadata rows into an interned snapshot.
    pub(crate) fn assemble(
        raw: &RawMetadata,
        server_version: &str,
        registry: &Registry,
    ) -> Result<Arc<Self>, LoadError> {
        // Phase 1: namespaces by id.
        if raw.namespaces.is_empty() {
            return Err(LoadError::NoNamespaces);
        }
        let mut namespaces_by_id: HashMap<i32, Arc<SchemaNamespace>> = HashMap::new();
        for row in &raw.namespaces {
            namespaces_by_id
                .entry(row.id)
                .or_insert_with(|| Arc::new(SchemaNamespace::new(row.id, row.name.clone())));
        }
        let mut namespaces: Vec<Arc<SchemaNamespace>> =
            namespaces_by_id.values().cloned().collect();
        namespaces.sort_by_key(|ns| ns.id());

        // Phase 2: collations by name, then the server/database selection.
        if raw.collations.is_empty() {
            return Err(LoadError::NoCollations);
        }
        let mut collations_by_name: HashMap<String, Arc<Collation>> = HashMap::new();
        for row in &raw.collations {
            collations_by_name
                .entry(row.name.to_lowercase())
                .or_insert_with(|| {
                    Arc::new(Collation::new(
                        row.name.clone(),
                        row.code_page,
                        row.locale_id,
                        row.flags.cast_unsigned(),
                        row.version,
                    ))
                });
        }
        let resolve_collation = |name: &str| {
            collations_by_name
                .get(&name.to_lowercase())
                .cloned()
                .ok_or_else(|| LoadError::CollationNotFound {
                    name: name.to_string(),
                })
        };
        let server_collation = resolve_collation(&raw.selection.server_collation)?;
        let database_collation = resolve_collation(&raw.selection.database_collation)?;
        let mut collations: Vec<Arc<Collation>> = collations_by_name.values().cloned().collect();
        collations.sort_by_key(|c| c.name().to_lowercase());

        // Phase 3: native types, bases before dependents.
        let mut types_by_id: HashMap<i32, Arc<NativeType>> = HashMap::new();
        let mut types_by_name: HashMap<String, Arc<NativeType>> = HashMap::new();
        for row in &raw.types {
            let namespace = namespaces_by_id
                .get(&row.namespace_id)
                .cloned()
                .ok_or(LoadError::SchemaNotFound {
                    id: row.namespace_id,
                })?;
            // A missing base id is tolerated: the row may reference a
            // group that is not part of this load.
            let parent = row.parent_id.and_then(|id| types_by_id.get(&id).cloned());
            let ty = NativeType::create(
                parent,
                namespace,
                row.name.clone(),
                SizeSpec::new(row.max_length, row.precision, row.scale),
                row.is_nullable,
                row.is_user_defined,
                row.is_clr,
                row.is_table,
            );
            types_by_id.insert(row.id, Arc::clone(&ty));
            types_by_name.insert(ty.full_name().to_lowercase(), Arc::clone(&ty));
            // First bare name wins; a qualified name is always available.
            types_by_name
                .entry(row.name.to_lowercase())
                .or_insert_with(|| Arc::clone(&ty));
        }
        let mut types_sorted: Vec<Arc<NativeType>> = types_by_id.values().cloned().collect();
        types_sorted.sort_by_key(|t| t.full_name().to_lowercase());

        // Phase 4: programs from flat parameter rows.
        let mut program_groups: BTreeMap<(u8, i32, String), Vec<&ParameterRow>> = BTreeMap::new();
        for row in &raw.parameters {
            program_groups
                .entry((row.kind, row.namespace_id, row.program_name.to_lowercase()))
                .or_default()
                .push(row);
        }
        let mut programs: Vec<Arc<ProgramDefinition>> = Vec::new();
        for ((kind, namespace_id, _), rows) in &program_groups {
            let namespace = namespaces_by_id
                .get(namespace_id)
                .cloned()
                .ok_or(LoadError::SchemaNotFound { id: *namespace_id })?;
            let name = rows[0].program_name.clone();
            let full_name = format!("{}.{}", namespace.name(), name);
            let mut parameters = Vec::new();
            // Rows with no parameter name mark a parameterless program.
            let mut named: Vec<&&ParameterRow> =
                rows.iter().filter(|r| r.name.is_some()).collect();
            named.sort_by_key(|r| r.ordinal);
            validate_contiguous(
                named.iter().map(|r| r.ordinal),
                &[0, 1],
                &full_name,
            )?;
            for row in named {
                let Some(param_name) = &row.name else { continue };
                let type_id = row.type_id.ok_or_else(|| {
                    LoadError::unknown(format!(
                        "parameter '{param_name}' of '{full_name}' has no type id"
                    ))
                })?;
                let base = types_by_id
                    .get(&type_id)
                    .ok_or(LoadError::TypeNotFound { id: type_id })?;
                parameters.push(ProgramParameter {
                    ordinal: row.ordinal,
                    name: param_name.clone(),
                    native_type: base.refine_with_size(SizeSpec::new(
                        row.max_length,
                        row.precision,
                        row.scale,
                    )),
                    direction: ParameterDirection::from_code(row.direction),
                    is_readonly: row.is_readonly,
                });
            }
            programs.push(Arc::new(ProgramDefinition {
                namespace,
                name,
                kind: ProgramKind::from_code(*kind),
                parameters,
            }));
        }
        let mut programs_by_name: HashMap<String, Arc<ProgramDefinition>> = HashMap::new();
        for program in &programs {
            programs_by_name
                .entry(program.name.to_lowercase())
                .or_insert_with(|| Arc::clone(program));
        }
        // Full names bind last so they always win over a colliding bare name.
        for program in &programs {
            programs_by_name.insert(program.full_name().to_lowercase(), Arc::clone(program));
        }
        let mut programs_sorted = programs;
        programs_sorted.sort_by_key(|p| p.full_name().to_lowercase());

        // Phase 5: tabular definitions from flat column rows.
        let mut table_groups: BTreeMap<(u8, i32, String), Vec<&ColumnRow>> = BTreeMap::new();
        for row in &raw.columns {
            table_groups
                .entry((row.kind, row.namespace_id, row.table_name.to_lowercase()))
                .or_default()
                .push(row);
        }
        let mut tables: Vec<Arc<TabularDefinition>> = Vec::new();
        let mut table_definitions: HashMap<String, Arc<TabularDefinition>> = HashMap::new();
        for ((kind, namespace_id, _), mut rows) in table_groups {
            let namespace = namespaces_by_id
                .get(&namespace_id)
                .cloned()
                .ok_or(LoadError::SchemaNotFound { id: namespace_id })?;
            let name = rows[0].table_name.clone();
            let full_name = format!("{}.{}", namespace.name(), name);
            rows.sort_by_key(|r| r.ordinal);
            validate_contiguous(rows.iter().map(|r| r.ordinal), &[0], &full_name)?;
            let mut columns = Vec::with_capacity(rows.len());
            for row in &rows {
                let base = types_by_id
                    .get(&row.type_id)
                    .ok_or(LoadError::TypeNotFound { id: row.type_id })?;
                let collation = row.collation.as_ref().and_then(|collation_name| {
                    let found = collations_by_name.get(&collation_name.to_lowercase());
                    if found.is_none() {
                        tracing::debug!(
                            "column '{}' of '{full_name}' names unknown collation \
                             '{collation_name}'",
                            row.name
                        );
                    }
                    found.cloned()
                });
                columns.push(Column {
                    ordinal: row.ordinal,
                    name: row.name.clone(),
                    native_type: base.refine_with_size(SizeSpec::new(
                        row.max_length,
                        row.precision,
                        row.scale,
                    )),
                    is_nullable: row.is_nullable,
                    collation,
                });
            }
            let table_type = match rows[0].table_type_id {
                Some(type_id) => {
                    let ty = types_by_id
                        .get(&type_id)
                        .ok_or(LoadError::TableTypeNotFound { id: type_id })?;
                    if !ty.is_table() {
                        return Err(LoadError::TypeNotATableType {
                            name: ty.full_name(),
                        });
                    }
                    Some(Arc::clone(ty))
                }
                None => None,
            };
            let definition = Arc::new(TabularDefinition {
                namespace,
                name,
                kind: TabularKind::from_code(kind),
                columns,
                table_type: table_type.clone(),
            });
            if let Some(ty) = table_type {
                let shape = TableShape {
                    columns: definition
                        .columns
                        .iter()
                        .map(|c| ShapeColumn {
                            native_type: Arc::clone(&c.native_type),
                            is_nullable: c.is_nullable,
                        })
                        .collect(),
                };
                if !ty.set_table_shape(shape) {
                    tracing::debug!(
                        "table type '{}' defined more than once in this load",
                        ty.full_name()
                    );
                }
                table_definitions
                    .insert(ty.full_name().to_lowercase(), Arc::clone(&definition));
            }
            tables.push(definition);
        }
        let mut tables_by_name: HashMap<String, Arc<TabularDefinition>> = HashMap::new();
        for table in &tables {
            tables_by_name
                .entry(table.name.to_lowercase())
                .or_insert_with(|| Arc::clone(table));
        }
        for table in &tables {
            tables_by_name.insert(table.full_name().to_lowercase(), Arc::clone(table));
        }
        let mut tables_sorted = tables;
        tables_sorted.sort_by_key(|t| t.full_name().to_lowercase());

        // Phase 6: structural identity and interning.
        let id = structural_id(
            &namespaces,
            &collations,
            &server_collation,
            &database_collation,
            &types_sorted,
            &programs_sorted,
            &tables_sorted,
        );
        let snapshot = Self {
            id,
            server_version: server_version.to_string(),
            namespaces,
            collations,
            server_collation,
            database_collation,
            types_sorted,
            programs_sorted,
            tables_sorted,
            types_by_name,
            programs_by_name,
            tables_by_name,
            table_definitions,
        };
        tracing::info!(
            id = %snapshot.id,
            types = snapshot.types_sorted.len(),
            programs = snapshot.programs_sorted.len(),
            tables = snapshot.tables_sorted.len(),
            "schema snapshot assembled"
        );
        Ok(registry.intern_snapshot(snapshot))
    }
}

impl PartialEq for SchemaSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SchemaSnapshot {}

impl std::fmt::Debug for SchemaSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSnapshot")
            .field("id", &self.id)
            .field("server_version", &self.server_version)
            .field("types", &self.types_sorted.len())
            .field("programs", &self.programs_sorted.len())
            .field("tables", &self.tables_sorted.len())
            .finish_non_exhaustive()
    }
}

/// A successfully published snapshot with its load instant.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    /// The interned snapshot.
    pub snapshot: Arc<SchemaSnapshot>,
    /// When the load completed.
    pub loaded_at: DateTime<Utc>,
}

/// Validates that sorted ordinals form one contiguous run starting at any
/// of the allowed origins.
fn validate_contiguous(
    ordinals: impl Iterator<Item = i32>,
    allowed_starts: &[i32],
    owner: &str,
) -> Result<(), LoadError> {
    let mut expected: Option<i32> = None;
    for ordinal in ordinals {
        match expected {
            None => {
                if !allowed_starts.contains(&ordinal) {
                    return Err(LoadError::OrdinalGap {
                        owner: owner.to_string(),
                    });
                }
                expected = Some(ordinal + 1);
            }
            Some(next) => {
                if ordinal != next {
                    return Err(LoadError::OrdinalGap {
                        owner: owner.to_string(),
                    });
                }
                expected = Some(next + 1);
            }
        }
    }
    Ok(())
}

fn structural_id(
    namespaces: &[Arc<SchemaNamespace>],
    collations: &[Arc<Collation>],
    server_collation: &Collation,
    database_collation: &Collation,
    types: &[Arc<NativeType>],
    programs: &[Arc<ProgramDefinition>],
    tables: &[Arc<TabularDefinition>],
) -> String {
    let mut hasher = Sha256::new();
    let mut put = |part: &str| {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    };
    for ns in namespaces {
        put(&format!("ns:{}:{}", ns.id(), ns.name().to_lowercase()));
    }
    for c in collations {
        put(&format!(
            "collation:{}:{}:{}",
            c.name().to_lowercase(),
            c.code_page(),
            c.locale_id()
        ));
    }
    put(&format!(
        "selection:{}:{}",
        server_collation.name().to_lowercase(),
        database_collation.name().to_lowercase()
    ));
    for t in types {
        put(&format!(
            "type:{}:{}:{:?}:{}:{}:{}",
            t.full_name().to_lowercase(),
            t.size(),
            t.code(),
            t.is_nullable(),
            t.is_user_defined(),
            t.is_table()
        ));
    }
    for p in programs {
        put(&format!(
            "program:{}:{}",
            p.full_name().to_lowercase(),
            p.kind
        ));
        for param in &p.parameters {
            put(&format!(
                "param:{}:{}:{}:{}:{}",
                param.ordinal,
                param.name.to_lowercase(),
                param.native_type.full_name().to_lowercase(),
                param.direction,
                param.is_readonly
            ));
        }
    }
    for t in tables {
        put(&format!("table:{}:{}", t.full_name().to_lowercase(), t.kind));
        for column in &t.columns {
            put(&format!(
                "column:{}:{}:{}:{}:{}",
                column.ordinal,
                column.name.to_lowercase(),
                column.native_type.full_name().to_lowercase(),
                column.native_type.size(),
                column.is_nullable
            ));
        }
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
