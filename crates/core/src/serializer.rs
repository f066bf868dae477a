//! The snapshot serializer (C3): declared models → [`SchemaSnapshot`],
//! including synthesis of many-to-many junction tables.
//!
//! The field DSL itself belongs to the ORM's model layer and is out of
//! scope here; this module only needs the shape of what that layer hands
//! over; see [`FieldSpec`] and [`ModelDef`].

use std::collections::BTreeSet;

use crate::dialect::DialectKind;
use crate::error::{Error, Result};
use crate::snapshot::{
    ColumnDef, ForeignKeyAction, ForeignKeyDef, IndexDef, PrimaryKeyDef, SchemaSnapshot, TableDef,
    UniqueConstraintDef,
};

/// An override for one dialect's rendering of a field's type, taking
/// precedence over [`Serializer::map_field_type`] when `db` matches the
/// target dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTypeOverride {
    pub db: DialectKind,
    pub type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoGenerate {
    Uuid,
    Now,
    CUID,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub column_name: String,
    /// Dialect-independent logical type (`string`, `int`, `bool`, `uuid`, ...).
    pub type_name: String,
    pub nullable: bool,
    pub array: bool,
    pub has_default: bool,
    pub default: Option<String>,
    pub auto_generate: Option<AutoGenerate>,
    pub with_timezone: bool,
    pub is_unique: bool,
    pub is_id: bool,
    pub native_type: Option<NativeTypeOverride>,
}

impl FieldSpec {
    #[must_use]
    pub fn new(column_name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            column_name: column_name.into(),
            type_name: type_name.into(),
            nullable,
            array: false,
            has_default: false,
            default: None,
            auto_generate: None,
            with_timezone: false,
            is_unique: false,
            is_id: false,
            native_type: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ManyToMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSpec {
    pub kind: RelationKind,
    pub from_model: String,
    pub to_model: String,
    /// Explicit junction table name; defaults to `<a>_<b>` in sorted order.
    pub junction_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    pub name: String,
    pub table_name: Option<String>,
    pub fields: Vec<FieldSpec>,
    #[allow(clippy::struct_field_names)]
    pub indexes: Vec<IndexDef>,
    #[allow(clippy::struct_field_names)]
    pub unique_constraints: Vec<UniqueConstraintDef>,
    #[allow(clippy::struct_field_names)]
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub relations: Vec<RelationSpec>,
}

impl ModelDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            fields: Vec::new(),
            indexes: Vec::new(),
            unique_constraints: Vec::new(),
            foreign_keys: Vec::new(),
            relations: Vec::new(),
        }
    }

    fn table_name(&self) -> &str {
        self.table_name.as_deref().unwrap_or(&self.name)
    }
}

/// Maps a [`FieldSpec`]'s logical type to the dialect's native type string.
/// A minimal, honest mapping for the common scalar kinds; `native_type`
/// always wins when it targets the current dialect.
pub trait FieldTypeMapper {
    fn dialect(&self) -> DialectKind;
    fn map_field_type(&self, field: &FieldSpec) -> Result<String>;
    fn auto_generate_expression(&self, auto_generate: AutoGenerate) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Serializer;

impl Serializer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// # Errors
    /// [`Error::InvalidSchema`] when a many-to-many relation's side lacks a
    /// single-column primary key.
    pub fn serialize(
        &self,
        models: &[ModelDef],
        mapper: &dyn FieldTypeMapper,
    ) -> Result<SchemaSnapshot> {
        // Pass 1: materialise every table without junction FKs, so junction
        // synthesis can look up any model's primary key regardless of
        // declaration order (spec's two-pass cyclic-reference handling).
        let mut tables = Vec::with_capacity(models.len());
        for model in models {
            tables.push(self.table_for_model(model, mapper)?);
        }

        let mut snapshot = SchemaSnapshot::new(tables, Vec::new());

        // Pass 2: attach junction tables for many-to-many relations.
        let mut seen_junctions: BTreeSet<String> = BTreeSet::new();
        for model in models {
            for relation in &model.relations {
                if relation.kind != RelationKind::ManyToMany {
                    continue;
                }
                let junction_name = junction_table_name(relation);
                if !seen_junctions.insert(junction_name.clone()) {
                    continue;
                }
                let junction = self.build_junction_table(&junction_name, relation, &snapshot)?;
                snapshot.tables.push(junction);
            }
        }

        snapshot.tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(snapshot)
    }

    fn table_for_model(&self, model: &ModelDef, mapper: &dyn FieldTypeMapper) -> Result<TableDef> {
        let mut table = TableDef::new(model.table_name().to_string());
        let mut id_columns = Vec::new();

        for field in &model.fields {
            let type_name = if let Some(native) = &field.native_type
                && native.db == mapper.dialect()
            {
                native.type_name.clone()
            } else {
                mapper.map_field_type(field)?
            };

            let default = match (&field.default, field.has_default, field.auto_generate) {
                (Some(default), _, _) => Some(default.clone()),
                (None, true, Some(auto_generate)) => {
                    Some(mapper.auto_generate_expression(auto_generate)?)
                }
                _ => None,
            };

            let mut column = ColumnDef::new(field.column_name.clone(), type_name, field.nullable);
            column.default = default;
            table.columns.push(column);

            if field.is_unique {
                table.unique_constraints.push(UniqueConstraintDef {
                    name: format!("{}_{}_key", table.name, field.column_name),
                    columns: vec![field.column_name.clone()],
                });
            }
            if field.is_id {
                id_columns.push(field.column_name.clone());
            }
        }

        if !id_columns.is_empty() {
            table.primary_key = Some(PrimaryKeyDef {
                columns: id_columns,
                name: None,
            });
        }

        table.indexes = model.indexes.clone();
        table.unique_constraints.extend(model.unique_constraints.clone());
        table.foreign_keys = model.foreign_keys.clone();

        Ok(table)
    }

    fn build_junction_table(
        &self,
        junction_name: &str,
        relation: &RelationSpec,
        snapshot: &SchemaSnapshot,
    ) -> Result<TableDef> {
        let from_table = snapshot.table(&relation.from_model).ok_or_else(|| {
            Error::invalid_schema(format!(
                "many-to-many relation references unknown model `{}`",
                relation.from_model
            ))
        })?;
        let to_table = snapshot.table(&relation.to_model).ok_or_else(|| {
            Error::invalid_schema(format!(
                "many-to-many relation references unknown model `{}`",
                relation.to_model
            ))
        })?;

        let from_pk_column = single_pk_column(from_table)?;
        let to_pk_column = single_pk_column(to_table)?;

        let from_fk_column = format!("{}_{}", from_table.name, from_pk_column.name);
        let to_fk_column = format!("{}_{}", to_table.name, to_pk_column.name);

        let mut junction = TableDef::new(junction_name);
        junction.columns.push(ColumnDef::new(
            from_fk_column.clone(),
            from_pk_column.r#type.clone(),
            false,
        ));
        junction.columns.push(ColumnDef::new(
            to_fk_column.clone(),
            to_pk_column.r#type.clone(),
            false,
        ));
        junction.primary_key = Some(PrimaryKeyDef {
            columns: vec![from_fk_column.clone(), to_fk_column.clone()],
            name: None,
        });
        junction.foreign_keys.push(ForeignKeyDef {
            name: format!("{junction_name}_{from_fk_column}_fkey"),
            columns: vec![from_fk_column],
            referenced_table: from_table.name.clone(),
            referenced_columns: vec![from_pk_column.name.clone()],
            on_delete: Some(ForeignKeyAction::NoAction),
            on_update: Some(ForeignKeyAction::NoAction),
        });
        junction.foreign_keys.push(ForeignKeyDef {
            name: format!("{junction_name}_{to_fk_column}_fkey"),
            columns: vec![to_fk_column],
            referenced_table: to_table.name.clone(),
            referenced_columns: vec![to_pk_column.name.clone()],
            on_delete: Some(ForeignKeyAction::NoAction),
            on_update: Some(ForeignKeyAction::NoAction),
        });

        Ok(junction)
    }
}

fn single_pk_column(table: &TableDef) -> Result<&ColumnDef> {
    let pk = table.primary_key.as_ref().ok_or_else(|| {
        Error::invalid_schema(format!(
            "many-to-many relation requires `{}` to have a primary key",
            table.name
        ))
    })?;
    if pk.columns.len() != 1 {
        return Err(Error::invalid_schema(format!(
            "many-to-many relation requires a single-column primary key on `{}`; compound primary keys require a surrogate",
            table.name
        )));
    }
    table
        .column(&pk.columns[0])
        .ok_or_else(|| Error::internal(format!("primary key column `{}` vanished", pk.columns[0])))
}

fn junction_table_name(relation: &RelationSpec) -> String {
    if let Some(name) = &relation.junction_name {
        return name.clone();
    }
    let mut names = [relation.from_model.as_str(), relation.to_model.as_str()];
    names.sort_unstable();
    format!("{}_{}", names[0], names[1])
}
