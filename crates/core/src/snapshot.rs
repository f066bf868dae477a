//! Dialect-neutral schema model (C1).
//!
//! A [`SchemaSnapshot`] is a fully-resolved, read-only description of a
//! database schema at one point in time. Both the introspector (C2, live DB
//! → snapshot) and the serializer (C3, declared models → snapshot) produce
//! these; the differ (C4) only ever compares two of them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, VibORMErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
}

impl SchemaSnapshot {
    #[must_use]
    pub fn new(tables: Vec<TableDef>, enums: Vec<EnumDef>) -> Self {
        Self { tables, enums }
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Validates the structural invariants from spec §3. Called by every
    /// producer (introspector, serializer) before handing a snapshot to the
    /// differ — the differ itself trusts its inputs.
    pub fn validate(&self) -> Result<()> {
        let mut seen_tables = BTreeSet::new();
        for table in &self.tables {
            if !seen_tables.insert(table.name.as_str()) {
                return Err(Error::invalid_schema(format!(
                    "duplicate table name `{}`",
                    table.name
                )));
            }
            table.validate()?;
        }

        let mut seen_enums = BTreeSet::new();
        for e in &self.enums {
            if !seen_enums.insert(e.name.as_str()) {
                return Err(Error::invalid_schema(format!(
                    "duplicate enum name `{}`",
                    e.name
                )));
            }
        }

        for table in &self.tables {
            for column in &table.columns {
                if let Some(enum_name) = &column.enum_type
                    && !seen_enums.contains(enum_name.as_str())
                {
                    return Err(Error::invalid_schema(format!(
                        "column `{}.{}` references unknown enum `{enum_name}`",
                        table.name, column.name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Option<PrimaryKeyDef>,
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
    #[serde(default)]
    pub unique_constraints: Vec<UniqueConstraintDef>,
}

impl TableDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn validate(&self) -> Result<()> {
        let mut seen_columns = BTreeSet::new();
        for column in &self.columns {
            if !seen_columns.insert(column.name.as_str()) {
                return Err(Error::invalid_schema(format!(
                    "duplicate column name `{}` on table `{}`",
                    column.name, self.name
                )));
            }
        }

        let has_column = |name: &str| seen_columns.contains(name);

        if let Some(pk) = &self.primary_key {
            for column in &pk.columns {
                if !has_column(column) {
                    return Err(Error::invalid_schema(format!(
                        "primary key on `{}` references unknown column `{column}`",
                        self.name
                    )));
                }
            }
        }

        let mut seen_index_names = BTreeSet::new();
        for index in &self.indexes {
            if !seen_index_names.insert(index.name.as_str()) {
                return Err(Error::invalid_schema(format!(
                    "duplicate index name `{}` on table `{}`",
                    index.name, self.name
                )));
            }
            for column in &index.columns {
                if !has_column(column) {
                    return Err(Error::invalid_schema(format!(
                        "index `{}` on `{}` references unknown column `{column}`",
                        index.name, self.name
                    )));
                }
            }
        }

        let mut seen_constraint_names = BTreeSet::new();
        for fk in &self.foreign_keys {
            if !seen_constraint_names.insert(fk.name.as_str()) {
                return Err(Error::invalid_schema(format!(
                    "duplicate constraint name `{}` on table `{}`",
                    fk.name, self.name
                )));
            }
            for column in &fk.columns {
                if !has_column(column) {
                    return Err(Error::invalid_schema(format!(
                        "foreign key `{}` on `{}` references unknown column `{column}`",
                        fk.name, self.name
                    )));
                }
            }
        }

        for unique in &self.unique_constraints {
            if !seen_constraint_names.insert(unique.name.as_str()) {
                return Err(Error::invalid_schema(format!(
                    "duplicate constraint name `{}` on table `{}`",
                    unique.name, self.name
                )));
            }
            for column in &unique.columns {
                if !has_column(column) {
                    return Err(Error::invalid_schema(format!(
                        "unique constraint `{}` on `{}` references unknown column `{column}`",
                        unique.name, self.name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Native, dialect-rendered type string (`integer`, `VARCHAR(255)`,
    /// `ENUM('a','b')`, or a bare enum type name).
    pub r#type: String,
    pub nullable: bool,
    /// Already SQL-ready: an escaped literal or a function call expression.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    /// Set when `type` names an enum; lets the differ and `SchemaSnapshot::validate`
    /// resolve the reference without re-parsing `type`.
    #[serde(default)]
    pub enum_type: Option<String>,
}

impl ColumnDef {
    #[must_use]
    pub fn new(name: impl Into<String>, r#type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
            nullable,
            default: None,
            auto_increment: false,
            enum_type: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn with_auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn with_enum_type(mut self, enum_name: impl Into<String>) -> Self {
        self.enum_type = Some(enum_name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyDef {
    pub columns: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    Btree,
    Hash,
    Gin,
    Gist,
    Fulltext,
    Spatial,
}

impl IndexType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Btree => "btree",
            Self::Hash => "hash",
            Self::Gin => "gin",
            Self::Gist => "gist",
            Self::Fulltext => "fulltext",
            Self::Spatial => "spatial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    #[serde(default)]
    pub index_type: Option<IndexType>,
    #[serde(default)]
    pub r#where: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
    SetDefault,
}

impl ForeignKeyAction {
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraintDef {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    /// Declaration order is significant: it is preserved verbatim in
    /// generated `CREATE TYPE ... AS ENUM` / `CHECK (... IN (...))` DDL.
    pub values: Vec<String>,
}

impl EnumDef {
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_table() -> TableDef {
        let mut table = TableDef::new("users");
        table.columns.push(ColumnDef::new("id", "integer", false));
        table.columns.push(ColumnDef::new("email", "text", false));
        table.primary_key = Some(PrimaryKeyDef {
            columns: vec!["id".to_string()],
            name: None,
        });
        table
    }

    #[test]
    fn valid_snapshot_passes() {
        let snapshot = SchemaSnapshot::new(vec![users_table()], vec![]);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn duplicate_table_name_fails() {
        let snapshot = SchemaSnapshot::new(vec![users_table(), users_table()], vec![]);
        let err = snapshot.validate().unwrap_err();
        assert_eq!(err.code(), VibORMErrorCode::InvalidSchema);
    }

    #[test]
    fn primary_key_must_reference_existing_column() {
        let mut table = users_table();
        table.primary_key = Some(PrimaryKeyDef {
            columns: vec!["missing".to_string()],
            name: None,
        });
        let snapshot = SchemaSnapshot::new(vec![table], vec![]);
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn enum_reference_must_resolve() {
        let mut table = users_table();
        table
            .columns
            .push(ColumnDef::new("status", "status_enum", false).with_enum_type("status_enum"));
        let snapshot = SchemaSnapshot::new(vec![table], vec![]);
        let err = snapshot.validate().unwrap_err();
        assert_eq!(err.code(), VibORMErrorCode::InvalidSchema);

        let snapshot = SchemaSnapshot::new(
            snapshot.tables,
            vec![EnumDef::new(
                "status_enum",
                vec!["active".into(), "inactive".into()],
            )],
        );
        assert!(snapshot.validate().is_ok());
    }
}
