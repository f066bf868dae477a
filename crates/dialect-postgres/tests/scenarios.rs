use std::collections::BTreeMap;

use viborm_migrate_core::dialect::{DialectDriver, GenerationContext};
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::snapshot::{ColumnDef, EnumDef, SchemaSnapshot};
use viborm_migrate_core::statement::Statement;
use viborm_migrate_dialect_postgres::PostgresDriver;

fn sql(statements: &[Statement], index: usize) -> &str {
    match &statements[index] {
        Statement::Sql { sql, .. } => sql,
        Statement::BatchBoundary => panic!("expected a SQL statement at index {index}"),
    }
}

#[test]
fn create_table_renders_serial_and_plain_columns() {
    let driver = PostgresDriver::new();
    let columns = vec![
        ColumnDef::new("id", "integer", false).with_auto_increment(),
        ColumnDef::new("email", "text", false),
        ColumnDef::new("name", "text", true),
    ];
    let statements = driver
        .generate(
            &DiffOperation::CreateTable {
                table: "users".into(),
                columns,
                primary_key: None,
            },
            &GenerationContext { current: &SchemaSnapshot::default(), desired: &SchemaSnapshot::default() },
        )
        .unwrap();

    let statement = sql(&statements, 0);
    assert!(statement.contains(r#""id" SERIAL NOT NULL"#));
    assert!(statement.contains(r#""email" text NOT NULL"#));
    assert!(statement.contains(r#""name" text"#));
    assert!(!statement.contains(r#""name" text NOT NULL"#));
}

#[test]
fn enum_add_value_renders_one_statement() {
    let driver = PostgresDriver::new();
    let statements = driver
        .generate(
            &DiffOperation::AlterEnum {
                r#enum: "status".into(),
                add_values: Some(vec!["pending".into()]),
                remove_values: None,
                new_values: None,
                dependent_columns: Vec::new(),
                value_replacements: BTreeMap::new(),
                default_replacement: None,
            },
            &GenerationContext { current: &SchemaSnapshot::default(), desired: &SchemaSnapshot::default() },
        )
        .unwrap();

    assert_eq!(statements.len(), 1);
    assert_eq!(sql(&statements, 0), "ALTER TYPE \"status\" ADD VALUE 'pending'");
}

#[test]
fn enum_remove_value_with_replacement_renders_five_statements_in_order() {
    let driver = PostgresDriver::new();
    let mut value_replacements = BTreeMap::new();
    value_replacements.insert("pending".to_string(), Some("active".to_string()));

    let statements = driver
        .generate(
            &DiffOperation::AlterEnum {
                r#enum: "status".into(),
                add_values: None,
                remove_values: Some(vec!["pending".into()]),
                new_values: Some(vec!["active".into(), "inactive".into()]),
                dependent_columns: vec![("users".into(), "status".into())],
                value_replacements,
                default_replacement: None,
            },
            &GenerationContext { current: &SchemaSnapshot::default(), desired: &SchemaSnapshot::default() },
        )
        .unwrap();

    assert_eq!(statements.len(), 5);
    assert!(sql(&statements, 0).contains("ALTER COLUMN \"status\" TYPE text"));
    assert!(sql(&statements, 1).starts_with("UPDATE \"users\" SET \"status\" = 'active'"));
    assert_eq!(sql(&statements, 2), "DROP TYPE \"status\"");
    assert_eq!(
        sql(&statements, 3),
        "CREATE TYPE \"status\" AS ENUM ('active', 'inactive')"
    );
    assert!(sql(&statements, 4).contains("USING \"status\"::\"status\""));
}

#[test]
fn create_enum_preserves_declaration_order() {
    let driver = PostgresDriver::new();
    let statements = driver
        .generate(
            &DiffOperation::CreateEnum {
                r#enum: EnumDef::new("status", vec!["active".into(), "inactive".into()]),
            },
            &GenerationContext { current: &SchemaSnapshot::default(), desired: &SchemaSnapshot::default() },
        )
        .unwrap();
    assert_eq!(
        sql(&statements, 0),
        "CREATE TYPE \"status\" AS ENUM ('active', 'inactive')"
    );
}
