use viborm_migrate_core::dialect::{DialectDriver, GenerationContext};
use viborm_migrate_core::diff::DiffEngine;
use viborm_migrate_core::diffop::DiffOperation;
use viborm_migrate_core::snapshot::{ColumnDef, EnumDef, SchemaSnapshot, TableDef};
use viborm_migrate_core::statement::Statement;
use viborm_migrate_dialect_sqlite::SqliteDriver;

fn sql(statement: &Statement) -> &str {
    match statement {
        Statement::Sql { sql, .. } => sql,
        Statement::BatchBoundary => panic!("expected a SQL statement"),
    }
}

#[test]
fn alter_column_recreates_the_table_in_the_documented_order() {
    let mut current_users = TableDef::new("users");
    current_users.columns.push(ColumnDef::new("id", "INTEGER", false));
    current_users.columns.push(ColumnDef::new("age", "TEXT", true));
    let current = SchemaSnapshot::new(vec![current_users], vec![]);

    let mut desired_users = TableDef::new("users");
    desired_users.columns.push(ColumnDef::new("id", "INTEGER", false));
    desired_users.columns.push(ColumnDef::new("age", "INTEGER", true));
    let desired = SchemaSnapshot::new(vec![desired_users], vec![]);

    let driver = SqliteDriver::new();
    let context = GenerationContext {
        current: &current,
        desired: &desired,
    };
    let statements = driver
        .generate(
            &DiffOperation::AlterColumn {
                table: "users".into(),
                from: ColumnDef::new("age", "TEXT", true),
                to: ColumnDef::new("age", "INTEGER", true),
            },
            &context,
        )
        .unwrap();

    let rendered: Vec<&str> = statements.iter().map(sql).collect();
    assert_eq!(rendered[0], "PRAGMA foreign_keys=OFF");
    assert!(rendered[1].starts_with(r#"CREATE TABLE "__new_users""#));
    assert!(rendered[2].starts_with(r#"INSERT INTO "__new_users" ("id", "age") SELECT "id", "age" FROM "users""#));
    assert_eq!(rendered[3], r#"DROP TABLE "users""#);
    assert_eq!(rendered[4], r#"ALTER TABLE "__new_users" RENAME TO "users""#);
    assert_eq!(*rendered.last().unwrap(), "PRAGMA foreign_keys=ON");
}

#[test]
fn enum_value_addition_with_no_removals_still_recreates_dependent_table() {
    let mut table = TableDef::new("users");
    table.columns.push(ColumnDef::new("id", "INTEGER", false));
    table
        .columns
        .push(ColumnDef::new("status", "TEXT", false).with_enum_type("status"));
    let current = SchemaSnapshot::new(
        vec![table.clone()],
        vec![EnumDef::new("status", vec!["active".into(), "inactive".into()])],
    );
    let desired = SchemaSnapshot::new(
        vec![table],
        vec![EnumDef::new(
            "status",
            vec!["active".into(), "inactive".into(), "pending".into()],
        )],
    );

    let outcome = DiffEngine::new().diff(&current, &desired);
    assert_eq!(outcome.operations.len(), 1);
    assert!(matches!(outcome.operations[0], DiffOperation::AlterEnum { .. }));

    let driver = SqliteDriver::new();
    let context = GenerationContext {
        current: &current,
        desired: &desired,
    };
    let statements = driver.generate(&outcome.operations[0], &context).unwrap();
    let rendered: Vec<&str> = statements.iter().map(sql).collect();
    assert!(rendered.iter().any(|s| s.contains(r#"CHECK ("status" IN ('active', 'inactive', 'pending'))"#)));
    assert!(rendered.iter().any(|s| s.starts_with(r#"CREATE TABLE "__new_users""#)));
}
