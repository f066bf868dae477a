//! Command-line front end for the migration core: `generate`, `apply`,
//! `rollback`, and `status`, each a thin wire-up of [`Orchestrator`] against
//! whichever dialect crate was enabled at build time.

mod connect;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result as MietteResult};
use viborm_migrate_core::config::MigrationConfig;
use viborm_migrate_core::orchestrator::{always_add_and_drop, always_rename, strict, Orchestrator, ResolverCallback};
use viborm_migrate_core::registry::DriverRegistry;
use viborm_migrate_core::snapshot::SchemaSnapshot;

use connect::connect_executor;

#[derive(Parser)]
#[command(name = "viborm-migrate", about = "Schema migration engine for VibORM", version)]
struct Cli {
    /// Target database dialect
    #[arg(long, value_enum, global = true)]
    dialect: Dialect,

    /// Directory holding the journal, snapshot, and migration files
    #[arg(long, value_name = "PATH", global = true, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Name of the tracking table
    #[arg(long, value_name = "NAME", global = true)]
    table_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// The `--dialect` flag selects a concrete *driver*, not just a SQL variant
/// — `Sqlite` and `Libsql` both speak `DialectKind::Sqlite` but are
/// registered and connected separately. This maps 1:1 onto
/// [`viborm_migrate_core::registry::DriverRegistry`]'s driver-name keying.
#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
    Libsql,
}

impl Dialect {
    fn driver_name(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Libsql => "libsql",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ResolverMode {
    Rename,
    AddDrop,
    Strict,
}

impl ResolverMode {
    fn callback(self) -> ResolverCallback<'static> {
        match self {
            Self::Rename => &always_rename,
            Self::AddDrop => &always_add_and_drop,
            Self::Strict => &strict,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Diff the current snapshot against a desired schema and write a new migration
    Generate {
        /// Path to a JSON-serialized desired [`SchemaSnapshot`]
        #[arg(long, value_name = "PATH")]
        schema: PathBuf,

        /// Name for the generated migration (e.g. `add_users_table`)
        name: String,

        /// How to resolve ambiguous rename-vs-add/drop changes
        #[arg(long, value_enum, default_value = "add-drop")]
        resolver: ResolverMode,

        /// Compute and print the SQL without writing any files
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply every pending migration
    Apply {
        /// Connection string or file path for the target database
        #[arg(long, value_name = "CONN")]
        connection: String,

        /// Stop after applying this migration (inclusive)
        #[arg(long, value_name = "NAME")]
        to: Option<String>,
    },

    /// Roll back the last applied migration(s)
    Rollback {
        #[arg(long, value_name = "CONN")]
        connection: String,

        /// Number of migrations to roll back
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Show applied and pending migrations
    Status {
        #[arg(long, value_name = "CONN")]
        connection: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> MietteResult<()> {
    let cli = Cli::parse();
    let driver_name = cli.dialect.driver_name();

    let mut config = MigrationConfig {
        migrations_dir: cli.migrations_dir,
        ..MigrationConfig::default()
    };
    if let Some(table_name) = cli.table_name {
        config.table_name = table_name;
    }
    if let Commands::Generate { dry_run, .. } = &cli.command {
        config.dry_run = *dry_run;
    }
    if let Commands::Apply { to, .. } = &cli.command {
        config.to.clone_from(to);
    }
    config.validate().into_diagnostic()?;

    let registry = build_registry();
    let driver = registry.get(driver_name).into_diagnostic()?;
    let orchestrator = Orchestrator::new(driver, config);

    match cli.command {
        Commands::Generate {
            schema,
            name,
            resolver,
            ..
        } => {
            let desired = read_schema(&schema)?;
            let current = orchestrator.current_snapshot().into_diagnostic()?;
            let now_millis = now_millis();
            let outcome = orchestrator
                .generate(&current, &desired, &name, resolver.callback(), now_millis)
                .into_diagnostic()?;
            report_generate(&outcome);
        }

        Commands::Apply { connection, .. } => {
            let mut executor = connect_executor(driver_name, &connection).into_diagnostic()?;
            let outcome = orchestrator.apply(executor.as_mut()).into_diagnostic()?;
            for entry in &outcome.applied {
                println!("applied {}", entry.name);
            }
            if outcome.applied.is_empty() {
                println!("nothing to apply");
            }
        }

        Commands::Rollback { connection, count } => {
            let mut executor = connect_executor(driver_name, &connection).into_diagnostic()?;
            let removed = orchestrator.rollback(executor.as_mut(), count).into_diagnostic()?;
            for row in &removed {
                println!("rolled back {}", row.name);
            }
        }

        Commands::Status { connection } => {
            let mut executor = connect_executor(driver_name, &connection).into_diagnostic()?;
            let report = orchestrator.status(executor.as_mut()).into_diagnostic()?;
            println!("applied:");
            for row in &report.applied {
                println!("  {} ({})", row.name, row.applied_at);
            }
            println!("pending:");
            for entry in &report.pending {
                println!("  {}", entry.name);
            }
        }
    }

    Ok(())
}

fn build_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    #[cfg(feature = "postgres")]
    registry.register(viborm_migrate_dialect_postgres::PostgresDriver::new());
    #[cfg(feature = "mysql")]
    registry.register(viborm_migrate_dialect_mysql::MySqlDriver::new());
    #[cfg(feature = "sqlite")]
    registry.register(viborm_migrate_dialect_sqlite::SqliteDriver::new());
    #[cfg(feature = "libsql")]
    registry.register(viborm_migrate_dialect_libsql::LibsqlDriver::new());
    registry
}

fn read_schema(path: &std::path::Path) -> MietteResult<SchemaSnapshot> {
    let contents = std::fs::read_to_string(path).into_diagnostic()?;
    let snapshot: SchemaSnapshot = serde_json::from_str(&contents).into_diagnostic()?;
    snapshot.validate().into_diagnostic()?;
    Ok(snapshot)
}

fn report_generate(outcome: &viborm_migrate_core::orchestrator::GenerateOutcome) {
    use viborm_migrate_core::orchestrator::GenerateOutcome;
    match outcome {
        GenerateOutcome::NoChanges => println!("no schema changes detected"),
        GenerateOutcome::Written(entry) => println!("wrote migration {}", entry.name),
        GenerateOutcome::DryRun { sql, operations_count } => {
            println!("-- {operations_count} operation(s), dry run");
            println!("{sql}");
        }
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
