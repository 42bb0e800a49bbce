//! dbstore CLI
//!
//! Inspect tables, apply configured table schemas and export records.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tracing::info;

use dbstore::schema::DdlOptions;
use dbstore::{Database, FieldValue, LoadOptions};

/// Schema reconciliation and record export for MySQL and TDS databases.
#[derive(Parser)]
#[command(name = "dbstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "dbstore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the introspected column definitions of a table.
    Describe {
        table: String,
    },

    /// Apply the table schemas declared in the configuration.
    Sync {
        /// Print the statements without executing them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Load one record and print it as JSON or XML.
    Export {
        table: String,

        /// Key field and value, `field=value`; repeat for composite keys.
        #[arg(short, long = "key", required = true)]
        keys: Vec<String>,

        /// Print XML instead of JSON.
        #[arg(long)]
        xml: bool,
    },
}

fn parse_keys(pairs: &[String]) -> anyhow::Result<IndexMap<String, FieldValue>> {
    let mut keys = IndexMap::new();
    for pair in pairs {
        let Some((field, value)) = pair.split_once('=') else {
            bail!("Invalid key {:?}, expected field=value", pair);
        };
        keys.insert(field.trim().to_string(), FieldValue::from(value));
    }
    Ok(keys)
}

async fn describe(db: &Database, name: &str) -> anyhow::Result<()> {
    let table = db.table(name);
    let columns = table.columns().await?;
    if columns.is_empty() {
        bail!("Table {} does not exist in {}", table.name(), db.name());
    }
    for column in columns.iter() {
        println!("{}", column.render_ddl(db.dialect(), DdlOptions { include_index: true }));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.to_string_lossy().to_string();
    let (config, db) = dbstore::init(&config_path)
        .await
        .with_context(|| format!("Failed to initialize from {}", config_path))?;

    match cli.command {
        Commands::Describe { table } => describe(&db, &table).await?,

        Commands::Sync { dry_run } => {
            let dry_run = dry_run || config.dry_run();
            if config.tables.is_empty() {
                info!("No tables declared in configuration");
            }
            for spec in &config.tables {
                let statements = if dry_run {
                    db.plan_sync(spec).await?
                } else {
                    db.sync(spec).await?
                };
                if statements.is_empty() {
                    info!(table = %spec.name, "Table is up to date");
                }
                for sql in statements {
                    println!("{};", sql);
                }
            }
        }

        Commands::Export { table, keys, xml } => {
            let keys = parse_keys(&keys)?;
            let table = db.table(&table);
            let mut record = table.new_record();
            let options = LoadOptions {
                keys: Some(keys),
                ..LoadOptions::default()
            };
            if !record.load(options).await? {
                bail!("No matching record in {}", table.name());
            }
            if xml {
                println!("{}", record.to_xml().await?);
            } else {
                match record.to_json().await? {
                    Some(json) => println!("{}", json),
                    None => bail!("Record has no fields to export"),
                }
            }
        }
    }

    Ok(())
}
