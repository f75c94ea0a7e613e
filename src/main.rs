//! Binary entry point for avrolite.
//!
//! Exports SQLite databases to Avro container files and loads them back.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Command results go to stdout; logs go to stderr.
#![allow(clippy::print_stdout)]

use anyhow::Context;
use avrolite::{NoopEnhancer, export_database, load_container, load_rows, read_schema, translate};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Avrolite - convert SQLite schemas and data to Avro and back.
#[derive(Parser)]
#[command(name = "avrolite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Export every user table to Avro container files.
    Export {
        /// Path to the SQLite database.
        #[arg(long, env = "AVROLITE_DB")]
        db: PathBuf,

        /// Output directory for the generated files.
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Prefix prepended to each output file name.
        #[arg(long, default_value = "")]
        prefix: String,

        /// Also write a JSON schema dump per table.
        #[arg(long)]
        json: bool,
    },

    /// Import an Avro row stream into a SQLite database,
    /// replacing the destination table.
    Import {
        /// Path to the SQLite database (created if missing).
        #[arg(long, env = "AVROLITE_DB")]
        db: PathBuf,

        /// Path to the table's JSON schema dump.
        #[arg(long)]
        schema: PathBuf,

        /// Path to the Avro data file.
        #[arg(long)]
        data: PathBuf,
    },

    /// Print a table's translated Avro record schema.
    Schema {
        /// Path to the SQLite database.
        #[arg(long, env = "AVROLITE_DB")]
        db: PathBuf,

        /// Table to translate.
        table: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("avrolite=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("avrolite=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        },
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Export {
            db,
            out,
            prefix,
            json,
        } => {
            let conn = rusqlite::Connection::open(&db)
                .with_context(|| format!("opening {}", db.display()))?;
            let files = export_database(&conn, &out, &prefix, json, &NoopEnhancer)?;
            for file in files {
                println!("{}", file.display());
            }
            Ok(())
        },

        Commands::Import { db, schema, data } => {
            let conn = rusqlite::Connection::open(&db)
                .with_context(|| format!("opening {}", db.display()))?;
            let schema: avrolite::TableSchema = serde_json::from_reader(
                File::open(&schema).with_context(|| format!("opening {}", schema.display()))?,
            )
            .context("parsing schema dump")?;

            // The data file may be a container file or a raw row stream;
            // a container is detected by its magic and unwrapped.
            let file =
                File::open(&data).with_context(|| format!("opening {}", data.display()))?;
            let mut reader = BufReader::new(file);
            let (count, result) = if is_container(&mut reader)? {
                load_container(&conn, &schema, reader)
            } else {
                load_rows(&conn, &schema, reader)
            };
            result.with_context(|| format!("{count} rows imported before failure"))?;
            println!("imported {count} rows into {}", schema.table);
            Ok(())
        },

        Commands::Schema { db, table } => {
            let conn = rusqlite::Connection::open(&db)
                .with_context(|| format!("opening {}", db.display()))?;
            let schema = read_schema(&conn, &table)?;
            let record = translate(&schema)?;
            println!("{}", serde_json::to_string_pretty(&record.to_json())?);
            Ok(())
        },
    }
}

/// Peeks at the stream to see whether it starts with the container magic.
fn is_container(reader: &mut BufReader<File>) -> anyhow::Result<bool> {
    use std::io::BufRead;
    let buf = reader.fill_buf()?;
    Ok(buf.starts_with(b"Obj\x01"))
}
