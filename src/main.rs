// src/main.rs

//! romdb CLI entry point.

use anyhow::Result;
use clap::Parser;
use romdb::{collate, grouping, RomDb};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "romdb")]
#[command(about = "Content-addressed archival database for ROM collections", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Schema SQL file (built-in default when absent)
    #[arg(short, long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Files pool on import, dump root on dump
    #[arg(short, long, value_name = "PATH")]
    roms: Option<PathBuf>,

    /// Manifest directory to import
    #[arg(short, long, value_name = "PATH")]
    import: Option<PathBuf>,

    /// Write patch.txt manifests here instead of importing
    #[arg(short, long, value_name = "PATH")]
    patch: Option<PathBuf>,

    /// Manifest configuration suffix
    #[arg(short, long, value_name = "NAME")]
    configuration: Option<String>,

    /// Dump roms
    #[arg(short, long)]
    dump: bool,

    /// Dump roms and metadata
    #[arg(short, long)]
    full_dump: bool,

    /// Verify database integrity
    #[arg(short, long)]
    verify: bool,

    /// Natural-sort a text file in place
    #[arg(long, value_name = "FILE")]
    sort: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.configuration.unwrap_or_default();
    let db_path = cli.output.unwrap_or_default();

    if let Some(sort_path) = cli.sort {
        collate::sort_file(&sort_path)?;
        return Ok(());
    }

    if let Some(patch_path) = cli.patch {
        if let Some(import_path) = cli.import {
            grouping::write_patch_lists(&import_path, &patch_path, &config)?;
        }
        return Ok(());
    }

    if let Some(import_path) = cli.import {
        let db = RomDb::open_or_create(&db_path, cli.schema.as_deref())?;
        match cli.roms {
            Some(roms_path) => db.import_from_pool(&roms_path, &import_path, &config)?,
            None => db.import(&import_path, &config)?,
        };
        return Ok(());
    }

    if cli.dump || cli.full_dump {
        let db = RomDb::open(&db_path)?;
        db.dump(&cli.roms.unwrap_or_default(), cli.full_dump)?;
        return Ok(());
    }

    if cli.verify {
        let db = RomDb::open(&db_path)?;
        for report in db.verify()? {
            println!("{} - {}", report.code, report.name);
            for name in &report.bad_files {
                println!("bad         : {name}");
            }
            println!("total good  : {}", report.files_good);
            println!("total bad   : {}", report.files_bad);
            println!("no checksum : {}", report.files_no_checksum);
            println!();
        }
    }
    Ok(())
}
