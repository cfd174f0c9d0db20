use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::output::{OutputMode, pretty_kv, render};
use inforequests_core::config::{CONFIG_FILE, render_default_config};
use inforequests_core::db::{DATABASE_FILE, Store, migrations};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config.toml with defaults even if the data directory exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitReport {
    data_dir: PathBuf,
    database: PathBuf,
    config: PathBuf,
    schema_version: u32,
}

/// Execute `ir init`. Creates the data directory:
///
/// ```text
/// <data-dir>/
///   config.toml            (defaults: timezone, deadlines, scheduler)
///   inforequests.sqlite3   (migrated to the latest schema)
/// ```
///
/// # Errors
///
/// Returns an error if the database already exists and `--force` is not
/// set, or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, data_dir: &Path, output: OutputMode) -> Result<()> {
    let database = data_dir.join(DATABASE_FILE);
    if database.exists() && !args.force {
        anyhow::bail!(
            "{} is already initialized. Use `ir init --force` to rewrite its config.",
            data_dir.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let config = data_dir.join(CONFIG_FILE);
    if !config.exists() || args.force {
        std::fs::write(&config, render_default_config()?)
            .with_context(|| format!("Failed to write config: {}", config.display()))?;
    }

    let store = Store::open(&database)?;
    let schema_version = migrations::current_schema_version(store.conn())?;
    tracing::info!(data_dir = %data_dir.display(), schema_version, "initialized data directory");

    let report = InitReport {
        data_dir: data_dir.to_path_buf(),
        database,
        config,
        schema_version,
    };
    render(output, &report, |r, w| {
        writeln!(w, "✓ Initialized {}", r.data_dir.display())?;
        pretty_kv(w, "database", r.database.display().to_string())?;
        pretty_kv(w, "config", r.config.display().to_string())?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  ir obligee add \"Town Hall\" --email \"Town Hall <hall@town.example>\"")?;
        writeln!(w, "  ir inforequest create --applicant \"Jane Doe\" --obligee 1")
    })
}
