#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use inforequests_core::config::resolve_data_dir;
use inforequests_core::error::classify;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ir: freedom-of-information request tracker",
    long_about = None
)]
struct Cli {
    /// Data directory (default: $IR_HOME, then the platform data dir).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize the data directory",
        after_help = "EXAMPLES:\n    ir init\n    ir --data-dir ./foi init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(about = "Manage obligees")]
    Obligee {
        #[command(subcommand)]
        command: cmd::obligee::ObligeeCommand,
    },

    #[command(
        about = "Create and inspect inforequests",
        after_help = "EXAMPLES:\n    ir inforequest create --applicant \"Jane Doe\" --obligee 1 --subject \"Budget 2010\"\n    ir inforequest show 1"
    )]
    Inforequest {
        #[command(subcommand)]
        command: cmd::inforequest::InforequestCommand,
    },

    #[command(
        about = "Record actions on a branch",
        after_help = "EXAMPLES:\n    ir action add 1 --type confirmation\n    ir action add 1 --type disclosure --disclosure-level partial\n    ir action add 1 --type extension --extension 10"
    )]
    Action {
        #[command(subcommand)]
        command: cmd::action::ActionCommand,
    },

    #[command(
        about = "Advance a request to other obligees",
        after_help = "EXAMPLES:\n    ir advance 1 --to 2 --to 3"
    )]
    Advance(cmd::advance::AdvanceArgs),

    #[command(
        about = "Expire overdue branches",
        long_about = "Append EXPIRATION or APPEAL_EXPIRATION to every branch whose deadline has passed. Safe to run repeatedly; meant for a daily cron job."
    )]
    Expire(cmd::expire::ExpireArgs),

    #[command(about = "Inspect branches")]
    Branch {
        #[command(subcommand)]
        command: cmd::branch::BranchCommand,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("IR_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "inforequests=debug,ir=debug,info"
        } else {
            "inforequests=info,ir=info,warn"
        })
    });

    let format = env::var("IR_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let output = cli.output_mode();

    if let Commands::Init(args) = &cli.command {
        return cmd::init::run_init(args, &data_dir, output);
    }

    let session = cmd::Session::open(&data_dir)?;
    match &cli.command {
        Commands::Init(_) => Ok(()),
        Commands::Obligee { command } => cmd::obligee::run_obligee(command, &session, output),
        Commands::Inforequest { command } => {
            cmd::inforequest::run_inforequest(command, &session, output)
        }
        Commands::Action { command } => cmd::action::run_action(command, &session, output),
        Commands::Advance(args) => cmd::advance::run_advance(args, &session, output),
        Commands::Expire(args) => cmd::expire::run_expire(args, &session, output),
        Commands::Branch { command } => cmd::branch::run_branch(command, &session, output),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let output = cli.output_mode();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = classify(&err);
            tracing::debug!(code = code.code(), summary = code.message(), error = ?err, "command failed");
            if render_error(output, &CliError::from(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
