use crate::demo::{run_demo, DemoArgs};
use crate::snapshot::{run_snapshot, SnapshotCommand};
use crate::server;
use clap::{Args, Parser, Subcommand};
use sirepre::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "SIREPRE",
    about = "Run the SIREPRE registration intake and exercise the applicant flow from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk an applicant through the registration flow against an in-memory backend
    Demo(DemoArgs),
    /// Inspect or discard the persisted registration snapshot
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Refuse registrations regardless of PORTAL_OPEN
    #[arg(long)]
    pub(crate) closed: bool,
    /// Polling-station CSV export, overriding PORTAL_STATIONS_CSV
    #[arg(long, value_name = "CSV")]
    pub(crate) stations: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Snapshot { command } => run_snapshot(command),
    }
}
