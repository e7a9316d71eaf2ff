use crate::demo::{run_demo, DemoArgs};
use crate::replay::{run_replay, ReplayArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tenant_lifecycle::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Tenant Lifecycle",
    about = "Provision and tear down tenant hosting sites from registry events",
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
    /// Feed a newline-delimited file of tenant events through the live collaborators
    Replay(ReplayArgs),
    /// Run the village7 provisioning and teardown scenario against in-memory collaborators
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Replay(args) => run_replay(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
