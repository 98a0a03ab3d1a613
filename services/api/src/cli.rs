use crate::demo::{print_blueprint, run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use intake_wizard::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Applicant Intake Wizard",
    about = "Serve or demonstrate the applicant intake wizard from the command line",
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
    /// Print the wizard steps and their sub-steps
    Steps,
    /// Walk a scripted applicant through every step against in-memory backends
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
    /// Skip the whole-record completeness check on submit
    #[arg(long)]
    pub(crate) lenient_submit: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Steps => {
            print_blueprint();
            Ok(())
        }
        Command::Demo(args) => run_demo(args).await,
    }
}
