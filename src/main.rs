use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use walletbook::core::log::init_logging;
use walletbook::{AppCommand, parse_window};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Report window; the current month when omitted.
#[derive(Args)]
struct WindowArgs {
    /// First day, YYYY-MM-DD
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Last day, YYYY-MM-DD
    #[arg(long, requires = "from")]
    to: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display income, expenses and balance
    Balance(WindowArgs),
    /// Display balance per wallet division
    ByDivision(WindowArgs),
    /// Display balance per transaction category
    ByType(WindowArgs),
    /// Display daily balance per wallet division
    Daily(WindowArgs),
    /// Check whether this month's balance is below the threshold
    Check {
        /// Threshold in ISK, defaults to the configured one
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Run the monthly balance notifier until Ctrl-C
    Watch,
    /// Display cached journal state per division
    Status,
}

impl TryFrom<Commands> for AppCommand {
    type Error = anyhow::Error;

    fn try_from(cmd: Commands) -> Result<AppCommand> {
        let window = |args: WindowArgs| parse_window(args.from.as_deref(), args.to.as_deref());
        Ok(match cmd {
            Commands::Balance(args) => AppCommand::Balance(window(args)?),
            Commands::ByDivision(args) => AppCommand::ByDivision(window(args)?),
            Commands::ByType(args) => AppCommand::ByType(window(args)?),
            Commands::Daily(args) => AppCommand::Daily(window(args)?),
            Commands::Check { threshold } => AppCommand::Check { threshold },
            Commands::Watch => AppCommand::Watch,
            Commands::Status => AppCommand::Status,
            Commands::Setup => anyhow::bail!("Setup command is handled separately"),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => walletbook::cli::setup::setup_at_path(path),
            None => walletbook::cli::setup::setup(),
        },
        Some(cmd) => match AppCommand::try_from(cmd) {
            Ok(command) => walletbook::run_command(command, cli.config_path.as_deref()).await,
            Err(e) => Err(e),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
