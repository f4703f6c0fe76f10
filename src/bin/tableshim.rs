use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tableshim::cli::{self, Command};

#[derive(Parser, Debug)]
#[command(name = "tableshim", version, about = "Inspect tableshim query translation and configuration", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, global = true, help = "Path to a config file (TOML). Environment variables override it.")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Translate a query options object into the store's native filter")]
    Translate {
        #[arg(long, help = "Table the query targets")]
        table: String,
        #[arg(long, help = "Options JSON, e.g. '{\"where\":{\"age\":{\">\":30}},\"limit\":10}'")]
        options: String,
        #[arg(long, help = "Join conditions with 'or' instead of 'and'")]
        or: bool,
    },
    #[command(about = "Check an options object for unsupported operations")]
    Check {
        #[arg(long, help = "Options JSON")]
        options: String,
    },
    #[command(about = "Print the resolved configuration with the secret redacted")]
    Config,
}

fn main() -> ExitCode {
    if let Err(e) = tableshim::logger::configure_from_env() {
        eprintln!("logging disabled: {e}");
    }
    let args = Cli::parse();
    let cmd = match args.command {
        Commands::Translate { table, options, or } => Command::Translate { table, options_json: options, or },
        Commands::Check { options } => Command::Check { options_json: options },
        Commands::Config => Command::Config { path: args.config },
    };
    let stdout = std::io::stdout();
    match cli::run(cmd, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
