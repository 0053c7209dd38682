use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "c2station", version, about = "C2 Station operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Console API authentication
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Device registry and presence
    Devices {
        #[command(subcommand)]
        action: commands::devices::DevicesAction,
    },
    /// Scheduled recordings
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Recordings stored on the console API
    Recordings {
        #[command(subcommand)]
        action: commands::recordings::RecordingsAction,
    },
    /// Run the console: ingest signals and commands from stdin, drive schedules
    Run(commands::run::RunArgs),
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Devices { action } => commands::devices::run(action),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Recordings { action } => commands::recordings::run(action),
        Commands::Run(args) => commands::run::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise the configured `log_level`. Logs go to stderr
/// so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = c2station_core::Config::load_or_default().log_level;
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
