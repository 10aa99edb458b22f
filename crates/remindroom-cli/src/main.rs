use clap::{CommandFactory, Parser, Subcommand};
use remindroom_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod surface;

#[derive(Parser)]
#[command(name = "remindroom", version, about = "Remindroom desktop reminder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reminder loop with a terminal alert surface
    Run {
        /// Speak the JSON-lines surface protocol on stdin/stdout
        #[arg(long)]
        json: bool,
    },
    /// Rule inspection and cache management
    Rules {
        #[command(subcommand)]
        action: commands::rules::RulesAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Logs go to stderr; stdout belongs to the alert surface.
fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(&config);

    let result = match cli.command {
        Commands::Run { json } => commands::run::run(&config, json),
        Commands::Rules { action } => commands::rules::run(&config, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "remindroom", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
