use clap::{Parser, Subcommand};
use smart_librarian::commands::{chat_loop, run_health_check, serve};
use smart_librarian::config::Config;

#[derive(Parser)]
#[command(name = "smart-librarian")]
#[command(about = "Retrieval-augmented book recommendation assistant")]
#[command(version)]
struct Cli {
    /// Run only the startup diagnostic and exit
    #[arg(long)]
    health: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop on stdin (the default)
    Chat {
        /// Number of retrieval results per question
        #[arg(long, default_value_t = 3)]
        k: usize,
        /// Rebuild the vector index before the first question
        #[arg(long)]
        rebuild: bool,
    },
    /// Start the HTTP API
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Run the startup diagnostic
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    if cli.health {
        run_health_check(&config);
        return Ok(());
    }

    match cli.command {
        None => chat_loop(&config, 3, false).await?,
        Some(Commands::Chat { k, rebuild }) => chat_loop(&config, k, rebuild).await?,
        Some(Commands::Serve { port }) => serve(config, port).await?,
        Some(Commands::Health) => {
            run_health_check(&config);
        }
    }

    Ok(())
}
