use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "featurebot", version, about = "Scheduled and auto-pinned Lemmy posts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and run the scheduler until Ctrl-C
    Run,
    /// Run one housekeeping pass now
    Tick {
        /// Evaluate the rollover at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Create one post definition's posts now
    Create {
        /// Definition name, as in `posts.N.name`
        name: String,
    },
    /// Show feature records and the day marker
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which definition a post name matches
    Match {
        /// Post name, as it appears on the platform
        name: String,
    },
    /// Unfeature a post now and drop its record
    Unpin {
        /// Platform post id
        post_id: i64,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run => commands::run::run().await,
        Commands::Tick { at } => commands::tick::run(at).await,
        Commands::Create { name } => commands::create::run(&name).await,
        Commands::Status { json } => commands::status::run(json),
        Commands::Match { name } => commands::matching::run(&name),
        Commands::Unpin { post_id } => commands::unpin::run(post_id).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
