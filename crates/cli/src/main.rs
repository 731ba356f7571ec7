//! DocMind CLI, the main entry point.
//!
//! Commands:
//! - `init`       : write a default config file
//! - `serve`      : start the HTTP gateway
//! - `chat`       : interactive or single-message chat
//! - `ingest`     : index a PDF for a user
//! - `wipe-index` : drop every indexed passage
//! - `set-secret` : store an API key in the settings table
//! - `set-profile`: store a user's display name

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docmind",
    about = "DocMind: conversational retrieval over your own documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to ~/.docmind/config.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with your documents
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation session id
        #[arg(short, long, default_value = "cli")]
        session: String,

        /// Tenant whose documents are searched
        #[arg(short, long, env = "DOCMIND_USER", default_value = "local")]
        user: String,

        /// Model name (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,

        /// Allow the assistant to search the web
        #[arg(long)]
        web: bool,
    },

    /// Index a PDF document for a user
    Ingest {
        /// Path to the PDF
        path: std::path::PathBuf,

        /// Tenant that owns the document
        #[arg(short, long, env = "DOCMIND_USER", default_value = "local")]
        user: String,
    },

    /// Delete the whole vector index (all users)
    WipeIndex {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Store a secret such as GROQ_API_KEY in the settings table
    SetSecret { key: String, value: String },

    /// Store the display name used for a user
    SetProfile { user_id: String, full_name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat {
            message,
            session,
            user,
            model,
            web,
        } => {
            let options = commands::chat::ChatOptions {
                session,
                user,
                model,
                web,
            };
            commands::chat::run(message, options).await?
        }
        Commands::Ingest { path, user } => commands::ingest::run(&path, &user).await?,
        Commands::WipeIndex { yes } => commands::ingest::wipe(yes).await?,
        Commands::SetSecret { key, value } => commands::settings::set_secret(&key, &value).await?,
        Commands::SetProfile { user_id, full_name } => {
            commands::settings::set_profile(&user_id, &full_name).await?
        }
    }

    Ok(())
}
