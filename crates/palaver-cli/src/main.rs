use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;

use app::AppContext;

#[derive(Parser)]
#[command(name = "palaver")]
#[command(about = "Terminal client for the palaver chat backend", long_about = None)]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the token
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Invalidate the token and forget it
    Logout,
    /// List conversations, newest first
    List,
    /// Start a new conversation
    New,
    /// Print a conversation's messages
    Show { id: String },
    /// Rename a conversation
    Rename {
        id: String,
        title: String,
        /// Type the title out before saving it
        #[arg(long)]
        animate: bool,
    },
    /// Delete a conversation
    Delete { id: String },
    /// Change a conversation's generation settings
    Settings {
        id: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        context_length: Option<u32>,
    },
    /// Interactive chat
    Chat { id: Option<String> },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let ctx = AppContext::load(cli.api_url).await?;

    let result = match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&ctx, &username, password).await
        }
        Commands::Register {
            username,
            email,
            password,
        } => commands::auth::register(&ctx, &username, &email, password).await,
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::List => commands::conversations::list(&ctx).await,
        Commands::New => commands::conversations::create(&ctx).await,
        Commands::Show { id } => commands::conversations::show(&ctx, &id).await,
        Commands::Rename { id, title, animate } => {
            commands::conversations::rename(&ctx, &id, &title, animate).await
        }
        Commands::Delete { id } => commands::conversations::delete(&ctx, &id).await,
        Commands::Settings {
            id,
            model,
            temperature,
            context_length,
        } => {
            commands::conversations::settings(&ctx, &id, model, temperature, context_length).await
        }
        Commands::Chat { id } => commands::chat::run(&ctx, id).await,
    };

    if ctx.session_expired() {
        ctx.sync_credentials().await?;
        eprintln!("Session expired. Run `palaver login` to sign in again.");
    }
    result
}
