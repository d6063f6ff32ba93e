use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use watson_middleware::config::{self, AppConfig};
use watson_middleware::store::FileStorage;
use watson_middleware::types::{ContextDelta, InboundMessage};
use watson_middleware::{BotWorker, Outcome, WatsonMiddleware};

#[derive(Parser)]
#[command(name = "watson-middleware")]
#[command(about = "Bridge chat messages to a Watson Assistant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read messages from stdin and print the assistant's replies
    Chat {
        /// End-user id the context is stored under
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        /// JSON object merged into the stored context before the first message
        #[arg(short, long)]
        context: Option<String>,

        /// Context store file (defaults to the configured path)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Send a single message
    Send {
        /// Message text (omit for text-less events such as welcome)
        text: Option<String>,

        #[arg(short, long, default_value = "cli-user")]
        user: String,

        /// Event type of the message
        #[arg(short = 't', long = "type", default_value = "message_received")]
        message_type: String,

        /// JSON object merged into the stored context
        #[arg(short, long)]
        context: Option<String>,

        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Delete a backend session and the data Watson keeps for it
    DeleteSession {
        session_id: String,
    },

    /// Store the Watson API key in the credentials directory
    Login,

    /// Show the resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::load()?;

    match cli.command {
        Commands::Chat {
            user,
            context,
            store,
        } => {
            let middleware = build_middleware(&config)?;
            let bot = bot_worker(&config, store);
            let mut delta = parse_delta(context.as_deref())?;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let mut message = InboundMessage::text(user.clone(), line);
                middleware
                    .send_to_watson(&bot, &mut message, delta.take().as_ref())
                    .await;
                print_reply(&message);
            }
            Ok(())
        }
        Commands::Send {
            text,
            user,
            message_type,
            context,
            store,
        } => {
            let middleware = build_middleware(&config)?;
            let bot = bot_worker(&config, store);
            let delta = parse_delta(context.as_deref())?;

            let mut message = InboundMessage {
                text,
                message_type,
                user,
                ..Default::default()
            };
            let outcome = middleware
                .send_to_watson(&bot, &mut message, delta.as_ref())
                .await;
            print_reply(&message);
            if let Outcome::Failed { .. } = outcome {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::DeleteSession { session_id } => {
            let middleware = build_middleware(&config)?;
            middleware.delete_user_data(&session_id).await?;
            println!("deleted session {session_id}");
            Ok(())
        }
        Commands::Login => {
            let key = rpassword::prompt_password("Watson API key: ")?;
            let path = watson_middleware::secrets::store_api_key(&key)?;
            println!("API key saved to {}", path.display());
            Ok(())
        }
        Commands::Status => {
            let w = &config.watson;
            println!("watson-middleware v{}", env!("CARGO_PKG_VERSION"));
            println!("service_url: {}", or_unset(&w.service_url));
            println!("assistant_id: {}", or_unset(&w.assistant_id));
            println!("api_version: {}", or_unset(&w.api_version));
            println!(
                "api_key: {}",
                if w.api_key.is_empty() { "<unset>" } else { "<redacted>" }
            );
            println!("inactivity_timeout_minutes: {}", w.inactivity_timeout_minutes);
            println!("minimum_confidence: {}", w.minimum_confidence);
            println!("store: {}", config.store.path.display());
            match config::validate(w) {
                Ok(()) => println!("config: ok"),
                Err(e) => println!("config: {e}"),
            }
            Ok(())
        }
    }
}

fn build_middleware(config: &AppConfig) -> anyhow::Result<WatsonMiddleware> {
    config::validate(&config.watson)?;
    Ok(WatsonMiddleware::new(&config.watson))
}

fn bot_worker(config: &AppConfig, store: Option<PathBuf>) -> BotWorker {
    let path = store.unwrap_or_else(|| config.store.path.clone());
    let storage = FileStorage::new(path);
    tracing::debug!(path = %storage.path().display(), "using context store");
    BotWorker::new(Arc::new(storage))
}

fn parse_delta(raw: Option<&str>) -> anyhow::Result<Option<ContextDelta>> {
    raw.map(|s| {
        serde_json::from_str::<ContextDelta>(s)
            .map_err(|e| anyhow::anyhow!("--context must be a JSON object: {e}"))
    })
    .transpose()
}

fn print_reply(message: &InboundMessage) {
    if let Some(error) = &message.watson_error {
        eprintln!("error: {error}");
        return;
    }
    if let Some(response) = &message.watson_data {
        for line in response.output_text() {
            println!("{line}");
        }
    }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "<unset>" } else { value }
}
