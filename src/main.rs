mod api;
mod gateway;
mod notifier;

use clap::{Parser, Subcommand};
use silvia_channels::WhatsAppBridgeChannel;
use silvia_core::{
    config::{self, KnowledgeKind},
    prompt,
    traits::{KnowledgeSource, Provider, StaticKnowledge},
};
use silvia_memory::{HistoryRecorder, Store, TableKnowledge};
use silvia_providers::GeminiProvider;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "silvia",
    version,
    about = "Silvia, a WhatsApp assistant answering from a knowledge base"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, env = "SILVIA_CONFIG", default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to WhatsApp and start answering.
    Start,
    /// Check configuration, provider and database health.
    Status,
    /// Ask a one-shot question against the knowledge base.
    Ask {
        /// The question to ask.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    let mut cfg = config::load(&cli.config)?;
    cfg.apply_env()?;

    let _guard = init_logging(&cfg.silvia)?;

    match cli.command {
        Commands::Start => {
            cfg.validate()?;

            let provider: Arc<dyn Provider> =
                Arc::new(GeminiProvider::from_section(&cfg.provider.gemini));

            if !cfg.channel.whatsapp.enabled {
                anyhow::bail!("WhatsApp channel is disabled. Enable channel.whatsapp in config.toml.");
            }
            let channel = Arc::new(WhatsAppBridgeChannel::new(cfg.channel.whatsapp.clone()));

            let store = open_store(&cfg).await?;
            let knowledge = build_knowledge(&cfg, store.as_ref())?;
            let history = match &store {
                Some(store) if cfg.database.history => {
                    Some(HistoryRecorder::new(store.pool().clone()))
                }
                _ => None,
            };

            let notifier = Arc::new(notifier::StatusNotifier::new(&cfg.notifier));

            println!("{}: starting assistant...", cfg.silvia.name);
            let gw = Arc::new(gateway::Gateway::new(
                provider,
                channel,
                knowledge,
                history,
                notifier,
                cfg.bot.clone(),
                cfg.api.clone(),
            ));
            gw.run().await?;
        }
        Commands::Status => {
            println!("{}: status check\n", cfg.silvia.name);
            println!("Config: {}", cli.config);
            println!("Model: {}", cfg.provider.gemini.model);
            println!(
                "Prefix: {}",
                cfg.bot.active_prefix().unwrap_or("<none, every message>")
            );
            println!("Knowledge: {:?}", cfg.knowledge.source);
            println!("Bridge: {}", cfg.channel.whatsapp.bridge_url);
            println!();

            if let Err(e) = cfg.validate() {
                println!("  config: {e}");
            } else {
                println!("  config: ok");
            }

            let provider = GeminiProvider::from_section(&cfg.provider.gemini);
            println!(
                "  gemini: {}",
                if provider.is_available().await {
                    "available"
                } else {
                    "unreachable"
                }
            );

            if cfg.database.is_configured() {
                let health = match Store::connect(&cfg.database).await {
                    Ok(store) => match store.ping().await {
                        Ok(()) => format!("ok ({:?})", store.backend()),
                        Err(e) => e.to_string(),
                    },
                    Err(e) => e.to_string(),
                };
                println!("  database: {health}");
            } else {
                println!("  database: not configured");
            }

            println!(
                "  webhook: {}",
                match &cfg.notifier.webhook_url {
                    Some(url) if !url.is_empty() => url.as_str(),
                    _ => "not configured",
                }
            );
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: silvia ask <message>");
            }
            cfg.validate()?;

            let question = message.join(" ");
            let store = open_store(&cfg).await?;
            let knowledge = build_knowledge(&cfg, store.as_ref())?;
            let provider = GeminiProvider::from_section(&cfg.provider.gemini);

            let text = knowledge.knowledge().await?;
            let response = provider.complete(&prompt::compose(&text, &question)).await?;
            println!("{}", response.text);
        }
    }

    Ok(())
}

/// Console logging plus a daily-rotated file under `{data_dir}/logs`.
///
/// `RUST_LOG` wins over `silvia.log_level`. The returned guard must live as
/// long as the process or buffered file lines are lost.
fn init_logging(cfg: &config::SilviaConfig) -> anyhow::Result<WorkerGuard> {
    let log_dir = std::path::PathBuf::from(config::shellexpand(&cfg.data_dir)).join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "silvia.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}

/// Connect (and migrate, when asked) the database if anything needs it.
async fn open_store(cfg: &config::Config) -> anyhow::Result<Option<Store>> {
    if !cfg.uses_database() {
        return Ok(None);
    }
    let store = Store::connect(&cfg.database).await?;
    if cfg.database.migrate {
        store.migrate(&cfg.knowledge.table).await?;
    }
    Ok(Some(store))
}

/// Build the configured knowledge source.
fn build_knowledge(
    cfg: &config::Config,
    store: Option<&Store>,
) -> anyhow::Result<Arc<dyn KnowledgeSource>> {
    match cfg.knowledge.source {
        KnowledgeKind::Static => Ok(Arc::new(StaticKnowledge::new(
            cfg.knowledge.load_static(&cfg.silvia.name)?,
        ))),
        KnowledgeKind::Database => {
            let store = store.ok_or_else(|| {
                anyhow::anyhow!("knowledge source is 'database' but no database is configured")
            })?;
            Ok(Arc::new(TableKnowledge::new(
                store.pool().clone(),
                &cfg.knowledge.table,
            )?))
        }
    }
}
