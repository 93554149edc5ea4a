use ledger_assistant::{
    api::{start_server, AppState},
    classifier::GeminiIntentClassifier,
    config::Config,
    dispatcher::IntentDispatcher,
    gemini::GeminiClient,
    store::PgLedgerStore,
    telegram::TelegramClient,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    info!("Ledger assistant starting");
    info!("Port: {}", config.port);

    // Durable ledger store
    let store = PgLedgerStore::connect(&config.database_url).await?;
    store.ensure_schema().await?;

    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; every message will fall back to the chat reply");
    }

    // Create components (constructed here, injected below)
    let classifier =
        GeminiIntentClassifier::new(GeminiClient::new(config.gemini_api_key.clone())?);
    let dispatcher = IntentDispatcher::new(
        Arc::new(store),
        Arc::new(classifier),
        config.local_offset(),
    );
    let telegram = TelegramClient::new(&config.bot_token)?;

    // Webhook self-registration is best-effort: the service still serves
    // updates delivered to an already-registered webhook.
    if let Some(url) = config.webhook_url() {
        match telegram.set_webhook(&url).await {
            Ok(()) => info!("Webhook registered with Telegram"),
            Err(e) => warn!("Webhook self-registration failed: {}", e),
        }
    }

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        telegram: Arc::new(telegram),
        webhook_secret: Arc::new(config.bot_token.clone()),
    };

    start_server(state, config.port).await?;

    Ok(())
}
