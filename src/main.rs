use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use modelgate::auth::AuthService;
use modelgate::chat::ChatService;
use modelgate::config;
use modelgate::providers::Dispatcher;
use modelgate::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env();

    let corpus = load_corpus(&config).await?;
    anyhow::ensure!(!corpus.is_empty(), "document corpus must not be empty");
    anyhow::ensure!(
        config.chat_models.contains(&config.chat_models.default_model),
        "chat default model '{}' is not in the chat model table",
        config.chat_models.default_model
    );
    anyhow::ensure!(
        config.rag_models.contains(&config.rag_models.default_model),
        "rag default model '{}' is not in the rag model table",
        config.rag_models.default_model
    );
    tracing::info!(documents = corpus.len(), "corpus loaded");

    let dispatcher = Dispatcher::new(config.anthropic_api_key.clone());
    let chat = ChatService::new(&config, Arc::new(corpus), dispatcher);
    let auth = AuthService::new(config.auth.clone(), config.timeouts.auth_probe);

    run_server(config, chat, auth).await
}

async fn load_corpus(config: &AppConfig) -> Result<Vec<String>> {
    match &config.corpus_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed reading corpus file: {}", path.display()))?;
            Ok(config::parse_corpus(&raw))
        }
        None => Ok(config::default_corpus()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
