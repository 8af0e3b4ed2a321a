use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::providers::{Backend, ModelSpec, ModelTable};

#[derive(Clone, Debug)]
pub struct TimeoutConfig {
    pub chat: Duration,
    pub rag: Duration,
    pub auth_probe: Duration,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub secret: String,
    pub remote_url: String,
    /// username/password pairs for the local fallback table.
    pub users: Vec<(String, String)>,
    pub token_ttl_secs: i64,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub anthropic_api_key: Option<String>,
    pub corpus_file: Option<PathBuf>,
    pub retrieval_top_k: usize,
    pub chat_models: ModelTable,
    pub rag_models: ModelTable,
    pub timeouts: TimeoutConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let ollama_base_url =
            env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
        let anthropic_base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());

        let ollama = |name: &str| ModelSpec {
            id: format!("ollama/{name}"),
            backend: Backend::Ollama {
                base_url: ollama_base_url.clone(),
            },
        };
        let anthropic = |name: &str| ModelSpec {
            id: format!("anthropic/{name}"),
            backend: Backend::Anthropic {
                base_url: anthropic_base_url.clone(),
            },
        };

        let chat_models = ModelTable::new(
            vec![
                ollama("llama3.2:latest"),
                anthropic("claude-haiku-4-5-20251001"),
                anthropic("claude-sonnet-4-6"),
            ],
            env::var("CHAT_DEFAULT_MODEL").unwrap_or_else(|_| "ollama/llama3.2:latest".to_string()),
        );

        let rag_models = ModelTable::new(
            vec![
                ollama("qwen2.5:latest"),
                anthropic("claude-haiku-4-5-20251001"),
                anthropic("claude-sonnet-4-6"),
            ],
            env::var("RAG_DEFAULT_MODEL").unwrap_or_else(|_| "ollama/qwen2.5:latest".to_string()),
        );

        Self {
            bind_addr: env::var("MODELGATE_BIND").unwrap_or_else(|_| "127.0.0.1:9000".to_string()),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            corpus_file: env::var("MODELGATE_CORPUS_FILE").map(PathBuf::from).ok(),
            retrieval_top_k: env::var("RETRIEVAL_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            chat_models,
            rag_models,
            timeouts: TimeoutConfig {
                chat: Duration::from_secs(
                    env::var("CHAT_TIMEOUT_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(120),
                ),
                rag: Duration::from_secs(
                    env::var("RAG_TIMEOUT_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(60),
                ),
                auth_probe: Duration::from_secs(
                    env::var("AUTH_PROBE_TIMEOUT_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(2),
                ),
            },
            auth: AuthConfig {
                secret: env::var("AUTH_SECRET")
                    .unwrap_or_else(|_| "mock-secret-key-for-demo-only".to_string()),
                // A sidecar verification service; normally not running in
                // dev, so logins fall back to the local table.
                remote_url: env::var("AUTH_REMOTE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:9099/api/auth/verify".to_string()),
                users: parse_users(
                    &env::var("AUTH_USERS")
                        .unwrap_or_else(|_| "admin:password123,user:secret,demo:demo".to_string()),
                ),
                token_ttl_secs: 3600,
            },
        }
    }
}

/// The built-in retrieval corpus. Used unless MODELGATE_CORPUS_FILE points at
/// a newline-delimited replacement.
pub fn default_corpus() -> Vec<String> {
    [
        "Take a leisurely walk in the park and enjoy the fresh air.",
        "Visit a local museum and discover something new.",
        "Attend a live music concert and feel the rhythm.",
        "Go for a hike and admire the natural scenery.",
        "Have a picnic with friends and share some laughs.",
        "Explore a new cuisine by dining at an ethnic restaurant.",
        "Take a yoga class and stretch your body and mind.",
        "Join a local sports league and enjoy some friendly competition.",
        "Attend a workshop or lecture on a topic you're interested in.",
        "Visit an amusement park and ride the roller coasters.",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// One document per non-empty line, original order preserved.
pub fn parse_corpus(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_users(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (user, pass) = entry.trim().split_once(':')?;
            if user.is_empty() {
                return None;
            }
            Some((user.to_string(), pass.to_string()))
        })
        .collect()
}
