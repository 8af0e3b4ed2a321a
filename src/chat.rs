use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::{ChatMessage, ChatRequest, ChatResponse, RagRequest, RagResponse};
use crate::prompt;
use crate::providers::{Dispatcher, ModelTable, ProviderError};
use crate::retrieval;

/// Orchestrates both endpoints: resolve the model, assemble the prompt,
/// dispatch once, shape the response. Stateless across requests; the corpus
/// and model tables are immutable after startup.
#[derive(Clone)]
pub struct ChatService {
    chat_models: ModelTable,
    rag_models: ModelTable,
    dispatcher: Dispatcher,
    corpus: Arc<Vec<String>>,
    retrieval_top_k: usize,
    chat_timeout: Duration,
    rag_timeout: Duration,
}

impl ChatService {
    pub fn new(config: &AppConfig, corpus: Arc<Vec<String>>, dispatcher: Dispatcher) -> Self {
        Self {
            chat_models: config.chat_models.clone(),
            rag_models: config.rag_models.clone(),
            dispatcher,
            corpus,
            retrieval_top_k: config.retrieval_top_k,
            chat_timeout: config.timeouts.chat,
            rag_timeout: config.timeouts.rag,
        }
    }

    pub fn chat_models(&self) -> &ModelTable {
        &self.chat_models
    }

    pub fn rag_models(&self) -> &ModelTable {
        &self.rag_models
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model_id = request
            .model
            .unwrap_or_else(|| self.chat_models.default_model.clone());
        let spec = self.chat_models.resolve(&model_id)?;

        tracing::info!(
            model = %spec.id,
            history_length = request.history.len(),
            message_length = request.message.len(),
            "chat message"
        );

        let messages = prompt::chat_messages(&request.history, &request.message);
        let answer = self
            .dispatcher
            .generate(spec, &messages, self.chat_timeout)
            .await?;

        let mut history = request.history;
        history.push(ChatMessage::user(&request.message));
        history.push(ChatMessage::assistant(answer.clone()));

        Ok(ChatResponse {
            message: answer,
            model: model_id,
            history,
        })
    }

    pub async fn rag(&self, request: RagRequest) -> Result<RagResponse, ProviderError> {
        let model_id = request
            .model
            .unwrap_or_else(|| self.rag_models.default_model.clone());
        let spec = self.rag_models.resolve(&model_id)?;

        let ranked = retrieval::rank(&request.query, &self.corpus, self.retrieval_top_k);
        let context: Vec<&str> = ranked.iter().map(|doc| doc.text).collect();

        tracing::info!(
            model = %spec.id,
            query_length = request.query.len(),
            retrieved = context.len(),
            "rag query"
        );

        let prompt_text = prompt::rag_prompt(&context, &request.query);
        let messages = vec![ChatMessage::user(prompt_text)];
        let answer = self
            .dispatcher
            .generate(spec, &messages, self.rag_timeout)
            .await?;

        Ok(RagResponse {
            query: request.query,
            answer,
            context_documents: context.into_iter().map(str::to_string).collect(),
            model: model_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::models::Role;
    use crate::providers::{Backend, ModelSpec};

    fn service_against(base_url: &str, corpus: Vec<String>) -> ChatService {
        let spec = |id: &str| ModelSpec {
            id: id.to_string(),
            backend: Backend::Ollama {
                base_url: base_url.to_string(),
            },
        };

        ChatService {
            chat_models: ModelTable::new(
                vec![spec("ollama/llama3.2:latest")],
                "ollama/llama3.2:latest",
            ),
            rag_models: ModelTable::new(
                vec![spec("ollama/qwen2.5:latest")],
                "ollama/qwen2.5:latest",
            ),
            dispatcher: Dispatcher::new(None),
            corpus: Arc::new(corpus),
            retrieval_top_k: 2,
            chat_timeout: Duration::from_secs(5),
            rag_timeout: Duration::from_secs(5),
        }
    }

    async fn spawn_echo_backend(reply: &str) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let reply = reply.to_string();

        let app = Router::new().route(
            "/api/chat",
            post(move || {
                let counter = counter.clone();
                let reply = reply.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"message": {"role": "assistant", "content": reply}}))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), calls)
    }

    #[tokio::test]
    async fn unknown_model_is_rejected_before_any_backend_call() {
        let (base_url, calls) = spawn_echo_backend("never sent").await;
        let service = service_against(&base_url, vec!["doc".to_string()]);

        let err = service
            .chat(ChatRequest {
                message: "hi".to_string(),
                history: vec![],
                model: Some("foo/bar".to_string()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::UnknownModel(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chat_extends_history_with_both_new_turns() {
        let (base_url, _) = spawn_echo_backend("  hello back  ").await;
        let service = service_against(&base_url, vec!["doc".to_string()]);

        let response = service
            .chat(ChatRequest {
                message: "test".to_string(),
                history: vec![],
                model: None,
            })
            .await
            .unwrap();

        assert_eq!(response.message, "hello back");
        assert_eq!(response.model, "ollama/llama3.2:latest");
        assert_eq!(response.history.len(), 2);
        assert_eq!(response.history[0], ChatMessage::user("test"));
        assert_eq!(response.history[1].role, Role::Assistant);
        assert!(!response.history[1].content.is_empty());
    }

    #[tokio::test]
    async fn chat_keeps_earlier_turns_in_order() {
        let (base_url, _) = spawn_echo_backend("fine, thanks").await;
        let service = service_against(&base_url, vec!["doc".to_string()]);

        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let response = service
            .chat(ChatRequest {
                message: "how are you".to_string(),
                history: history.clone(),
                model: None,
            })
            .await
            .unwrap();

        assert_eq!(response.history.len(), 4);
        assert_eq!(&response.history[..2], &history[..]);
        assert_eq!(response.history[2], ChatMessage::user("how are you"));
        assert_eq!(response.history[3], ChatMessage::assistant("fine, thanks"));
    }

    #[tokio::test]
    async fn rag_echoes_retrieved_documents_in_rank_order() {
        let (base_url, calls) = spawn_echo_backend("go outside").await;
        let corpus = vec![
            "Take a walk in the park.".to_string(),
            "Stay inside and read.".to_string(),
            "Walk the dog around the park.".to_string(),
        ];
        let service = service_against(&base_url, corpus);

        let response = service
            .rag(RagRequest {
                query: "walk in the park".to_string(),
                model: None,
            })
            .await
            .unwrap();

        assert_eq!(response.answer, "go outside");
        assert_eq!(response.model, "ollama/qwen2.5:latest");
        assert_eq!(response.context_documents.len(), 2);
        assert_eq!(response.context_documents[0], "Take a walk in the park.");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
