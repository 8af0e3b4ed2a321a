use std::net::SocketAddr;

use anyhow::Result;
use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthError, AuthService};
use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::models::{
    ChatRequest, LoginRequest, ModelsResponse, RagRequest, TokenResponse,
};
use crate::providers::ProviderError;

#[derive(Clone)]
struct AppState {
    chat: ChatService,
    auth: AuthService,
}

pub async fn run_server(config: AppConfig, chat: ChatService, auth: AuthService) -> Result<()> {
    let state = AppState { chat, auth };
    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/api/auth/login", post(login))
        .route("/api/chat/models", get(chat_models))
        .route("/api/chat/message", post(chat_message))
        .route("/api/rag/models", get(rag_models))
        .route("/api/rag/query", post(rag_query))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_page(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let template = IndexTemplate {
        chat_default: state.chat.chat_models().default_model.clone(),
        rag_default: state.chat.rag_models().default_model.clone(),
    };
    let body = template.render().map_err(ApiError::from)?;
    Ok(Html(body))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.auth.login(request).await?;
    Ok(Json(token))
}

async fn chat_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let table = state.chat.chat_models();
    Json(ModelsResponse {
        models: table.ids(),
        default: table.default_model.clone(),
    })
}

async fn chat_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<crate::models::ChatResponse>, ApiError> {
    let response = state.chat.chat(request).await?;
    Ok(Json(response))
}

async fn rag_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let table = state.chat.rag_models();
    Json(ModelsResponse {
        models: table.ids(),
        default: table.default_model.clone(),
    })
}

async fn rag_query(
    State(state): State<AppState>,
    Json(request): Json<RagRequest>,
) -> Result<Json<crate::models::RagResponse>, ApiError> {
    let response = state.chat.rag(request).await?;
    Ok(Json(response))
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    chat_default: String,
    rag_default: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<ProviderError> for ApiError {
    fn from(value: ProviderError) -> Self {
        let status = match &value {
            ProviderError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            ProviderError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProviderError::Auth(_) => StatusCode::UNAUTHORIZED,
            ProviderError::Backend { .. } | ProviderError::Other(_) => StatusCode::BAD_GATEWAY,
        };

        Self {
            status,
            message: value.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        let status = match &value {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: value.to_string(),
        }
    }
}

impl From<askama::Error> for ApiError {
    fn from(value: askama::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
