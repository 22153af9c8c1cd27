//! HTTP chat API.
//!
//! Each session created through the API gets its own turns and agent
//! memory. Only the Google credential provider is shared across sessions.

use super::sales_agent;
use crate::agent::{LanguageModel, OpenAIModel};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::{CredentialProvider, GoogleCredentials};
use crate::error::CloserError;
use crate::session::{ChatSession, SessionRegistry, SessionReply, SessionState, Turn};
use crate::tools::{ProductCatalog, ProductRecord};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use uuid::Uuid;

/// Shared application state.
pub struct AppState<M> {
    pub sessions: SessionRegistry<M>,
    pub catalog: ProductCatalog,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'closer doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    for note in preflight::advisories(Operation::Serve, &settings) {
        Output::warning(&note);
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    // No browser consent from inside a request handler.
    let credentials: Arc<dyn CredentialProvider> =
        Arc::new(GoogleCredentials::new(&settings).with_interactive(false));

    let catalog = ProductCatalog::from_settings(&settings);
    let factory_settings = settings.clone();
    let sessions: SessionRegistry<OpenAIModel> = SessionRegistry::new(Box::new(move || {
        sales_agent(&factory_settings, None, credentials.clone())
    }));

    let state = Arc::new(AppState { sessions, catalog });
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Closer API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Products", "GET    /products");
    Output::kv("New session", "POST   /sessions");
    Output::kv("Get session", "GET    /sessions/{id}");
    Output::kv("Send message", "POST   /sessions/{id}/messages");
    Output::kv("Reset session", "POST   /sessions/{id}/reset");
    Output::kv("Close session", "DELETE /sessions/{id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API routes over the given state.
pub fn router<M: LanguageModel + 'static>(state: Arc<AppState<M>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/products", get(list_products::<M>))
        .route("/sessions", post(create_session::<M>))
        .route(
            "/sessions/{id}",
            get(get_session::<M>).delete(delete_session::<M>),
        )
        .route("/sessions/{id}/messages", post(send_message::<M>))
        .route("/sessions/{id}/reset", post(reset_session::<M>))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct MessageRequest {
    message: String,
}

#[derive(Serialize)]
struct SessionView {
    id: Uuid,
    created_at: DateTime<Utc>,
    state: SessionState,
    turns: Vec<Turn>,
}

impl SessionView {
    fn of<M: LanguageModel>(session: &ChatSession<M>) -> Self {
        Self {
            id: session.id(),
            created_at: session.created_at(),
            state: session.state(),
            turns: session.turns(),
        }
    }
}

#[derive(Serialize)]
struct ProductListResponse {
    products: Vec<ProductRecord>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Map a library error onto an HTTP status.
fn error_response(e: CloserError) -> Response {
    let status = match &e {
        CloserError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        CloserError::SessionBusy => StatusCode::CONFLICT,
        CloserError::Validation(_) => StatusCode::BAD_REQUEST,
        CloserError::OpenAI(_) | CloserError::Http(_) | CloserError::ExternalService(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("Request failed: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_products<M: LanguageModel + 'static>(
    State(state): State<Arc<AppState<M>>>,
) -> impl IntoResponse {
    let products: Vec<ProductRecord> = state.catalog.iter().cloned().collect();
    Json(ProductListResponse {
        total: products.len(),
        products,
    })
}

async fn create_session<M: LanguageModel + 'static>(
    State(state): State<Arc<AppState<M>>>,
) -> Response {
    match state.sessions.create().await {
        Ok(session) => (StatusCode::CREATED, Json(SessionView::of(&session))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_session<M: LanguageModel + 'static>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.sessions.get(id).await {
        Ok(session) => Json(SessionView::of(&session)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn send_message<M: LanguageModel + 'static>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Response {
    let session = match state.sessions.get(id).await {
        Ok(session) => session,
        Err(e) => return error_response(e),
    };
    // Run detached so a client disconnect cannot strand the session Busy.
    let task = tokio::spawn(async move { session.send(&req.message).await });
    let result: Result<SessionReply, CloserError> = match task.await {
        Ok(result) => result,
        Err(e) => Err(CloserError::Agent(format!("message task failed: {}", e))),
    };
    match result {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => error_response(e),
    }
}

async fn reset_session<M: LanguageModel + 'static>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<Uuid>,
) -> Response {
    let session = match state.sessions.get(id).await {
        Ok(session) => session,
        Err(e) => return error_response(e),
    };
    match session.reset() {
        Ok(()) => Json(SessionView::of(&session)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_session<M: LanguageModel + 'static>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.sessions.remove(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
