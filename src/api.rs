use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Router,
};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::spawn;
use tracing::{debug, error, info};

use crate::{
    app_state::AppState,
    prompts::{NO_GROUNDING_MESSAGE, URL_FAILED_MESSAGE},
    query_analyzer::find_url_reference,
    rag::{ContextAssembler, DEFAULT_TOP_K},
};

type ApiError = (StatusCode, Json<serde_json::Value>);
type EventStream = UnboundedReceiver<Result<Event, axum::Error>>;

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct IngestPayload {
    sources: Vec<String>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    message: String,
    chunks: usize,
}

#[derive(Deserialize)]
pub struct ChatPayload {
    message: String,
    /// Modelo para esta petición; si falta se usa el activo.
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
pub struct DocumentsResponse {
    total_chunks: usize,
    documents: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ModelPayload {
    model: String,
}

/// Eventos del stream SSE del chat: `{"status": ...}`, `{"content": ...}`
/// o `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEvent {
    Status(String),
    Content(String),
    Error(String),
}

fn internal_error(message: String) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message })))
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/ingest", post(ingest_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/documents", get(documents_handler))
        .route("/api/model", get(get_model_handler).post(set_model_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn ingest_handler(
    State(state): State<AppState>,
    Json(payload): Json<IngestPayload>,
) -> Result<Json<IngestResponse>, ApiError> {
    let assembler = state.current_assembler().await;
    match assembler.ingest(payload.sources.as_slice()).await {
        Ok(summary) => {
            let chunks = summary.chunks_created;
            let message = summary.to_string();
            state.record_chunks(summary.chunk_contents);
            Ok(Json(IngestResponse { message, chunks }))
        }
        Err(e) => {
            error!("Error de ingesta: {e:#}");
            Err(internal_error(format!("Error en la ingesta: {e}")))
        }
    }
}

#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Sse<EventStream>, ApiError> {
    let assembler = match payload.model.as_deref().map(str::trim) {
        Some(model) if !model.is_empty() => state.assembler_for(model).await.map_err(|e| {
            error!(model = %model, "No se pudo configurar el modelo: {e:#}");
            internal_error(format!("No se pudo configurar el modelo '{model}': {e}"))
        })?,
        _ => state.current_assembler().await,
    };

    let (tx, rx) = mpsc::unbounded();
    spawn(async move {
        run_chat(&state, &assembler, &payload.message, &tx).await;
    });

    Ok(Sse::new(rx).keep_alive(KeepAlive::default()))
}

#[axum::debug_handler]
async fn documents_handler(State(state): State<AppState>) -> Json<DocumentsResponse> {
    let documents = state.processed_documents();
    Json(DocumentsResponse {
        total_chunks: documents.len(),
        documents,
    })
}

#[axum::debug_handler]
async fn get_model_handler(State(state): State<AppState>) -> Json<ModelPayload> {
    Json(ModelPayload {
        model: state.current_assembler().await.model().to_string(),
    })
}

#[axum::debug_handler]
async fn set_model_handler(
    State(state): State<AppState>,
    Json(payload): Json<ModelPayload>,
) -> Result<Json<ModelPayload>, ApiError> {
    if payload.model.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "El identificador de modelo no puede estar vacío." })),
        ));
    }

    let assembler = state.assembler_for(&payload.model).await.map_err(|e| {
        error!("Error cambiando de modelo: {e:#}");
        internal_error(format!("No se pudo cambiar al modelo '{}': {e}", payload.model))
    })?;
    Ok(Json(ModelPayload {
        model: assembler.model().to_string(),
    }))
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    state.request_shutdown();
    StatusCode::OK
}

// --- Chat ---

fn send_event(tx: &UnboundedSender<Result<Event, axum::Error>>, event: ChatEvent) {
    if tx.unbounded_send(Event::default().json_data(&event)).is_err() {
        debug!("El cliente cerró el stream del chat");
    }
}

/// Resuelve el mensaje de sistema, pide la respuesta y la emite por el stream.
async fn run_chat(
    state: &AppState,
    assembler: &ContextAssembler,
    message: &str,
    tx: &UnboundedSender<Result<Event, axum::Error>>,
) {
    let system = match chat_system_message(state, assembler, message, tx).await {
        Ok(system) => system,
        Err(e) => {
            error!("Error preparando el contexto del chat: {e}");
            send_event(tx, ChatEvent::Error(e));
            return;
        }
    };

    let forward = |chunk: &str| {
        if !chunk.is_empty() {
            send_event(tx, ChatEvent::Content(chunk.to_string()));
        }
    };
    match assembler.answer(&system, message, &forward).await {
        Ok(answer) => debug!(len = answer.len(), "Respuesta del chat enviada"),
        Err(e) => {
            error!("Error del motor de completado: {e:#}");
            send_event(tx, ChatEvent::Error(e.to_string()));
        }
    }
}

/// Mensaje de sistema para el chat.
///
/// Un token `@url` provoca la ingesta previa de esa URL y se quita de la
/// pregunta. Sin contexto recuperado se devuelve la indicación de incluir
/// una URL, o el aviso de que la URL no aportó contenido.
async fn chat_system_message(
    state: &AppState,
    assembler: &ContextAssembler,
    message: &str,
    tx: &UnboundedSender<Result<Event, axum::Error>>,
) -> Result<String, String> {
    if let Some((token, url)) = find_url_reference(message) {
        send_event(tx, ChatEvent::Status("processing".to_string()));
        let question = message.replace(token, "").trim().to_string();

        let summary = assembler
            .ingest(&[url])
            .await
            .map_err(|e| format!("Error processing URL: {e}"))?;
        let chunks = summary.chunks_created;
        state.record_chunks(summary.chunk_contents);

        if chunks == 0 || !assembler.is_ready().await {
            info!(url = %url, "La URL no produjo contenido");
            return Ok(URL_FAILED_MESSAGE.to_string());
        }
        let (context, _) = assembler
            .retrieve(&question, DEFAULT_TOP_K)
            .await
            .map_err(|e| format!("Error processing URL: {e}"))?;
        return Ok(grounded_prompt(assembler, &question, &context, URL_FAILED_MESSAGE));
    }

    if !assembler.is_ready().await {
        return Ok(NO_GROUNDING_MESSAGE.to_string());
    }
    let (context, _) = assembler
        .retrieve(message, DEFAULT_TOP_K)
        .await
        .map_err(|e| format!("Error retrieving context: {e}"))?;
    Ok(grounded_prompt(assembler, message, &context, NO_GROUNDING_MESSAGE))
}

/// Prompt RAG, o `fallback` si no se recuperó contexto.
fn grounded_prompt(assembler: &ContextAssembler, question: &str, context: &str, fallback: &str) -> String {
    if context.trim().is_empty() {
        info!("Sin contexto recuperado; se responde sin fundamento");
        return fallback.to_string();
    }
    assembler.build_prompt(question, context)
}
