//! Dobles de prueba compartidos: embeddings deterministas, motores de
//! completado guionizados y un servidor HTTP local con páginas fijas.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;

use crate::crawler::WebCrawler;
use crate::llm::{CompletionEngine, EmbeddingBackend};

const VOCABULARY: &[&str] = &[
    "founded", "pricing", "careers", "company", "services", "engineers", "acme", "linkedin", "post",
];

fn keyword_vectors(texts: &[String]) -> Vec<Vec<f32>> {
    texts
        .iter()
        .map(|text| {
            let text = text.to_lowercase();
            VOCABULARY
                .iter()
                .map(|kw| if text.contains(kw) { 1.0 } else { 0.0 })
                .collect()
        })
        .collect()
}

/// Una dimensión por palabra clave del vocabulario: 1.0 si el texto la contiene.
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingBackend for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(keyword_vectors(texts))
    }
}

/// Mismos vectores que [`KeywordEmbedder`] bajo otro nombre de modelo.
pub struct NamedKeywordEmbedder(pub &'static str);

#[async_trait]
impl EmbeddingBackend for NamedKeywordEmbedder {
    fn model_name(&self) -> &str {
        self.0
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(keyword_vectors(texts))
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingBackend for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("embedding service unavailable"))
    }
}

/// Responde siempre lo mismo y recuerda los últimos mensajes recibidos.
/// En modo streaming entrega la respuesta en los fragmentos indicados.
pub struct ScriptedEngine {
    chunks: Vec<String>,
    last_system: Mutex<Option<String>>,
    last_user: Mutex<Option<String>>,
}

impl ScriptedEngine {
    pub fn new(response: &str) -> Self {
        Self::streaming(&[response])
    }

    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            last_system: Mutex::new(None),
            last_user: Mutex::new(None),
        }
    }

    pub fn last_user_message(&self) -> Option<String> {
        self.last_user.lock().unwrap().clone()
    }

    pub fn last_system_message(&self) -> Option<String> {
        self.last_system.lock().unwrap().clone()
    }

    fn record(&self, system: &str, user: &str) {
        *self.last_system.lock().unwrap() = Some(system.to_string());
        *self.last_user.lock().unwrap() = Some(user.to_string());
    }
}

#[async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.record(system, user);
        Ok(self.chunks.concat())
    }

    async fn complete_streaming(
        &self,
        system: &str,
        user: &str,
        on_chunk: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String> {
        self.record(system, user);
        for chunk in &self.chunks {
            on_chunk(chunk);
        }
        Ok(self.chunks.concat())
    }
}

pub struct FailingEngine;

#[async_trait]
impl CompletionEngine for FailingEngine {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Err(anyhow!("completion service unavailable"))
    }
}

/// Peticiones en curso y máximo simultáneo observado por el servidor local.
#[derive(Default)]
pub struct ServerStats {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ServerStats {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Descuenta la petición aunque el cliente la abandone a mitad.
struct InFlight<'a>(&'a ServerStats);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct PageServer {
    pages: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    stats: Arc<ServerStats>,
}

async fn serve_page(State(server): State<Arc<PageServer>>, uri: Uri) -> Response {
    let stats = &server.stats;
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.peak.fetch_max(now, Ordering::SeqCst);
    let _guard = InFlight(stats);

    if let Some(delay) = server.delays.get(uri.path()) {
        tokio::time::sleep(*delay).await;
    }
    match server.pages.get(uri.path()) {
        Some(html) => Html(html.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Levanta un servidor en `127.0.0.1` que sirve `pages` por ruta exacta
/// (404 para el resto). Devuelve la URL base sin barra final.
pub async fn serve_pages(pages: &[(&str, &str)]) -> String {
    serve_tracked_pages(pages, &[]).await.0
}

/// Como [`serve_pages`], retrasando las rutas de `delays` y contando las
/// peticiones simultáneas.
pub async fn serve_tracked_pages(
    pages: &[(&str, &str)],
    delays: &[(&str, Duration)],
) -> (String, Arc<ServerStats>) {
    let stats = Arc::new(ServerStats::default());
    let server = Arc::new(PageServer {
        pages: pages
            .iter()
            .map(|(path, html)| (path.to_string(), html.to_string()))
            .collect(),
        delays: delays
            .iter()
            .map(|(path, delay)| (path.to_string(), *delay))
            .collect(),
        stats: stats.clone(),
    });
    let app = Router::new().fallback(serve_page).with_state(server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), stats)
}

/// URL de un puerto local en el que nadie escucha.
pub async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

/// Crawler que ignora proxies del entorno para hablar con el servidor local.
pub fn test_crawler() -> WebCrawler {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    WebCrawler::with_client(client)
}
