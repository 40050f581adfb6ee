//! Ensamblado de contexto RAG sobre el índice vectorial local.
//!
//! Flujo:
//!   1. Ingesta: fuentes → crawler → chunks → índice (ver [`crate::ingest`]).
//!   2. Recuperación: análisis de la consulta (informativo) y búsqueda
//!      vectorial en paralelo; los chunks se unen con líneas en blanco.
//!   3. El prompt final se construye con la plantilla fija y se entrega al
//!      motor de completado.
//!
//! Un `ContextAssembler` queda fijado a un único modelo: embeddings,
//! completado y análisis salen siempre del mismo `LlmManager`.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::{
    chunker::TextSplitter,
    config::AppConfig,
    crawler::WebCrawler,
    ingest::{self, IngestionSummary},
    llm::{CompletionEngine, LlmManager},
    models::QueryAnalysis,
    prompts,
    query_analyzer::QueryAnalyzer,
    vector_store::VectorIndex,
};

/// Número de chunks recuperados por defecto.
pub const DEFAULT_TOP_K: usize = 4;

pub struct ContextAssembler {
    model: String,
    crawler: WebCrawler,
    splitter: TextSplitter,
    index: VectorIndex,
    analyzer: QueryAnalyzer,
    engine: Arc<dyn CompletionEngine>,
}

impl ContextAssembler {
    /// Construye el ensamblador para `model`, reabriendo el índice persistido.
    pub async fn new(cfg: &AppConfig, model: &str) -> Result<Self> {
        let manager = Arc::new(LlmManager::for_model(cfg, model)?);
        let crawler = WebCrawler::new()?;
        let index = VectorIndex::open(&cfg.vector_index_dir, manager.clone()).await?;
        Ok(Self::with_backends(manager.chat_model.clone(), crawler, index, manager))
    }

    /// Ensambla con backends ya construidos. El índice debe haberse abierto
    /// con el backend de embeddings del mismo modelo.
    pub fn with_backends(
        model: String,
        crawler: WebCrawler,
        index: VectorIndex,
        engine: Arc<dyn CompletionEngine>,
    ) -> Self {
        Self {
            model,
            crawler,
            splitter: TextSplitter::default(),
            index,
            analyzer: QueryAnalyzer::new(engine.clone()),
            engine,
        }
    }

    /// Ensamblador para `model` que comparte con éste el almacén del índice,
    /// de modo que ninguna escritura de uno pisa las del otro. Cada uno sólo
    /// recupera los vectores de su propio modelo de embeddings.
    pub fn switch_model(&self, cfg: &AppConfig, model: &str) -> Result<Self> {
        let manager = Arc::new(LlmManager::for_model(cfg, model)?);
        let index = self.index.with_embedder(manager.clone());
        Ok(Self::with_backends(
            manager.chat_model.clone(),
            self.crawler.clone(),
            index,
            manager,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `true` si hay un índice con contenido contra el que recuperar.
    pub async fn is_ready(&self) -> bool {
        self.index.is_populated().await
    }

    /// Ingiere `sources`. Sólo los errores inesperados (p. ej. del índice)
    /// se propagan; las fuentes que fallan no aportan chunks.
    pub async fn ingest<S: AsRef<str>>(&self, sources: &[S]) -> Result<IngestionSummary> {
        ingest::ingest_sources(&self.crawler, &self.splitter, &self.index, sources).await
    }

    /// Contexto para `query`: hasta `k` chunks únicos unidos por líneas en
    /// blanco, junto al análisis de la consulta. Sin índice (o sin vectores
    /// del modelo de embeddings actual) devuelve `("", QueryAnalysis::default())`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<(String, QueryAnalysis)> {
        if !self.index.is_populated().await {
            warn!(
                embedding_model = %self.index.embedding_model(),
                "No hay índice vectorial para este modelo; no se puede recuperar contexto"
            );
            return Ok((String::new(), QueryAnalysis::default()));
        }

        let (analysis, chunks) = tokio::join!(self.analyzer.analyze(query), self.index.search(query, k));
        let chunks = chunks?;

        let context = chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        info!(
            chunks = chunks.len(),
            context_len = context.len(),
            analysis = %analysis.analysis,
            "Contexto recuperado"
        );
        Ok((context, analysis))
    }

    pub fn build_prompt(&self, question: &str, context: &str) -> String {
        prompts::build_prompt(question, context)
    }

    /// Envía el prompt al motor de completado del modelo activo y entrega
    /// la respuesta a `on_chunk` según llega. Devuelve el texto completo.
    pub async fn answer(
        &self,
        system: &str,
        question: &str,
        on_chunk: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String> {
        self.engine.complete_streaming(system, question, on_chunk).await
    }
}
