//! Índice vectorial local para los chunks, persistido en un directorio fijo.
//!
//! API pública:
//!   - `VectorIndex::open(dir, embedder)`: reabre el índice existente si lo hay.
//!   - `upsert(&[Chunk])`: crea el índice o añade chunks, y persiste.
//!   - `search(&str, k)`: búsqueda por similitud coseno con deduplicación por contenido.
//!
//! El índice es el único escritor de los chunks ingeridos. Las escrituras se
//! serializan con un `RwLock`; las lecturas pueden ir en paralelo. Las vistas
//! creadas con [`VectorIndex::with_embedder`] comparten el mismo almacén, y
//! cada una sólo consulta los vectores de su propio modelo de embeddings.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::EmbeddingBackend;
use crate::models::{Chunk, DocumentMetadata};

const INDEX_FILE: &str = "index.json";

/// Chunk persistido junto con su vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    id: String,
    content: String,
    metadata: DocumentMetadata,
    embedding: Vec<f32>,
    /// Modelo que generó el vector; distintos modelos no comparten espacio.
    embedding_model: String,
    added_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    chunks: Vec<StoredChunk>,
}

pub struct VectorIndex {
    dir: PathBuf,
    embedder: Arc<dyn EmbeddingBackend>,
    /// `None` hasta que exista un índice (en disco o creado en este proceso).
    state: Arc<RwLock<Option<Vec<StoredChunk>>>>,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Quita chunks con contenido idéntico, conservando el primero visto.
pub fn dedup_by_content(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.content.clone()))
        .collect()
}

impl VectorIndex {
    /// Abre el índice en `dir`. Si ya hay uno persistido se reutiliza.
    pub async fn open(dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingBackend>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(INDEX_FILE);

        let state = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("No se pudo leer el índice {}", path.display()))?;
            let file: IndexFile = serde_json::from_str(&raw)
                .with_context(|| format!("Índice corrupto en {}", path.display()))?;
            info!(
                path = %path.display(),
                chunks = file.chunks.len(),
                "Índice vectorial existente cargado desde disco"
            );
            Some(file.chunks)
        } else {
            info!(
                dir = %dir.display(),
                "No hay índice vectorial; se creará al añadir documentos"
            );
            None
        };

        Ok(Self {
            dir,
            embedder,
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Otra vista del mismo almacén con un backend de embeddings distinto.
    /// Las escrituras de cualquiera de las vistas son visibles para todas.
    pub fn with_embedder(&self, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            dir: self.dir.clone(),
            embedder,
            state: self.state.clone(),
        }
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }

    /// `true` si existe un índice con al menos un chunk del modelo de
    /// embeddings actual.
    pub async fn is_populated(&self) -> bool {
        let model = self.embedder.model_name();
        self.state
            .read()
            .await
            .as_ref()
            .map_or(false, |chunks| chunks.iter().any(|entry| entry.embedding_model == model))
    }

    /// Total de chunks almacenados, de cualquier modelo.
    pub async fn len(&self) -> usize {
        self.state.read().await.as_ref().map_or(0, Vec::len)
    }

    /// Crea el índice con `chunks` o los añade al existente, y persiste.
    pub async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            warn!("No se proporcionaron chunks para el índice vectorial");
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .context("Error generando embeddings de los chunks")?;
        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "El backend devolvió {} embeddings para {} chunks",
                vectors.len(),
                chunks.len()
            );
        }

        let model = self.embedder.model_name().to_string();
        let now = Utc::now();
        let new_entries: Vec<StoredChunk> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| StoredChunk {
                id: Uuid::new_v4().to_string(),
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                embedding,
                embedding_model: model.clone(),
                added_at: now,
            })
            .collect();

        let mut state = self.state.write().await;
        match state.as_mut() {
            None => {
                info!(chunks = new_entries.len(), "Creando índice vectorial nuevo");
                *state = Some(new_entries);
            }
            Some(existing) => {
                info!(
                    chunks = new_entries.len(),
                    total = existing.len() + new_entries.len(),
                    "Añadiendo chunks al índice vectorial existente"
                );
                existing.extend(new_entries);
            }
        }

        let stored = state.as_deref().unwrap_or_default();
        self.persist(stored).await
    }

    /// Devuelve hasta `k` chunks únicos por contenido, los más similares a `query`.
    /// Se recuperan `2k` candidatos antes de deduplicar.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        if k == 0 {
            debug!("Búsqueda con k = 0; no se devuelven chunks");
            return Ok(Vec::new());
        }
        if !self.is_populated().await {
            warn!(
                embedding_model = %self.embedder.model_name(),
                "No hay índice vectorial disponible para la búsqueda"
            );
            return Ok(Vec::new());
        }
        let model = self.embedder.model_name();

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .context("Error generando el embedding de la consulta")?
            .into_iter()
            .next()
            .context("El backend no devolvió embedding para la consulta")?;

        let candidates: Vec<Chunk> = {
            let state = self.state.read().await;
            let stored = state.as_deref().unwrap_or_default();

            let mut scored: Vec<(f32, &StoredChunk)> = stored
                .iter()
                .filter(|entry| entry.embedding_model == model && entry.embedding.len() == query_vec.len())
                .map(|entry| (cosine_similarity(&entry.embedding, &query_vec), entry))
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));

            scored
                .into_iter()
                .take(k * 2)
                .map(|(_, entry)| Chunk {
                    content: entry.content.clone(),
                    metadata: entry.metadata.clone(),
                })
                .collect()
        };
        debug!(candidates = candidates.len(), k, "Candidatos recuperados");

        let mut unique = dedup_by_content(candidates);
        unique.truncate(k);
        info!(query = %query, returned = unique.len(), "Chunks únicos devueltos");
        Ok(unique)
    }

    async fn persist(&self, chunks: &[StoredChunk]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("No se pudo crear {}", self.dir.display()))?;

        let file = IndexFile {
            chunks: chunks.to_vec(),
        };
        let json = serde_json::to_string(&file)?;

        let path = self.dir.join(INDEX_FILE);
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("No se pudo escribir {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("No se pudo reemplazar {}", path.display()))?;

        debug!(path = %path.display(), chunks = chunks.len(), "Índice persistido");
        Ok(())
    }
}
