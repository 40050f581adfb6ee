//! Ingesta de fuentes en el índice vectorial.
//!
//! Secuencia estricta por llamada: clasificación → rastreo → división de
//! secciones de LinkedIn → chunking → upsert en el índice. Sólo las fuentes
//! clasificadas como URL se rastrean; las rutas de fichero se aceptan pero
//! no se leen.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    chunker::TextSplitter,
    crawler::WebCrawler,
    models::{Document, DocumentKind, SectionType},
    sources,
    vector_store::VectorIndex,
};

/// Resumen de los resultados de una operación de ingesta.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestionSummary {
    pub urls_scanned: usize,
    pub files_skipped: usize,
    pub documents_loaded: usize,
    pub chunks_created: usize,
    /// Contenido de los chunks añadidos al índice, en orden.
    #[serde(skip)]
    pub chunk_contents: Vec<String>,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} URLs procesadas, {} ficheros omitidos. {} documentos y {} chunks creados.",
            self.urls_scanned, self.files_skipped, self.documents_loaded, self.chunks_created
        )
    }
}

/// Ejecuta la ingesta completa. Una lista sin fuentes válidas no es un
/// error: devuelve un resumen con cero chunks.
pub async fn ingest_sources<S: AsRef<str>>(
    crawler: &WebCrawler,
    splitter: &TextSplitter,
    index: &VectorIndex,
    sources: &[S],
) -> Result<IngestionSummary> {
    let classified = sources::classify(sources);
    let mut summary = IngestionSummary {
        urls_scanned: classified.urls.len(),
        files_skipped: classified.files.len(),
        ..Default::default()
    };

    if !classified.files.is_empty() {
        warn!(files = ?classified.files, "Las rutas de fichero no se ingieren; se omiten");
    }
    if classified.urls.is_empty() {
        info!("No hay URLs que procesar");
        return Ok(summary);
    }

    let documents = crawler.load_web_documents(&classified.urls).await;
    summary.documents_loaded = documents.len();

    let documents = split_linkedin_sections(documents);
    let chunks = splitter.split_documents(&documents);
    index
        .upsert(&chunks)
        .await
        .context("Error añadiendo los chunks al índice vectorial")?;

    summary.chunks_created = chunks.len();
    summary.chunk_contents = chunks.into_iter().map(|chunk| chunk.content).collect();
    let indexed_total = index.len().await;
    info!(indexed_total, "{summary}");
    Ok(summary)
}

/// Divide cada documento social de LinkedIn en un documento por sección
/// (bloques separados por línea en blanco), etiquetando su tipo. El resto
/// de documentos pasa sin cambios.
pub fn split_linkedin_sections(documents: Vec<Document>) -> Vec<Document> {
    let mut processed = Vec::with_capacity(documents.len());

    for doc in documents {
        let platform = match doc.metadata.platform() {
            Some(platform) if doc.metadata.source.contains("linkedin.com") => platform,
            _ => {
                processed.push(doc);
                continue;
            }
        };

        for section in doc.content.split("\n\n").filter(|s| !s.trim().is_empty()) {
            let mut metadata = doc.metadata.clone();
            metadata.kind = DocumentKind::SocialMedia {
                platform,
                section_type: Some(identify_linkedin_section(section)),
            };
            processed.push(Document::new(section, metadata));
        }
    }

    processed
}

/// Primera coincidencia (sin distinguir mayúsculas) entre los marcadores conocidos.
pub fn identify_linkedin_section(content: &str) -> SectionType {
    let lower = content.to_lowercase();
    if lower.contains("company:") {
        SectionType::CompanyInfo
    } else if lower.contains("about:") {
        SectionType::About
    } else if lower.contains("post:") {
        SectionType::Post
    } else if lower.contains("content from") {
        SectionType::AdditionalContent
    } else {
        SectionType::General
    }
}
