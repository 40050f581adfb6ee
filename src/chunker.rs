//! División recursiva de documentos en chunks acotados con solapamiento.
//!
//! Se prueban los separadores por prioridad (párrafo, línea, fin de frase,
//! espacio, carácter). Los trozos que siguen siendo demasiado grandes se
//! dividen de nuevo con el siguiente separador; los pequeños se fusionan
//! hasta el tamaño objetivo, arrastrando hasta `chunk_overlap` caracteres
//! del chunk anterior. Las longitudes se miden en caracteres.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::models::{Chunk, Document};

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 50;
/// Límite duro de chunks por llamada de ingesta (acota el coste de embeddings).
pub const MAX_CHUNKS_PER_BATCH: usize = 50;

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunks: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP, MAX_CHUNKS_PER_BATCH)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Divide `text` por `separator` dejando el separador al inicio del
/// trozo siguiente. Con separador vacío se divide por caracteres.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(text[start..idx].to_string());
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize, max_chunks: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size),
            max_chunks,
        }
    }

    /// Divide los documentos y trunca a los primeros `max_chunks` chunks.
    /// Nunca falla; una entrada vacía produce una salida vacía.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .map(move |content| Chunk {
                        content,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect();

        if chunks.len() > self.max_chunks {
            debug!(
                total = chunks.len(),
                kept = self.max_chunks,
                "Truncando chunks al máximo por lote"
            );
            chunks.truncate(self.max_chunks);
        }

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "Documentos divididos en chunks"
        );
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, candidate) in separators.iter().copied().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut output = Vec::new();
        let mut small = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                output.extend(self.merge(&small));
                small.clear();
            }
            if remaining.is_empty() {
                output.push(piece);
            } else {
                output.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !small.is_empty() {
            output.extend(self.merge(&small));
        }
        output
    }

    /// Fusiona trozos pequeños hasta `chunk_size`, conservando como
    /// solapamiento la cola del chunk anterior (como mucho `chunk_overlap`).
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    merged.push(chunk);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }
        merged
    }
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
