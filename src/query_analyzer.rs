//! Análisis de la pregunta del usuario: genera varias consultas de búsqueda
//! y una explicación usando el motor de completado.
//!
//! El motor debe responder con un único objeto JSON `{analysis, queries}`.
//! Si no cumple el contrato se usa una heurística determinista, y si el
//! motor falla se busca directamente con la pregunta. Nunca devuelve error.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::llm::{strip_code_fences, CompletionEngine};
use crate::models::QueryAnalysis;
use crate::prompts;

const QUERY_ANALYZER_SYSTEM: &str = "You are a precise search query analyzer. Respond only with JSON.";

fn url_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(https?://\S+)").expect("regex válida"))
}

fn section_request() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)what is .* content of the (.*?) section.*").expect("regex válida"))
}

/// Quita los tokens `@http(s)://...` de la pregunta.
pub fn strip_url_references(question: &str) -> String {
    url_reference().replace_all(question, "").trim().to_string()
}

/// Primer token `@url` del mensaje: devuelve el token completo y la URL.
pub fn find_url_reference(message: &str) -> Option<(&str, &str)> {
    let captures = url_reference().captures(message)?;
    let token = captures.get(0)?.as_str();
    let url = captures.get(1)?.as_str();
    Some((token, url))
}

#[derive(Debug, Deserialize)]
struct StrictAnalysis {
    analysis: String,
    queries: Vec<String>,
}

pub struct QueryAnalyzer {
    engine: Arc<dyn CompletionEngine>,
}

impl QueryAnalyzer {
    pub fn new(engine: Arc<dyn CompletionEngine>) -> Self {
        Self { engine }
    }

    pub async fn analyze(&self, question: &str) -> QueryAnalysis {
        let clean_question = strip_url_references(question);
        info!(question = %clean_question, "Analizando consulta");

        let prompt = prompts::query_analyzer_prompt(&clean_question);
        let response = match self.engine.complete(QUERY_ANALYZER_SYSTEM, &prompt).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error analizando la consulta: {e:#}");
                return direct_search_analysis(&clean_question);
            }
        };

        match parse_analysis(&response) {
            Some(analysis) => {
                info!(queries = analysis.queries.len(), "Análisis de consulta completado");
                analysis
            }
            None => {
                warn!(
                    response = %response,
                    "La respuesta del análisis no es JSON válido; usando análisis de respaldo"
                );
                fallback_analysis(&clean_question)
            }
        }
    }
}

/// Interpreta la respuesta del motor. Exige las claves `analysis` y `queries`.
pub fn parse_analysis(response: &str) -> Option<QueryAnalysis> {
    let parsed: StrictAnalysis = serde_json::from_str(strip_code_fences(response)).ok()?;
    Some(QueryAnalysis {
        analysis: parsed.analysis,
        queries: parsed.queries,
    })
}

/// Respaldo determinista: la pregunta original más el tema extraído de
/// frases tipo "what is the content of the X section".
pub fn fallback_analysis(question: &str) -> QueryAnalysis {
    let topic = section_request().replace(question, "$1").to_string();
    QueryAnalysis {
        analysis: "Analyzing section request".to_string(),
        queries: vec![question.to_string(), topic.clone(), format!("content {topic}")],
    }
}

/// Respaldo ante fallo del motor: búsqueda directa, confianza baja.
pub fn direct_search_analysis(question: &str) -> QueryAnalysis {
    QueryAnalysis {
        analysis: "Using direct search".to_string(),
        queries: vec![question.to_string()],
    }
}
