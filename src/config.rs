//! Carga y gestión de configuración de la aplicación (servidor, índice vectorial y LLM).

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

/// Familia de modelos: OpenAI (API alojada) u Ollama (modelo local).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl LlmProvider {
    /// Decide la familia a partir del identificador de modelo.
    /// Los modelos `gpt-*` van a OpenAI; el resto se sirve con Ollama.
    pub fn for_model(model: &str) -> Self {
        if model.trim().to_lowercase().starts_with("gpt-") {
            Self::OpenAI
        } else {
            Self::Ollama
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub static_dir: PathBuf,

    /// Directorio fijo donde se persiste el índice vectorial.
    pub vector_index_dir: PathBuf,

    pub default_model: String,
    pub openai_embedding_model: String,
    pub ollama_embedding_model: Option<String>,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());
        let static_dir = env::var("STATIC_DIR").unwrap_or_else(|_| "frontend".to_string());
        let vector_index_dir =
            env::var("VECTOR_INDEX_DIR").unwrap_or_else(|_| "vector_db".to_string());

        let default_model =
            env::var("DEFAULT_MODEL").unwrap_or_else(|_| "deepseek-r1:1.5b".to_string());
        if default_model.trim().is_empty() {
            return Err(anyhow!("DEFAULT_MODEL no puede estar vacío"));
        }

        let openai_embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let ollama_embedding_model = env::var("OLLAMA_EMBEDDING_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty());

        Ok(Self {
            server_addr,
            static_dir: PathBuf::from(static_dir),
            vector_index_dir: PathBuf::from(vector_index_dir),
            default_model,
            openai_embedding_model,
            ollama_embedding_model,
        })
    }

    /// Modelo de embeddings a usar para un modelo de chat dado.
    /// Ollama reutiliza el propio modelo salvo que se configure otro.
    pub fn embedding_model_for(&self, model: &str) -> String {
        match LlmProvider::for_model(model) {
            LlmProvider::OpenAI => self.openai_embedding_model.clone(),
            LlmProvider::Ollama => self
                .ollama_embedding_model
                .clone()
                .unwrap_or_else(|| model.to_string()),
        }
    }
}
