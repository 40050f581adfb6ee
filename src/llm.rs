//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//!
//! El resto de la aplicación sólo conoce dos capacidades:
//!   - [`EmbeddingBackend`]: convierte textos en vectores.
//!   - [`CompletionEngine`]: genera texto a partir de un mensaje de sistema y uno de usuario.
//!
//! [`LlmManager`] implementa ambas con OpenAI (API alojada) u Ollama (local),
//! según el identificador de modelo con el que se construya.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel; // <- para .embed_texts
use tracing::info;

use crate::config::{AppConfig, LlmProvider};

/// Función de embeddings intercambiable. El índice vectorial la usa como
/// función de puntuación; no gestiona el ciclo de vida del modelo.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// Un vector por texto, en el mismo orden.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Motor de completado opaco al que el núcleo entrega un prompt.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Entrega la respuesta a `on_chunk` por fragmentos según llega y
    /// devuelve el texto completo. Por defecto hay un único fragmento.
    async fn complete_streaming(
        &self,
        system: &str,
        user: &str,
        on_chunk: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String> {
        let answer = self.complete(system, user).await?;
        on_chunk(&answer);
        Ok(answer)
    }
}

/// Gestor de LLMs y embeddings para un modelo concreto.
///
/// Se construye una vez por modelo: cambiar de modelo implica crear un
/// gestor nuevo, nunca mutar éste.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub embedding_model: String,
    pub chat_model: String,
}

impl LlmManager {
    /// Construye el manager para `model`, eligiendo familia y modelo de embeddings
    /// de forma coherente.
    pub fn for_model(cfg: &AppConfig, model: &str) -> Result<Self> {
        let chat_model = model.trim();
        if chat_model.is_empty() {
            return Err(anyhow!("El identificador de modelo está vacío"));
        }

        let manager = Self {
            provider: LlmProvider::for_model(chat_model),
            embedding_model: cfg.embedding_model_for(chat_model),
            chat_model: chat_model.to_string(),
        };
        info!(
            provider = ?manager.provider,
            chat_model = %manager.chat_model,
            embedding_model = %manager.embedding_model,
            "LLM Manager configurado"
        );
        Ok(manager)
    }

    // ---------------------------------------------------------------------
    // EMBEDDINGS
    // ---------------------------------------------------------------------

    async fn embed_with_openai(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        use rig::providers::openai;
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;
        #[allow(unused_imports)]
        use rig::client::ProviderClient as _;

        let client = openai::Client::from_env();
        let embedding_model = client.embedding_model(&self.embedding_model);
        let embeddings = embedding_model.embed_texts(texts).await?;
        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    async fn embed_with_ollama(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        use rig::providers::ollama;
        use rig::client::EmbeddingsClient as _;
        #[allow(unused_imports)]
        use rig::client::ProviderClient as _;

        // Lee OLLAMA_API_BASE_URL del entorno.
        let client = ollama::Client::from_env();
        let embedding_model = client.embedding_model(&self.embedding_model);
        let embeddings = embedding_model.embed_texts(texts).await?;
        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    async fn complete_with_openai(&self, system: &str, user: &str) -> Result<String> {
        use rig::providers::openai;
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;
        #[allow(unused_imports)]
        use rig::client::ProviderClient as _;

        let client = openai::Client::from_env();
        let agent = client.agent(&self.chat_model).preamble(system).build();
        let answer = agent.prompt(user).await?;
        Ok(answer)
    }

    async fn complete_with_ollama(&self, system: &str, user: &str) -> Result<String> {
        use rig::providers::ollama;
        use rig::client::CompletionClient as _;
        #[allow(unused_imports)]
        use rig::client::ProviderClient as _;

        let client = ollama::Client::from_env();
        let agent = client.agent(&self.chat_model).preamble(system).build();
        let answer = agent.prompt(user).await?;
        Ok(answer)
    }
}

#[async_trait]
impl EmbeddingBackend for LlmManager {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = match self.provider {
            LlmProvider::OpenAI => self.embed_with_openai(texts.to_vec()).await?,
            LlmProvider::Ollama => self.embed_with_ollama(texts.to_vec()).await?,
        };

        if vectors.len() != texts.len() {
            return Err(anyhow!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                vectors.len(),
                texts.len()
            ));
        }

        Ok(vectors
            .into_iter()
            .map(|v| v.into_iter().map(|x| x as f32).collect())
            .collect())
    }
}

#[async_trait]
impl CompletionEngine for LlmManager {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(system, user).await,
            LlmProvider::Ollama => self.complete_with_ollama(system, user).await,
        }
    }
}

/// Quita las vallas de código (```json ... ```) que algunos modelos añaden
/// alrededor de una respuesta JSON.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_config() -> AppConfig {
        AppConfig {
            server_addr: "127.0.0.1:0".to_string(),
            static_dir: PathBuf::from("frontend"),
            vector_index_dir: PathBuf::from("vector_db"),
            default_model: "deepseek-r1:1.5b".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            ollama_embedding_model: None,
        }
    }

    #[test]
    fn manager_configures_one_family_consistently() {
        let cfg = sample_config();

        let hosted = LlmManager::for_model(&cfg, "gpt-4o-mini").unwrap();
        assert_eq!(hosted.provider, LlmProvider::OpenAI);
        assert_eq!(hosted.embedding_model, "text-embedding-3-small");
        assert_eq!(hosted.chat_model, "gpt-4o-mini");

        let local = LlmManager::for_model(&cfg, " deepseek-r1:7b ").unwrap();
        assert_eq!(local.provider, LlmProvider::Ollama);
        assert_eq!(local.embedding_model, "deepseek-r1:7b");
        assert_eq!(local.model_name(), "deepseek-r1:7b");
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!(LlmManager::for_model(&sample_config(), "  ").is_err());
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }
}
