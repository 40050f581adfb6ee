use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};
use tokio::sync::{oneshot, RwLock};
use tracing::info;

use crate::{config::AppConfig, rag::ContextAssembler};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// Ensamblador del modelo activo. Cambiar de modelo sustituye el `Arc`
    /// completo; las peticiones en curso terminan con el anterior.
    pub assembler: Arc<RwLock<Arc<ContextAssembler>>>,
    /// Contenido de todos los chunks ingeridos durante la vida del proceso.
    pub processed_documents: Arc<Mutex<Vec<String>>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(config: AppConfig, assembler: ContextAssembler, shutdown_tx: oneshot::Sender<()>) -> Self {
        Self {
            config,
            assembler: Arc::new(RwLock::new(Arc::new(assembler))),
            processed_documents: Arc::new(Mutex::new(Vec::new())),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
        }
    }

    pub async fn current_assembler(&self) -> Arc<ContextAssembler> {
        self.assembler.read().await.clone()
    }

    /// Devuelve el ensamblador para `model`, construyendo uno nuevo y
    /// sustituyendo el activo si el modelo cambia. El nuevo comparte el
    /// almacén del índice con el anterior.
    pub async fn assembler_for(&self, model: &str) -> Result<Arc<ContextAssembler>> {
        let model = model.trim();
        if model.is_empty() {
            return Err(anyhow!("El identificador de modelo está vacío"));
        }

        let mut active = self.assembler.write().await;
        if active.model() == model {
            return Ok(active.clone());
        }

        let assembler = Arc::new(active.switch_model(&self.config, model)?);
        info!(from = %active.model(), to = %model, "Modelo activo cambiado");
        *active = assembler.clone();
        Ok(assembler)
    }

    pub fn record_chunks(&self, contents: Vec<String>) {
        self.processed_documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(contents);
    }

    pub fn processed_documents(&self) -> Vec<String> {
        self.processed_documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Dispara el apagado ordenado. Sólo la primera llamada tiene efecto.
    pub fn request_shutdown(&self) -> bool {
        let sender = self
            .shutdown_sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }
}
