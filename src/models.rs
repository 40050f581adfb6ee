//! Modelos de dominio: documentos, chunks, fuentes y análisis de consultas.

use serde::{Deserialize, Serialize};

/// Plataforma de red social reconocida por dominio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linkedin,
    Twitter,
    Facebook,
    Instagram,
    Youtube,
    Unknown,
}

impl Platform {
    /// Nombre legible usado en la cabecera `Platform: <Name>`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Linkedin => "LinkedIn",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::Youtube => "YouTube",
            Platform::Unknown => "Unknown",
        }
    }
}

/// Tipo de sección de una página de LinkedIn tras dividirla.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    CompanyInfo,
    About,
    Post,
    AdditionalContent,
    General,
}

/// Variante del documento. Los documentos de redes sociales llevan
/// la plataforma y, opcionalmente, el tipo de sección.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentKind {
    Generic,
    SocialMedia {
        platform: Platform,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section_type: Option<SectionType>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// URL o ruta de origen.
    pub source: String,
    #[serde(flatten)]
    pub kind: DocumentKind,
}

impl DocumentMetadata {
    pub fn generic(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind: DocumentKind::Generic,
        }
    }

    pub fn social(source: impl Into<String>, platform: Platform) -> Self {
        Self {
            source: source.into(),
            kind: DocumentKind::SocialMedia {
                platform,
                section_type: None,
            },
        }
    }

    pub fn platform(&self) -> Option<Platform> {
        match self.kind {
            DocumentKind::SocialMedia { platform, .. } => Some(platform),
            DocumentKind::Generic => None,
        }
    }

    pub fn is_social_media(&self) -> bool {
        matches!(self.kind, DocumentKind::SocialMedia { .. })
    }
}

/// Documento de texto producido por una etapa de carga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// Trozo acotado de un documento, listo para embeddings.
/// Sólo lo produce el chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Url,
    File,
}

/// Resultado de clasificar una entrada. Efímero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub value: String,
    pub kind: SourceKind,
}

/// Fuentes particionadas en URLs y ficheros, en orden de entrada.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedSources {
    pub urls: Vec<String>,
    pub files: Vec<String>,
}

/// Análisis de una pregunta: explicación y consultas de búsqueda derivadas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub analysis: String,
    pub queries: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_metadata_serializes_with_type_tag() {
        let mut meta = DocumentMetadata::social("https://linkedin.com/company/acme", Platform::Linkedin);
        if let DocumentKind::SocialMedia { section_type, .. } = &mut meta.kind {
            *section_type = Some(SectionType::CompanyInfo);
        }

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["source"], "https://linkedin.com/company/acme");
        assert_eq!(value["type"], "social_media");
        assert_eq!(value["platform"], "linkedin");
        assert_eq!(value["section_type"], "company_info");

        let back: DocumentMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn generic_metadata_has_no_platform() {
        let meta = DocumentMetadata::generic("https://example.com");
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["type"], "generic");
        assert!(value.get("platform").is_none());
        assert_eq!(meta.platform(), None);
        assert!(!meta.is_social_media());
    }
}
