//! Clasificación de fuentes de entrada en URLs y ficheros.

use tracing::debug;
use url::Url;

use crate::models::{ClassifiedSources, Source, SourceKind};

/// Una cadena es URL si parsea con esquema y host.
pub fn is_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().map_or(false, |h| !h.is_empty()),
        Err(_) => false,
    }
}

pub fn classify_one(value: &str) -> Source {
    let kind = if is_url(value) {
        SourceKind::Url
    } else {
        SourceKind::File
    };
    Source {
        value: value.to_string(),
        kind,
    }
}

/// Particiona las fuentes. Sin E/S y sin errores: lo que no es URL
/// se trata como referencia a fichero.
pub fn classify<S: AsRef<str>>(sources: &[S]) -> ClassifiedSources {
    let mut classified = ClassifiedSources::default();

    for source in sources {
        let source = classify_one(source.as_ref());
        match source.kind {
            SourceKind::Url => classified.urls.push(source.value),
            SourceKind::File => classified.files.push(source.value),
        }
    }

    debug!(
        urls = classified.urls.len(),
        files = classified.files.len(),
        "Fuentes clasificadas"
    );
    classified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_urls_and_files() {
        let classified = classify(&["https://example.com", "report.pdf"]);
        assert_eq!(classified.urls, vec!["https://example.com".to_string()]);
        assert_eq!(classified.files, vec!["report.pdf".to_string()]);
    }

    #[test]
    fn malformed_strings_become_files() {
        let classified = classify(&["example.com", "http://", "mailto:someone", "", "ftp://host/x"]);
        assert_eq!(classified.urls, vec!["ftp://host/x".to_string()]);
        assert_eq!(classified.files.len(), 4);
    }

    #[test]
    fn classification_is_idempotent() {
        let input = vec![
            "https://example.com/a".to_string(),
            "notes.txt".to_string(),
            "https://linkedin.com/company/acme".to_string(),
        ];
        assert_eq!(classify(&input), classify(&input));
    }
}
