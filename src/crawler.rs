//! Rastreo web: sitios genéricos con recorrido recursivo acotado y páginas
//! de redes sociales con extracción específica por plataforma.
//!
//! La ingesta es "best effort" por fuente: cualquier fallo de red o de
//! parseo de una URL produce cero documentos para esa URL y nunca se
//! propaga. Cada descarga devuelve un `Result<_, FetchError>` que el
//! llamador registra y descarta.

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use scraper::Html;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::html_cleaner::clean_html;
use crate::models::{Document, DocumentMetadata, Platform};
use crate::social::{extract_social_content, first_match, is_social_media, platform_of, selector, trimmed_text};

/// Profundidad máxima del recorrido: la raíz y sus enlaces directos.
pub const MAX_CRAWL_DEPTH: usize = 2;
/// Conexiones simultáneas máximas en el lote de enlaces sociales.
pub const MAX_CONCURRENT_FETCHES: usize = 5;
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
pub const SUPPLEMENTARY_TIMEOUT: Duration = Duration::from_secs(10);
/// Segmentos de ruta que nunca se rastrean.
pub const EXCLUDED_SEGMENTS: &[&str] = &["login", "signup", "cart", "checkout", "account"];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const LINKEDIN_MAX_POSTS: usize = 5;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL inválida '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Error de red en {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} en {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("No se pudo leer el cuerpo de {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Request { source, .. } | FetchError::Body { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct WebCrawler {
    client: reqwest::Client,
    page_timeout: Duration,
    supplementary_timeout: Duration,
}

impl WebCrawler {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(PAGE_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Usa un cliente ya configurado (útil para fijar proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            page_timeout: PAGE_TIMEOUT,
            supplementary_timeout: SUPPLEMENTARY_TIMEOUT,
        }
    }

    /// Límites por petición: páginas principales y páginas suplementarias
    /// de LinkedIn.
    pub fn with_timeouts(mut self, page: Duration, supplementary: Duration) -> Self {
        self.page_timeout = page;
        self.supplementary_timeout = supplementary;
        self
    }

    /// Carga documentos para todas las URLs. Nunca falla: las fuentes que
    /// no se pueden descargar simplemente no aportan documentos.
    pub async fn load_web_documents(&self, urls: &[String]) -> Vec<Document> {
        if urls.is_empty() {
            return Vec::new();
        }

        let mut documents = Vec::new();
        let mut discovered: Vec<String> = Vec::new();
        let mut seen_social: HashSet<String> = HashSet::new();
        let mut fetched_social: HashSet<String> = HashSet::new();

        for url in urls {
            if is_social_media(url) {
                fetched_social.insert(url.clone());
                match self.load_social_document(url).await {
                    Ok(Some(doc)) => documents.push(doc),
                    Ok(None) => info!(url = %url, "Página social sin contenido"),
                    Err(e) => warn!(url = %url, timeout = e.is_timeout(), "No se pudo cargar la página social: {e}"),
                }
                continue;
            }

            let (pages, root_html) = self.crawl_site(url).await;
            info!(url = %url, pages = pages.len(), "Sitio rastreado");
            documents.extend(pages);

            let root_html = match root_html {
                Some(html) => Some(html),
                None => match self.fetch_html(url, self.page_timeout).await {
                    Ok(html) => Some(html),
                    Err(e) => {
                        warn!(url = %url, "No se pudo buscar enlaces sociales: {e}");
                        None
                    }
                },
            };
            if let Some(html) = root_html {
                for link in extract_social_links(&html, url) {
                    if seen_social.insert(link.clone()) {
                        discovered.push(link);
                    }
                }
            }
        }

        let pending: Vec<String> = discovered
            .into_iter()
            .filter(|link| !fetched_social.contains(link))
            .collect();
        if !pending.is_empty() {
            info!(links = pending.len(), "Descargando enlaces sociales descubiertos");
            documents.extend(self.load_social_batch(pending).await);
        }

        documents
    }

    /// Descarga un lote de páginas sociales con concurrencia acotada.
    /// Un fallo aislado no cancela al resto.
    pub async fn load_social_batch(&self, urls: Vec<String>) -> Vec<Document> {
        let results: Vec<(String, Result<Option<Document>, FetchError>)> = stream::iter(urls)
            .map(|url| async move {
                let result = self.load_social_document(&url).await;
                (url, result)
            })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let mut documents = Vec::new();
        for (url, result) in results {
            match result {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => debug!(url = %url, "Enlace social sin contenido"),
                Err(e) => warn!(url = %url, timeout = e.is_timeout(), "Fallo al descargar enlace social: {e}"),
            }
        }
        documents
    }

    /// Descarga y extrae una página social. LinkedIn usa la extracción profunda.
    pub async fn load_social_document(&self, url: &str) -> Result<Option<Document>, FetchError> {
        let html = self.fetch_html(url, self.page_timeout).await?;
        let platform = platform_of(url);

        let content = if platform == Platform::Linkedin {
            self.linkedin_deep_content(url, &html).await
        } else {
            extract_social_content(url, &html)
        };

        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(Document::new(content, DocumentMetadata::social(url, platform))))
    }

    /// Extracción profunda de LinkedIn: tarjeta de empresa, sección "about",
    /// publicaciones recientes y las páginas `/about` y `/posts`. Cada página
    /// suplementaria puede fallar por separado.
    async fn linkedin_deep_content(&self, url: &str, html: &str) -> String {
        let mut parts = linkedin_profile_parts(url, html);

        let base = url.trim_end_matches('/');
        for suffix in ["about", "posts"] {
            let extra_url = format!("{base}/{suffix}");
            match self.fetch_html(&extra_url, self.supplementary_timeout).await {
                Ok(extra_html) => {
                    if let Some(text) = main_text(&extra_html) {
                        parts.push(format!("\nContent from {extra_url}:"));
                        parts.push(text);
                    }
                }
                Err(e) => debug!(url = %extra_url, "Página suplementaria de LinkedIn no disponible: {e}"),
            }
        }

        parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Recorrido en anchura dentro del mismo host, hasta `MAX_CRAWL_DEPTH`.
    /// Devuelve los documentos y, si se pudo descargar, el HTML de la raíz.
    async fn crawl_site(&self, start: &str) -> (Vec<Document>, Option<String>) {
        let base = match Url::parse(start) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %start, "URL inicial inválida: {e}");
                return (Vec::new(), None);
            }
        };

        let mut root_html = None;
        let mut documents = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut level = vec![base.to_string()];
        visited.insert(base.to_string());

        for depth in 0..MAX_CRAWL_DEPTH {
            if level.is_empty() {
                break;
            }
            debug!(depth, urls = level.len(), "Procesando nivel del rastreo");

            let fetched: Vec<(String, Result<String, FetchError>)> = stream::iter(level)
                .map(|page_url| async move {
                    let result = self.fetch_html(&page_url, self.page_timeout).await;
                    (page_url, result)
                })
                .buffered(MAX_CONCURRENT_FETCHES)
                .collect()
                .await;

            let mut next_level = Vec::new();
            for (page_url, result) in fetched {
                let html = match result {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(url = %page_url, timeout = e.is_timeout(), "Fallo al descargar página: {e}");
                        continue;
                    }
                };

                let content = clean_html(&html);
                if !content.is_empty() {
                    documents.push(Document::new(content, DocumentMetadata::generic(page_url.clone())));
                }

                if depth + 1 < MAX_CRAWL_DEPTH {
                    for link in extract_site_links(&html, &base) {
                        if visited.insert(link.clone()) {
                            next_level.push(link);
                        }
                    }
                }

                if depth == 0 {
                    root_html = Some(html);
                }
            }
            level = next_level;
        }

        (documents, root_html)
    }

    async fn fetch_html(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}

fn has_excluded_segment(url: &Url) -> bool {
    url.path_segments().map_or(false, |mut segments| {
        segments.any(|segment| EXCLUDED_SEGMENTS.contains(&segment.to_lowercase().as_str()))
    })
}

fn hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Enlaces del mismo host que deben seguirse en el recorrido.
fn extract_site_links(html: &str, base: &Url) -> Vec<String> {
    hrefs(html)
        .iter()
        .filter_map(|href| base.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| url.host_str() == base.host_str() && url.port_or_known_default() == base.port_or_known_default())
        .filter(|url| !has_excluded_segment(url))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| !is_social_media(url))
        .collect()
}

/// Enlaces a redes sociales presentes en la página, sin duplicados.
pub fn extract_social_links(html: &str, page_url: &str) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();

    hrefs(html)
        .into_iter()
        .filter(|href| is_social_media(href))
        .map(|href| match base.as_ref().and_then(|b| b.join(&href).ok()) {
            Some(url) => url.to_string(),
            None => href,
        })
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Partes de la página principal de una empresa en LinkedIn.
fn linkedin_profile_parts(url: &str, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut parts = vec![format!("Platform: LinkedIn\nSource: {url}\n")];

    if let Some(company) = first_match(&document, "h1.org-top-card-summary__title") {
        parts.push(format!("Company: {}", trimmed_text(company)));
    }
    if let Some(about) = first_match(&document, "section.org-about-section") {
        parts.push(format!("About: {}", trimmed_text(about)));
    }

    if let Some(posts_sel) = selector("div.feed-shared-update-v2, div.update-components-text") {
        let posts: Vec<String> = document
            .select(&posts_sel)
            .take(LINKEDIN_MAX_POSTS)
            .map(trimmed_text)
            .collect();
        if !posts.is_empty() {
            parts.push("\nRecent Updates:".to_string());
            parts.extend(
                posts
                    .into_iter()
                    .filter(|text| !text.is_empty())
                    .map(|text| format!("Post: {text}")),
            );
        }
    }

    parts
}

/// Texto del elemento `<main>`, si existe.
fn main_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let text = first_match(&document, "main").map(trimmed_text)?;
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentKind;
    use crate::test_support::{serve_pages, serve_tracked_pages, test_crawler, unused_local_url};

    const LINKEDIN_PAGE: &str = r#"<html><body>
        <h1 class="org-top-card-summary__title"> Acme Corp </h1>
        <section class="org-about-section">AI consulting since 2021</section>
        <div class="feed-shared-update-v2">We shipped v2</div>
        </body></html>"#;

    #[test]
    fn excluded_segments_are_detected() {
        let url = Url::parse("https://acme.com/account/settings").unwrap();
        assert!(has_excluded_segment(&url));
        let url = Url::parse("https://acme.com/Checkout").unwrap();
        assert!(has_excluded_segment(&url));
        let url = Url::parse("https://acme.com/blog/login-tips-and-more").unwrap();
        assert!(!has_excluded_segment(&url));
    }

    #[test]
    fn site_links_stay_on_the_same_host() {
        let base = Url::parse("https://acme.com/").unwrap();
        let html = r##"
            <a href="/about#team">About</a>
            <a href="https://acme.com/services">Services</a>
            <a href="https://other.com/x">Other</a>
            <a href="/login">Login</a>
            <a href="mailto:hi@acme.com">Mail</a>
            <a href="https://linkedin.com/company/acme">LinkedIn</a>"##;
        assert_eq!(
            extract_site_links(html, &base),
            vec!["https://acme.com/about".to_string(), "https://acme.com/services".to_string()]
        );
    }

    #[test]
    fn social_links_are_deduplicated() {
        let html = r#"
            <a href="https://twitter.com/acme">t</a>
            <a href="https://twitter.com/acme">t again</a>
            <a href="https://www.youtube.com/@acme">yt</a>
            <a href="/contact">contact</a>"#;
        assert_eq!(
            extract_social_links(html, "https://acme.com"),
            vec!["https://twitter.com/acme".to_string(), "https://www.youtube.com/@acme".to_string()]
        );
    }

    #[test]
    fn linkedin_profile_sections_are_labelled() {
        let parts = linkedin_profile_parts("https://linkedin.com/company/acme", LINKEDIN_PAGE);
        assert_eq!(parts[0], "Platform: LinkedIn\nSource: https://linkedin.com/company/acme\n");
        assert!(parts.contains(&"Company: Acme Corp".to_string()));
        assert!(parts.contains(&"About: AI consulting since 2021".to_string()));
        assert!(parts.contains(&"\nRecent Updates:".to_string()));
        assert!(parts.contains(&"Post: We shipped v2".to_string()));
    }

    #[tokio::test]
    async fn crawls_site_within_depth_and_follows_social_links() {
        let base = serve_pages(&[
            (
                "/",
                r#"<h1>Home</h1><p>Welcome to Acme</p>
                   <a href="/about">About</a>
                   <a href="/login">Login</a>
                   <a href="https://other.invalid/x">Elsewhere</a>
                   <a href="/linkedin.com/company/acme">LinkedIn</a>"#,
            ),
            ("/about", r#"<h1>About</h1><p>Founded in 2021</p><a href="/about/team">Team</a>"#),
            ("/about/team", "<p>Team page</p>"),
            ("/login", "<p>secret</p>"),
            ("/linkedin.com/company/acme", LINKEDIN_PAGE),
            ("/linkedin.com/company/acme/about", "<main>Acme builds AI products</main>"),
        ])
        .await;

        let crawler = test_crawler();
        let docs = crawler.load_web_documents(&[format!("{base}/")]).await;
        let sources: Vec<&str> = docs.iter().map(|d| d.metadata.source.as_str()).collect();

        assert!(sources.contains(&format!("{base}/").as_str()), "{sources:?}");
        assert!(sources.contains(&format!("{base}/about").as_str()), "{sources:?}");
        assert!(!sources.iter().any(|s| s.ends_with("/about/team")));
        assert!(!sources.iter().any(|s| s.ends_with("/login")));

        let about = docs.iter().find(|d| d.metadata.source.ends_with("/about")).unwrap();
        assert_eq!(about.content, "About\nFounded in 2021");
        assert_eq!(about.metadata.kind, DocumentKind::Generic);

        let social = docs
            .iter()
            .find(|d| d.metadata.is_social_media())
            .expect("documento de LinkedIn descubierto");
        assert_eq!(social.metadata.platform(), Some(Platform::Linkedin));
        assert!(social.content.contains("Company: Acme Corp"));
        assert!(social.content.contains("Acme builds AI products"));
        assert!(!social.content.contains("/posts:"));
    }

    #[tokio::test]
    async fn linkedin_url_dispatches_to_deep_extraction() {
        let base = serve_pages(&[("/linkedin.com/company/acme", LINKEDIN_PAGE)]).await;
        let url = format!("{base}/linkedin.com/company/acme");

        let docs = test_crawler().load_web_documents(&[url.clone()]).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata, DocumentMetadata::social(url, Platform::Linkedin));
        assert!(docs[0].content.starts_with("Platform: LinkedIn\nSource: "));
        assert!(docs[0].content.contains("Post: We shipped v2"));
    }

    #[tokio::test]
    async fn failing_sources_yield_no_documents() {
        let base = serve_pages(&[("/", "<p>ok</p>")]).await;
        let docs = test_crawler()
            .load_web_documents(&[
                format!("{base}/missing"),
                unused_local_url().await,
                format!("{base}/twitter.com/gone"),
            ])
            .await;
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn one_failing_social_link_does_not_abort_the_batch() {
        let base = serve_pages(&[
            (
                "/twitter.com/acme",
                r#"<div class="tweet"><div class="tweet-text">Hello</div></div>"#,
            ),
        ])
        .await;

        let docs = test_crawler()
            .load_social_batch(vec![
                format!("{base}/facebook.com/missing"),
                format!("{base}/twitter.com/acme"),
                unused_local_url().await,
            ])
            .await;

        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.contains("Tweet: Hello"));
        assert_eq!(docs[0].metadata.platform(), Some(Platform::Twitter));
    }

    const TWEET_PAGE: &str = r#"<div class="tweet"><div class="tweet-text">Hello</div></div>"#;

    #[tokio::test]
    async fn social_batch_keeps_at_most_five_requests_in_flight() {
        let paths: Vec<String> = (0..12).map(|i| format!("/twitter.com/acme{i}")).collect();
        let pages: Vec<(&str, &str)> = paths.iter().map(|p| (p.as_str(), TWEET_PAGE)).collect();
        let delays: Vec<(&str, Duration)> = paths
            .iter()
            .map(|p| (p.as_str(), Duration::from_millis(150)))
            .collect();
        let (base, stats) = serve_tracked_pages(&pages, &delays).await;

        let urls = paths.iter().map(|p| format!("{base}{p}")).collect();
        let docs = test_crawler().load_social_batch(urls).await;

        assert_eq!(docs.len(), 12);
        assert!(stats.peak() <= MAX_CONCURRENT_FETCHES, "peak = {}", stats.peak());
        assert!(stats.peak() > 1, "peak = {}", stats.peak());
    }

    #[tokio::test]
    async fn slow_page_times_out_without_affecting_the_rest() {
        let (base, _stats) = serve_tracked_pages(
            &[("/twitter.com/slow", TWEET_PAGE), ("/twitter.com/fast", TWEET_PAGE)],
            &[("/twitter.com/slow", Duration::from_secs(3))],
        )
        .await;
        let crawler = test_crawler().with_timeouts(Duration::from_millis(300), Duration::from_millis(300));

        let err = crawler
            .fetch_html(&format!("{base}/twitter.com/slow"), crawler.page_timeout)
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err}");

        let docs = crawler
            .load_social_batch(vec![format!("{base}/twitter.com/slow"), format!("{base}/twitter.com/fast")])
            .await;
        assert_eq!(docs.len(), 1);
        assert!(docs[0].metadata.source.ends_with("/twitter.com/fast"));
    }

    #[tokio::test]
    async fn invalid_urls_are_fetch_errors() {
        let err = test_crawler().fetch_html("not a url", PAGE_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(!err.is_timeout());
    }
}
