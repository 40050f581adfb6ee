//! Extracción de contenido específica de cada red social.
//!
//! Cada plataforma tiene sus propios selectores y etiqueta las líneas que
//! extrae ("Tweet: …", "Facebook Post: …"). Si no se encuentra nada
//! específico se recurre al limpiador genérico de HTML.

use scraper::{ElementRef, Html, Selector};

use crate::html_cleaner::{clean_html, visible_text};
use crate::models::Platform;

/// Dominios reconocidos como redes sociales.
pub const SOCIAL_DOMAINS: &[&str] = &[
    "twitter.com",
    "x.com",
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
];

pub fn is_social_media(url: &str) -> bool {
    let lower = url.to_lowercase();
    SOCIAL_DOMAINS.iter().any(|domain| lower.contains(domain))
}

pub fn platform_of(url: &str) -> Platform {
    let lower = url.to_lowercase();
    if lower.contains("linkedin.com") {
        Platform::Linkedin
    } else if lower.contains("twitter.com") || lower.contains("x.com") {
        Platform::Twitter
    } else if lower.contains("facebook.com") {
        Platform::Facebook
    } else if lower.contains("instagram.com") {
        Platform::Instagram
    } else if lower.contains("youtube.com") {
        Platform::Youtube
    } else {
        Platform::Unknown
    }
}

/// Extrae el contenido de una página social y lo envuelve con la
/// cabecera `Platform` / `Source` / `Content:`.
pub fn extract_social_content(url: &str, html: &str) -> String {
    let platform = platform_of(url);
    let document = Html::parse_document(html);

    let mut lines = match platform {
        Platform::Linkedin => linkedin_lines(&document),
        Platform::Twitter => twitter_lines(&document),
        Platform::Facebook => facebook_lines(&document),
        Platform::Youtube => youtube_lines(&document),
        Platform::Instagram | Platform::Unknown => Vec::new(),
    };

    if lines.is_empty() {
        lines.push(clean_html(html));
    }

    let mut parts = vec![
        format!("Platform: {}", platform.display_name()),
        format!("Source: {url}"),
        "Content:".to_string(),
    ];
    parts.extend(lines);
    parts.join("\n\n")
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Primer elemento que casa con `css` dentro del documento.
pub(crate) fn first_match<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    document.select(&sel).next()
}

pub(crate) fn trimmed_text(element: ElementRef<'_>) -> String {
    visible_text(element).trim().to_string()
}

fn linkedin_lines(document: &Html) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(main) = first_match(document, "div.feed-shared-update-v2, div.article-content") else {
        return lines;
    };

    if let Some(post_sel) = selector("div.feed-shared-text") {
        if let Some(post) = main.select(&post_sel).next() {
            lines.push(format!("LinkedIn Post: {}", trimmed_text(post)));
        }
    }
    if let Some(title_sel) = selector("h1.article-title, h2.article-title") {
        if let Some(title) = main.select(&title_sel).next() {
            lines.push(format!("Article Title: {}", trimmed_text(title)));
        }
    }
    lines
}

fn twitter_lines(document: &Html) -> Vec<String> {
    let (Some(tweets), Some(text_sel)) = (
        selector("div.tweet, div.timeline-Tweet"),
        selector("div.tweet-text, div.timeline-Tweet-text"),
    ) else {
        return Vec::new();
    };

    document
        .select(&tweets)
        .filter_map(|tweet| tweet.select(&text_sel).next())
        .map(|text| format!("Tweet: {}", trimmed_text(text)))
        .collect()
}

fn facebook_lines(document: &Html) -> Vec<String> {
    let Some(posts) = selector("div.userContent, div.post_message") else {
        return Vec::new();
    };

    document
        .select(&posts)
        .map(|post| format!("Facebook Post: {}", trimmed_text(post)))
        .collect()
}

fn youtube_lines(document: &Html) -> Vec<String> {
    let meta_content = |property: &str| {
        first_match(document, &format!(r#"meta[property="{property}"]"#))
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string)
    };

    let mut lines = Vec::new();
    if let Some(title) = meta_content("og:title") {
        lines.push(format!("Video Title: {title}"));
    }
    if let Some(description) = meta_content("og:description") {
        lines.push(format!("Video Description: {description}"));
    }
    lines
}
