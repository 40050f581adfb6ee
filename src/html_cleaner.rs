//! Limpieza de HTML: elimina ruido y reconstruye un texto plano legible,
//! agrupado por secciones (encabezado + cuerpo) y sin líneas duplicadas.
//!
//! Algoritmo:
//!   1. El texto de los enlaces se rodea de espacios para no pegar palabras.
//!   2. `script`, `style` e `iframe` se ignoran por completo.
//!   3. Se busca el contenido principal (`#doc-content`, `#main-content`,
//!      `article`, `main`, `.content`) y si no existe se usa el documento entero.
//!   4. Se recorren encabezados y bloques en orden de documento; cada
//!      encabezado abre una sección nueva y vuelca la anterior.
//!   5. Las listas aportan una línea por `li`; `pre`/`code` llevan el prefijo `CODE: `.
//!   6. Pasada final: se eliminan las líneas repetidas conservando la primera.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};

const STRIPPED_TAGS: &[&str] = &["script", "style", "iframe"];
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const BLOCK_TAGS: &[&str] = &["p", "span", "ul", "ol", "pre", "code"];
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "div#doc-content",
    "div#main-content",
    "article",
    "main",
    "div.content",
];
const BULLET_GLYPHS: &[char] = &['•', '·', '⋅', '∙', '◦', '⦁', '◆', '►', '▸', '▹', '▻', '▷', '▶'];

/// Limpia un documento HTML completo. Nunca falla: si no hay contenido
/// principal reconocible se procesa el documento entero.
pub fn clean_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = find_main_content(&document);
    dedup_lines(&format_sections(root))
}

/// Elimina líneas vacías y repetidas (coincidencia exacta tras `trim`),
/// conservando el orden de la primera aparición.
pub fn dedup_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();

    for line in text.lines().map(str::trim) {
        if !line.is_empty() && seen.insert(line) {
            lines.push(line);
        }
    }

    lines.join("\n")
}

fn find_main_content(document: &Html) -> ElementRef<'_> {
    for selector in MAIN_CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(found) = document.select(&selector).next() {
            return found;
        }
    }
    document.root_element()
}

/// Texto visible de un elemento, sin nodos eliminados y con espacios
/// alrededor de cada enlace.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if STRIPPED_TAGS.contains(&el.name()) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if el.name() == "a" {
                    out.push(' ');
                    collect_text(child_ref, out);
                    out.push(' ');
                } else {
                    collect_text(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

/// Colapsa espacios y quita un viñeta/flecha inicial.
pub fn normalize_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_prefix(|c: char| BULLET_GLYPHS.contains(&c)) {
        Some(rest) => rest.trim().to_string(),
        None => collapsed,
    }
}

fn clean_text(element: ElementRef<'_>) -> String {
    normalize_text(&visible_text(element))
}

fn is_inside_stripped(element: ElementRef<'_>) -> bool {
    element.ancestors().any(|node| match node.value() {
        Node::Element(el) => STRIPPED_TAGS.contains(&el.name()),
        _ => false,
    })
}

#[derive(Default)]
struct SectionWriter {
    output: Vec<String>,
    heading: Option<String>,
    body: Vec<String>,
}

impl SectionWriter {
    fn start_section(&mut self, heading: String) {
        self.flush();
        self.heading = Some(heading).filter(|h| !h.is_empty());
    }

    /// Vuelca la sección actual si tiene encabezado y cuerpo. El cuerpo
    /// previo al primer encabezado se arrastra a la primera sección.
    fn flush(&mut self) {
        if let Some(heading) = &self.heading {
            if !self.body.is_empty() {
                self.output.push(String::new());
                self.output.push(heading.clone());
                self.output.push(String::new());
                self.output.append(&mut self.body);
            }
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        if self.output.is_empty() && !self.body.is_empty() {
            self.output.append(&mut self.body);
        }
        self.output.join("\n")
    }
}

fn format_sections(root: ElementRef<'_>) -> String {
    let mut writer = SectionWriter::default();

    for node in root.descendants().skip(1) {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();
        if !HEADING_TAGS.contains(&name) && !BLOCK_TAGS.contains(&name) {
            continue;
        }
        if is_inside_stripped(element) {
            continue;
        }

        match name {
            h if HEADING_TAGS.contains(&h) => writer.start_section(clean_text(element)),
            "ul" | "ol" => {
                let items = element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| child.value().name() == "li")
                    .map(clean_text)
                    .filter(|text| !text.is_empty());
                writer.body.extend(items);
            }
            "pre" | "code" => {
                let text = clean_text(element);
                if !text.is_empty() {
                    writer.body.push(format!("CODE: {text}"));
                }
            }
            _ => {
                let text = clean_text(element);
                if !text.is_empty() {
                    writer.body.push(text);
                }
            }
        }
    }

    writer.finish()
}
