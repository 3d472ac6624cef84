//! Reducing page markup to something a language model can read.
//!
//! [`reduce`] keeps only the visible text of a page, collapses whitespace and
//! cuts the result to a character budget. [`collect_agenda_links`] finds the
//! event deep links on a listing page for the detail-page flow.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use tracing::debug;
use url::Url;

/// Default character budget for listing pages.
pub const MAX_TEXT_CHARS: usize = 30_000;

const HIDDEN_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("valid body selector"));
static PAGINATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(/page/\d*|/pagina|/p/\d+/?$)").expect("valid pagination regex"));
static CATEGORY_FILTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/(categoria|categorias|category|categories|tag|tags)(/|$)").expect("valid category regex"));

/// Visible text of `html`, whitespace-collapsed and cut to `max_chars` characters.
pub fn reduce(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut pieces = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed);
        }
    }

    let joined = pieces.join(" ");
    let collapsed = joined.split_whitespace().join(" ");
    truncate_chars(&collapsed, max_chars)
}

/// Cut to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Event deep links on a listing page.
///
/// A link qualifies when its path contains `segment` (for example `/agenda/`)
/// and it is not the listing itself, a pagination link, a category filter, or
/// a link carrying a query string. Links are resolved against `listing_url`,
/// stripped of fragments, de-duplicated in page order and capped at `cap`.
pub fn collect_agenda_links(html: &str, listing_url: &str, segment: &str, cap: usize) -> Vec<String> {
    let Ok(base) = Url::parse(listing_url) else {
        return Vec::new();
    };
    let listing_key = base.as_str().trim_end_matches('/').to_string();
    let document = Html::parse_document(html);

    let links: Vec<String> = document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| url.query().is_none())
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .filter(|url| is_agenda_detail(url.path(), segment))
        .map(|url| url.to_string())
        .filter(|url| url.trim_end_matches('/') != listing_key)
        .unique()
        .take(cap)
        .collect();

    debug!(count = links.len(), %listing_url, "Collected agenda links");
    links
}

fn is_agenda_detail(path: &str, segment: &str) -> bool {
    let Some(idx) = path.find(segment) else {
        return false;
    };
    let rest = path[idx + segment.len()..].trim_matches('/');
    !rest.is_empty() && !PAGINATION_RE.is_match(path) && !CATEGORY_FILTER_RE.is_match(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_drops_scripts_and_collapses_whitespace() {
        let html = r#"<html><head><title>Agenda</title><style>p{}</style></head>
            <body><h1>Concierto   de
            Salsa</h1><script>var x = 1;</script><p>Viernes 20:00</p>
            <noscript>Activa JavaScript</noscript></body></html>"#;
        assert_eq!(reduce(html, 1000), "Concierto de Salsa Viernes 20:00");
    }

    #[test]
    fn test_reduce_respects_char_budget_on_multibyte_text() {
        let html = "<body><p>Bogotá Medellín</p></body>";
        assert_eq!(reduce(html, 6), "Bogotá");
    }

    #[test]
    fn test_truncate_chars_short_input_unchanged() {
        assert_eq!(truncate_chars("Cali", 10), "Cali");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn test_collect_agenda_links_filters_and_dedupes() {
        let html = r##"<body>
            <a href="/es/agenda/teatro/la-obra">Obra</a>
            <a href="/es/agenda/teatro/la-obra#horarios">Obra otra vez</a>
            <a href="https://www.idartes.gov.co/es/agenda">Agenda</a>
            <a href="/es/agenda?page=2">Siguiente</a>
            <a href="/es/agenda/page/3">Página 3</a>
            <a href="/es/agenda/categoria/musica">Música</a>
            <a href="/es/noticias/algo">Noticia</a>
            <a href="mailto:info@idartes.gov.co">Correo</a>
            <a href="/es/agenda/musica/festival-jazz">Jazz</a>
        </body>"##;
        let links = collect_agenda_links(html, "https://www.idartes.gov.co/es/agenda", "/agenda/", 10);
        assert_eq!(
            links,
            vec![
                "https://www.idartes.gov.co/es/agenda/teatro/la-obra".to_string(),
                "https://www.idartes.gov.co/es/agenda/musica/festival-jazz".to_string(),
            ]
        );
    }

    #[test]
    fn test_collect_agenda_links_caps_results() {
        let html: String = (0..25)
            .map(|i| format!("<a href=\"/agenda/evento-{i}\">Evento {i}</a>"))
            .collect();
        let links = collect_agenda_links(&html, "https://example.com/agenda", "/agenda/", 10);
        assert_eq!(links.len(), 10);
        assert_eq!(links[0], "https://example.com/agenda/evento-0");
    }

    #[test]
    fn test_collect_agenda_links_invalid_listing_url() {
        assert!(collect_agenda_links("<a href=\"/agenda/x\">x</a>", "not a url", "/agenda/", 10).is_empty());
    }
}
