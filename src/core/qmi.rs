//! Long-form descriptions scraped from Quality and Methodology Information
//! pages.
//!
//! The trim window is a heuristic fitted to the current ONS page template:
//! the first paragraphs are navigation and the last ones are footer text.
//! It has to be revisited whenever that template changes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::adapters::HttpFetcher;
use crate::core::extract::{json_path_str, scalar_field, QMI_URL_PATH};
use crate::core::DatasetListing;
use crate::utils::error::Result;

static PARAGRAPH_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p(?:\s[^>]*)?>").expect("paragraph pattern"));
/// Where a paragraph ends: its own end tag, or any tag that closes it
/// implicitly (a block-level start tag, or the end of its container).
static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</p\s*>",
        r"|<(?:p|div|ul|ol|dl|table|h[1-6]|section|article|aside|header|footer|blockquote|pre|form|nav|main|hr)(?:\s[^>]*)?/?>",
        r"|</(?:div|body|html|section|article|aside|main|td|th|li|dd|blockquote|form|header|footer|nav)\s*>",
    ))
    .expect("paragraph end pattern")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("entity pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimWindow {
    pub skip_leading: usize,
    pub skip_trailing: usize,
    /// Paragraphs must be strictly longer than this after cleaning.
    pub min_paragraph_chars: usize,
}

impl Default for TrimWindow {
    fn default() -> Self {
        Self {
            skip_leading: 4,
            skip_trailing: 7,
            min_paragraph_chars: 35,
        }
    }
}

impl TrimWindow {
    pub fn apply<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = items.len().saturating_sub(self.skip_trailing);
        if self.skip_leading >= end {
            return &[];
        }
        &items[self.skip_leading..end]
    }
}

/// Inner HTML of every `<p>` element, in document order. A missing `</p>`
/// ends the paragraph where the next block starts, as HTML parsers do.
pub fn extract_paragraphs(html: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut cursor = 0;
    while let Some(open) = PARAGRAPH_OPEN.find_at(html, cursor) {
        let start = open.end();
        let end = PARAGRAPH_END
            .find_at(html, start)
            .map_or(html.len(), |m| m.start());
        paragraphs.push(&html[start..end]);
        cursor = end;
    }
    paragraphs
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&rsquo;", "'")
        .replace("&lsquo;", "'")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    // last, so "&amp;lt;" stays literal text
    numeric.replace("&amp;", "&")
}

/// Plain text of one paragraph: markup removed, quotes, commas and escape
/// artifacts dropped, whitespace collapsed.
pub fn clean_paragraph(inner_html: &str) -> String {
    let without_tags = TAG.replace_all(inner_html, "");
    let decoded = decode_entities(&without_tags)
        .replace('\u{a0}', " ")
        .replace("\\n", " ")
        .replace("\\xa0", " ");
    let stripped: String = decoded
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | ',' | '\u{2018}' | '\u{2019}' | '\u{201c}' | '\u{201d}'))
        .collect();
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

pub fn narrative(html: &str, window: &TrimWindow) -> String {
    let paragraphs = extract_paragraphs(html);
    window
        .apply(&paragraphs)
        .iter()
        .map(|p| clean_paragraph(p))
        .filter(|p| p.chars().count() > window.min_paragraph_chars)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Narrative page per listing position: the QMI item with the same id, else
/// the link embedded in the listing itself, else (for listings without an id)
/// the QMI item at the same position.
pub fn align_qmi_urls(listings: &[DatasetListing], qmi_items: &[Value]) -> Vec<Option<String>> {
    let by_id: HashMap<String, String> = qmi_items
        .iter()
        .filter_map(|item| {
            let id = scalar_field(item, "id")?;
            let href = json_path_str(item, QMI_URL_PATH)?;
            Some((id, href.to_string()))
        })
        .collect();

    listings
        .iter()
        .enumerate()
        .map(|(position, listing)| {
            if let Some(url) = listing.id.as_ref().and_then(|id| by_id.get(id)) {
                return Some(url.clone());
            }
            if listing.qmi_url.is_some() {
                return listing.qmi_url.clone();
            }
            if listing.id.is_none() {
                return qmi_items
                    .get(position)
                    .and_then(|item| json_path_str(item, QMI_URL_PATH))
                    .map(str::to_string);
            }
            None
        })
        .collect()
}

pub struct QmiScraper {
    fetcher: HttpFetcher,
    window: TrimWindow,
}

impl QmiScraper {
    pub fn new(fetcher: HttpFetcher, window: TrimWindow) -> Self {
        Self { fetcher, window }
    }

    pub async fn narrative_for(&self, url: &str) -> Result<String> {
        let html = self.fetcher.get_text(url, self.fetcher.retry_policy()).await?;
        Ok(narrative(&html, &self.window))
    }

    /// Empty when there is no page or it cannot be fetched; never fails.
    pub async fn scrape(&self, qmi_url: Option<&str>) -> String {
        let Some(url) = qmi_url else {
            return String::new();
        };

        match self.narrative_for(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("QMI page {} unavailable: {}", url, e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(paragraphs: &[&str]) -> String {
        let body: String = paragraphs.iter().map(|p| format!("<p>{}</p>\n", p)).collect();
        format!("<html><body>{}</body></html>", body)
    }

    fn listing(id: Option<&str>, qmi: Option<&str>) -> DatasetListing {
        DatasetListing {
            id: id.map(str::to_string),
            title: None,
            description: None,
            latest_version_href: Some("http://d".to_string()),
            qmi_url: qmi.map(str::to_string),
        }
    }

    #[test]
    fn test_extract_paragraphs_with_attributes() {
        let html = r#"<div><P class="lead">One</P><p>Two <b>bold</b></p><pre>not</pre></div>"#;
        assert_eq!(extract_paragraphs(html), vec!["One", "Two <b>bold</b>"]);
    }

    #[test]
    fn test_unclosed_paragraphs_end_at_next_block() {
        let html = "<div><p>First<p class=x>Second</div><p>Intro<ul><li>item</li></ul><p>Last";
        assert_eq!(extract_paragraphs(html), vec!["First", "Second", "Intro", "Last"]);
    }

    #[test]
    fn test_unclosed_paragraphs_keep_trim_window_aligned() {
        let mut html = String::from("<html><body>");
        for i in 0..12 {
            if i == 4 {
                html.push_str("<p>This dataset measures the change in prices of goods over time.");
            } else {
                html.push_str(&format!("<p>nav {}", i));
            }
        }
        html.push_str("</body></html>");

        assert_eq!(extract_paragraphs(&html).len(), 12);
        assert_eq!(
            narrative(&html, &TrimWindow::default()),
            "This dataset measures the change in prices of goods over time."
        );
    }

    #[test]
    fn test_trim_window_leaves_middle() {
        let window = TrimWindow::default();
        let items: Vec<usize> = (0..12).collect();
        assert_eq!(window.apply(&items), &[4]);
        assert!(window.apply(&items[..11]).is_empty());
        assert!(window.apply(&items[..3]).is_empty());
    }

    #[test]
    fn test_twelve_paragraphs_keep_one_long_one() {
        let mut paragraphs = vec!["navigation"; 12];
        paragraphs[4] = "This dataset measures the change in prices of goods over time.";
        let text = narrative(&page(&paragraphs), &TrimWindow::default());
        assert_eq!(text, "This dataset measures the change in prices of goods over time.");
    }

    #[test]
    fn test_short_surviving_paragraph_gives_empty_narrative() {
        let mut paragraphs = vec!["A paragraph long enough to pass the length threshold."; 12];
        paragraphs[4] = "Exactly thirty-five characters long";
        assert_eq!("Exactly thirty-five characters long".len(), 35);
        assert_eq!(narrative(&page(&paragraphs), &TrimWindow::default()), "");
    }

    #[test]
    fn test_clean_paragraph() {
        let cleaned = clean_paragraph(
            "The <a href=\"/x\">Labour Force Survey</a>&nbsp;is a  study\n of 'households', run&#160;quarterly &amp; monthly.",
        );
        assert_eq!(
            cleaned,
            "The Labour Force Survey is a study of households run quarterly & monthly."
        );
    }

    #[test]
    fn test_custom_window_concatenates() {
        let window = TrimWindow {
            skip_leading: 0,
            skip_trailing: 0,
            min_paragraph_chars: 10,
        };
        let html = page(&["short", "First long paragraph here.", "Second long paragraph here."]);
        assert_eq!(
            narrative(&html, &window),
            "First long paragraph here. Second long paragraph here."
        );
    }

    #[test]
    fn test_align_prefers_id_then_embedded_then_position() {
        let listings = vec![
            listing(Some("b"), None),
            listing(Some("x"), Some("http://embedded/x")),
            listing(None, None),
            listing(Some("y"), None),
        ];
        let qmi_items = vec![
            json!({"id": "a", "qmi": {"href": "http://qmi/a"}}),
            json!({"id": "b", "qmi": {"href": "http://qmi/b"}}),
            json!({"qmi": {"href": "http://qmi/unnamed"}}),
            json!({"id": "z", "qmi": {"href": "http://qmi/z"}}),
        ];

        let aligned = align_qmi_urls(&listings, &qmi_items);
        assert_eq!(
            aligned,
            vec![
                Some("http://qmi/b".to_string()),
                Some("http://embedded/x".to_string()),
                Some("http://qmi/unnamed".to_string()),
                None,
            ]
        );
    }

    #[tokio::test]
    async fn test_scrape_without_url_is_empty() {
        let fetcher = HttpFetcher::new(Default::default()).unwrap();
        let scraper = QmiScraper::new(fetcher, TrimWindow::default());
        assert_eq!(scraper.scrape(None).await, "");
    }
}
