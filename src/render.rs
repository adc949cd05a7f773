use std::time::{Duration, Instant};

use log::{debug, warn};
use reqwest::{Client, ClientBuilder};
use scraper::{Html, Selector};

use crate::error::PipelineError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// An uncompressed frame from a collaborator that can rasterize the page.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A rendered page handed over by the rendering collaborator. Everything the
/// pipeline consumes goes through this seam, so extraction and snapshotting
/// can be exercised against stub pages in tests.
pub trait PageSession {
    fn url(&self) -> &str;

    /// Page title, for diagnostics only.
    fn title(&self) -> Option<String>;

    /// Full rendered textual content of the page.
    fn body_text(&self) -> &str;

    /// Text of every element matching a CSS selector, in document order.
    /// Collaborators without structured query support return an empty vec.
    fn select_text(&self, css: &str) -> Vec<String>;

    /// Whole-page raster capture, if the collaborator supports one.
    fn capture_page_png(&self) -> Option<Vec<u8>>;

    /// Raw pixel buffer capture, if the collaborator supports one.
    fn capture_raw_frame(&self) -> Option<RawFrame>;
}

/// Produces one exclusively-owned [`PageSession`] per run.
pub trait Renderer {
    async fn render(&self, url: &str) -> anyhow::Result<Box<dyn PageSession>>;
}

/// Plain-HTTP rendering collaborator. Instead of a blind settle delay it
/// refetches until the page text satisfies a readiness predicate, and maps
/// running out the deadline to [`PipelineError::Render`].
pub struct HttpRenderer {
    client: Client,
    timeout: Duration,
    ready_marker: String,
}

impl HttpRenderer {
    pub fn new(timeout: Duration, ready_marker: impl Into<String>) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            timeout,
            ready_marker: ready_marker.into(),
        })
    }

    fn content_ready(&self, text: &str) -> bool {
        !text.trim().is_empty()
            && (self.ready_marker.is_empty() || text.contains(&self.ready_marker))
    }
}

impl Renderer for HttpRenderer {
    async fn render(&self, url: &str) -> anyhow::Result<Box<dyn PageSession>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let html = response.text().await.unwrap_or_default();
                    let text = flatten_to_text(&html);
                    if self.content_ready(&text) {
                        return Ok(Box::new(HttpSession {
                            url: url.to_string(),
                            html,
                            text,
                        }));
                    }
                    debug!("content at {url} not ready yet, polling again");
                }
                Err(e) => warn!("fetch attempt for {url} failed: {e}"),
            }
            if Instant::now() >= deadline {
                return Err(PipelineError::Render(format!(
                    "page at {url} not ready within {:?}",
                    self.timeout
                ))
                .into());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Session over a fetched HTML document. Holds the raw markup and re-parses
/// per structured query; raster capture is not a capability of plain HTTP.
pub struct HttpSession {
    url: String,
    html: String,
    text: String,
}

impl PageSession for HttpSession {
    fn url(&self) -> &str {
        &self.url
    }

    fn title(&self) -> Option<String> {
        self.select_text("title").into_iter().next()
    }

    fn body_text(&self) -> &str {
        &self.text
    }

    fn select_text(&self, css: &str) -> Vec<String> {
        let Ok(selector) = Selector::parse(css) else {
            return vec![];
        };
        let document = Html::parse_document(&self.html);
        document
            .select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn capture_page_png(&self) -> Option<Vec<u8>> {
        None
    }

    fn capture_raw_frame(&self) -> Option<RawFrame> {
        None
    }
}

fn flatten_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_keeps_price_token_and_marker_adjacent_enough_for_regex() {
        let html = r#"<html><body><div><span>9,351</span> <span>CNY/kg</span></div></body></html>"#;
        let text = flatten_to_text(html);
        assert!(text.contains("9,351"));
        assert!(text.contains("CNY/kg"));
    }

    #[test]
    fn session_structured_query_returns_element_text() {
        let session = HttpSession {
            url: "http://example.invalid".to_string(),
            html: r#"<html><head><title>Silver</title></head>
                     <body><div class="priceItem">9,351 CNY/kg</div></body></html>"#
                .to_string(),
            text: String::new(),
        };
        assert_eq!(
            session.select_text(r#"div[class*="price"]"#),
            vec!["9,351 CNY/kg".to_string()]
        );
        assert_eq!(session.title().as_deref(), Some("Silver"));
    }

    #[test]
    fn readiness_predicate_requires_marker() {
        let renderer = HttpRenderer::new(Duration::from_secs(1), "CNY/kg").unwrap();
        assert!(!renderer.content_ready(""));
        assert!(!renderer.content_ready("still loading"));
        assert!(renderer.content_ready("Original 9,351 CNY/kg"));
    }
}
