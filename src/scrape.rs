use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// Job boards first, then generic containers.
const DESCRIPTION_SELECTORS: &[&str] = &[
    ".jobs-description__content",
    ".jobs-box__html-content",
    ".show-more-less-html__markup",
    ".description__text",
    "div.jobs-description-content__text",
    "#job-details",
    "article.jobs-description",
    "#jobDescriptionText",
    ".job-description",
    "[itemprop='description']",
    "main",
    "article",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub struct PageFetcher {
    client: reqwest::blocking::Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Downloads a job page and returns the readable description text.
    pub fn fetch_job_page(&self, url: &str) -> Result<String> {
        info!(url, "fetching job page");
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Fetching {} failed with status {}",
                url,
                response.status()
            ));
        }

        let html = response
            .text()
            .with_context(|| format!("Failed to read response body from {}", url))?;

        let text = html_to_text(&html).ok_or_else(|| anyhow!("No content found on page {}", url))?;
        debug!(url, chars = text.len(), "extracted job page text");
        Ok(text)
    }
}

/// Extracts the text of the first known description container that has any,
/// falling back to the whole `<body>`. One line per text fragment.
pub fn html_to_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for selector in DESCRIPTION_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(text) = document.select(&selector).find_map(element_text) {
            return Some(text);
        }
    }

    let body = Selector::parse("body").ok()?;
    document.select(&body).find_map(element_text)
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let lines: Vec<&str> = element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
            });
            if hidden {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then_some(trimmed)
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_prefers_description_container() {
        let html = r#"<html><body>
            <nav>Jobs Home</nav>
            <div class="description__text"><h2>About the role</h2><p>Write Rust.</p></div>
        </body></html>"#;
        assert_eq!(
            html_to_text(html).unwrap(),
            "About the role\nWrite Rust."
        );
    }

    #[test]
    fn test_html_to_text_falls_back_to_body() {
        let html = "<html><body><div><p>Senior Engineer</p><p>Remote</p></div></body></html>";
        assert_eq!(html_to_text(html).unwrap(), "Senior Engineer\nRemote");
    }

    #[test]
    fn test_html_to_text_skips_scripts_and_styles() {
        let html = r#"<html><head><style>p { color: red; }</style></head>
            <body><script>var tracking = 1;</script><p>Visible</p></body></html>"#;
        assert_eq!(html_to_text(html).unwrap(), "Visible");
    }

    #[test]
    fn test_html_to_text_skips_empty_containers() {
        let html = r#"<html><body><main>   </main><article><p>Job text</p></article></body></html>"#;
        assert_eq!(html_to_text(html).unwrap(), "Job text");
    }

    #[test]
    fn test_html_to_text_empty_page() {
        assert!(html_to_text("<html><body></body></html>").is_none());
    }

    #[test]
    #[ignore] // requires network
    fn test_fetch_job_page() {
        let fetcher = PageFetcher::new().unwrap();
        let result = fetcher.fetch_job_page("https://example.com");
        assert!(result.is_ok());
    }
}
