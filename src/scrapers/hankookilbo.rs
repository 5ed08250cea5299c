//! Hankook Ilbo article scraper.
//!
//! Article bodies on hankookilbo.com live in `<p class="editor-p">` elements.
//! The paragraph texts are stripped and joined with single spaces, matching
//! the shape expected by the classification prompts.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::models::Dataset;

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("clova_news_labeler/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Sentinel content for pages that fetched fine but held no article body.
pub const CONTENT_NOT_FOUND: &str = "Content not found";

/// Extract the article body from page HTML.
///
/// Returns the joined paragraph text and its character count, or the
/// [`CONTENT_NOT_FOUND`] sentinel with length 0 when no matching paragraphs
/// exist.
pub fn extract_content(html: &str) -> (String, usize) {
    let document = Html::parse_document(html);
    let paragraph = Selector::parse("p.editor-p").unwrap();

    let paragraphs: Vec<String> = document
        .select(&paragraph)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if paragraphs.is_empty() {
        return (CONTENT_NOT_FOUND.to_string(), 0);
    }

    let content = paragraphs.join(" ");
    let len = content.chars().count();
    (content, len)
}

/// Fetch one article and return its body text and character count.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_article_content(url: &str) -> Result<(String, usize), Box<dyn Error>> {
    let url = Url::parse(url)?;
    let response = HTTP.get(url).send().await?.error_for_status()?;
    let html = response.text().await?;

    let (content, len) = extract_content(&html);
    info!(chars = len, "Parsed article");
    Ok((content, len))
}

/// Fill missing `content` / `len_content` for every row, sequentially.
///
/// A failed fetch is recorded in the row's content as an error string with
/// length 0, so the batch pass can surface it per row instead of aborting the
/// pipeline.
#[instrument(level = "info", skip_all)]
pub async fn fill_contents(dataset: &mut Dataset) {
    let mut fetched = 0usize;
    let mut failed = 0usize;

    for row in &mut dataset.rows {
        if !row.content.is_empty() && row.len_content > 0 {
            debug!(docid = row.docid, "Content already present");
            continue;
        }

        match fetch_article_content(&row.link).await {
            Ok((content, len)) => {
                debug!(docid = row.docid, chars = len, "Fetched article content");
                row.content = content;
                row.len_content = len;
                fetched += 1;
            }
            Err(e) => {
                warn!(docid = row.docid, link = %row.link, error = %e, "Fetch failed");
                row.content = format!("Error fetching content: {e}");
                row.len_content = 0;
                failed += 1;
            }
        }
    }

    info!(fetched, failed, "Content fetch pass complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content_joins_paragraphs() {
        let html = r#"
            <html><body>
            <p class="editor-p">  첫 번째 문단입니다. </p>
            <p class="other">무시되는 문단</p>
            <p class="editor-p">두 번째 문단.</p>
            </body></html>
        "#;
        let (content, len) = extract_content(html);
        assert_eq!(content, "첫 번째 문단입니다. 두 번째 문단.");
        assert_eq!(len, content.chars().count());
    }

    #[test]
    fn test_extract_content_no_paragraphs() {
        let html = "<html><body><div>본문 없음</div></body></html>";
        let (content, len) = extract_content(html);
        assert_eq!(content, CONTENT_NOT_FOUND);
        assert_eq!(len, 0);
    }

    #[test]
    fn test_extract_content_nested_markup() {
        let html = r#"<p class="editor-p">앞 <b>강조</b> 뒤</p>"#;
        let (content, _) = extract_content(html);
        assert_eq!(content, "앞 강조 뒤");
    }

    #[test]
    fn test_extract_content_skips_empty_paragraphs() {
        let html = r#"<p class="editor-p">   </p><p class="editor-p">본문</p>"#;
        let (content, len) = extract_content(html);
        assert_eq!(content, "본문");
        assert_eq!(len, 2);
    }
}
