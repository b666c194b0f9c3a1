use askama::Template;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::guides::domain::Category;
use crate::reactions::EMOJIS;

/// Standalone guide document. Every interpolated field goes through askama's
/// HTML escaper.
#[derive(Template)]
#[template(path = "guide/document.html")]
struct GuideDocument<'a> {
    title: &'a str,
    author: &'a str,
    category: &'a str,
    created_display: String,
    body_lines: Vec<&'a str>,
    image_urls: Vec<&'a str>,
    filename: &'a str,
    emojis: Vec<&'static str>,
}

/// Everything the renderer needs to produce one guide document.
pub struct GuideContent<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub body: &'a str,
    pub image_urls: &'a [String],
    /// Reaction key used by the embedded widget
    pub filename: &'a str,
}

pub fn render(content: &GuideContent<'_>) -> AppResult<String> {
    let document = GuideDocument {
        title: content.title,
        author: content.author,
        category: content.category.as_str(),
        created_display: content.created_at.format("%B %d, %Y").to_string(),
        body_lines: body_lines(content.body),
        image_urls: content.image_urls.iter().map(String::as_str).collect(),
        filename: content.filename,
        emojis: EMOJIS.to_vec(),
    };

    Ok(document.render()?)
}

/// Split on `\n`, `\r\n` and lone `\r` so every line break becomes a `<br>`.
fn body_lines(body: &str) -> Vec<&str> {
    body.split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
        .collect()
}
