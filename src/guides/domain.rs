// Domain types - pure, no side effects
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

pub const GUIDE_EXTENSION: &str = ".html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Technology,
    Cooking,
    Diy,
    Education,
    Fitness,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Technology,
        Category::Cooking,
        Category::Diy,
        Category::Education,
        Category::Fitness,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::Cooking => "Cooking",
            Category::Diy => "DIY",
            Category::Education => "Education",
            Category::Fitness => "Fitness",
            Category::Other => "Other",
        }
    }

    /// Substring embedded in every rendered guide of this category.
    pub fn marker(&self) -> &'static str {
        match self {
            Category::Technology => r#"data-category="Technology""#,
            Category::Cooking => r#"data-category="Cooking""#,
            Category::Diy => r#"data-category="DIY""#,
            Category::Education => r#"data-category="Education""#,
            Category::Fitness => r#"data-category="Fitness""#,
            Category::Other => r#"data-category="Other""#,
        }
    }

    /// Recover the category of a rendered document by scanning for markers.
    /// Falls back to `Other`.
    pub fn sniff(document: &str) -> Category {
        Category::ALL
            .into_iter()
            .find(|c| document.contains(c.marker()))
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| AppError::Validation("Please choose a valid category.".into()))
    }
}

/// One row of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideSummary {
    pub filename: String,
    pub title: String,
    pub author: String,
    pub category: Category,
    /// Unix seconds, 0 when unknown
    pub created_time: i64,
    pub can_delete: bool,
}

impl GuideSummary {
    pub fn url(&self) -> String {
        format!("/guides/{}", self.filename)
    }

    pub fn created_display(&self) -> String {
        chrono::DateTime::from_timestamp(self.created_time, 0)
            .map(|dt| dt.format("%B %d, %Y").to_string())
            .unwrap_or_default()
    }
}

/// Replace everything but alphanumerics, space, `-` and `_` with `_`,
/// then spaces with `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn guide_filename(author: &str, title: &str) -> String {
    format!("{}_{}{}", author, sanitize_title(title), GUIDE_EXTENSION)
}

/// Author recorded in a legacy filename: everything before the first `_`.
pub fn author_from_filename(filename: &str) -> &str {
    filename.split('_').next().unwrap_or(filename)
}

/// Display title recovered from a filename: author prefix and extension
/// dropped, underscores to spaces, title-cased.
pub fn title_from_filename(filename: &str, author: &str) -> String {
    let stem = filename.strip_suffix(GUIDE_EXTENSION).unwrap_or(filename);
    let stem = stem
        .strip_prefix(author)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(stem);

    title_case(stem.replace('_', " ").trim())
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_alpha = false;
    for c in s.chars() {
        if prev_is_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_is_alpha = c.is_alphabetic();
    }
    out
}

/// Accepts only a bare `*.html` file name that cannot escape the guides
/// directory.
pub fn is_guide_filename(filename: &str) -> bool {
    filename.len() > GUIDE_EXTENSION.len()
        && filename.ends_with(GUIDE_EXTENSION)
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\', '\0'])
        && !filename.contains("..")
}

/// Ownership rule for guides without a metadata record.
pub fn has_owner_prefix(filename: &str, username: &str) -> bool {
    filename.starts_with(&format!("{}_", username))
}
