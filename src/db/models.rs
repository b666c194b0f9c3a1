/// Structured record stored alongside each guide document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideRecord {
    pub filename: String,
    pub author: String,
    pub title: String,
    pub category: String,
    /// Unix seconds
    pub created_at: i64,
}
