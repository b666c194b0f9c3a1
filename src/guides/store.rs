use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::db::models::GuideRecord;
use crate::error::{AppError, AppResult};
use crate::guides::domain::{
    author_from_filename, guide_filename, has_owner_prefix, is_guide_filename,
    title_from_filename, Category, GuideSummary,
};
use crate::guides::render::{self, GuideContent};
use crate::state::DbPool;

/// Longest file name most filesystems accept.
const MAX_FILENAME_BYTES: usize = 255;

/// Input for [`GuideStore::create`].
#[derive(Debug, Clone)]
pub struct NewGuide<'a> {
    pub author: &'a str,
    pub title: &'a str,
    pub category: &'a str,
    pub body: &'a str,
    pub image_urls: &'a [String],
}

/// Guide documents on disk plus one metadata row per guide. Documents
/// without a row are treated as legacy files: author, category and
/// ownership are then recovered from the filename and the document.
#[derive(Clone)]
pub struct GuideStore {
    pool: DbPool,
    dir: PathBuf,
}

impl GuideStore {
    pub fn new(pool: DbPool, dir: PathBuf) -> Self {
        Self { pool, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render and store a guide, silently replacing any guide with the same
    /// filename. Returns the filename.
    pub fn create(&self, guide: &NewGuide<'_>) -> AppResult<String> {
        let title = guide.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required.".into()));
        }
        let category: Category = guide.category.parse()?;

        let filename = guide_filename(guide.author, title);
        if filename.len() > MAX_FILENAME_BYTES {
            return Err(AppError::Validation("Title is too long.".into()));
        }
        let created_at = Utc::now();

        let document = render::render(&GuideContent {
            title,
            author: guide.author,
            category,
            created_at,
            body: guide.body,
            image_urls: guide.image_urls,
            filename: &filename,
        })?;

        self.write_atomic(&filename, document.as_bytes())?;

        let record = GuideRecord {
            filename: filename.clone(),
            author: guide.author.to_string(),
            title: title.to_string(),
            category: category.as_str().to_string(),
            created_at: created_at.timestamp(),
        };
        self.upsert_record(&record)?;

        tracing::info!("Guide created: {} by {}", filename, guide.author);
        Ok(filename)
    }

    /// Every stored guide, newest first. Not filtered by viewer; `viewer`
    /// only decides `can_delete`.
    pub fn list(&self, viewer: Option<&str>) -> AppResult<Vec<GuideSummary>> {
        let records = self.all_records()?;

        let mut guides = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable guide entry: {}", e);
                    continue;
                }
            };
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_guide_filename(&filename) {
                continue;
            }

            let summary = match records.get(&filename) {
                Some(record) => summary_from_record(record, viewer),
                None => self.legacy_summary(&filename, &entry.path(), viewer),
            };
            guides.push(summary);
        }

        guides.sort_by(|a, b| {
            b.created_time
                .cmp(&a.created_time)
                .then_with(|| a.filename.cmp(&b.filename))
        });

        Ok(guides)
    }

    /// Raw document bytes.
    pub fn get(&self, filename: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(filename)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.path_for(filename)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Metadata row, if the guide has one.
    pub fn record(&self, filename: &str) -> AppResult<Option<GuideRecord>> {
        let conn = self.pool.get()?;
        let record = conn
            .query_row(
                "SELECT filename, author, title, category, created_at
                 FROM guides WHERE filename = ?1",
                params![filename],
                |row| {
                    Ok(GuideRecord {
                        filename: row.get(0)?,
                        author: row.get(1)?,
                        title: row.get(2)?,
                        category: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Remove a guide owned by `actor`.
    pub fn delete(&self, filename: &str, actor: &str) -> AppResult<()> {
        let path = self.path_for(filename)?;
        if !path.is_file() {
            return Err(AppError::NotFound);
        }

        let owns = match self.record(filename)? {
            Some(record) => record.author == actor,
            None => has_owner_prefix(filename, actor),
        };
        if !owns {
            tracing::warn!("{} tried to delete {} without owning it", actor, filename);
            return Err(AppError::Forbidden);
        }

        std::fs::remove_file(&path).map_err(|e| {
            tracing::error!("Failed to delete guide {}: {}", path.display(), e);
            AppError::Storage(e)
        })?;

        // The document is gone; a leftover row is only logged since listing
        // is driven by the files on disk and a later create overwrites it.
        if let Err(e) = self.remove_record(filename) {
            tracing::error!("Failed to remove metadata for {}: {}", filename, e);
        }

        tracing::info!("Guide deleted: {} by {}", filename, actor);
        Ok(())
    }

    fn remove_record(&self, filename: &str) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM guides WHERE filename = ?1", params![filename])?;
        Ok(())
    }

    fn path_for(&self, filename: &str) -> AppResult<PathBuf> {
        if is_guide_filename(filename) {
            Ok(self.dir.join(filename))
        } else {
            Err(AppError::NotFound)
        }
    }

    /// Write to a temp file in the same directory, then rename over the
    /// destination so readers never see a partial document.
    fn write_atomic(&self, filename: &str, contents: &[u8]) -> AppResult<()> {
        let final_path = self.path_for(filename)?;
        let temp_path = self
            .dir
            .join(format!(".{}.tmp", uuid::Uuid::now_v7()));

        let result = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(contents)?;
            file.sync_all()?;
            drop(file);
            std::fs::rename(&temp_path, &final_path)
        })();

        if let Err(e) = result {
            tracing::error!("Failed to write guide {}: {}", final_path.display(), e);
            let _ = std::fs::remove_file(&temp_path);
            return Err(AppError::Storage(e));
        }
        Ok(())
    }

    fn upsert_record(&self, record: &GuideRecord) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO guides (filename, author, title, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(filename) DO UPDATE SET
               author = excluded.author,
               title = excluded.title,
               category = excluded.category,
               created_at = excluded.created_at",
            params![
                record.filename,
                record.author,
                record.title,
                record.category,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn all_records(&self) -> AppResult<HashMap<String, GuideRecord>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT filename, author, title, category, created_at FROM guides")?;

        let records = stmt
            .query_map([], |row| {
                Ok(GuideRecord {
                    filename: row.get(0)?,
                    author: row.get(1)?,
                    title: row.get(2)?,
                    category: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .filter_map(|r| r.ok())
            .map(|record| (record.filename.clone(), record))
            .collect();

        Ok(records)
    }

    fn legacy_summary(&self, filename: &str, path: &Path, viewer: Option<&str>) -> GuideSummary {
        let author = author_from_filename(filename).to_string();

        let category = match std::fs::read_to_string(path) {
            Ok(document) => Category::sniff(&document),
            Err(e) => {
                tracing::warn!("Could not read {} for category: {}", path.display(), e);
                Category::Other
            }
        };

        let created_time = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        GuideSummary {
            filename: filename.to_string(),
            title: title_from_filename(filename, &author),
            can_delete: viewer.is_some_and(|v| has_owner_prefix(filename, v)),
            author,
            category,
            created_time,
        }
    }
}

fn summary_from_record(record: &GuideRecord, viewer: Option<&str>) -> GuideSummary {
    GuideSummary {
        filename: record.filename.clone(),
        title: title_from_filename(&record.filename, &record.author),
        author: record.author.clone(),
        category: record.category.parse().unwrap_or(Category::Other),
        created_time: record.created_at,
        can_delete: viewer == Some(record.author.as_str()),
    }
}
