use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
pub const UPLOADS_URL_PREFIX: &str = "/static/uploads";

/// Uploaded guide images. Images are not tracked per guide and are left in
/// place when a guide is deleted.
#[derive(Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save one upload and return its URL. `None` means the upload was
    /// skipped: unsupported extension, or the write failed (logged).
    pub fn save(&self, actor: &str, original_name: &str, bytes: &[u8]) -> Option<String> {
        let name = stored_name(actor, original_name)?;
        let path = self.dir.join(&name);

        if let Err(e) = std::fs::write(&path, bytes) {
            tracing::error!("Failed to save image {}: {}", path.display(), e);
            return None;
        }

        tracing::info!("Saved image {} for {}", name, actor);
        Some(format!("{}/{}", UPLOADS_URL_PREFIX, name))
    }
}

/// Original extension (with its dot), if it is on the allow-list. The
/// extension is what follows the last dot of the final path component, so
/// `x.png/` and `.png` have none.
pub fn allowed_extension(original_name: &str) -> Option<&str> {
    let (stem, ext) = original_name.rsplit_once('.')?;
    if ext.contains(['/', '\\']) {
        return None;
    }
    let base = stem.rsplit(['/', '\\']).next().unwrap_or(stem);
    if base.trim_start_matches('.').is_empty() {
        return None;
    }

    let allowed = ALLOWED_EXTENSIONS
        .iter()
        .any(|a| a.eq_ignore_ascii_case(ext));
    // Keep the dot from the original name so `.PNG` stays `.PNG`
    allowed.then(|| &original_name[stem.len()..])
}

/// `<actor>_<hash><ext>`, hash being a non-cryptographic hash of the
/// original file name. Different uploads with one name collide.
pub fn stored_name(actor: &str, original_name: &str) -> Option<String> {
    if original_name.is_empty() {
        return None;
    }
    let ext = allowed_extension(original_name)?;

    let mut hasher = DefaultHasher::new();
    original_name.hash(&mut hasher);
    Some(format!("{}_{}{}", actor, hasher.finish(), ext))
}
