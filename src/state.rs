use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::credentials::CredentialStore;
use crate::config::Config;
use crate::guides::images::ImageStore;
use crate::guides::store::GuideStore;
use crate::reactions::ReactionStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub credentials: CredentialStore,
    pub guides: GuideStore,
    pub images: ImageStore,
    pub reactions: ReactionStore,
}

impl AppState {
    /// Wire every store to the pool and the configured directories.
    /// The directories must already exist.
    pub fn new(db: DbPool, config: Config) -> Self {
        let credentials = CredentialStore::new(db.clone(), config.auth.bcrypt_cost);
        let guides = GuideStore::new(db.clone(), config.guides_path());
        let images = ImageStore::new(config.uploads_path());
        let reactions = ReactionStore::new(db.clone(), guides.clone());

        Self {
            db,
            config,
            credentials,
            guides,
            images,
            reactions,
        }
    }
}
