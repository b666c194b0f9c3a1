use rusqlite::{params, OptionalExtension};

use crate::error::{AppError, AppResult};
use crate::state::DbPool;

pub const MIN_PASSWORD_LEN: usize = 6;

/// User accounts. Passwords are kept as bcrypt hashes.
#[derive(Clone)]
pub struct CredentialStore {
    pool: DbPool,
    cost: u32,
}

impl CredentialStore {
    pub fn new(pool: DbPool, cost: u32) -> Self {
        Self { pool, cost }
    }

    /// Validate and create a new account.
    pub fn register(&self, username: &str, password: &str, confirm: &str) -> AppResult<()> {
        validate_registration(username, password, confirm)?;

        if self.exists(username)? {
            return Err(already_exists());
        }

        let hash = bcrypt::hash(password, self.cost)?;
        let conn = self.pool.get()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, hash],
        )?;

        // Lost a race with a concurrent registration of the same name
        if inserted == 0 {
            return Err(already_exists());
        }

        tracing::info!("Registered user: {}", username);
        Ok(())
    }

    /// Insert a legacy account. Only the username pattern is enforced, since
    /// old passwords predate the length rule. Returns false if the name exists.
    pub fn import(&self, username: &str, password: &str) -> AppResult<bool> {
        if !is_valid_username(username) {
            return Err(AppError::Validation(
                "Username can only contain letters, numbers, and underscore.".into(),
            ));
        }

        let hash = bcrypt::hash(password, self.cost)?;
        let conn = self.pool.get()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, hash],
        )?;
        Ok(inserted > 0)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let hash: Option<String> = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match hash {
            Some(hash) => bcrypt::verify(password, &hash).unwrap_or(false),
            None => false,
        })
    }

    pub fn exists(&self, username: &str) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn count(&self) -> AppResult<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn already_exists() -> AppError {
    AppError::Validation("Username already exists.".into())
}

/// Input checks, in the order their messages are reported.
pub fn validate_registration(username: &str, password: &str, confirm: &str) -> AppResult<()> {
    if password != confirm {
        return Err(AppError::Validation("Passwords do not match.".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters.".into(),
        ));
    }
    if !is_valid_username(username) {
        return Err(AppError::Validation(
            "Username can only contain letters, numbers, and underscore.".into(),
        ));
    }
    Ok(())
}

/// `^[A-Za-z0-9_]+$`
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_store() -> (tempfile::TempDir, CredentialStore) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (tmp, CredentialStore::new(pool, 4))
    }

    fn validation_message(err: AppError) -> String {
        match err {
            AppError::Validation(msg) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn register_then_authenticate() {
        let (_tmp, store) = test_store();
        store.register("alice", "secret1", "secret1").unwrap();

        assert!(store.authenticate("alice", "secret1").unwrap());
        assert!(!store.authenticate("alice", "wrong!!").unwrap());
        assert!(!store.authenticate("bob", "secret1").unwrap());
    }

    #[test]
    fn password_is_not_stored_in_plaintext() {
        let (_tmp, store) = test_store();
        store.register("alice", "secret1", "secret1").unwrap();

        let conn = store.pool.get().unwrap();
        let stored: String = conn
            .query_row(
                "SELECT password_hash FROM users WHERE username = 'alice'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(stored, "secret1");
        assert!(stored.starts_with("$2"));
    }

    #[test]
    fn duplicate_username_is_rejected_and_writes_one_record() {
        let (_tmp, store) = test_store();
        store.register("alice", "secret1", "secret1").unwrap();

        let err = store.register("alice", "other12", "other12").unwrap_err();
        assert_eq!(validation_message(err), "Username already exists.");
        assert_eq!(store.count().unwrap(), 1);

        // The original password still works
        assert!(store.authenticate("alice", "secret1").unwrap());
    }

    #[test]
    fn mismatched_confirmation_writes_nothing() {
        let (_tmp, store) = test_store();
        let err = store.register("alice", "secret1", "secret2").unwrap_err();
        assert_eq!(validation_message(err), "Passwords do not match.");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn short_password_is_rejected() {
        let (_tmp, store) = test_store();
        let err = store.register("alice", "abc", "abc").unwrap_err();
        assert_eq!(
            validation_message(err),
            "Password must be at least 6 characters."
        );
    }

    #[test]
    fn username_pattern_is_enforced() {
        let (_tmp, store) = test_store();
        for bad in ["", "bob smith", "bob:x", "bob-2", "ünï"] {
            let err = store.register(bad, "secret1", "secret1").unwrap_err();
            assert_eq!(
                validation_message(err),
                "Username can only contain letters, numbers, and underscore."
            );
        }
        store.register("Bob_2", "secret1", "secret1").unwrap();
    }

    #[test]
    fn mismatch_is_reported_before_length() {
        let err = validate_registration("alice", "abc", "abd").unwrap_err();
        assert_eq!(validation_message(err), "Passwords do not match.");
    }

    #[test]
    fn concurrent_registrations_of_one_name_yield_one_record() {
        let (_tmp, store) = test_store();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.register("racer", "secret1", "secret1"))
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();

        assert_eq!(successes, 1);
        assert_eq!(store.count().unwrap(), 1);
    }
}
