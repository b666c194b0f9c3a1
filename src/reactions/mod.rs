use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::guides::store::GuideStore;
use crate::state::DbPool;

/// The reaction buttons offered on every guide.
pub const EMOJIS: [&str; 4] = ["👍", "❤️", "😂", "😮"];

/// Emoji -> number of users who picked it. Always holds the four known
/// emojis; stored values outside that set get their own entries.
pub type Counts = BTreeMap<String, i64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionSummary {
    pub counts: Counts,
    #[serde(rename = "userReaction")]
    pub user_reaction: Option<String>,
}

/// One emoji per (guide, user). Reactions are keyed by guide filename and
/// never updated or removed.
#[derive(Clone)]
pub struct ReactionStore {
    pool: DbPool,
    guides: GuideStore,
}

impl ReactionStore {
    pub fn new(pool: DbPool, guides: GuideStore) -> Self {
        Self { pool, guides }
    }

    pub fn get_reactions(&self, filename: &str, viewer: Option<&str>) -> AppResult<ReactionSummary> {
        let conn = self.pool.get()?;
        let counts = counts_for(&conn, filename)?;

        let user_reaction = match viewer {
            Some(username) => conn
                .query_row(
                    "SELECT emoji FROM reactions WHERE guide = ?1 AND username = ?2",
                    params![filename, username],
                    |row| row.get(0),
                )
                .optional()?,
            None => None,
        };

        Ok(ReactionSummary {
            counts,
            user_reaction,
        })
    }

    /// Record `actor`'s reaction and return the updated counts. The emoji
    /// is stored as given, even when it is not one of [`EMOJIS`].
    pub fn add_reaction(&self, filename: &str, emoji: &str, actor: Option<&str>) -> AppResult<Counts> {
        let actor = actor.ok_or(AppError::Unauthorized)?;
        if !self.guides.exists(filename) {
            return Err(AppError::NotFound);
        }

        let mut conn = self.pool.get()?;
        // Immediate: take the write lock before the existence check so two
        // requests cannot both pass it.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let already: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM reactions WHERE guide = ?1 AND username = ?2",
            params![filename, actor],
            |row| row.get(0),
        )?;
        if already {
            return Err(AppError::AlreadyReacted);
        }

        tx.execute(
            "INSERT INTO reactions (guide, username, emoji) VALUES (?1, ?2, ?3)",
            params![filename, actor, emoji],
        )?;
        let counts = counts_for(&tx, filename)?;
        tx.commit()?;

        tracing::info!("{} reacted {} to {}", actor, emoji, filename);
        Ok(counts)
    }

    /// Insert a reaction unless the pair already has one. Used by the legacy
    /// importer, which does not require the guide file to exist.
    pub fn import(&self, filename: &str, username: &str, emoji: &str) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO reactions (guide, username, emoji) VALUES (?1, ?2, ?3)",
            params![filename, username, emoji],
        )?;
        Ok(inserted > 0)
    }
}

fn counts_for(conn: &rusqlite::Connection, filename: &str) -> AppResult<Counts> {
    let mut counts: Counts = EMOJIS.iter().map(|e| (e.to_string(), 0)).collect();

    let mut stmt =
        conn.prepare("SELECT emoji, COUNT(*) FROM reactions WHERE guide = ?1 GROUP BY emoji")?;
    let rows = stmt.query_map(params![filename], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (emoji, n) = row?;
        *counts.entry(emoji).or_insert(0) += n;
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::guides::store::NewGuide;

    struct Fixture {
        _tmp: tempfile::TempDir,
        guides: GuideStore,
        reactions: ReactionStore,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        let dir = tmp.path().join("guides");
        std::fs::create_dir_all(&dir).unwrap();
        let guides = GuideStore::new(pool.clone(), dir);
        let reactions = ReactionStore::new(pool, guides.clone());
        Fixture {
            _tmp: tmp,
            guides,
            reactions,
        }
    }

    fn publish(guides: &GuideStore, author: &str, title: &str) -> String {
        guides
            .create(&NewGuide {
                author,
                title,
                category: "Other",
                body: "",
                image_urls: &[],
            })
            .unwrap()
    }

    #[test]
    fn empty_guide_has_all_zero_counts() {
        let f = fixture();
        let summary = f.reactions.get_reactions("alice_T.html", Some("bob")).unwrap();
        assert_eq!(summary.counts.len(), 4);
        assert!(summary.counts.values().all(|&n| n == 0));
        assert!(summary.user_reaction.is_none());
    }

    #[test]
    fn second_reaction_is_rejected_and_counts_unchanged() {
        let f = fixture();
        let guide = publish(&f.guides, "alice", "My Deck!!");

        let counts = f.reactions.add_reaction(&guide, "👍", Some("bob")).unwrap();
        assert_eq!(counts["👍"], 1);

        let err = f
            .reactions
            .add_reaction(&guide, "😂", Some("bob"))
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyReacted));

        let summary = f.reactions.get_reactions(&guide, Some("bob")).unwrap();
        assert_eq!(summary.counts["👍"], 1);
        assert_eq!(summary.counts["😂"], 0);
        assert_eq!(summary.user_reaction.as_deref(), Some("👍"));
    }

    #[test]
    fn counts_aggregate_across_users() {
        let f = fixture();
        let guide = publish(&f.guides, "alice", "T");
        f.reactions.add_reaction(&guide, "❤️", Some("bob")).unwrap();
        f.reactions.add_reaction(&guide, "❤️", Some("carol")).unwrap();
        let counts = f.reactions.add_reaction(&guide, "😮", Some("alice")).unwrap();

        assert_eq!(counts["❤️"], 2);
        assert_eq!(counts["😮"], 1);
        assert_eq!(counts["👍"], 0);

        let anonymous = f.reactions.get_reactions(&guide, None).unwrap();
        assert!(anonymous.user_reaction.is_none());
        assert_eq!(anonymous.counts, counts);
    }

    #[test]
    fn unauthenticated_and_missing_guide_are_rejected() {
        let f = fixture();
        let guide = publish(&f.guides, "alice", "T");

        assert!(matches!(
            f.reactions.add_reaction(&guide, "👍", None),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            f.reactions.add_reaction("alice_Nope.html", "👍", Some("bob")),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn arbitrary_emoji_strings_are_stored() {
        let f = fixture();
        let guide = publish(&f.guides, "alice", "T");
        let counts = f
            .reactions
            .add_reaction(&guide, "banana", Some("bob"))
            .unwrap();
        assert_eq!(counts["banana"], 1);
        assert_eq!(counts.len(), 5);
    }

    #[test]
    fn reactions_are_per_guide() {
        let f = fixture();
        let one = publish(&f.guides, "alice", "One");
        let two = publish(&f.guides, "alice", "Two");
        f.reactions.add_reaction(&one, "👍", Some("bob")).unwrap();
        f.reactions.add_reaction(&two, "😂", Some("bob")).unwrap();

        assert_eq!(f.reactions.get_reactions(&one, None).unwrap().counts["😂"], 0);
        assert_eq!(f.reactions.get_reactions(&two, None).unwrap().counts["😂"], 1);
    }

    #[test]
    fn concurrent_reactions_are_not_lost() {
        let f = fixture();
        let one = publish(&f.guides, "alice", "One");
        let two = publish(&f.guides, "alice", "Two");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = f.reactions.clone();
                let guide = if i % 2 == 0 { one.clone() } else { two.clone() };
                std::thread::spawn(move || {
                    store
                        .add_reaction(&guide, "👍", Some(&format!("user{}", i)))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(f.reactions.get_reactions(&one, None).unwrap().counts["👍"], 4);
        assert_eq!(f.reactions.get_reactions(&two, None).unwrap().counts["👍"], 4);
    }

    #[test]
    fn import_skips_existing_pairs() {
        let f = fixture();
        assert!(f.reactions.import("old_T.html", "bob", "👍").unwrap());
        assert!(!f.reactions.import("old_T.html", "bob", "😂").unwrap());
        let summary = f.reactions.get_reactions("old_T.html", Some("bob")).unwrap();
        assert_eq!(summary.user_reaction.as_deref(), Some("👍"));
    }

    #[test]
    fn summary_serializes_with_user_reaction_key() {
        let summary = ReactionSummary {
            counts: Counts::new(),
            user_reaction: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("userReaction").unwrap().is_null());
        assert!(json.get("counts").unwrap().is_object());
    }
}
