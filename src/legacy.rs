use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::auth::CredentialStore;
use crate::error::{AppError, AppResult};
use crate::reactions::ReactionStore;

/// guide filename -> username -> emoji
pub type LegacyReactions = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub users_imported: usize,
    pub users_skipped: usize,
    pub reactions_imported: usize,
    pub reactions_skipped: usize,
}

/// `username:password` per line. Lines without a colon are ignored; the
/// password is everything after the first colon. A repeated username keeps
/// its last password, the one the old site accepted.
pub fn parse_credentials(content: &str) -> Vec<(String, String)> {
    let mut records: Vec<(String, String)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (user, pass) in content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_once(':'))
    {
        match index.get(user) {
            Some(&i) => records[i].1 = pass.to_string(),
            None => {
                index.insert(user.to_string(), records.len());
                records.push((user.to_string(), pass.to_string()));
            }
        }
    }
    records
}

/// A corrupt reaction file reads as empty.
pub fn parse_reactions(content: &str) -> LegacyReactions {
    match serde_json::from_str(content) {
        Ok(reactions) => reactions,
        Err(e) => {
            tracing::warn!("Ignoring unreadable reaction file: {}", e);
            LegacyReactions::new()
        }
    }
}

pub fn import_users(
    credentials: &CredentialStore,
    records: &[(String, String)],
    report: &mut ImportReport,
) -> AppResult<()> {
    for (username, password) in records {
        match credentials.import(username, password) {
            Ok(true) => report.users_imported += 1,
            Ok(false) => {
                tracing::debug!("User {} already exists, skipping", username);
                report.users_skipped += 1;
            }
            Err(AppError::Validation(msg)) => {
                tracing::warn!("Skipping user {:?}: {}", username, msg);
                report.users_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub fn import_reactions(
    reactions: &ReactionStore,
    legacy: &LegacyReactions,
    report: &mut ImportReport,
) -> AppResult<()> {
    for (guide, by_user) in legacy {
        for (username, emoji) in by_user {
            if reactions.import(guide, username, emoji)? {
                report.reactions_imported += 1;
            } else {
                report.reactions_skipped += 1;
            }
        }
    }
    Ok(())
}

/// Load whichever legacy files were given. A missing file is logged and skipped.
pub fn run(
    credentials: &CredentialStore,
    reactions: &ReactionStore,
    users_file: Option<&Path>,
    reactions_file: Option<&Path>,
) -> AppResult<ImportReport> {
    let mut report = ImportReport::default();

    if let Some(path) = users_file {
        match std::fs::read_to_string(path) {
            Ok(content) => import_users(credentials, &parse_credentials(&content), &mut report)?,
            Err(e) => tracing::warn!("Cannot read {}: {}", path.display(), e),
        }
    }

    if let Some(path) = reactions_file {
        match std::fs::read_to_string(path) {
            Ok(content) => import_reactions(reactions, &parse_reactions(&content), &mut report)?,
            Err(e) => tracing::warn!("Cannot read {}: {}", path.display(), e),
        }
    }

    tracing::info!(
        "Import finished: {} users added ({} skipped), {} reactions added ({} skipped)",
        report.users_imported,
        report.users_skipped,
        report.reactions_imported,
        report.reactions_skipped
    );
    tracing::info!("{} users on record", credentials.count()?);
    Ok(report)
}
