//! Command handlers

pub mod auth;
pub mod config;
pub mod diary;
pub mod export;
pub mod settings;
pub mod status;

use anyhow::{bail, Result};
use uuid::Uuid;

use diary_core::{
    AuthError, Config, DiaryRecord, DiaryRepository, LocalStore, RepositoryError, SessionManager,
    SessionUser, SettingsStore, StorageError,
};

/// Repositories shared by every command, opened once per invocation
pub struct App {
    pub config: Config,
    pub store: LocalStore,
    pub diaries: DiaryRepository,
    pub session: SessionManager,
    pub settings: SettingsStore,
}

impl App {
    pub fn new(config: Config) -> Self {
        let store = LocalStore::new(config.clone());
        Self {
            diaries: DiaryRepository::new(store.clone()),
            session: SessionManager::new(store.clone()),
            settings: SettingsStore::new(store.clone()),
            store,
            config,
        }
    }

    /// Resolve an id (full UUID or prefix) to a stored diary
    pub fn find_diary(&self, id: &str) -> Result<DiaryRecord> {
        if let Ok(uuid) = Uuid::parse_str(id) {
            return match self.diaries.get_by_id(uuid)? {
                Some(diary) => Ok(diary),
                None => bail!("Diary not found: {}", id),
            };
        }

        let mut matches = self.diaries.find_by_prefix(id)?;
        match matches.len() {
            0 => bail!("No diary found matching: {}", id),
            1 => Ok(matches.remove(0)),
            _ => {
                eprintln!("Multiple diaries match '{}':", id);
                for diary in &matches {
                    eprintln!("  {} - {}", diary.id, diary.title);
                }
                bail!("Ambiguous ID. Please provide more characters.");
            }
        }
    }

    /// Resolve a diary the current user may read: their own, or any for a teacher
    pub fn visible_diary(&self, id: &str) -> Result<(SessionUser, DiaryRecord)> {
        let user = self.logged_in()?;
        let diary = self.find_diary(id)?;
        if !user.is_teacher() && diary.user_id != user.id {
            bail!("Diary {} belongs to another student", &diary.id.to_string()[..8]);
        }
        Ok((user, diary))
    }

    /// Resolve a diary written by the current student
    pub fn own_diary(&self, id: &str) -> Result<(SessionUser, DiaryRecord)> {
        let user = self.session.require_student()?;
        let diary = self.find_diary(id)?;
        if diary.user_id != user.id {
            bail!("Only the author can change diary {}", &diary.id.to_string()[..8]);
        }
        Ok((user, diary))
    }

    pub fn logged_in(&self) -> Result<SessionUser> {
        match self.session.current()? {
            Some(user) => Ok(user),
            None => bail!("Not logged in. Run `diary login <name>` first."),
        }
    }
}

/// Recovery advice for the first storage failure in an error chain
pub fn recovery_hint(error: &anyhow::Error) -> Option<&'static str> {
    error.chain().find_map(|cause| {
        let storage = cause.downcast_ref::<StorageError>().or_else(|| {
            match cause.downcast_ref::<RepositoryError>() {
                Some(RepositoryError::Storage(e)) => Some(e),
                _ => match cause.downcast_ref::<AuthError>() {
                    Some(AuthError::Storage(e)) => Some(e),
                    _ => None,
                },
            }
        });
        storage.and_then(StorageError::recovery_suggestion)
    })
}
