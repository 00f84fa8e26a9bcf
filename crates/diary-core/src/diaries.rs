//! Diary repository
//!
//! CRUD over the diary collection. Records are stored newest-first (new
//! diaries are inserted at the head). Additions and teacher comments are
//! append-only: there is no operation that edits or removes a single entry.
//!
//! Every mutation is one read-modify-write of the diaries key, so an append
//! never rewrites a stale copy of the record it read earlier. Not-found ids
//! are not errors: `update` and the appends return `Ok(None)`, `delete`
//! returns `Ok(false)`, and nothing is written.
//!
//! ## Usage
//!
//! ```ignore
//! let repo = DiaryRepository::new(LocalStore::new(config));
//! let diary = repo.create(DiaryDraft::new(user.id, &user.name, "遠足", "楽しかった"))?;
//! repo.append_addition(diary.id, NewAddition::new("また行きたい", "どうだった？"))?;
//! ```

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Addition, AiFeedback, DiaryDraft, DiaryPatch, DiaryRecord, SyncStatus, TeacherComment,
    ValidationError,
};
use crate::storage::{LocalStore, StorageError, StorageResult, StoreKey};

/// Errors from diary mutations
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Input for an author's follow-up note
#[derive(Debug, Clone)]
pub struct NewAddition {
    pub content: String,
    pub question_context: String,
}

impl NewAddition {
    pub fn new(content: impl Into<String>, question_context: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            question_context: question_context.into(),
        }
    }
}

/// Input for a teacher's comment
#[derive(Debug, Clone)]
pub struct NewTeacherComment {
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub content: String,
}

impl NewTeacherComment {
    pub fn new(teacher_id: Uuid, teacher_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            teacher_id,
            teacher_name: teacher_name.into(),
            content: content.into(),
        }
    }
}

/// Repository over the stored diary collection
#[derive(Debug, Clone)]
pub struct DiaryRepository {
    store: LocalStore,
}

impl DiaryRepository {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// All diaries in stored order (newest first)
    pub fn list_all(&self) -> StorageResult<Vec<DiaryRecord>> {
        self.store.get(StoreKey::Diaries)
    }

    /// Diaries written by one user, in stored order
    pub fn list_by_user(&self, user_id: Uuid) -> StorageResult<Vec<DiaryRecord>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|d| d.user_id == user_id)
            .collect())
    }

    pub fn get_by_id(&self, id: Uuid) -> StorageResult<Option<DiaryRecord>> {
        Ok(self.list_all()?.into_iter().find(|d| d.id == id))
    }

    /// Diaries whose id starts with `prefix`
    pub fn find_by_prefix(&self, prefix: &str) -> StorageResult<Vec<DiaryRecord>> {
        let prefix = prefix.to_lowercase();
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|d| d.id.to_string().starts_with(&prefix))
            .collect())
    }

    pub fn count(&self) -> StorageResult<usize> {
        Ok(self.list_all()?.len())
    }

    /// Validate and store a new diary at the head of the collection
    pub fn create(&self, draft: DiaryDraft) -> RepositoryResult<DiaryRecord> {
        draft.validate()?;
        let record = DiaryRecord::from_draft(draft);

        self.store
            .modify(StoreKey::Diaries, |diaries: &mut Vec<DiaryRecord>| {
                diaries.insert(0, record.clone());
                Some(())
            })?;

        info!(id = %record.id, user = %record.user_name, "created diary");
        Ok(record)
    }

    /// Shallow-merge `patch` into a stored diary
    pub fn update(&self, id: Uuid, patch: DiaryPatch) -> RepositoryResult<Option<DiaryRecord>> {
        patch.validate()?;
        let updated = self.modify_record(id, |record| record.apply(patch))?;
        if updated.is_none() {
            debug!(%id, "update skipped: diary not found");
        }
        Ok(updated)
    }

    /// Remove a diary; returns whether one was removed
    pub fn delete(&self, id: Uuid) -> StorageResult<bool> {
        let removed = self
            .store
            .modify(StoreKey::Diaries, |diaries: &mut Vec<DiaryRecord>| {
                let before = diaries.len();
                diaries.retain(|d| d.id != id);
                (diaries.len() != before).then_some(())
            })?
            .is_some();

        if removed {
            info!(%id, "deleted diary");
        }
        Ok(removed)
    }

    /// Append a follow-up note to a diary
    pub fn append_addition(
        &self,
        id: Uuid,
        addition: NewAddition,
    ) -> RepositoryResult<Option<DiaryRecord>> {
        let content = addition.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyField("addition").into());
        }

        let entry = Addition::new(content, addition.question_context);
        Ok(self.modify_record(id, |record| {
            record.additions.push(entry);
            record.touch();
        })?)
    }

    /// Append a teacher comment to a diary
    pub fn append_teacher_comment(
        &self,
        id: Uuid,
        comment: NewTeacherComment,
    ) -> RepositoryResult<Option<DiaryRecord>> {
        let content = comment.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyField("comment").into());
        }

        let entry = TeacherComment::new(comment.teacher_id, comment.teacher_name, content);
        Ok(self.modify_record(id, |record| {
            record.teacher_comments.push(entry);
            record.touch();
        })?)
    }

    /// Store a generated feedback pair, replacing any previous one
    pub fn attach_feedback(
        &self,
        id: Uuid,
        feedback: impl Into<String>,
        question: impl Into<String>,
    ) -> RepositoryResult<Option<DiaryRecord>> {
        self.update(id, DiaryPatch::ai_feedback(AiFeedback::new(feedback, question)))
    }

    pub fn set_sync_status(
        &self,
        id: Uuid,
        status: SyncStatus,
    ) -> RepositoryResult<Option<DiaryRecord>> {
        self.update(id, DiaryPatch::sync_status(status))
    }

    fn modify_record<F>(&self, id: Uuid, f: F) -> StorageResult<Option<DiaryRecord>>
    where
        F: FnOnce(&mut DiaryRecord),
    {
        self.store
            .modify(StoreKey::Diaries, |diaries: &mut Vec<DiaryRecord>| {
                let record = diaries.iter_mut().find(|d| d.id == id)?;
                f(record);
                Some(record.clone())
            })
    }
}

/// Group diaries by author name, in order of first appearance
pub fn group_by_student(diaries: &[DiaryRecord]) -> Vec<(String, Vec<DiaryRecord>)> {
    let mut groups: Vec<(String, Vec<DiaryRecord>)> = Vec::new();
    for diary in diaries {
        match groups.iter_mut().find(|(name, _)| *name == diary.user_name) {
            Some((_, list)) => list.push(diary.clone()),
            None => groups.push((diary.user_name.clone(), vec![diary.clone()])),
        }
    }
    groups
}
