//! Data models for Classroom Diary
//!
//! Defines the records kept in the local store: diaries with their child
//! records (images, additions, teacher comments, AI feedback), the user
//! registry, the session identity, and the app settings.
//!
//! Field names serialize in camelCase so stored documents keep the same
//! shape as the exported JSON.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of images attached to a single diary
pub const MAX_IMAGES: usize = 3;

/// Maximum decoded size of one image
pub const MAX_IMAGE_BYTES: usize = 500 * 1024;

/// Role carried by a session identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Student => write!(f, "student"),
            UserRole::Teacher => write!(f, "teacher"),
        }
    }
}

/// Spreadsheet sync state of a diary (informational only)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// An image embedded in a diary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiaryImage {
    pub id: Uuid,
    /// Base64-encoded bytes
    pub data: String,
    /// Original filename
    pub name: String,
    /// MIME type, e.g. `image/png`
    #[serde(rename = "type")]
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

impl DiaryImage {
    /// Build an image from raw bytes
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: BASE64.encode(bytes),
            name: name.into(),
            mime_type: mime_type.into(),
            created_at: Utc::now(),
        }
    }

    /// Load an image file, inferring the MIME type from its extension
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let bytes = std::fs::read(path).map_err(|source| ValidationError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let image = Self::from_bytes(name, mime_type_for(path), &bytes);
        image.validate()?;
        Ok(image)
    }

    /// Size of the decoded image bytes
    pub fn decoded_len(&self) -> Result<usize, ValidationError> {
        BASE64
            .decode(&self.data)
            .map(|bytes| bytes.len())
            .map_err(|_| ValidationError::ImageEncoding {
                name: self.name.clone(),
            })
    }

    /// Check MIME type and size limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.mime_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage {
                name: self.name.clone(),
                mime_type: self.mime_type.clone(),
            });
        }

        let size = self.decoded_len()?;
        if size > MAX_IMAGE_BYTES {
            return Err(ValidationError::ImageTooLarge {
                name: self.name.clone(),
                size,
            });
        }
        Ok(())
    }
}

fn mime_type_for(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// The single encouragement/question pair attached to a diary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiFeedback {
    pub feedback: String,
    pub question: String,
    pub generated_at: DateTime<Utc>,
}

impl AiFeedback {
    pub fn new(feedback: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            feedback: feedback.into(),
            question: question.into(),
            generated_at: Utc::now(),
        }
    }
}

/// A follow-up note answering the AI question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Addition {
    pub id: Uuid,
    pub content: String,
    /// The question this addition answers
    pub question_context: String,
    pub created_at: DateTime<Utc>,
}

impl Addition {
    pub fn new(content: impl Into<String>, question_context: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            question_context: question_context.into(),
            created_at: Utc::now(),
        }
    }
}

/// Feedback left on a diary by a teacher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherComment {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl TeacherComment {
    pub fn new(teacher_id: Uuid, teacher_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            teacher_id,
            teacher_name: teacher_name.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One journal entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiaryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Author display name at the time of writing
    pub user_name: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub images: Vec<DiaryImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_feedback: Option<AiFeedback>,
    #[serde(default)]
    pub additions: Vec<Addition>,
    #[serde(default)]
    pub teacher_comments: Vec<TeacherComment>,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl DiaryRecord {
    /// Materialize a validated draft into a new record
    pub fn from_draft(draft: DiaryDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            user_name: draft.user_name,
            title: draft.title.trim().to_string(),
            content: draft.content.trim().to_string(),
            images: draft.images,
            created_at: now,
            updated_at: now,
            ai_feedback: None,
            additions: draft.additions,
            teacher_comments: Vec::new(),
            sync_status: SyncStatus::Pending,
        }
    }

    /// The question the author is currently expected to answer
    pub fn current_question(&self) -> Option<&str> {
        self.ai_feedback.as_ref().map(|f| f.question.as_str())
    }

    /// Apply a shallow patch and advance `updated_at`
    ///
    /// Text fields are trimmed the same way a draft is.
    pub fn apply(&mut self, patch: DiaryPatch) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            self.content = content.trim().to_string();
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(feedback) = patch.ai_feedback {
            self.ai_feedback = Some(feedback);
        }
        if let Some(status) = patch.sync_status {
            self.sync_status = status;
        }
        self.touch();
    }

    /// Advance `updated_at`, strictly past its previous value
    pub fn touch(&mut self) {
        self.updated_at = next_timestamp(self.updated_at);
    }
}

/// `now`, or the smallest representable step past `previous` if the clock
/// has not moved forward
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Input for creating a diary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryDraft {
    pub user_id: Uuid,
    pub user_name: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub images: Vec<DiaryImage>,
    #[serde(default)]
    pub additions: Vec<Addition>,
}

impl DiaryDraft {
    pub fn new(
        user_id: Uuid,
        user_name: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            title: title.into(),
            content: content.into(),
            images: Vec::new(),
            additions: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<DiaryImage>) -> Self {
        self.images = images;
        self
    }

    /// Reject drafts that must never reach storage
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyField("title"));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyField("content"));
        }
        validate_images(&self.images)
    }
}

/// Shallow update of a diary
///
/// Additions and teacher comments are not patchable; they only grow
/// through the repository's append operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<DiaryImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_feedback: Option<AiFeedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
}

impl DiaryPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn ai_feedback(feedback: AiFeedback) -> Self {
        Self {
            ai_feedback: Some(feedback),
            ..Self::default()
        }
    }

    pub fn sync_status(status: SyncStatus) -> Self {
        Self {
            sync_status: Some(status),
            ..Self::default()
        }
    }

    /// Check edited fields against the same rules as a draft
    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(self.title.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err(ValidationError::EmptyField("title"));
        }
        if matches!(self.content.as_deref(), Some(c) if c.trim().is_empty()) {
            return Err(ValidationError::EmptyField("content"));
        }
        match self.images {
            Some(ref images) => validate_images(images),
            None => Ok(()),
        }
    }
}

fn validate_images(images: &[DiaryImage]) -> Result<(), ValidationError> {
    if images.len() > MAX_IMAGES {
        return Err(ValidationError::TooManyImages(images.len()));
    }
    images.iter().try_for_each(DiaryImage::validate)
}

/// Durable name + password credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: Uuid,
    pub name: String,
    /// Argon2 PHC string, never the password itself
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The identity currently logged in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
}

impl SessionUser {
    pub fn student(user: &RegisteredUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            role: UserRole::Student,
        }
    }

    pub fn teacher(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role: UserRole::Teacher,
        }
    }

    pub fn is_teacher(&self) -> bool {
        self.role == UserRole::Teacher
    }
}

/// External-service settings; an absent field means the feature is off
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps_script_url: Option<String>,
}

impl AppSettings {
    /// Merge the fields present in `patch`; a blank value clears the field
    pub fn merge(&mut self, patch: AppSettings) {
        merge_field(&mut self.gemini_api_key, patch.gemini_api_key);
        merge_field(&mut self.spreadsheet_id, patch.spreadsheet_id);
        merge_field(&mut self.spreadsheet_url, patch.spreadsheet_url);
        merge_field(&mut self.apps_script_url, patch.apps_script_url);
    }

    pub fn has_gemini_key(&self) -> bool {
        self.gemini_api_key.is_some()
    }

    pub fn has_spreadsheet_id(&self) -> bool {
        self.spreadsheet_id.is_some()
    }

    pub fn has_apps_script_url(&self) -> bool {
        self.apps_script_url.is_some()
    }
}

fn merge_field(target: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        let v = v.trim();
        *target = if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        };
    }
}

/// Input rejected before any storage call
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("The {0} must not be empty")]
    EmptyField(&'static str),

    #[error("At most {} images can be attached (got {})", MAX_IMAGES, .0)]
    TooManyImages(usize),

    #[error("'{name}' is not an image ({mime_type})")]
    NotAnImage { name: String, mime_type: String },

    #[error("Image '{}' is {} bytes; the limit is {} bytes", .name, .size, MAX_IMAGE_BYTES)]
    ImageTooLarge { name: String, size: usize },

    #[error("Image '{name}' is not valid base64")]
    ImageEncoding { name: String },

    #[error("Failed to read image '{path}': {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DiaryDraft {
        DiaryDraft::new(Uuid::new_v4(), "Aoi", "遠足", "今日は山に登りました。")
    }

    #[test]
    fn test_from_draft_defaults() {
        let record = DiaryRecord::from_draft(draft());
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.images.is_empty());
        assert!(record.additions.is_empty());
        assert!(record.teacher_comments.is_empty());
        assert!(record.ai_feedback.is_none());
        assert_eq!(record.sync_status, SyncStatus::Pending);
    }

    #[test]
    fn test_from_draft_trims_text() {
        let mut d = draft();
        d.title = "  遠足  ".to_string();
        d.content = "\n楽しかった\n".to_string();
        let record = DiaryRecord::from_draft(d);
        assert_eq!(record.title, "遠足");
        assert_eq!(record.content, "楽しかった");
    }

    #[test]
    fn test_draft_validation_rejects_blank_fields() {
        let mut d = draft();
        d.title = "   ".to_string();
        assert!(matches!(d.validate(), Err(ValidationError::EmptyField("title"))));

        let mut d = draft();
        d.content = String::new();
        assert!(matches!(d.validate(), Err(ValidationError::EmptyField("content"))));
    }

    #[test]
    fn test_draft_validation_image_limits() {
        let png = DiaryImage::from_bytes("a.png", "image/png", &[0u8; 16]);
        let d = draft().with_images(vec![png.clone(); 4]);
        assert!(matches!(d.validate(), Err(ValidationError::TooManyImages(4))));

        let pdf = DiaryImage::from_bytes("a.pdf", "application/pdf", &[0u8; 16]);
        let d = draft().with_images(vec![pdf]);
        assert!(matches!(d.validate(), Err(ValidationError::NotAnImage { .. })));

        let big = DiaryImage::from_bytes("big.png", "image/png", &vec![0u8; MAX_IMAGE_BYTES + 1]);
        let d = draft().with_images(vec![big]);
        assert!(matches!(d.validate(), Err(ValidationError::ImageTooLarge { .. })));

        let d = draft().with_images(vec![png; 3]);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_image_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("flower.JPG");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let image = DiaryImage::from_path(&path).unwrap();
        assert_eq!(image.name, "flower.JPG");
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.decoded_len().unwrap(), 3);
    }

    #[test]
    fn test_image_from_path_rejects_non_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        assert!(matches!(
            DiaryImage::from_path(&path),
            Err(ValidationError::NotAnImage { .. })
        ));
    }

    #[test]
    fn test_apply_patch_is_shallow() {
        let mut record = DiaryRecord::from_draft(draft());
        let before = record.clone();
        std::thread::sleep(std::time::Duration::from_millis(5));

        record.apply(DiaryPatch::title("山登り"));
        assert_eq!(record.title, "山登り");
        assert_eq!(record.content, before.content);
        assert_eq!(record.created_at, before.created_at);
        assert!(record.updated_at > before.updated_at);
    }

    #[test]
    fn test_apply_patch_trims_text() {
        let mut record = DiaryRecord::from_draft(draft());
        record.apply(DiaryPatch {
            title: Some("  山登り  ".to_string()),
            content: Some("\n頂上に着いた\n".to_string()),
            ..DiaryPatch::default()
        });
        assert_eq!(record.title, "山登り");
        assert_eq!(record.content, "頂上に着いた");
    }

    #[test]
    fn test_touch_strictly_advances() {
        let mut record = DiaryRecord::from_draft(draft());
        // Pretend the clock is behind the stored timestamp
        record.updated_at = Utc::now() + Duration::hours(1);
        let before = record.updated_at;
        record.touch();
        assert!(record.updated_at > before);
    }

    #[test]
    fn test_patch_validation() {
        assert!(DiaryPatch::title("").validate().is_err());
        assert!(DiaryPatch::content("ok").validate().is_ok());
        assert!(DiaryPatch::default().validate().is_ok());
    }

    #[test]
    fn test_settings_merge() {
        let mut settings = AppSettings {
            gemini_api_key: Some("key-1".to_string()),
            spreadsheet_id: Some("sheet".to_string()),
            ..AppSettings::default()
        };

        settings.merge(AppSettings {
            gemini_api_key: Some(" key-2 ".to_string()),
            spreadsheet_id: Some("".to_string()),
            ..AppSettings::default()
        });

        assert_eq!(settings.gemini_api_key.as_deref(), Some("key-2"));
        assert!(!settings.has_spreadsheet_id());
        assert!(!settings.has_apps_script_url());
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = DiaryRecord::from_draft(draft());
        record.ai_feedback = Some(AiFeedback::new("すごいね！", "どんな気持ちだった？"));
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("userId").is_some());
        assert!(json.get("teacherComments").is_some());
        assert_eq!(json["syncStatus"], "pending");
        assert!(json["aiFeedback"].get("generatedAt").is_some());
    }

    #[test]
    fn test_image_serializes_type_field() {
        let image = DiaryImage::from_bytes("a.png", "image/png", b"x");
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["type"], "image/png");
    }

    #[test]
    fn test_current_question() {
        let mut record = DiaryRecord::from_draft(draft());
        assert!(record.current_question().is_none());
        record.ai_feedback = Some(AiFeedback::new("いいね", "なぜ？"));
        assert_eq!(record.current_question(), Some("なぜ？"));
    }
}
