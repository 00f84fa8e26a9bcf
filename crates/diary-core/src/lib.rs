//! Classroom Diary core library
//!
//! Local-first data layer for a classroom journaling app: students write
//! diaries, receive AI encouragement with a follow-up question, answer it
//! with additions, and teachers leave comments.
//!
//! # Architecture
//!
//! - **Local store**: one JSON document per fixed key in the data directory
//! - **Repositories**: diaries, settings, and sessions over the local store
//! - **Gateways**: Gemini feedback and Apps Script spreadsheet sync over HTTP
//!
//! # Quick Start
//!
//! ```text
//! let store = LocalStore::new(Config::load()?);
//! let session = SessionManager::new(store.clone());
//! let user = session.register_and_login("Aoi", "1234")?;
//!
//! let diaries = DiaryRepository::new(store);
//! diaries.create(DiaryDraft::new(user.id, &user.name, "遠足", "楽しかった"))?;
//! ```
//!
//! # Modules
//!
//! - `storage`: JSON-file key-value store
//! - `models`: Diary, user, and settings records
//! - `diaries`: Diary repository
//! - `session`: Registration, login, and the current identity
//! - `settings`: External-service settings
//! - `view`: Filter and sort of diary lists
//! - `export`: CSV export
//! - `feedback`: Gemini feedback gateway
//! - `spreadsheet`: Apps Script sync
//! - `config`: Application configuration

pub mod config;
pub mod diaries;
pub mod export;
pub mod feedback;
pub mod models;
pub mod password;
pub mod session;
pub mod settings;
pub mod spreadsheet;
pub mod storage;
pub mod view;

pub use config::Config;
pub use diaries::{
    group_by_student, DiaryRepository, NewAddition, NewTeacherComment, RepositoryError,
};
pub use export::{export_filename, to_csv, write_csv_file, ExportError};
pub use feedback::{
    AdditionFeedbackRequest, FeedbackError, FeedbackReply, FeedbackRequest, GeminiClient,
};
pub use models::{
    AppSettings, DiaryDraft, DiaryImage, DiaryPatch, DiaryRecord, RegisteredUser, SessionUser,
    SyncStatus, UserRole, ValidationError,
};
pub use session::{AuthError, SessionManager};
pub use settings::SettingsStore;
pub use spreadsheet::{SpreadsheetClient, SpreadsheetSyncRequest, SyncError};
pub use storage::{LocalStore, StorageError, StorageStats, StoreKey};
pub use view::{view, SortOrder};
