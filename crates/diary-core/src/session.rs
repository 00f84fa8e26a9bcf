//! Session and account management
//!
//! Tracks who is logged in, separately from the registry of named accounts.
//!
//! - Students register once with a name and password, then log in with
//!   the same pair. Every student session belongs to exactly one
//!   registered user.
//! - Teachers log in through a shared password gate; no registry row is
//!   created for them.
//! - A short most-recently-used list of names is kept for one-click name
//!   selection. It only pre-fills the name; the password is always checked.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{RegisteredUser, SessionUser, UserRole};
use crate::password::{hash_password, verify_password};
use crate::storage::{LocalStore, StorageError, StoreKey};

/// Capacity of the remembered-names list
pub const MAX_REMEMBERED_NAMES: usize = 10;

/// Authentication and registration failures
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Name must not be empty")]
    EmptyName,

    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("No user named '{0}' is registered")]
    UnknownUser(String),

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("This action requires a {0} login")]
    WrongRole(UserRole),

    #[error("{0}")]
    Hash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Login state and the user registry
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: LocalStore,
    config: Config,
}

impl SessionManager {
    /// Create a session manager; the shared gates come from the store's config
    pub fn new(store: LocalStore) -> Self {
        let config = store.config().clone();
        Self { store, config }
    }

    /// The identity currently logged in, if any
    pub fn current(&self) -> AuthResult<Option<SessionUser>> {
        Ok(self.store.get_optional(StoreKey::SessionUser)?)
    }

    /// The current identity, which must be a student
    pub fn require_student(&self) -> AuthResult<SessionUser> {
        self.require_role(UserRole::Student)
    }

    /// The current identity, which must be a teacher
    pub fn require_teacher(&self) -> AuthResult<SessionUser> {
        self.require_role(UserRole::Teacher)
    }

    fn require_role(&self, role: UserRole) -> AuthResult<SessionUser> {
        let user = self.current()?.ok_or(AuthError::NotLoggedIn)?;
        if user.role != role {
            return Err(AuthError::WrongRole(role));
        }
        Ok(user)
    }

    /// All registered users in registration order
    pub fn registered_users(&self) -> AuthResult<Vec<RegisteredUser>> {
        Ok(self.store.get(StoreKey::UserRegistry)?)
    }

    /// Look up a registered user by exact name
    pub fn find_by_name(&self, name: &str) -> AuthResult<Option<RegisteredUser>> {
        let name = name.trim();
        Ok(self
            .registered_users()?
            .into_iter()
            .find(|u| u.name == name))
    }

    /// Whether self-service registration needs the classroom code
    pub fn requires_classroom_password(&self) -> bool {
        self.config.classroom_password.is_some()
    }

    /// Check the shared classroom code; passes when no code is configured
    pub fn verify_classroom_password(&self, code: &str) -> AuthResult<()> {
        match self.config.classroom_password {
            Some(ref expected) if expected != code => Err(AuthError::IncorrectPassword),
            _ => Ok(()),
        }
    }

    /// Register a new student and log them in
    ///
    /// Fails with `AlreadyRegistered` if the name is taken; the existing
    /// record is never replaced.
    pub fn register_and_login(&self, name: &str, password: &str) -> AuthResult<SessionUser> {
        let name = normalize_name(name)?;
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let password_hash = hash_password(password)?;
        let candidate = RegisteredUser {
            id: uuid::Uuid::new_v4(),
            name: name.clone(),
            password_hash,
            created_at: chrono::Utc::now(),
        };

        let user = self
            .store
            .modify(StoreKey::UserRegistry, |users: &mut Vec<RegisteredUser>| {
                if users.iter().any(|u| u.name == candidate.name) {
                    return None;
                }
                users.push(candidate.clone());
                Some(candidate)
            })?
            .ok_or_else(|| AuthError::AlreadyRegistered(name.clone()))?;

        info!(name = %user.name, "registered student");
        self.start_session(SessionUser::student(&user))
    }

    /// Log in a registered student
    ///
    /// Session and registry are left untouched on failure.
    pub fn login(&self, name: &str, password: &str) -> AuthResult<SessionUser> {
        let name = normalize_name(name)?;
        let user = self
            .find_by_name(&name)?
            .ok_or_else(|| AuthError::UnknownUser(name.clone()))?;

        if !verify_password(password, &user.password_hash)? {
            debug!(name = %name, "login rejected");
            return Err(AuthError::IncorrectPassword);
        }

        info!(name = %user.name, "student logged in");
        self.start_session(SessionUser::student(&user))
    }

    /// Log in as a teacher through the shared password gate
    pub fn teacher_login(&self, name: &str, shared_password: &str) -> AuthResult<SessionUser> {
        let name = normalize_name(name)?;
        if shared_password != self.config.teacher_password {
            debug!(name = %name, "teacher login rejected");
            return Err(AuthError::IncorrectPassword);
        }

        let user = SessionUser::teacher(name);
        self.store.set(StoreKey::SessionUser, &user)?;
        info!(name = %user.name, "teacher logged in");
        Ok(user)
    }

    /// Clear the session
    pub fn logout(&self) -> AuthResult<()> {
        self.store.remove(StoreKey::SessionUser)?;
        info!("logged out");
        Ok(())
    }

    /// Recently used student names, most recent first
    pub fn remembered_names(&self) -> AuthResult<Vec<String>> {
        Ok(self.store.get(StoreKey::RememberedNames)?)
    }

    fn start_session(&self, user: SessionUser) -> AuthResult<SessionUser> {
        self.store.set(StoreKey::SessionUser, &user)?;
        self.store
            .modify(StoreKey::RememberedNames, |names: &mut Vec<String>| {
                remember_name(names, &user.name);
                Some(())
            })?;
        Ok(user)
    }
}

/// Move `name` to the front of the list, dropping duplicates and overflow
pub fn remember_name(names: &mut Vec<String>, name: &str) {
    names.retain(|n| n != name);
    names.insert(0, name.to_string());
    names.truncate(MAX_REMEMBERED_NAMES);
}

fn normalize_name(name: &str) -> AuthResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::EmptyName);
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_manager(temp_dir: &TempDir) -> SessionManager {
        SessionManager::new(LocalStore::open(temp_dir.path()))
    }

    fn gated_manager(temp_dir: &TempDir, code: &str) -> SessionManager {
        let mut config = Config::with_data_dir(temp_dir.path());
        config.classroom_password = Some(code.to_string());
        SessionManager::new(LocalStore::new(config))
    }

    #[test]
    fn test_anonymous_initially() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);

        assert!(manager.current().unwrap().is_none());
        assert!(matches!(manager.require_student(), Err(AuthError::NotLoggedIn)));
    }

    #[test]
    fn test_register_then_login() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);

        let session = manager.register_and_login("Aoi", "1234").unwrap();
        assert_eq!(session.name, "Aoi");
        assert_eq!(session.role, UserRole::Student);

        let registered = manager.find_by_name("Aoi").unwrap().unwrap();
        assert_eq!(registered.id, session.id);
        assert_ne!(registered.password_hash, "1234");

        manager.logout().unwrap();
        let again = manager.login("Aoi", "1234").unwrap();
        assert_eq!(again.id, session.id);
        assert_eq!(manager.current().unwrap(), Some(again));
    }

    #[test]
    fn test_wrong_password_leaves_session_anonymous() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);
        manager.register_and_login("Aoi", "1234").unwrap();
        manager.logout().unwrap();
        let registry_before = manager.registered_users().unwrap();

        let result = manager.login("Aoi", "wrong");
        assert!(matches!(result, Err(AuthError::IncorrectPassword)));
        assert!(manager.current().unwrap().is_none());
        assert_eq!(manager.registered_users().unwrap(), registry_before);
    }

    #[test]
    fn test_unknown_name_fails() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);
        manager.register_and_login("Aoi", "1234").unwrap();
        manager.logout().unwrap();

        assert!(matches!(manager.login("aoi", "1234"), Err(AuthError::UnknownUser(_))));
        assert!(manager.current().unwrap().is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);
        let first = manager.register_and_login("Aoi", "1234").unwrap();

        let result = manager.register_and_login(" Aoi ", "other");
        assert!(matches!(result, Err(AuthError::AlreadyRegistered(_))));

        let users = manager.registered_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, first.id);
        // The original password still works
        manager.login("Aoi", "1234").unwrap();
    }

    #[test]
    fn test_blank_inputs_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);

        assert!(matches!(manager.register_and_login("  ", "1234"), Err(AuthError::EmptyName)));
        assert!(matches!(manager.register_and_login("Aoi", ""), Err(AuthError::EmptyPassword)));
        assert!(manager.registered_users().unwrap().is_empty());
    }

    #[test]
    fn test_logout_is_unconditional() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);

        manager.logout().unwrap();
        manager.register_and_login("Aoi", "1234").unwrap();
        manager.logout().unwrap();
        assert!(manager.current().unwrap().is_none());
    }

    #[test]
    fn test_teacher_login() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);

        assert!(matches!(
            manager.teacher_login("Sato", "nope"),
            Err(AuthError::IncorrectPassword)
        ));
        assert!(manager.current().unwrap().is_none());

        let teacher = manager.teacher_login("Sato", "teacher2024").unwrap();
        assert!(teacher.is_teacher());
        assert_eq!(manager.require_teacher().unwrap(), teacher);
        assert!(matches!(
            manager.require_student(),
            Err(AuthError::WrongRole(UserRole::Student))
        ));
        // No registry row for teachers
        assert!(manager.find_by_name("Sato").unwrap().is_none());
    }

    #[test]
    fn test_classroom_password_gate() {
        let temp_dir = TempDir::new().unwrap();
        let open = test_manager(&temp_dir);
        assert!(!open.requires_classroom_password());
        assert!(open.verify_classroom_password("anything").is_ok());

        let gated = gated_manager(&temp_dir, "admin");
        assert!(gated.requires_classroom_password());
        assert!(matches!(
            gated.verify_classroom_password("wrong"),
            Err(AuthError::IncorrectPassword)
        ));
        assert!(gated.verify_classroom_password("admin").is_ok());
    }

    #[test]
    fn test_remembered_names_updated_on_login() {
        let temp_dir = TempDir::new().unwrap();
        let manager = test_manager(&temp_dir);

        manager.register_and_login("Aoi", "1").unwrap();
        manager.register_and_login("Ren", "2").unwrap();
        manager.login("Aoi", "1").unwrap();

        assert_eq!(manager.remembered_names().unwrap(), vec!["Aoi", "Ren"]);
    }

    #[test]
    fn test_remember_name_bounded_and_deduplicated() {
        let mut names = Vec::new();
        for i in 0..12 {
            remember_name(&mut names, &format!("name{}", i));
        }
        assert_eq!(names.len(), MAX_REMEMBERED_NAMES);
        assert_eq!(names[0], "name11");
        assert_eq!(names[9], "name2");

        remember_name(&mut names, "name5");
        assert_eq!(names.len(), MAX_REMEMBERED_NAMES);
        assert_eq!(names[0], "name5");
        assert_eq!(names.iter().filter(|n| *n == "name5").count(), 1);
    }
}
