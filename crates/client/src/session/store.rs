//! In-memory session state mirrored to durable storage.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};
use tradedesk_core::SessionUser;

use super::storage::{SessionStorage, StorageError, keys};

/// Token and identity of the logged-in user.
///
/// `generation` is bumped by every login, so a logout that started against an
/// older session can tell it has been superseded.
#[derive(Default)]
struct Session {
    token: Option<SecretString>,
    user: Option<SessionUser>,
    generation: u64,
}

/// Single source of truth for "who is logged in".
///
/// Owned by one [`SessionManager`](super::SessionManager); there is no
/// ambient global. Every mutation is mirrored to the [`SessionStorage`].
pub struct SessionStore {
    session: RwLock<Session>,
    storage: Arc<dyn SessionStorage>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Rehydrate the session from storage.
    ///
    /// Both entries must be present and the user entry must parse; otherwise
    /// the store starts unauthenticated.
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Self {
        let session = match read_persisted(storage.as_ref()) {
            Ok(Some((token, user))) => {
                debug!(user_id = %user.user_id, "Restored persisted session");
                Session {
                    token: Some(token),
                    user: Some(user),
                    generation: 0,
                }
            }
            Ok(None) => Session::default(),
            Err(e) => {
                warn!(error = %e, "Could not read persisted session, starting logged out");
                Session::default()
            }
        };

        Self {
            session: RwLock::new(session),
            storage,
        }
    }

    /// Whether both a token and a user are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        session.token.is_some() && session.user.is_some()
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    /// Current bearer token and the session generation it belongs to.
    pub(crate) fn credentials(&self) -> (Option<SecretString>, u64) {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        (session.token.clone(), session.generation)
    }

    /// Generation of the current session.
    pub(crate) fn generation(&self) -> u64 {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Install a new session in memory and persist it.
    ///
    /// The in-memory session is set even when persisting fails, so the user
    /// stays logged in for the lifetime of the process.
    pub(crate) fn establish(&self, token: SecretString, user: SessionUser) -> Result<(), StorageError> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        let persisted = persist(self.storage.as_ref(), &token, &user);

        session.token = Some(token);
        session.user = Some(user);
        session.generation = session.generation.wrapping_add(1);

        persisted
    }

    /// Remove the token of session `generation` from memory and hand it to
    /// the caller.
    ///
    /// Only the first of several concurrent callers receives the token, and
    /// nothing is taken once a newer session has been established.
    pub(crate) fn take_token(&self, generation: u64) -> Option<SecretString> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if session.generation != generation {
            return None;
        }
        session.token.take()
    }

    /// Drop token and user of session `generation` from memory and storage.
    ///
    /// A newer session is left alone. Returns `true` if anything was cleared
    /// from memory. Storage failures are logged.
    pub(crate) fn clear(&self, generation: u64) -> bool {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if session.generation != generation {
            debug!("Session was replaced, keeping it");
            return false;
        }

        let had_session = session.token.is_some() || session.user.is_some();
        session.token = None;
        session.user = None;

        for key in [keys::AUTH_TOKEN, keys::AUTH_USER] {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, "Failed to remove persisted session entry");
            }
        }

        had_session
    }
}

fn read_persisted(
    storage: &dyn SessionStorage,
) -> Result<Option<(SecretString, SessionUser)>, StorageError> {
    let token = storage.get(keys::AUTH_TOKEN)?;
    let user = storage.get(keys::AUTH_USER)?;

    let (Some(token), Some(user)) = (token, user) else {
        return Ok(None);
    };

    match serde_json::from_str::<SessionUser>(&user) {
        Ok(user) if !token.is_empty() => Ok(Some((SecretString::from(token), user))),
        Ok(_) => Ok(None),
        Err(e) => {
            warn!(error = %e, "Persisted user entry is not valid JSON");
            Ok(None)
        }
    }
}

fn persist(
    storage: &dyn SessionStorage,
    token: &SecretString,
    user: &SessionUser,
) -> Result<(), StorageError> {
    // SessionUser only holds strings; serialization cannot fail.
    let user_json = serde_json::to_string(user).unwrap_or_default();
    // The previous user must never sit next to the new token.
    storage.remove(keys::AUTH_USER)?;
    storage.set(keys::AUTH_TOKEN, token.expose_secret())?;
    storage.set(keys::AUTH_USER, &user_json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;

    use tradedesk_core::{Email, UserId, UserProfile};

    use super::*;
    use crate::session::storage::MemoryStorage;

    fn user() -> SessionUser {
        user_with_id("u-1")
    }

    fn user_with_id(id: &str) -> SessionUser {
        SessionUser {
            user_id: UserId::new(id),
            profile: UserProfile {
                email: Email::parse("ada@example.com").unwrap(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                phone: None,
            },
        }
    }

    /// Accepts everything except writes of the user entry.
    #[derive(Default)]
    struct UserWriteFails(MemoryStorage);

    impl SessionStorage for UserWriteFails {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == keys::AUTH_USER {
                return Err(StorageError::Write {
                    key: key.to_string(),
                    source: io::Error::other("disk full"),
                });
            }
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_restore_empty_storage_is_logged_out() {
        let store = SessionStore::restore(Arc::new(MemoryStorage::new()));
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_establish_persists_and_restores() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::restore(storage.clone());
        store
            .establish(SecretString::from("tok".to_string()), user())
            .unwrap();
        assert!(store.is_authenticated());

        let restored = SessionStore::restore(storage);
        assert!(restored.is_authenticated());
        assert_eq!(restored.user(), Some(user()));
        assert_eq!(restored.credentials().0.unwrap().expose_secret(), "tok");
    }

    #[test]
    fn test_restore_requires_both_keys() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(keys::AUTH_TOKEN, "tok").unwrap();
        assert!(!SessionStore::restore(storage.clone()).is_authenticated());

        storage.remove(keys::AUTH_TOKEN).unwrap();
        storage
            .set(keys::AUTH_USER, &serde_json::to_string(&user()).unwrap())
            .unwrap();
        assert!(!SessionStore::restore(storage).is_authenticated());
    }

    #[test]
    fn test_restore_rejects_unparsable_user() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(keys::AUTH_TOKEN, "tok").unwrap();
        storage.set(keys::AUTH_USER, "{not json").unwrap();
        assert!(!SessionStore::restore(storage).is_authenticated());
    }

    #[test]
    fn test_take_token_only_once() {
        let store = SessionStore::restore(Arc::new(MemoryStorage::new()));
        store
            .establish(SecretString::from("tok".to_string()), user())
            .unwrap();
        let generation = store.generation();

        assert!(store.take_token(generation).is_some());
        assert!(store.take_token(generation).is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::restore(storage.clone());
        store
            .establish(SecretString::from("tok".to_string()), user())
            .unwrap();
        let generation = store.generation();

        assert!(store.clear(generation));
        assert!(!store.clear(generation));
        assert!(storage.is_empty());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clear_of_replaced_session_keeps_newer_login() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::restore(storage.clone());
        store
            .establish(SecretString::from("old".to_string()), user())
            .unwrap();
        let stale = store.generation();
        assert!(store.take_token(stale).is_some());

        store
            .establish(SecretString::from("new".to_string()), user_with_id("u-2"))
            .unwrap();

        assert!(store.take_token(stale).is_none());
        assert!(!store.clear(stale));
        assert!(store.is_authenticated());
        assert_eq!(store.credentials().0.unwrap().expose_secret(), "new");
        assert_eq!(storage.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("new"));
        assert!(storage.get(keys::AUTH_USER).unwrap().is_some());
    }

    #[test]
    fn test_failed_user_write_leaves_no_mixed_identity() {
        let storage = Arc::new(UserWriteFails::default());
        storage.0.set(keys::AUTH_TOKEN, "old").unwrap();
        storage
            .0
            .set(keys::AUTH_USER, &serde_json::to_string(&user()).unwrap())
            .unwrap();

        let store = SessionStore::restore(storage.clone());
        assert!(store.is_authenticated());

        let result = store.establish(SecretString::from("new".to_string()), user_with_id("u-2"));
        assert!(result.is_err());
        assert_eq!(store.user(), Some(user_with_id("u-2")));

        assert!(storage.get(keys::AUTH_USER).unwrap().is_none());
        assert!(!SessionStore::restore(storage).is_authenticated());
    }
}
