//! Durable session persistence.
//!
//! Field order matters: on save the `authenticated` flag is dropped first and
//! written last, and on load it is the first thing checked, so a save that was
//! interrupted halfway never reads back as a signed-in session.

use crate::{KeyValueStorage, MemoryStorage, Session, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

const AUTHENTICATED_TRUE: &str = "true";

/// PKCE values held between `login` and the callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLogin {
    pub state: Option<String>,
    pub code_verifier: Option<String>,
}

/// Saves, restores and clears the [`Session`].
pub struct TokenStore {
    storage: Box<dyn KeyValueStorage>,
}

impl TokenStore {
    /// Create a store over the given backend.
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// A store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// Persist a complete session.
    pub fn save(&self, session: &Session) -> StorageResult<()> {
        let (access_token, expires_at) = match (&session.access_token, session.expires_at) {
            (Some(token), Some(expires_at)) if session.authenticated => (token, expires_at),
            _ => {
                return Err(StorageError::Encoding(
                    "only complete, authenticated sessions can be saved".to_string(),
                ))
            }
        };

        let _ = self.storage.delete(StorageKeys::AUTHENTICATED)?;

        self.storage.set(StorageKeys::ACCESS_TOKEN, access_token)?;
        self.storage.set(
            StorageKeys::EXPIRES_AT,
            &expires_at.timestamp_millis().to_string(),
        )?;
        match &session.refresh_token {
            Some(refresh_token) => self.storage.set(StorageKeys::REFRESH_TOKEN, refresh_token)?,
            None => {
                let _ = self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
            }
        }

        self.storage
            .set(StorageKeys::AUTHENTICATED, AUTHENTICATED_TRUE)?;

        debug!(expires_at = %expires_at, "Session saved");
        Ok(())
    }

    /// Restore the session as of the current time.
    pub fn load(&self) -> Session {
        self.load_at(Utc::now())
    }

    /// Restore the session as of `now`.
    ///
    /// Anything missing, unreadable or unparsable yields an empty session. An
    /// expired session also yields an empty one and clears the store.
    pub fn load_at(&self, now: DateTime<Utc>) -> Session {
        match self.read_session() {
            Ok(Some(session)) if session.is_expired_at(now) => {
                debug!("Stored session expired, clearing");
                if let Err(e) = self.clear() {
                    warn!(error = %e, "Failed to clear expired session");
                }
                Session::empty()
            }
            Ok(Some(session)) => session,
            Ok(None) => Session::empty(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                Session::empty()
            }
        }
    }

    fn read_session(&self) -> StorageResult<Option<Session>> {
        if self.storage.get(StorageKeys::AUTHENTICATED)?.as_deref() != Some(AUTHENTICATED_TRUE) {
            return Ok(None);
        }

        let Some(access_token) = self.storage.get(StorageKeys::ACCESS_TOKEN)? else {
            debug!("Authenticated flag set but access token missing");
            return Ok(None);
        };
        let Some(expires_at) = self
            .storage
            .get(StorageKeys::EXPIRES_AT)?
            .as_deref()
            .and_then(parse_epoch_millis)
        else {
            debug!("Authenticated flag set but expiry missing or unparsable");
            return Ok(None);
        };
        let refresh_token = self.storage.get(StorageKeys::REFRESH_TOKEN)?;

        Ok(Some(Session::authenticated(
            access_token,
            expires_at,
            refresh_token,
        )))
    }

    /// Remove every key this store writes, including pending PKCE values.
    pub fn clear(&self) -> StorageResult<()> {
        // The flag goes first so a partial clear never leaves a signed-in session.
        let mut first_error = self.storage.delete(StorageKeys::AUTHENTICATED).err();
        for key in StorageKeys::ALL
            .iter()
            .filter(|key| **key != StorageKeys::AUTHENTICATED)
        {
            if let Err(e) = self.storage.delete(key) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Persist the state and verifier of a login in progress.
    pub fn save_pending_login(&self, state: &str, code_verifier: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::AUTH_STATE, state)?;
        self.storage.set(StorageKeys::CODE_VERIFIER, code_verifier)
    }

    /// Read the state and verifier of a login in progress.
    pub fn pending_login(&self) -> StorageResult<PendingLogin> {
        Ok(PendingLogin {
            state: self.storage.get(StorageKeys::AUTH_STATE)?,
            code_verifier: self.storage.get(StorageKeys::CODE_VERIFIER)?,
        })
    }

    /// Forget the pending login values.
    pub fn clear_pending_login(&self) -> StorageResult<()> {
        let _ = self.storage.delete(StorageKeys::AUTH_STATE)?;
        let _ = self.storage.delete(StorageKeys::CODE_VERIFIER)?;
        Ok(())
    }
}

fn parse_epoch_millis(raw: &str) -> Option<DateTime<Utc>> {
    let millis = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
