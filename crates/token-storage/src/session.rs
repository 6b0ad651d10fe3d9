//! The persisted session value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access token, expiry and refresh token for the signed-in user.
///
/// `authenticated == true` implies `access_token` and `expires_at` are present;
/// [`Session::authenticated`] is the only constructor that sets the flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub authenticated: bool,
}

impl Session {
    /// A signed-out session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A complete, signed-in session.
    pub fn authenticated(
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            expires_at: Some(expires_at),
            refresh_token,
            authenticated: true,
        }
    }

    /// True when nothing at all is held.
    pub fn is_empty(&self) -> bool {
        !self.authenticated && self.access_token.is_none() && self.refresh_token.is_none()
    }

    /// True when the flag is set and both required fields are present.
    pub fn is_complete(&self) -> bool {
        self.authenticated && self.access_token.is_some() && self.expires_at.is_some()
    }

    /// The access token, if it is still usable at `now`.
    pub fn valid_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(expires_at)) if self.authenticated && now < expires_at => {
                Some(token.as_str())
            }
            _ => None,
        }
    }

    /// True once `now` has reached the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now >= expires_at)
    }
}
