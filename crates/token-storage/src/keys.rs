//! Storage key constants.

/// Keys used for the persisted session.
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer access token
    pub const ACCESS_TOKEN: &'static str = "spotify_access_token";

    /// Access token expiry, epoch milliseconds
    pub const EXPIRES_AT: &'static str = "spotify_token_expires_at";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "spotify_refresh_token";

    /// `"true"` once a complete session has been written
    pub const AUTHENTICATED: &'static str = "spotify_is_authenticated";

    /// PKCE state, only between login and callback
    pub const AUTH_STATE: &'static str = "spotify_auth_state";

    /// PKCE code verifier, only between login and callback
    pub const CODE_VERIFIER: &'static str = "spotify_code_verifier";

    /// Every key the store may write.
    pub const ALL: [&'static str; 6] = [
        Self::ACCESS_TOKEN,
        Self::EXPIRES_AT,
        Self::REFRESH_TOKEN,
        Self::AUTHENTICATED,
        Self::AUTH_STATE,
        Self::CODE_VERIFIER,
    ];
}
