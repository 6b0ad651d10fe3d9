//! Authorization request URL and redirect parameter parsing.

use crate::{AuthError, AuthResult};
use pkce_crypto::{PkceChallenge, CHALLENGE_METHOD};
use serde::{Deserialize, Serialize};
use toune_config::Config;
use url::Url;

/// Build the `/authorize` URL the user agent is sent to.
pub fn authorization_url(config: &Config, challenge: &PkceChallenge) -> AuthResult<Url> {
    let base = config.accounts_base_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/authorize", base))
        .map_err(|e| AuthError::Config(format!("invalid accounts_base_url: {}", e)))?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("scope", &config.scopes)
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("state", &challenge.state)
            .append_pair("code_challenge_method", CHALLENGE_METHOD)
            .append_pair("code_challenge", &challenge.code_challenge);
        if config.show_dialog {
            query.append_pair("show_dialog", "true");
        }
    }

    Ok(url)
}

/// Query parameters the authorization server appends to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Read `code`, `state` and `error` from a redirect URL's query string.
    pub fn from_url(url: &Url) -> Self {
        let mut params = CallbackParams::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Parse a pasted redirect URL.
    pub fn parse(redirect: &str) -> AuthResult<Self> {
        let url = Url::parse(redirect.trim())
            .map_err(|e| AuthError::AuthorizationDenied(format!("invalid redirect URL: {}", e)))?;
        Ok(Self::from_url(&url))
    }

    /// Split into `(code, state)`, or the denial reason.
    pub fn into_code_and_state(self) -> AuthResult<(String, String)> {
        if let Some(reason) = self.error {
            return Err(AuthError::AuthorizationDenied(reason));
        }
        match (self.code, self.state) {
            (Some(code), Some(state)) if !code.is_empty() => Ok((code, state)),
            _ => Err(AuthError::AuthorizationDenied(
                "missing authorization code or state".to_string(),
            )),
        }
    }
}
