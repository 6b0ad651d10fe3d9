//! Session manager: PKCE login, token refresh and logout.
//!
//! `AuthSession` is the only writer of the signed-in [`Session`]. Every path
//! that replaces or clears it bumps a generation counter while holding the
//! session lock; a refresh remembers the generation it started under and its
//! result is dropped if the counter moved in the meantime, so a logout always
//! wins over a refresh response that arrives late.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthState};
use crate::authorize::{authorization_url, CallbackParams};
use crate::clock::{Clock, SystemClock};
use crate::token_endpoint::{CodeExchange, ReqwestTokenEndpoint, TokenEndpoint, TokenResponse};
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use pkce_crypto::{ChallengeGenerator, PkceChallenge};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use token_storage::{Session, TokenStore};
use toune_config::Config;
use tracing::{debug, info, warn};
use url::Url;

/// Subtracted from `expires_in` so a token is never used right up to its expiry.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Snapshot of the session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub state: AuthState,
    pub authenticated: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
}

/// Token lifecycle manager.
pub struct AuthSession {
    config: Config,
    store: TokenStore,
    challenges: ChallengeGenerator,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    session: Mutex<Session>,
    fsm: Mutex<AuthMachine>,
    state_tx: watch::Sender<AuthState>,
    /// Held for the whole of a refresh so only one is ever in flight.
    refresh_gate: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl AuthSession {
    /// Session manager talking to the configured authorization server over HTTP.
    pub fn from_config(config: Config, store: TokenStore) -> Self {
        let endpoint = ReqwestTokenEndpoint::new(&config.accounts_base_url, config.client_id.clone());
        Self::new(config, store, Arc::new(endpoint))
    }

    pub fn new(config: Config, store: TokenStore, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self::with_clock(config, store, endpoint, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Config,
        store: TokenStore,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Anonymous);
        Self {
            config,
            store,
            challenges: ChallengeGenerator::default(),
            endpoint,
            clock,
            session: Mutex::new(Session::empty()),
            fsm: Mutex::new(AuthMachine::new()),
            state_tx,
            refresh_gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load a persisted session. Call once at startup.
    pub fn restore(&self) -> AuthState {
        let restored = self.store.load_at(self.clock.now());
        if !restored.is_complete() {
            debug!("No stored session to restore");
            return self.state();
        }

        {
            let mut session = self.session.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            *session = restored;
        }
        self.advance(AuthMachineInput::SessionRestored);
        info!("Restored stored session");
        self.state()
    }

    /// The `/authorize` URL for a given challenge, without touching storage.
    pub fn authorization_url(&self, challenge: &PkceChallenge) -> AuthResult<Url> {
        authorization_url(&self.config, challenge)
    }

    /// Start a login: persist a fresh state/verifier pair and return the URL
    /// the user agent must be sent to.
    pub fn login(&self) -> AuthResult<Url> {
        let challenge = self.challenges.generate();
        let url = self.authorization_url(&challenge)?;

        self.store
            .save_pending_login(&challenge.state, &challenge.code_verifier)?;
        self.advance(AuthMachineInput::LoginStarted);

        info!("Login started; waiting for authorization callback");
        Ok(url)
    }

    /// Complete a login from the raw redirect parameters.
    pub async fn handle_callback_params(&self, params: CallbackParams) -> AuthResult<()> {
        match params.into_code_and_state() {
            Ok((code, state)) => self.handle_callback(&code, &state).await,
            Err(err) => {
                warn!(error = %err, "Authorization callback rejected");
                self.advance(AuthMachineInput::CallbackFailed);
                Err(err)
            }
        }
    }

    /// Complete a login: check `state`, exchange `code` and persist the session.
    ///
    /// A mismatched `state` leaves the pending pair in place so the genuine
    /// redirect can still complete.
    pub async fn handle_callback(&self, code: &str, state: &str) -> AuthResult<()> {
        let pending = self.store.pending_login()?;

        if pending.state.as_deref() != Some(state) {
            warn!("Authorization callback state does not match pending login");
            self.advance(AuthMachineInput::CallbackFailed);
            return Err(AuthError::StateMismatch);
        }

        let Some(code_verifier) = pending.code_verifier else {
            warn!("Authorization callback without a pending code verifier");
            self.advance(AuthMachineInput::CallbackFailed);
            return Err(AuthError::MissingVerifier);
        };

        // The code is single use, so the pair is spent whatever the exchange returns.
        self.store.clear_pending_login()?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let request = CodeExchange {
            code: code.to_string(),
            code_verifier,
            redirect_uri: self.config.redirect_uri.clone(),
        };

        let exchanged = self
            .endpoint
            .exchange_code(&request)
            .await
            .and_then(|tokens| {
                let expires_at = expiry_from(self.clock.now(), tokens.expires_in).ok_or_else(|| {
                    AuthError::TokenExchangeFailed {
                        status: 200,
                        body: format!("expires_in out of range: {}", tokens.expires_in),
                    }
                })?;
                Ok((tokens, expires_at))
            });
        let (tokens, expires_at) = match exchanged {
            Ok(exchanged) => exchanged,
            Err(err) => {
                self.advance(AuthMachineInput::CallbackFailed);
                return Err(err);
            }
        };

        self.apply_tokens(generation, tokens, expires_at, None)?;
        self.advance(AuthMachineInput::CallbackSucceeded);

        info!("Login complete");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On failure the session is left as it was; [`get_valid_token`](Self::get_valid_token)
    /// is the path that gives up and clears it.
    pub async fn refresh_token(&self) -> AuthResult<String> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// An access token that is valid now, refreshing if needed.
    ///
    /// Fails only with [`AuthError::AuthenticationRequired`], after clearing the session.
    pub async fn get_valid_token(&self) -> AuthResult<String> {
        if let Some(token) = self.current_token() {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;

        // Whoever held the gate before us may already have refreshed.
        if let Some(token) = self.current_token() {
            return Ok(token);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        self.advance(AuthMachineInput::TokenExpired);

        match self.refresh_locked().await {
            Ok(token) => Ok(token),
            Err(err) => {
                warn!(error = %err, "Could not obtain a valid access token");
                self.clear_if_current(generation);
                Err(AuthError::AuthenticationRequired)
            }
        }
    }

    /// Mark `rejected` as unusable so the next [`get_valid_token`](Self::get_valid_token)
    /// refreshes. A token that has already been replaced is left alone.
    pub fn invalidate_access_token(&self, rejected: &str) {
        let mut session = self.session.lock();
        if session.access_token.as_deref() == Some(rejected) {
            debug!("Access token rejected by the resource server");
            session.expires_at = Some(self.clock.now());
        }
    }

    /// Forget the session and any pending login. Safe to call repeatedly.
    pub fn logout(&self) -> AuthResult<()> {
        let cleared = {
            let mut session = self.session.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            *session = Session::empty();
            self.store.clear()
        };
        self.advance(AuthMachineInput::LoggedOut);

        cleared?;
        info!("Logged out");
        Ok(())
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().state())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn status(&self) -> AuthStatus {
        let session = self.session.lock();
        AuthStatus {
            state: self.state(),
            authenticated: session.authenticated,
            expires_at: session.expires_at,
            has_refresh_token: session.refresh_token.is_some(),
        }
    }

    /// Watch the auth state; collaborators reset themselves on `Anonymous`.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    fn current_token(&self) -> Option<String> {
        let now = self.clock.now();
        self.session
            .lock()
            .valid_access_token(now)
            .map(str::to_string)
    }

    /// Refresh while the caller holds `refresh_gate`.
    async fn refresh_locked(&self) -> AuthResult<String> {
        let (refresh_token, generation) = {
            let session = self.session.lock();
            (
                session.refresh_token.clone(),
                self.generation.load(Ordering::SeqCst),
            )
        };
        let Some(refresh_token) = refresh_token else {
            return Err(AuthError::NoRefreshToken);
        };

        self.advance(AuthMachineInput::RefreshStarted);

        let refreshed = self.endpoint.refresh(&refresh_token).await.and_then(|tokens| {
            let expires_at = expiry_from(self.clock.now(), tokens.expires_in).ok_or_else(|| {
                AuthError::TokenRefreshFailed(format!(
                    "expires_in out of range: {}",
                    tokens.expires_in
                ))
            })?;
            Ok((tokens, expires_at))
        });
        let (tokens, expires_at) = match refreshed {
            Ok(refreshed) => refreshed,
            Err(err) => {
                if self.generation.load(Ordering::SeqCst) == generation {
                    self.advance(AuthMachineInput::RefreshFailed);
                }
                return Err(err);
            }
        };

        let access_token = tokens.access_token.clone();
        self.apply_tokens(generation, tokens, expires_at, Some(refresh_token))?;
        self.advance(AuthMachineInput::RefreshSucceeded);

        info!("Access token refreshed");
        Ok(access_token)
    }

    /// Persist and install a token set, unless the generation moved since
    /// the request went out. `previous_refresh` is kept when the server did
    /// not rotate the refresh token.
    fn apply_tokens(
        &self,
        generation: u64,
        tokens: TokenResponse,
        expires_at: DateTime<Utc>,
        previous_refresh: Option<String>,
    ) -> AuthResult<()> {
        let mut session = self.session.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding token response from a superseded session");
            return Err(AuthError::AuthenticationRequired);
        }

        let updated = Session::authenticated(
            tokens.access_token,
            expires_at,
            tokens.refresh_token.or(previous_refresh),
        );
        self.store.save(&updated)?;
        *session = updated;
        Ok(())
    }

    fn clear_if_current(&self, generation: u64) {
        {
            let mut session = self.session.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            *session = Session::empty();
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear stored session");
            }
        }
        self.advance(AuthMachineInput::SessionCleared);
    }

    /// Apply an FSM input, ignoring inputs the current state does not accept.
    fn advance(&self, input: AuthMachineInput) {
        if let Err(e) = self.transition(&input) {
            debug!(error = %e, "Auth input ignored");
        }
    }

    fn transition(&self, input: &AuthMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = %old_state, new_state = %new_state, "Auth state transition");
            self.state_tx.send_replace(new_state);
        }

        Ok(new_state)
    }
}

/// `issued_at + expires_in - margin`, or `None` when `expires_in` does not fit a timestamp.
pub fn expiry_from(issued_at: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .and_then(|expiry| expiry.checked_sub_signed(Duration::seconds(EXPIRY_MARGIN_SECS)))
}
