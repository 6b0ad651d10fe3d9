//! PKCE login and token lifecycle for the Spotify Web API.
//!
//! This crate provides:
//! - **AuthSession**: login, callback handling, single-flight refresh, logout
//! - **Token lifecycle FSM**: explicit states built on `rust-fsm`
//! - **TokenEndpoint**: the `/api/token` seam, with a `reqwest` implementation
//! - **CallbackServer**: a loopback receiver for the authorization redirect

pub mod auth_fsm;
mod authorize;
mod callback_server;
mod clock;
mod error;
mod session;
mod token_endpoint;

pub use auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthState};
pub use authorize::{authorization_url, CallbackParams};
pub use callback_server::CallbackServer;
pub use clock::{Clock, SystemClock};
pub use error::{AuthError, AuthResult};
pub use session::{expiry_from, AuthSession, AuthStatus, EXPIRY_MARGIN_SECS};
pub use token_endpoint::{CodeExchange, ReqwestTokenEndpoint, TokenEndpoint, TokenResponse};
