//! Token lifecycle state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐  LoginStarted   ┌──────────────────┐
//! │    Anonymous    │ ──────────────► │ AwaitingCallback │
//! └────────┬────────┘                 └────────┬─────────┘
//!          │ SessionRestored                   │ CallbackSucceeded / CallbackFailed
//!          ▼                                   ▼
//! ┌─────────────────┐  TokenExpired   ┌──────────────────┐
//! │  Authenticated  │ ──────────────► │   ExpiringSoon   │
//! └────────┬────────┘                 └────────┬─────────┘
//!          ▲                                   │ RefreshStarted
//!          │ RefreshSucceeded                  ▼
//!          │                          ┌──────────────────┐
//!          └───────────────────────── │    Refreshing    │
//!                                     └────────┬─────────┘
//!                                              │ RefreshFailed → ExpiringSoon
//!                                              │ SessionCleared / LoggedOut → Anonymous
//! ```
//!
//! `Error` is entered from a failed callback and left by starting a new login.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Anonymous)

    Anonymous => {
        LoginStarted => AwaitingCallback,
        SessionRestored => Authenticated,
        CallbackSucceeded => Authenticated,
        CallbackFailed => Error,
        LoggedOut => Anonymous
    },
    AwaitingCallback => {
        LoginStarted => AwaitingCallback,
        CallbackSucceeded => Authenticated,
        CallbackFailed => Error,
        LoggedOut => Anonymous
    },
    Authenticated => {
        LoginStarted => AwaitingCallback,
        CallbackSucceeded => Authenticated,
        TokenExpired => ExpiringSoon,
        RefreshStarted => Refreshing,
        SessionCleared => Anonymous,
        LoggedOut => Anonymous
    },
    ExpiringSoon => {
        LoginStarted => AwaitingCallback,
        RefreshStarted => Refreshing,
        SessionCleared => Anonymous,
        LoggedOut => Anonymous
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        RefreshFailed => ExpiringSoon,
        SessionCleared => Anonymous,
        LoggedOut => Anonymous
    },
    Error => {
        LoginStarted => AwaitingCallback,
        CallbackSucceeded => Authenticated,
        CallbackFailed => Error,
        LoggedOut => Anonymous
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Authentication state as seen by collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No session.
    Anonymous,
    /// Browser sent to the authorization endpoint; waiting for the redirect.
    AwaitingCallback,
    /// Access token valid.
    Authenticated,
    /// Access token past its (margin-adjusted) expiry.
    ExpiringSoon,
    /// A refresh request is in flight.
    Refreshing,
    /// The last callback failed.
    Error,
}

impl AuthState {
    /// Returns true while a session is held, including during refresh.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticated | AuthState::ExpiringSoon | AuthState::Refreshing
        )
    }

    /// Returns true if the state is a transient/in-progress state.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthState::AwaitingCallback | AuthState::Refreshing)
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Anonymous => AuthState::Anonymous,
            AuthMachineState::AwaitingCallback => AuthState::AwaitingCallback,
            AuthMachineState::Authenticated => AuthState::Authenticated,
            AuthMachineState::ExpiringSoon => AuthState::ExpiringSoon,
            AuthMachineState::Refreshing => AuthState::Refreshing,
            AuthMachineState::Error => AuthState::Error,
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuthState::Anonymous => "anonymous",
            AuthState::AwaitingCallback => "awaiting_callback",
            AuthState::Authenticated => "authenticated",
            AuthState::ExpiringSoon => "expiring_soon",
            AuthState::Refreshing => "refreshing",
            AuthState::Error => "error",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticated_machine() -> AuthMachine {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::LoginStarted).unwrap();
        machine.consume(&AuthMachineInput::CallbackSucceeded).unwrap();
        machine
    }

    #[test]
    fn test_initial_state_is_anonymous() {
        let machine = AuthMachine::new();
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_login_flow() {
        let machine = authenticated_machine();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_failed_callback_then_retry() {
        let mut machine = AuthMachine::new();
        machine.consume(&AuthMachineInput::LoginStarted).unwrap();
        machine.consume(&AuthMachineInput::CallbackFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Error);

        machine.consume(&AuthMachineInput::CallbackSucceeded).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_expiry_and_refresh_cycle() {
        let mut machine = authenticated_machine();

        machine.consume(&AuthMachineInput::TokenExpired).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::ExpiringSoon);

        machine.consume(&AuthMachineInput::RefreshStarted).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Refreshing);

        machine.consume(&AuthMachineInput::RefreshSucceeded).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Authenticated);
    }

    #[test]
    fn test_failed_refresh_then_session_cleared() {
        let mut machine = authenticated_machine();
        machine.consume(&AuthMachineInput::TokenExpired).unwrap();
        machine.consume(&AuthMachineInput::RefreshStarted).unwrap();

        machine.consume(&AuthMachineInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::ExpiringSoon);

        machine.consume(&AuthMachineInput::SessionCleared).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_logout_from_refreshing() {
        let mut machine = authenticated_machine();
        machine.consume(&AuthMachineInput::RefreshStarted).unwrap();

        machine.consume(&AuthMachineInput::LoggedOut).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let mut machine = AuthMachine::new();
        assert!(machine.consume(&AuthMachineInput::LoggedOut).is_ok());
        assert!(machine.consume(&AuthMachineInput::LoggedOut).is_ok());
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_cannot_refresh_without_session() {
        let mut machine = AuthMachine::new();
        assert!(machine.consume(&AuthMachineInput::RefreshStarted).is_err());
        assert!(machine.consume(&AuthMachineInput::RefreshSucceeded).is_err());
        assert_eq!(*machine.state(), AuthMachineState::Anonymous);
    }

    #[test]
    fn test_auth_state_classification() {
        assert!(AuthState::Authenticated.is_authenticated());
        assert!(AuthState::ExpiringSoon.is_authenticated());
        assert!(AuthState::Refreshing.is_authenticated());
        assert!(!AuthState::Anonymous.is_authenticated());
        assert!(!AuthState::Error.is_authenticated());

        assert!(AuthState::AwaitingCallback.is_transient());
        assert!(!AuthState::Authenticated.is_transient());
    }

    #[test]
    fn test_auth_state_serializes_snake_case() {
        let json = serde_json::to_string(&AuthState::AwaitingCallback).unwrap();
        assert_eq!(json, "\"awaiting_callback\"");
        assert_eq!(AuthState::ExpiringSoon.to_string(), "expiring_soon");
    }

    #[test]
    fn test_from_machine_state() {
        let machine = authenticated_machine();
        assert_eq!(AuthState::from(machine.state()), AuthState::Authenticated);
    }
}
