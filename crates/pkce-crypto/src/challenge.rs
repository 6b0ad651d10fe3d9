//! PKCE challenge generation (RFC 7636, `S256` method).

use crate::digest::digest;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The only challenge method this crate produces.
pub const CHALLENGE_METHOD: &str = "S256";

/// Verifier length used for every login.
pub const DEFAULT_VERIFIER_LEN: usize = 64;

/// Anti-CSRF state length.
pub const DEFAULT_STATE_LEN: usize = 16;

/// Shortest verifier RFC 7636 allows.
pub const MIN_VERIFIER_LEN: usize = 43;

/// Longest verifier RFC 7636 allows.
pub const MAX_VERIFIER_LEN: usize = 128;

/// Unreserved URI characters permitted in a code verifier.
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Verifier, challenge and state for one login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceChallenge {
    /// Client secret proven at code exchange time.
    pub code_verifier: String,
    /// `base64url_no_pad(sha256(code_verifier))`, sent with the authorization request.
    pub code_challenge: String,
    /// Random value echoed back by the authorization server.
    pub state: String,
}

/// Produces fresh [`PkceChallenge`] values.
#[derive(Debug, Clone)]
pub struct ChallengeGenerator {
    verifier_len: usize,
    state_len: usize,
}

impl Default for ChallengeGenerator {
    fn default() -> Self {
        Self {
            verifier_len: DEFAULT_VERIFIER_LEN,
            state_len: DEFAULT_STATE_LEN,
        }
    }
}

impl ChallengeGenerator {
    /// Create a generator with a custom verifier length, clamped to 43..=128.
    pub fn with_verifier_len(verifier_len: usize) -> Self {
        Self {
            verifier_len: verifier_len.clamp(MIN_VERIFIER_LEN, MAX_VERIFIER_LEN),
            ..Self::default()
        }
    }

    /// Generate a new verifier, its challenge and a separate state token.
    pub fn generate(&self) -> PkceChallenge {
        let code_verifier = random_unreserved(self.verifier_len);
        let code_challenge = code_challenge(&code_verifier);
        let state = random_state(self.state_len);

        tracing::debug!(
            verifier_len = code_verifier.len(),
            state_len = state.len(),
            "Generated PKCE challenge"
        );

        PkceChallenge {
            code_verifier,
            code_challenge,
            state,
        }
    }
}

/// Derive the `S256` code challenge for a verifier.
pub fn code_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(digest(code_verifier.as_bytes()))
}

fn random_unreserved(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| UNRESERVED[rng.gen_range(0..UNRESERVED.len())] as char)
        .collect()
}

fn random_state(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generate_lengths() {
        let challenge = ChallengeGenerator::default().generate();
        assert_eq!(challenge.code_verifier.len(), DEFAULT_VERIFIER_LEN);
        assert_eq!(challenge.state.len(), DEFAULT_STATE_LEN);
        // 32 digest bytes encode to 43 base64 characters without padding
        assert_eq!(challenge.code_challenge.len(), 43);
    }

    #[test]
    fn test_verifier_uses_unreserved_charset() {
        let challenge = ChallengeGenerator::default().generate();
        assert!(challenge
            .code_verifier
            .bytes()
            .all(|b| UNRESERVED.contains(&b)));
        assert!(challenge.state.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_challenge_matches_verifier() {
        let challenge = ChallengeGenerator::default().generate();
        assert_eq!(
            challenge.code_challenge,
            code_challenge(&challenge.code_verifier)
        );
    }

    #[test]
    fn test_challenge_is_url_safe_without_padding() {
        for _ in 0..200 {
            let challenge = ChallengeGenerator::default().generate();
            assert!(!challenge.code_challenge.contains('+'));
            assert!(!challenge.code_challenge.contains('/'));
            assert!(!challenge.code_challenge.contains('='));
        }
    }

    #[test]
    fn test_generated_values_do_not_collide() {
        let generator = ChallengeGenerator::default();
        let mut verifiers = HashSet::new();
        let mut states = HashSet::new();
        for _ in 0..500 {
            let challenge = generator.generate();
            assert!(verifiers.insert(challenge.code_verifier));
            assert!(states.insert(challenge.state));
        }
    }

    #[test]
    fn test_verifier_len_is_clamped() {
        assert_eq!(
            ChallengeGenerator::with_verifier_len(10)
                .generate()
                .code_verifier
                .len(),
            MIN_VERIFIER_LEN
        );
        assert_eq!(
            ChallengeGenerator::with_verifier_len(500)
                .generate()
                .code_verifier
                .len(),
            MAX_VERIFIER_LEN
        );
    }
}
