//! PKCE primitives for the Toune login flow.
//!
//! This crate provides:
//! - **SHA-256** with a platform path and a software fallback that agree bit for bit
//! - **ChallengeGenerator** for code verifiers, `S256` challenges and state tokens

mod challenge;
pub mod digest;

pub use challenge::{
    code_challenge, ChallengeGenerator, PkceChallenge, CHALLENGE_METHOD, DEFAULT_STATE_LEN,
    DEFAULT_VERIFIER_LEN, MAX_VERIFIER_LEN, MIN_VERIFIER_LEN,
};
pub use digest::{digest, digest_with, software_digest, Digest, DigestBackend, DIGEST_LEN};
