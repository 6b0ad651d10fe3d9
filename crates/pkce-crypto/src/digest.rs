//! SHA-256 digests for PKCE code challenges.
//!
//! Two interchangeable paths produce the same 32 bytes:
//! - **Platform**: the `sha2` crate, compiled in with the `platform-digest` feature
//! - **Software**: a self-contained implementation of the standard compression
//!   function, used when the platform path is not available
//!
//! Callers go through [`digest`] and never learn which path ran.

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// A SHA-256 digest.
pub type Digest = [u8; DIGEST_LEN];

const BLOCK_LEN: usize = 64;

/// Length field appended during padding, in bytes.
const LENGTH_FIELD_LEN: usize = 8;

const H0: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// Which implementation computes a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestBackend {
    /// The `sha2` crate.
    Platform,
    /// The built-in software rounds.
    Software,
}

impl DigestBackend {
    /// The backend this build prefers.
    pub fn detect() -> Self {
        if cfg!(feature = "platform-digest") {
            DigestBackend::Platform
        } else {
            DigestBackend::Software
        }
    }
}

/// Compute the SHA-256 digest of `message` with the preferred backend.
pub fn digest(message: &[u8]) -> Digest {
    digest_with(DigestBackend::detect(), message)
}

/// Compute the SHA-256 digest of `message` with an explicit backend.
pub fn digest_with(backend: DigestBackend, message: &[u8]) -> Digest {
    match backend {
        DigestBackend::Platform => platform_digest(message),
        DigestBackend::Software => software_digest(message),
    }
}

#[cfg(feature = "platform-digest")]
fn platform_digest(message: &[u8]) -> Digest {
    use sha2::{Digest as _, Sha256};

    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&Sha256::digest(message));
    out
}

#[cfg(not(feature = "platform-digest"))]
fn platform_digest(message: &[u8]) -> Digest {
    tracing::trace!("platform digest not compiled in, using software rounds");
    software_digest(message)
}

/// Software SHA-256.
///
/// Full blocks are compressed straight from the input; the remainder is
/// copied into a one- or two-block tail together with the `0x80` marker,
/// zero fill and the 64-bit big-endian bit length.
pub fn software_digest(message: &[u8]) -> Digest {
    let mut state = H0;

    let mut blocks = message.chunks_exact(BLOCK_LEN);
    for block in &mut blocks {
        compress(&mut state, block);
    }

    let rest = blocks.remainder();
    let mut tail = [0u8; BLOCK_LEN * 2];
    tail[..rest.len()].copy_from_slice(rest);
    tail[rest.len()] = 0x80;

    let tail_len = if rest.len() + 1 + LENGTH_FIELD_LEN <= BLOCK_LEN {
        BLOCK_LEN
    } else {
        BLOCK_LEN * 2
    };
    let bit_len = (message.len() as u64).wrapping_mul(8);
    tail[tail_len - LENGTH_FIELD_LEN..tail_len].copy_from_slice(&bit_len.to_be_bytes());

    for block in tail[..tail_len].chunks_exact(BLOCK_LEN) {
        compress(&mut state, block);
    }

    let mut out = [0u8; DIGEST_LEN];
    for (word, bytes) in state.iter().zip(out.chunks_exact_mut(4)) {
        bytes.copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// One 64-round compression of a 64-byte block into `state`.
fn compress(state: &mut [u32; 8], block: &[u8]) {
    let mut schedule = [0u32; 64];
    for (slot, word) in schedule.iter_mut().zip(block.chunks_exact(4)) {
        *slot = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
    }
    for i in 16..64 {
        schedule[i] = small_sigma1(schedule[i - 2])
            .wrapping_add(schedule[i - 7])
            .wrapping_add(small_sigma0(schedule[i - 15]))
            .wrapping_add(schedule[i - 16]);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for (round_constant, word) in K.iter().zip(schedule.iter()) {
        let t1 = h
            .wrapping_add(big_sigma1(e))
            .wrapping_add(choose(e, f, g))
            .wrapping_add(*round_constant)
            .wrapping_add(*word);
        let t2 = big_sigma0(a).wrapping_add(majority(a, b, c));

        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    for (slot, value) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *slot = slot.wrapping_add(value);
    }
}

#[inline]
fn big_sigma0(x: u32) -> u32 {
    x.rotate_right(2) ^ x.rotate_right(13) ^ x.rotate_right(22)
}

#[inline]
fn big_sigma1(x: u32) -> u32 {
    x.rotate_right(6) ^ x.rotate_right(11) ^ x.rotate_right(25)
}

#[inline]
fn small_sigma0(x: u32) -> u32 {
    x.rotate_right(7) ^ x.rotate_right(18) ^ (x >> 3)
}

#[inline]
fn small_sigma1(x: u32) -> u32 {
    x.rotate_right(17) ^ x.rotate_right(19) ^ (x >> 10)
}

#[inline]
fn choose(x: u32, y: u32, z: u32) -> u32 {
    (x & y) ^ (!x & z)
}

#[inline]
fn majority(x: u32, y: u32, z: u32) -> u32 {
    (x & y) ^ (x & z) ^ (y & z)
}
