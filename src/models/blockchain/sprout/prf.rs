//! Sprout pseudo-random functions.
//!
//! Each PRF is one SHA-256 compression of a 512-bit block whose first four
//! bits select the function, followed by a 252-bit key and a 256-bit input.

use crate::models::blockchain::digest::sha256_compress;
use crate::models::blockchain::digest::Hash256;

fn prf(prefix: u8, key: &[u8; 32], input: &[u8; 32]) -> Hash256 {
    let mut left = *key;
    left[0] = (left[0] & 0x0f) | prefix;
    sha256_compress(&left, input)
}

/// `PRF^addr_{a_sk}(t)`, used to derive the paying key and encryption key.
pub(crate) fn prf_addr(a_sk: &[u8; 32], t: u8) -> Hash256 {
    let mut input = [0u8; 32];
    input[0] = t;
    prf(0xc0, a_sk, &input)
}

/// `PRF^nf_{a_sk}(rho)`: the nullifier of a note.
pub(crate) fn prf_nf(a_sk: &[u8; 32], rho: &Hash256) -> Hash256 {
    prf(0xe0, a_sk, rho.as_bytes())
}

/// `PRF^pk_{a_sk}(i, h_sig)`: the MAC binding input `i` to `h_sig`.
pub(crate) fn prf_pk(a_sk: &[u8; 32], index: usize, h_sig: &Hash256) -> Hash256 {
    let prefix = if index == 0 { 0x00 } else { 0x40 };
    prf(prefix, a_sk, h_sig.as_bytes())
}

/// `PRF^rho_phi(i, h_sig)`: the unique value of output note `i`.
pub(crate) fn prf_rho(phi: &[u8; 32], index: usize, h_sig: &Hash256) -> Hash256 {
    let prefix = if index == 0 { 0x20 } else { 0x60 };
    prf(prefix, phi, h_sig.as_bytes())
}
