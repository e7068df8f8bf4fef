//! TLS 1.2 pseudo-random function (RFC 5246, section 5).

use hmac::{Hmac, Mac, digest::KeyInit};
use sha2::{Sha256, Sha384};

use crate::{config::DigestAlgorithm, error::ContextError};

/// Label for the master secret.
pub const MASTER_SECRET_LABEL: &[u8] = b"master secret";
/// Label for the client's Finished.
pub const CLIENT_FINISHED_LABEL: &[u8] = b"client finished";
/// Label for the server's Finished.
pub const SERVER_FINISHED_LABEL: &[u8] = b"server finished";

/// `PRF(secret, label, seed)` truncated to `len` bytes.
pub fn prf(
    algorithm: DigestAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    len: usize,
) -> Result<Vec<u8>, ContextError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    match algorithm {
        DigestAlgorithm::Sha256 => p_hash::<Hmac<Sha256>>(secret, &label_seed, len),
        DigestAlgorithm::Sha384 => p_hash::<Hmac<Sha384>>(secret, &label_seed, len),
    }
}

/// `P_hash`: A(0) = seed, A(i) = HMAC(secret, A(i-1)),
/// output = HMAC(secret, A(1) + seed) + HMAC(secret, A(2) + seed) + ...
fn p_hash<M>(secret: &[u8], seed: &[u8], len: usize) -> Result<Vec<u8>, ContextError>
where
    M: Mac + KeyInit + Clone,
{
    let keyed = <M as Mac>::new_from_slice(secret).map_err(|e| ContextError::Prf(e.to_string()))?;

    let mut out = Vec::with_capacity(len);
    let mut a = seed.to_vec();
    while out.len() < len {
        let mut mac = keyed.clone();
        mac.update(&a);
        a = mac.finalize().into_bytes().to_vec();

        let mut mac = keyed.clone();
        mac.update(&a);
        mac.update(seed);
        out.extend_from_slice(&mac.finalize().into_bytes());
    }
    out.truncate(len);
    Ok(out)
}
