use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::errors::AuthError;

/// PKCE verifier/challenge pair (RFC 7636, S256).
#[derive(Debug, Clone)]
pub struct PkceCodes {
    pub code_verifier: String,
    pub code_challenge: String,
}

pub fn generate_pkce() -> Result<PkceCodes, AuthError> {
    let mut bytes = [0u8; 64];
    rand::thread_rng()
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::PkceGeneration(e.to_string()))?;

    let code_verifier = URL_SAFE_NO_PAD.encode(bytes);
    let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));

    Ok(PkceCodes {
        code_verifier,
        code_challenge,
    })
}

/// Random OAuth state string.
pub fn generate_state() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rand::thread_rng()
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::StateGeneration(e.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
