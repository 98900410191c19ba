//! Passphrase-based key derivation for ASCII-armored private key envelopes.

use crate::error::KeyError;

/// KDF options parsed out of an envelope's `kdf_options` field.
#[derive(Debug, Clone)]
pub enum KdfParams {
    None,
    Scrypt { salt: Vec<u8> },
    Bcrypt { salt: Vec<u8>, rounds: u32 },
    Pbkdf2HmacSha256 { salt: Vec<u8>, rounds: u32 },
}

impl KdfParams {
    pub fn name(&self) -> &'static str {
        match self {
            KdfParams::None => "none",
            KdfParams::Scrypt { .. } => "scrypt",
            KdfParams::Bcrypt { .. } => "bcrypt",
            KdfParams::Pbkdf2HmacSha256 { .. } => "pbkdf2_hmac_sha256",
        }
    }
}

const DERIVED_KEY_BYTES: usize = 32;

/// Derives a 32-byte key-wrapping key from a passphrase.
pub fn derive(params: &KdfParams, passphrase: &[u8]) -> Result<[u8; 32], KeyError> {
    match params {
        KdfParams::None => Err(KeyError::new(
            "private key is not passphrase-protected, no KDF to run",
        )),
        KdfParams::Scrypt { salt } => scrypt_derive(salt, passphrase),
        KdfParams::Bcrypt { salt, rounds } => bcrypt_pbkdf_derive(salt, *rounds, passphrase),
        KdfParams::Pbkdf2HmacSha256 { salt, rounds } => {
            pbkdf2_derive(salt, *rounds, passphrase)
        }
    }
}

fn scrypt_derive(salt: &[u8], passphrase: &[u8]) -> Result<[u8; 32], KeyError> {
    // log2(N) = 14, r = 8, p = 1, matching the reference implementation.
    let params = scrypt::Params::new(14, 8, 1, DERIVED_KEY_BYTES)
        .map_err(|e| KeyError::new(format!("invalid scrypt parameters: {e}")))?;
    let mut out = [0u8; DERIVED_KEY_BYTES];
    scrypt::scrypt(passphrase, salt, &params, &mut out)
        .map_err(|e| KeyError::new(format!("scrypt derivation failed: {e}")))?;
    Ok(out)
}

fn bcrypt_pbkdf_derive(salt: &[u8], rounds: u32, passphrase: &[u8]) -> Result<[u8; 32], KeyError> {
    let mut out = [0u8; DERIVED_KEY_BYTES];
    bcrypt_pbkdf::bcrypt_pbkdf(passphrase, salt, rounds, &mut out)
        .map_err(|e| KeyError::new(format!("bcrypt_pbkdf derivation failed: {e}")))?;
    Ok(out)
}

fn pbkdf2_derive(salt: &[u8], rounds: u32, passphrase: &[u8]) -> Result<[u8; 32], KeyError> {
    let mut out = [0u8; DERIVED_KEY_BYTES];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(passphrase, salt, rounds, &mut out);
    Ok(out)
}
