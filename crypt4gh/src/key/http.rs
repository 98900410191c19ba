//! HTTP remote-key protocol. Client requires the `http-client`
//! feature; the path-dispatch logic is always available so both a test
//! harness and the `crypt4gh-keyserver` binary can reuse it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::KeyError;
use crate::wire::X25519_BASEPOINT_BYTES;

use super::Key;

/// Splits a path into components, dropping at most one leading and one
/// trailing empty element (i.e. the slashes framing `/prefix/key/suffix/`).
fn split_and_clean(s: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = s.split('/').collect();
    if parts.first().map(|p| p.is_empty()).unwrap_or(false) {
        parts.remove(0);
    }
    if parts.last().map(|p| p.is_empty()).unwrap_or(false) {
        parts.pop();
    }
    parts
}

/// A name-keyed collection of keys reachable over `<prefix>/<name>/<suffix>/<point-hex>`.
///
/// Shared between the HTTP server binary and this crate's tests so the
/// matching logic only needs to be right once.
pub struct PathKeyServer {
    prefix: Vec<String>,
    suffix: Vec<String>,
    keys: HashMap<String, Arc<dyn Key>>,
}

impl PathKeyServer {
    pub fn new(keys: HashMap<String, Arc<dyn Key>>, prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: split_and_clean(prefix).into_iter().map(String::from).collect(),
            suffix: split_and_clean(suffix).into_iter().map(String::from).collect(),
            keys,
        }
    }

    /// Matches an incoming request path, returning the 32-byte ECDH
    /// result on success or `None` if the path should 404.
    pub fn handle(&self, request_path: &str) -> Option<Result<[u8; 32], KeyError>> {
        let mut components: Vec<&str> = request_path.split('/').collect();
        if components.first().map(|c| !c.is_empty()).unwrap_or(true) {
            return None; // must start with '/'
        }
        components.remove(0);

        for expected in &self.prefix {
            match components.first() {
                Some(actual) if actual == expected => {
                    components.remove(0);
                }
                _ => return None,
            }
        }
        if components.is_empty() {
            return None;
        }
        let key_id = components.remove(0);

        for expected in &self.suffix {
            match components.first() {
                Some(actual) if actual == expected => {
                    components.remove(0);
                }
                _ => return None,
            }
        }
        if components.len() != 1 {
            return None;
        }
        let point_hex = components[0];
        if point_hex.len() != 64 {
            return None;
        }
        let point_bytes = hex::decode(point_hex).ok()?;
        let point: [u8; 32] = point_bytes.try_into().ok()?;
        let key = self.keys.get(key_id)?;
        Some(key.compute_ecdh(&point))
    }
}

#[cfg(feature = "http-client")]
mod client {
    use super::*;

    /// Blocking HTTP client delegating ECDH to a remote key server.
    ///
    /// The client has no notion of its own public key beyond what the
    /// server will compute for it: it derives one by asking the server to
    /// scalar-multiply the X25519 base point, exactly as a fresh
    /// `SoftwareKey` derives its public key from its private scalar.
    pub struct HttpKey {
        base_url: String,
        agent: reqwest::blocking::Client,
    }

    impl HttpKey {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                base_url: base_url.into(),
                agent: reqwest::blocking::Client::new(),
            }
        }

        fn request_ecdh(&self, peer_point: &[u8; 32]) -> Result<[u8; 32], KeyError> {
            let mut url = self.base_url.clone();
            if !url.ends_with('/') {
                url.push('/');
            }
            url.push_str(&hex::encode(peer_point));

            let response = self
                .agent
                .get(&url)
                .send()
                .map_err(|e| KeyError::new(format!("remote key request failed: {e}")))?;
            if !response.status().is_success() {
                return Err(KeyError::new(format!(
                    "remote key server returned {}",
                    response.status()
                )));
            }
            let body = response
                .bytes()
                .map_err(|e| KeyError::new(format!("failed to read remote key response: {e}")))?;
            if body.len() != 32 {
                return Err(KeyError::new(format!(
                    "remote key server returned {} bytes, expected 32",
                    body.len()
                )));
            }
            let mut out = [0u8; 32];
            out.copy_from_slice(&body);
            Ok(out)
        }
    }

    impl Key for HttpKey {
        fn public_key(&self) -> [u8; 32] {
            // Infallible by protocol contract in practice; a transport
            // failure here surfaces as an all-zero key, which will then
            // fail AEAD authentication downstream rather than panic.
            self.request_ecdh(&X25519_BASEPOINT_BYTES).unwrap_or([0; 32])
        }

        fn can_derive_symmetric(&self) -> bool {
            true
        }

        fn compute_write_symmetric(&self, reader_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
            let shared = self.compute_ecdh(reader_pub)?;
            Ok(super::super::derive_session_key(&shared, reader_pub, &self.public_key()))
        }

        fn compute_read_symmetric(&self, writer_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
            let shared = self.compute_ecdh(writer_pub)?;
            Ok(super::super::derive_session_key(&shared, &self.public_key(), writer_pub))
        }

        fn compute_ecdh(&self, peer_point: &[u8; 32]) -> Result<[u8; 32], KeyError> {
            self.request_ecdh(peer_point)
        }
    }
}

#[cfg(feature = "http-client")]
pub use client::HttpKey;
