//! gpg-agent-compatible UNIX socket backend. Enabled by the `agent` feature.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

use sha1::{Digest, Sha1};

use super::sexp::{self, Sexp};
use super::{derive_session_key, ExternalKey};
use crate::error::KeyError;

/// Custom base32 alphabet gpg-agent uses for its socket directory hash
/// (a permuted standard alphabet, not RFC 4648).
const ZBASE32_ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// Run-time base directories searched for the per-user socket directory,
/// each suffixed with `/user/<uid>` except the last.
fn run_base_candidates(uid: u32) -> Vec<String> {
    vec![
        format!("/run/gnupg/user/{uid}"),
        format!("/run/user/{uid}"),
        format!("/var/run/gnupg/user/{uid}"),
        format!("/var/run/user/{uid}"),
        "/gnupg".to_string(),
    ]
}

/// Encodes `bytes` using gpg-agent's z-base-32-like alphabet.
fn zbase32_encode(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let idx = (buffer >> bits) & 0x1f;
            out.push(ZBASE32_ALPHABET[idx as usize] as char);
        }
    }
    if bits > 0 {
        let idx = (buffer << (5 - bits)) & 0x1f;
        out.push(ZBASE32_ALPHABET[idx as usize] as char);
    }
    out
}

/// Computes the `d.<hash>` directory name for `home_dir`, hashing the
/// first 15 bytes of its SHA-1 digest.
pub fn socket_dir_name(home_dir: &str) -> String {
    let digest = Sha1::digest(home_dir.as_bytes());
    format!("d.{}", zbase32_encode(&digest[..15]))
}

/// Searches the standard run-base directories for a live
/// `S.gpg-agent` socket belonging to `home_dir`.
pub fn discover_socket_path(home_dir: &str, uid: u32) -> Result<String, KeyError> {
    let dir_name = socket_dir_name(home_dir);
    for base in run_base_candidates(uid) {
        let candidate = format!("{base}/{dir_name}/S.gpg-agent");
        if std::path::Path::new(&candidate).exists() {
            return Ok(candidate);
        }
    }
    Err(KeyError::new(
        "could not locate a gpg-agent socket in any known run-base directory",
    ))
}

/// A connection to a gpg-agent-compatible assuan socket.
pub struct AgentConnection {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl AgentConnection {
    pub fn connect(socket_path: &str) -> Result<Self, KeyError> {
        let stream = UnixStream::connect(socket_path)
            .map_err(|e| KeyError::new(format!("failed to connect to agent socket: {e}")))?;
        let reader_stream = stream
            .try_clone()
            .map_err(|e| KeyError::new(format!("failed to clone agent socket: {e}")))?;
        let mut conn = Self {
            reader: BufReader::new(reader_stream),
            writer: stream,
        };
        let greeting = conn.read_line()?;
        if !greeting.starts_with("OK") {
            return Err(KeyError::new(format!(
                "agent did not greet with OK: {greeting}"
            )));
        }
        Ok(conn)
    }

    fn read_line(&mut self) -> Result<String, KeyError> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| KeyError::new(format!("agent socket read failed: {e}")))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn send_command(&mut self, command: &str) -> Result<(), KeyError> {
        self.writer
            .write_all(command.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|e| KeyError::new(format!("agent socket write failed: {e}")))
    }

    /// Sends a command and collects every `D `-prefixed data line up to
    /// the terminating `OK`/`ERR` status line, unescaping `%XX` along the
    /// way.
    fn command(&mut self, command: &str) -> Result<Vec<Vec<u8>>, KeyError> {
        self.send_command(command)?;
        let mut data = Vec::new();
        loop {
            let line = self.read_line()?;
            if let Some(payload) = line.strip_prefix("D ") {
                data.push(unescape(payload));
            } else if line == "END" {
                continue;
            } else if line.starts_with("OK") {
                return Ok(data);
            } else if line.starts_with("ERR") {
                return Err(KeyError::new(format!("agent returned error: {line}")));
            }
        }
    }

    /// `HAVEKEY --list=1000`: lists keygrips the agent currently holds.
    pub fn list_keygrips(&mut self) -> Result<Vec<String>, KeyError> {
        let data = self.command("HAVEKEY --list=1000")?;
        data.into_iter()
            .next()
            .map(|blob| blob.chunks(20).map(hex::encode).collect())
            .ok_or_else(|| KeyError::new("agent returned no keygrip list"))
    }

    /// `READKEY <keygrip>`: returns the Curve25519 public key embedded in
    /// the agent's S-expression reply.
    pub fn read_public_key(&mut self, keygrip_hex: &str) -> Result<[u8; 32], KeyError> {
        let data = self.command(&format!("READKEY {keygrip_hex}"))?;
        let blob = data
            .into_iter()
            .next()
            .ok_or_else(|| KeyError::new("agent returned no key data"))?;
        let (sexp, _) = sexp::parse(&blob)?;
        extract_ecc_q(&sexp)
    }

    /// Performs an ECDH via `SETKEY`+`PKDECRYPT`, sending the peer's
    /// Montgomery point wrapped in `(7:enc-val(4:ecdh(1:e33:<0x40><point>)))`
    /// — the `e` atom is the compression-byte-prefixed 33-byte point, not
    /// the bare 32-byte point.
    pub fn ecdh(&mut self, keygrip_hex: &str, peer_point: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        self.command(&format!("SETKEY {keygrip_hex}"))?;
        self.send_command("PKDECRYPT")?;
        // Consume the `S` inquiry line the agent sends before it will accept data.
        let _ = self.read_line()?;

        let mut point_atom = Vec::with_capacity(33);
        point_atom.push(0x40);
        point_atom.extend_from_slice(peer_point);

        let mut sexp = Vec::new();
        sexp.extend_from_slice(b"(7:enc-val(4:ecdh(1:e");
        sexp.extend_from_slice(point_atom.len().to_string().as_bytes());
        sexp.push(b':');
        sexp.extend_from_slice(&point_atom);
        sexp.extend_from_slice(b")))");

        self.writer
            .write_all(format!("D {}\n", escape(&sexp)).as_bytes())
            .map_err(|e| KeyError::new(format!("agent socket write failed: {e}")))?;
        self.writer
            .write_all(b"END\n")
            .map_err(|e| KeyError::new(format!("agent socket write failed: {e}")))?;

        let data = self.collect_status_terminated()?;
        let blob = data
            .into_iter()
            .next()
            .ok_or_else(|| KeyError::new("agent returned no ECDH result"))?;
        let (sexp, _) = sexp::parse(&blob)?;
        extract_ecc_q(&sexp)
    }

    fn collect_status_terminated(&mut self) -> Result<Vec<Vec<u8>>, KeyError> {
        let mut data = Vec::new();
        loop {
            let line = self.read_line()?;
            if let Some(payload) = line.strip_prefix("D ") {
                data.push(unescape(payload));
            } else if line.starts_with("OK") {
                return Ok(data);
            } else if line.starts_with("ERR") {
                return Err(KeyError::new(format!("agent returned error: {line}")));
            }
        }
    }
}

/// Pulls the raw 32-byte point out of an `(... (q <bytes>) ...)` or
/// `(ecdh (e <bytes>))`-shaped S-expression.
fn extract_ecc_q(sexp: &Sexp) -> Result<[u8; 32], KeyError> {
    for tag in [&b"q"[..], &b"e"[..]] {
        if let Some(found) = find_tagged_atom(sexp, tag) {
            if found.len() == 32 {
                let mut out = [0u8; 32];
                out.copy_from_slice(&found);
                return Ok(out);
            }
            // gpg-crypto sometimes prefixes points with a 0x40 format byte.
            if found.len() == 33 && found[0] == 0x40 {
                let mut out = [0u8; 32];
                out.copy_from_slice(&found[1..]);
                return Ok(out);
            }
        }
    }
    Err(KeyError::new(
        "could not find a 32-byte Curve25519 point in agent reply",
    ))
}

fn find_tagged_atom(sexp: &Sexp, tag: &[u8]) -> Option<Vec<u8>> {
    if let Some(after) = sexp.find_after(tag) {
        if let Some(atom) = after.as_atom() {
            return Some(atom.to_vec());
        }
    }
    if let Some(items) = sexp.as_list() {
        for item in items {
            if let Some(found) = find_tagged_atom(item, tag) {
                return Some(found);
            }
        }
    }
    None
}

fn escape(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        match b {
            b'%' | b'\r' | b'\n' | 0 => out.push_str(&format!("%{b:02X}")),
            _ => out.push(b as char),
        }
    }
    out
}

fn unescape(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(value) = u8::from_str_radix(std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""), 16) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Builds an [`ExternalKey`] backed by a single agent connection and
/// keygrip, resolving public key + ECDH oracle through it.
pub fn agent_key(
    socket_path: String,
    keygrip_hex: String,
) -> Result<ExternalKey<impl Fn(&[u8; 32]) -> Result<[u8; 32], KeyError> + Send + Sync>, KeyError>
{
    let mut conn = AgentConnection::connect(&socket_path)?;
    let public_key = conn.read_public_key(&keygrip_hex)?;

    let oracle_socket = socket_path;
    let oracle_grip = keygrip_hex;
    Ok(ExternalKey::new(public_key, move |peer_point: &[u8; 32]| {
        let mut conn = AgentConnection::connect(&oracle_socket)?;
        conn.ecdh(&oracle_grip, peer_point)
    }))
}

/// Helper mirroring [`Key::compute_write_symmetric`]/`compute_read_symmetric`
/// for callers that already have a raw ECDH shared point from the agent
/// (used by tests that stub the socket round trip).
pub(crate) fn derive_from_shared(
    shared: &[u8; 32],
    reader_pub: &[u8; 32],
    writer_pub: &[u8; 32],
) -> [u8; 32] {
    derive_session_key(shared, reader_pub, writer_pub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zbase32_alphabet_has_32_distinct_symbols() {
        let mut alphabet = ZBASE32_ALPHABET.to_vec();
        alphabet.sort();
        alphabet.dedup();
        assert_eq!(alphabet.len(), 32);
    }

    #[test]
    fn escape_roundtrips_reserved_bytes() {
        let original = b"hello%world\r\n\0done";
        let escaped = escape(original);
        assert_eq!(unescape(&escaped), original.to_vec());
    }

    #[test]
    fn socket_dir_name_is_stable_for_same_input() {
        let a = socket_dir_name("/home/alice");
        let b = socket_dir_name("/home/alice");
        assert_eq!(a, b);
        assert_ne!(a, socket_dir_name("/home/bob"));
    }
}
