//! Path-based HTTP server for the Crypt4GH remote-key protocol.
//!
//! Serves `compute_ecdh` over HTTP: a GET against
//! `<prefix>/<key-id>/<suffix>/<hex-encoded-point>` scalar-multiplies the
//! request's point with the named key's private scalar and returns the
//! raw 32-byte result. Clients use this to resolve their own public key
//! (point = base point) and to complete header-packet ECDH without the
//! private key ever leaving this process.
//!
//! Configuration (environment variables):
//!   CRYPT4GH_KEYSERVER_ADDR        - listen address (default: 0.0.0.0:8080)
//!   CRYPT4GH_KEYSERVER_KEYS_DIR    - directory of `<id>.sec` key files (required)
//!   CRYPT4GH_KEYSERVER_PREFIX      - path prefix before the key id (default: /keys)
//!   CRYPT4GH_KEYSERVER_SUFFIX      - path segment(s) between id and point (default: "")
//!   CRYPT4GH_KEYSERVER_PASSPHRASE  - passphrase for encrypted key files, if any
//!   CRYPT4GH_LOG_FORMAT            - "json" for structured logging, "pretty" for dev

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use crypt4gh::error::KeyError;
use crypt4gh::key::envelope;
use crypt4gh::key::http::PathKeyServer;
use crypt4gh::key::Key;

struct AppState {
    server: PathKeyServer,
}

type Shared = Arc<AppState>;

fn load_keys(dir: &str, passphrase: Option<&str>) -> HashMap<String, Arc<dyn Key>> {
    let mut keys: HashMap<String, Arc<dyn Key>> = HashMap::new();
    let entries = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("failed to read CRYPT4GH_KEYSERVER_KEYS_DIR {dir}: {e}"));

    for entry in entries {
        let entry = entry.expect("failed to read directory entry");
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sec") {
            continue;
        }
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let contents = std::fs::read(&path)
            .unwrap_or_else(|e| panic!("failed to read key file {}: {e}", path.display()));
        let mut callback = || -> Result<String, KeyError> {
            passphrase
                .map(str::to_owned)
                .ok_or_else(|| KeyError::new("key file is encrypted but no passphrase was configured"))
        };
        let key = envelope::decode(&contents, &mut callback)
            .unwrap_or_else(|e| panic!("failed to load key {}: {e}", path.display()));
        if !key.can_derive_symmetric() {
            panic!("key file {} does not contain a private key", path.display());
        }

        tracing::info!(id = %id, path = %path.display(), "loaded key");
        keys.insert(id, Arc::new(key));
    }
    keys
}

async fn handle_key_request(State(state): State<Shared>, req: Request) -> impl IntoResponse {
    let path = req.uri().path().to_string();
    match state.server.handle(&path) {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(Ok(shared)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            shared.to_vec(),
        )
            .into_response(),
        Some(Err(e)) => {
            tracing::warn!(path = %path, error = %e, "ECDH request failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[tokio::main]
async fn main() {
    let log_format = std::env::var("CRYPT4GH_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crypt4gh_keyserver=info,tower_http=info".into());
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).with_target(true).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let addr: SocketAddr = std::env::var("CRYPT4GH_KEYSERVER_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()
        .expect("CRYPT4GH_KEYSERVER_ADDR must be a valid socket address");
    let keys_dir = std::env::var("CRYPT4GH_KEYSERVER_KEYS_DIR")
        .expect("CRYPT4GH_KEYSERVER_KEYS_DIR must be set");
    let prefix = std::env::var("CRYPT4GH_KEYSERVER_PREFIX").unwrap_or_else(|_| "/keys".into());
    let suffix = std::env::var("CRYPT4GH_KEYSERVER_SUFFIX").unwrap_or_default();
    let passphrase = std::env::var("CRYPT4GH_KEYSERVER_PASSPHRASE").ok();

    let keys = load_keys(&keys_dir, passphrase.as_deref());
    if keys.is_empty() {
        tracing::warn!(dir = %keys_dir, "no key files (*.sec) found");
    }
    let server = PathKeyServer::new(keys, &prefix, &suffix);
    let state: Shared = Arc::new(AppState { server });

    let app = Router::new()
        .route("/health", get(health))
        .route("/*rest", get(handle_key_request))
        .with_state(state);

    tracing::info!(%addr, prefix = %prefix, suffix = %suffix, "starting Crypt4GH key server");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
