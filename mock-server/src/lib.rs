//! Minimal Nextcloud imitation for tests.
//!
//! Serves the capabilities endpoint (v1 and v2 OCS paths), login flow v2
//! initiation, and two echo routes that reflect request headers and bodies.
//! [`ServerState`] switches theming and login flow v2 on or off; [`run`] and
//! [`run_with`] serve the router on a caller-bound listener.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

/// OCS status code the server uses when the marker header is missing.
pub const OCS_CSRF_FAILED: u16 = 997;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Theming {
    pub name: String,
    pub url: String,
    pub logo: String,
    pub background: String,
    pub slogan: String,
    pub color: String,
}

impl Default for Theming {
    fn default() -> Self {
        Self {
            name: "Nextcloud".to_string(),
            url: "https://nextcloud.com".to_string(),
            logo: "/core/img/logo/logo.svg".to_string(),
            background: "/core/img/background.png".to_string(),
            slogan: "a safe home for all your data".to_string(),
            color: "#0082c9".to_string(),
        }
    }
}

/// What the mock advertises.
#[derive(Clone, Debug)]
pub struct ServerState {
    pub version: (u32, u32, u32),
    /// `None` serves capabilities without a `theming` block.
    pub theming: Option<Theming>,
    pub login_v2: bool,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            version: (28, 0, 4),
            theming: Some(Theming::default()),
            login_v2: true,
        }
    }
}

type Shared = Arc<ServerState>;

pub fn app() -> Router {
    app_with(ServerState::default())
}

pub fn app_with(state: ServerState) -> Router {
    Router::new()
        .route("/ocs/v1.php/cloud/capabilities", get(capabilities))
        .route("/ocs/v2.php/cloud/capabilities", get(capabilities))
        .route("/index.php/login/v2", post(login_v2))
        .route("/echo/headers", get(echo_headers))
        .route("/echo", post(echo_body))
        .with_state(Arc::new(state))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, ServerState::default()).await
}

pub async fn run_with(listener: TcpListener, state: ServerState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(state)).await
}

fn has_ocs_marker(headers: &HeaderMap) -> bool {
    ["ocs-apirequest", "x-ocs-apirequest"].iter().any(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    })
}

fn ocs(status: &str, statuscode: u16, message: &str, data: Value) -> Value {
    json!({
        "ocs": {
            "meta": {
                "status": status,
                "statuscode": statuscode,
                "message": message,
                "totalitems": "",
                "itemsperpage": ""
            },
            "data": data
        }
    })
}

async fn capabilities(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !has_ocs_marker(&headers) {
        log::debug!("capabilities request without OCS marker header");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ocs("failure", OCS_CSRF_FAILED, "CSRF check failed", json!([]))),
        );
    }

    let (major, minor, micro) = state.version;
    let mut capabilities = json!({ "core": { "pollinterval": 60, "webdav-root": "remote.php/webdav" } });
    if let Some(theming) = &state.theming {
        capabilities["theming"] = json!(theming);
    }
    let data = json!({
        "version": {
            "major": major,
            "minor": minor,
            "micro": micro,
            "string": format!("{major}.{minor}.{micro}"),
            "edition": "",
            "extendedSupport": false
        },
        "capabilities": capabilities
    });
    (StatusCode::OK, Json(ocs("ok", 100, "OK", data)))
}

async fn login_v2(State(state): State<Shared>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    if !state.login_v2 {
        return Err(StatusCode::NOT_FOUND);
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let token = Uuid::new_v4().simple().to_string();
    let flow = Uuid::new_v4().simple().to_string();
    log::info!("login flow v2 initiated, poll token {token}");
    Ok(Json(json!({
        "poll": {
            "token": token,
            "endpoint": format!("http://{host}/index.php/login/v2/poll")
        },
        "login": format!("http://{host}/index.php/login/v2/flow/{flow}")
    })))
}

/// Request headers as `{name: [values...]}` with lowercase names.
async fn echo_headers(headers: HeaderMap) -> Json<BTreeMap<String, Vec<String>>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        out.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(out)
}

async fn echo_body(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| header::HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], body)
}
