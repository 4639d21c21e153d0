//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and drives
//! `NextcloudClient` over the real reqwest transport, so header composition,
//! URL resolution and decoding are checked against an actual HTTP stack.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use mock_server::ServerState;
use nextcloud_config::{
    AuthError, BrowserCapability, BrowserLauncher, BrowserRequest, BrowserSession, ClientConfig,
    ClientError, HttpMethod, LoginCallback, LoginState, NextcloudClient, OcsApiHeader, Rgb,
    SessionKind,
};
use serde::{Deserialize, Serialize};

async fn start_server(state: ServerState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run_with(listener, state));
    format!("http://{addr}")
}

fn client(base: &str) -> NextcloudClient {
    NextcloudClient::new(base, ClientConfig::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

#[tokio::test]
async fn capabilities_over_http() {
    let base = start_server(ServerState::default()).await;
    let caps = client(&base).capabilities().await.unwrap();

    assert!(caps.meta().is_ok());
    let data = caps.data().unwrap();
    assert_eq!(data.version.as_ref().unwrap().string, "28.0.4");
    let theming = data.theming().unwrap();
    assert_eq!(theming.name, "Nextcloud");
    assert_eq!(theming.display_color(), Rgb { r: 0x00, g: 0x82, b: 0xc9 });
}

#[tokio::test]
async fn capabilities_without_theming_app() {
    let base = start_server(ServerState {
        theming: None,
        ..ServerState::default()
    })
    .await;
    let caps = client(&base).capabilities().await.unwrap();
    assert!(caps.data().unwrap().theming().is_none());
}

#[tokio::test]
async fn either_ocs_marker_spelling_is_accepted() {
    let base = start_server(ServerState::default()).await;
    for header in [OcsApiHeader::Standard, OcsApiHeader::Prefixed] {
        let config = ClientConfig::default().with_ocs_header(header);
        let client = NextcloudClient::new(&base, config).unwrap();
        assert!(client.capabilities().await.is_ok(), "{header:?}");
    }
}

#[tokio::test]
async fn base_path_prefix_is_kept() {
    let base = start_server(ServerState::default()).await;
    let err = client(&format!("{base}/nextcloud/")).capabilities().await.unwrap_err();
    assert_eq!(err, ClientError::WrongStatus(404));
}

#[tokio::test]
async fn repeated_and_concurrent_fetches_agree() {
    let base = start_server(ServerState::default()).await;
    let client = client(&base);

    let (a, b, c) = tokio::join!(
        client.capabilities(),
        client.capabilities(),
        client.capabilities()
    );
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}")).capabilities().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Request composition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_headers_reach_the_server() {
    let base = start_server(ServerState::default()).await;
    let config = ClientConfig::default().with_languages(["nl-NL", "en"]);
    let client = NextcloudClient::new(&base, config).unwrap();

    let headers: BTreeMap<String, Vec<String>> = client.fetch("echo/headers").await.unwrap();
    let one = |name: &str| headers.get(name).map(|v| v.as_slice());

    assert_eq!(one("ocs-apirequest"), Some(&["true".to_string()][..]));
    assert_eq!(one("x-ocs-apirequest"), Some(&["true".to_string()][..]));
    assert_eq!(one("accept"), Some(&["application/json".to_string()][..]));
    assert_eq!(
        one("accept-language"),
        Some(&["nl-NL;q=1.0, en;q=0.9".to_string()][..])
    );
    assert_eq!(
        one("accept-encoding"),
        Some(&["br;q=1.0, gzip;q=0.9, deflate;q=0.8".to_string()][..])
    );
    assert_eq!(one("user-agent"), Some(&["NextcloudConfig".to_string()][..]));
    assert!(headers.get("content-type").is_none());
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Note {
    title: String,
    tags: Vec<String>,
    pinned: bool,
}

#[tokio::test]
async fn json_body_round_trips() {
    let base = start_server(ServerState::default()).await;
    let note = Note {
        title: "Groceries".to_string(),
        tags: vec!["home".to_string(), "ünïcode".to_string()],
        pinned: true,
    };
    let echoed: Note = client(&base).post("echo", Some(&note)).await.unwrap();
    assert_eq!(echoed, note);
}

#[tokio::test]
async fn extra_headers_are_sent() {
    let base = start_server(ServerState::default()).await;
    let client = client(&base);
    let request = client
        .requests()
        .build(HttpMethod::Get, "echo/headers")
        .with_header("X-Request-Id", "42");
    let headers: BTreeMap<String, Vec<String>> = client.send(request).await.unwrap();
    assert_eq!(headers["x-request-id"], vec!["42".to_string()]);
}

// ---------------------------------------------------------------------------
// Login flow v2
// ---------------------------------------------------------------------------

/// Launcher that keeps the callback so the test can play the browser.
#[derive(Default)]
struct Handoff {
    request: Mutex<Option<(SessionKind, String, String)>>,
    callback: Mutex<Option<LoginCallback>>,
}

struct NoopBrowser;

impl BrowserSession for NoopBrowser {
    fn start(&mut self) -> bool {
        true
    }

    fn cancel(&mut self) {}
}

impl BrowserLauncher for Handoff {
    fn capability(&self) -> BrowserCapability {
        BrowserCapability::Modern
    }

    fn launch(&self, kind: SessionKind, request: BrowserRequest) -> Box<dyn BrowserSession> {
        *self.request.lock().unwrap() =
            Some((kind, request.url.to_string(), request.callback_scheme));
        *self.callback.lock().unwrap() = Some(request.callback);
        Box::new(NoopBrowser)
    }
}

#[tokio::test]
async fn login_flow_end_to_end() {
    let base = start_server(ServerState::default()).await;
    let launcher = Arc::new(Handoff::default());
    let session = client(&base)
        .login_session(launcher.as_ref(), "nc")
        .await
        .unwrap();

    assert_eq!(session.state(), LoginState::Initiated);
    assert!(session
        .login_url()
        .as_str()
        .starts_with(&format!("{base}/index.php/login/v2/flow/")));
    assert_eq!(session.poll().endpoint, format!("{base}/index.php/login/v2/poll"));
    assert_eq!(session.poll().token.len(), 32);

    let (kind, url, scheme) = launcher.request.lock().unwrap().clone().unwrap();
    assert_eq!(kind, SessionKind::Modern);
    assert_eq!(url, session.login_url().as_str());
    assert_eq!(scheme, "nc");

    session.start().unwrap();
    let callback = launcher.callback.lock().unwrap().take().unwrap();
    callback.complete("nc://login/server:http://cloud&user:alice&password:app-token");

    assert_eq!(
        session.wait().await.unwrap(),
        "nc://login/server:http://cloud&user:alice&password:app-token"
    );
}

#[tokio::test]
async fn login_v2_disabled_is_not_available() {
    let base = start_server(ServerState {
        login_v2: false,
        ..ServerState::default()
    })
    .await;
    let launcher = Handoff::default();
    let err = client(&base).login_session(&launcher, "nc").await.unwrap_err();

    assert_eq!(err, AuthError::V2NotAvailable(ClientError::WrongStatus(404)));
    assert!(launcher.callback.lock().unwrap().is_none());
}
