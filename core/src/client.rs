//! Client facade: build, execute, decode.
//!
//! # Design
//! `NextcloudClient` holds only immutable data: the bound [`Endpoint`], the
//! pre-rendered default headers and a transport handle. Every call is an
//! independent exchange, so calls may run concurrently from any number of
//! tasks with no ordering between them. Lower-layer errors are converted to
//! [`ClientError`] before they leave this module.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{BrowserLauncher, LoginSession};
use crate::codec::{self, Envelope};
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{AuthError, ClientError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::request::RequestBuilder;
use crate::transport::{HttpTransport, Transport};
use crate::types::{CapabilitiesResponse, LoginInitiation};

/// Server version and theming, OCS-wrapped.
pub const CAPABILITIES_PATH: &str = "ocs/v1.php/cloud/capabilities";

/// Login flow v2 initiation. Flat JSON.
pub const LOGIN_V2_PATH: &str = "index.php/login/v2";

#[derive(Debug, Clone)]
pub struct NextcloudClient<T = HttpTransport> {
    endpoint: Endpoint,
    builder: RequestBuilder,
    transport: T,
}

impl NextcloudClient<HttpTransport> {
    /// Client for `base_url` using the reqwest transport.
    pub fn new(base_url: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let endpoint = Endpoint::parse(base_url)?;
        let transport = HttpTransport::new(endpoint.clone(), &config)?;
        Ok(Self::with_transport(endpoint, &config, transport))
    }
}

impl<T: Transport> NextcloudClient<T> {
    pub fn with_transport(endpoint: Endpoint, config: &ClientConfig, transport: T) -> Self {
        Self {
            endpoint,
            builder: RequestBuilder::new(config),
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Builder for requests that need extra headers or query pairs; pass the
    /// result to [`send`](Self::send) or [`send_ocs`](Self::send_ocs).
    pub fn requests(&self) -> &RequestBuilder {
        &self.builder
    }

    /// `GET path`, flat JSON response.
    pub async fn fetch<R: DeserializeOwned>(&self, path: &str) -> Result<R, ClientError> {
        self.send(self.builder.build(HttpMethod::Get, path)).await
    }

    /// `GET path`, OCS-wrapped response.
    pub async fn fetch_ocs<R: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Envelope<R>, ClientError> {
        self.send_ocs(self.builder.build(HttpMethod::Get, path)).await
    }

    /// `POST path` with an optional JSON body, flat JSON response.
    pub async fn post<R, B>(&self, path: &str, body: Option<&B>) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = match body {
            Some(body) => self.builder.build_json(HttpMethod::Post, path, body)?,
            None => self.builder.build(HttpMethod::Post, path),
        };
        self.send(request).await
    }

    /// `POST path` without a body.
    pub async fn post_empty<R: DeserializeOwned>(&self, path: &str) -> Result<R, ClientError> {
        self.send(self.builder.build(HttpMethod::Post, path)).await
    }

    pub async fn send<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, ClientError> {
        let response = self.exchange(request).await?;
        codec::decode(&response).map_err(|e| log_decode_error(&response, e.into()))
    }

    pub async fn send_ocs<R: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<Envelope<R>, ClientError> {
        let response = self.exchange(request).await?;
        codec::decode_envelope(&response).map_err(|e| log_decode_error(&response, e.into()))
    }

    /// Server version and theming.
    pub async fn capabilities(&self) -> Result<Envelope<CapabilitiesResponse>, ClientError> {
        self.fetch_ocs(CAPABILITIES_PATH).await
    }

    /// Ask the server for a one-time login URL and poll credentials.
    pub async fn initiate_login(&self) -> Result<LoginInitiation, AuthError> {
        self.post_empty(LOGIN_V2_PATH)
            .await
            .map_err(AuthError::V2NotAvailable)
    }

    /// Initiate login flow v2 and open (but not start) a browser session
    /// for it.
    pub async fn login_session<L>(
        &self,
        launcher: &L,
        callback_scheme: &str,
    ) -> Result<LoginSession, AuthError>
    where
        L: BrowserLauncher + ?Sized,
    {
        let initiation = self.initiate_login().await?;
        LoginSession::open(initiation, callback_scheme, launcher)
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let method = request.method;
        let path = request.path.clone();
        self.transport.execute(request).await.map_err(|e| {
            log::debug!("{method} {path}: {e}");
            ClientError::from(e)
        })
    }
}

fn log_decode_error(response: &HttpResponse, err: ClientError) -> ClientError {
    let target = response
        .request
        .as_ref()
        .map(|r| format!("{} {}", r.method, r.path))
        .unwrap_or_default();
    match &err {
        ClientError::DecodeFailure(_) => log::warn!("{target}: {err}"),
        _ => log::debug!("{target}: {err}"),
    }
    if let Some(body) = response.body_text() {
        log::trace!("{target}: body {body}");
    }
    err
}
