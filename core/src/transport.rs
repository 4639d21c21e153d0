//! Transport: executes one `HttpRequest` and returns the raw `HttpResponse`.
//!
//! # Design
//! [`Transport`] is the only seam where I/O happens. [`HttpTransport`] is the
//! reqwest implementation used by default; tests and embedders substitute
//! their own. A transport never retries and never caches: each call is one
//! unary exchange.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect;

use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Pluggable request executor.
///
/// Implementations return `Ok` for every HTTP response regardless of status;
/// only the failure to obtain a response at all is an error.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).execute(request)
    }
}

/// reqwest-backed transport bound to a single [`Endpoint`].
///
/// Cookies live in a private jar, and redirects are only followed while they
/// stay on the endpoint's origin, so no cookie is ever accepted from or sent
/// to another site. The underlying `reqwest::Client` pools connections and is
/// safe to share between concurrent calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint, config: &ClientConfig) -> Result<Self, TransportError> {
        let scope = endpoint.clone();
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if scope.same_origin(attempt.url()) {
                attempt.follow()
            } else {
                log::debug!("not following cross-origin redirect to {}", attempt.url());
                attempt.stop()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_provider(Arc::new(reqwest::cookie::Jar::default()))
            .redirect(policy)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self
            .endpoint
            .resolve(&request.path, &request.query)
            .map_err(|e| match e {
                ClientError::InvalidUrl(msg) => TransportError::InvalidUrl(msg),
                other => TransportError::InvalidUrl(other.to_string()),
            })?;
        log::debug!("{} {}", request.method, url);
        log::trace!("request headers: {:?}", request.headers);

        let headers = header_map(&request.headers)?;
        let mut builder = self
            .client
            .request(reqwest_method(request.method), url.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            log::debug!("{} {} failed: {e}", request.method, url);
            TransportError::Network(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        log::debug!("{} {} -> {status} ({} bytes)", request.method, url, bytes.len());

        let response = HttpResponse {
            status,
            headers,
            body: (!bytes.is_empty()).then(|| bytes.to_vec()),
            request: Some(request),
        };
        if let Some(text) = response.body_text() {
            log::trace!("response body: {text}");
        }
        Ok(response)
    }
}

/// Repeated names are kept in order.
fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let key = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(format!("bad header name {name:?}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(format!("bad value for header {name}")))?;
        map.append(key, value);
    }
    Ok(map)
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Trace => reqwest::Method::TRACE,
        HttpMethod::Connect => reqwest::Method::CONNECT,
    }
}
