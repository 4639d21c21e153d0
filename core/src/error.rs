//! Error types for the Nextcloud client.
//!
//! # Design
//! Each layer has its own error: [`TransportError`] for the network hop,
//! [`DecodeError`] for the envelope codec. Both convert into the closed
//! [`ClientError`] taxonomy, which is the only error type the facade
//! returns. The login handshake adds [`AuthError`] for terminal outcomes and
//! [`SessionError`] for misuse of a [`LoginSession`](crate::auth::LoginSession).

use thiserror::Error;

/// Failures of a single transport round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint and the request path do not form a valid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name or value cannot go on the wire. Nothing was sent.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// No HTTP response was obtained (DNS, TLS, reset, timeout, ...).
    #[error("network error: {0}")]
    Network(String),
}

/// Failures of the envelope codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The status is outside 200..=299. The body is never inspected.
    #[error("unexpected HTTP status {0}")]
    WrongStatus(u16),

    /// A 2xx response without body bytes.
    #[error("response has no body")]
    EmptyResponse,

    /// The body is not JSON of the expected shape.
    #[error("malformed response body: {0}")]
    Malformed(String),
}

/// Errors returned by [`NextcloudClient`](crate::client::NextcloudClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    WrongStatus(u16),

    #[error("empty response")]
    EmptyResponse,

    #[error("decoding failed: {0}")]
    DecodeFailure(String),

    #[error("encoding failed: {0}")]
    EncodingFailure(String),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidUrl(msg) => ClientError::InvalidUrl(msg),
            TransportError::InvalidHeader(msg) => ClientError::EncodingFailure(msg),
            TransportError::Network(msg) => ClientError::Network(msg),
        }
    }
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::WrongStatus(status) => ClientError::WrongStatus(status),
            DecodeError::EmptyResponse => ClientError::EmptyResponse,
            DecodeError::Malformed(msg) => ClientError::DecodeFailure(msg),
        }
    }
}

/// Terminal outcomes of the login flow v2 handshake. None of them is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The login initiation request failed or returned an unexpected shape.
    #[error("login flow v2 is not available: {0}")]
    V2NotAvailable(#[source] ClientError),

    /// The browser session reported an error instead of a callback URL.
    #[error("login failed: {0}")]
    InvalidLogin(String),

    /// No browser session can be presented on this host.
    #[error("no browser session available")]
    BrowserUnavailable,

    /// The session was cancelled by the caller.
    #[error("login cancelled")]
    Cancelled,
}

/// Misuse of a login session. The session state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("session was cancelled")]
    Cancelled,

    #[error("session already finished")]
    Finished,

    /// The browser collaborator refused to start. Unlike the other variants
    /// this one moves the session to `Failed`.
    #[error("browser session failed to start")]
    LaunchFailed,
}
