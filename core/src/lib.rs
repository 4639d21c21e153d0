//! Client SDK for the Nextcloud capabilities and login flow v2 APIs.
//!
//! # Overview
//! A call goes through three stages: [`RequestBuilder`] produces a plain-data
//! [`HttpRequest`], a [`Transport`] executes it, and the codec turns the
//! [`HttpResponse`] into a typed value. [`NextcloudClient`] wires the three
//! together and maps every failure onto [`ClientError`].
//!
//! # Design
//! - Building and decoding are pure; only the transport does I/O. Hosts that
//!   run their own HTTP stack (see the FFI crate) use the two halves
//!   directly.
//! - Application identity and languages are injected through
//!   [`ClientConfig`] at construction, never read during a call.
//! - Flat and OCS-wrapped responses have separate decode entry points that
//!   share the same status/body guard.
//! - The browser used for login is a collaborator behind
//!   [`BrowserLauncher`]; [`LoginSession`] owns the handshake state.
//!
//! ```no_run
//! use nextcloud_config::{ClientConfig, NextcloudClient};
//!
//! # async fn run() -> Result<(), nextcloud_config::ClientError> {
//! let client = NextcloudClient::new("https://cloud.example.com", ClientConfig::from_env())?;
//! let caps = client.capabilities().await?;
//! if let Some(theming) = caps.data().and_then(|d| d.theming()) {
//!     println!("{} - {} ({})", theming.name, theming.slogan, theming.display_color());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod codec;
pub mod color;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod request;
pub mod transport;
pub mod types;

pub use auth::{
    BrowserCapability, BrowserLauncher, BrowserRequest, BrowserSession, LoginCallback,
    LoginFailure, LoginSession, LoginState, SessionKind,
};
pub use client::{NextcloudClient, CAPABILITIES_PATH, LOGIN_V2_PATH};
pub use codec::{decode, decode_envelope, Envelope, Meta, OcsBody};
pub use color::Rgb;
pub use config::{AppIdentity, ClientConfig, OcsApiHeader};
pub use endpoint::Endpoint;
pub use error::{AuthError, ClientError, DecodeError, SessionError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use request::RequestBuilder;
pub use transport::{HttpTransport, Transport};
pub use types::{
    Capabilities, CapabilitiesResponse, CoreCapabilities, LoginInitiation, PollEndpoint,
    ThemingCapabilities, Version,
};
