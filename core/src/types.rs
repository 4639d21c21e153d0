//! Wire DTOs for the capabilities and login flow v2 endpoints.
//!
//! Unknown fields are ignored. Sub-objects a server may leave out (an
//! instance without the theming app has no `theming` block) are optional;
//! the fields inside a present object are required.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// Payload of `GET ocs/v1.php/cloud/capabilities`, inside the OCS envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    pub version: Option<Version>,
    pub capabilities: Option<Capabilities>,
}

impl CapabilitiesResponse {
    pub fn theming(&self) -> Option<&ThemingCapabilities> {
        self.capabilities.as_ref()?.theming.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub string: String,
    #[serde(default)]
    pub edition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub core: Option<CoreCapabilities>,
    pub theming: Option<ThemingCapabilities>,
}

/// Present but not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreCapabilities {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemingCapabilities {
    pub name: String,
    pub url: String,
    pub logo: String,
    pub background: String,
    pub slogan: String,
    /// Hex colour such as `#0082c9`.
    pub color: String,
}

impl ThemingCapabilities {
    /// The brand colour, or black when the server value does not parse.
    pub fn display_color(&self) -> Rgb {
        Rgb::parse(&self.color).unwrap_or_default()
    }
}

/// Response of `POST index.php/login/v2`. Not OCS-wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInitiation {
    /// One-time URL to open in the browser.
    pub login: String,
    pub poll: PollEndpoint,
}

/// Token and URL for polling the outcome of a login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollEndpoint {
    pub token: String,
    pub endpoint: String,
}
