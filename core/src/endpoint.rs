//! The server base URL a client is bound to.

use std::fmt;

use url::{Origin, Url};

use crate::error::ClientError;

/// Absolute `http`/`https` base URL, e.g. `https://cloud.example.com/nextcloud`.
///
/// Request paths are appended to the endpoint's path prefix segment by
/// segment, so the prefix is never replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    pub fn parse(base_url: &str) -> Result<Self, ClientError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        Self::from_url(base)
    }

    pub fn from_url(base: Url) -> Result<Self, ClientError> {
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "{base}: scheme must be http or https"
            )));
        }
        if base.host_str().is_none_or(str::is_empty) {
            return Err(ClientError::InvalidUrl(format!("{base}: missing host")));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(ClientError::InvalidUrl(format!(
                "{base}: base URL must not carry a query or fragment"
            )));
        }
        Ok(Self { base })
    }

    pub fn as_url(&self) -> &Url {
        &self.base
    }

    pub fn origin(&self) -> Origin {
        self.base.origin()
    }

    /// Whether `url` shares scheme, host and port with this endpoint.
    pub fn same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
    }

    /// Append `path` and then `query` to the base URL.
    ///
    /// `path` must be relative: schemes, `?`, `#` and `.`/`..` segments are
    /// rejected with [`ClientError::InvalidUrl`]. Empty segments are skipped.
    pub fn resolve(&self, path: &str, query: &[(String, String)]) -> Result<Url, ClientError> {
        if path.contains("://") || path.contains(['?', '#']) {
            return Err(ClientError::InvalidUrl(format!(
                "{path:?} is not a relative path"
            )));
        }

        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ClientError::InvalidUrl(format!("{} cannot be a base", self.base)))?;
            segments.pop_if_empty();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                if segment == "." || segment == ".." {
                    return Err(ClientError::InvalidUrl(format!(
                        "{path:?} escapes the endpoint path"
                    )));
                }
                segments.push(segment);
            }
        }

        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt(f)
    }
}
