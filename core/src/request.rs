//! Request builder: default headers plus optional JSON body.
//!
//! # Design
//! `RequestBuilder` renders the default header list once from a
//! [`ClientConfig`] and stamps it onto every request. It performs no I/O and
//! reads no global state, so the same inputs always give the same request.

use serde::Serialize;

use crate::config::{AppIdentity, ClientConfig};
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest};

/// `User-Agent` used when the host application supplied no identity.
pub const SDK_USER_AGENT: &str = "NextcloudConfig";

/// Content codings offered in `Accept-Encoding`, most preferred first.
pub const ACCEPTED_ENCODINGS: [&str; 3] = ["br", "gzip", "deflate"];

/// At most this many language tags go into `Accept-Language`.
pub const MAX_LANGUAGES: usize = 6;

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    defaults: Vec<(String, String)>,
}

impl RequestBuilder {
    pub fn new(config: &ClientConfig) -> Self {
        let mut defaults: Vec<(String, String)> = config
            .ocs_header
            .names()
            .iter()
            .map(|name| (name.to_string(), "true".to_string()))
            .collect();
        defaults.push(("Accept".to_string(), "application/json".to_string()));
        defaults.push((
            "Accept-Language".to_string(),
            quality_encoded(config.languages.iter().take(MAX_LANGUAGES)),
        ));
        defaults.push((
            "Accept-Encoding".to_string(),
            quality_encoded(ACCEPTED_ENCODINGS),
        ));
        defaults.push((
            "User-Agent".to_string(),
            user_agent(config.identity.as_ref()),
        ));
        Self { defaults }
    }

    /// Default headers in the order they are sent.
    pub fn default_headers(&self) -> &[(String, String)] {
        &self.defaults
    }

    /// A request without a body.
    pub fn build(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            path: path.to_string(),
            query: Vec::new(),
            headers: self.defaults.clone(),
            body: None,
        }
    }

    /// A request whose body is `body` serialized as JSON.
    pub fn build_json<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<HttpRequest, ClientError> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| ClientError::EncodingFailure(e.to_string()))?;
        let mut request = self.build(method, path);
        request
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        request.body = Some(bytes);
        Ok(request)
    }
}

/// Render `items` as a quality-weighted header value.
///
/// Weights start at 1.0 and drop by 0.1 per position with no floor, so an
/// eleventh item gets `q=0.0` and a twelfth `q=-0.1`.
pub fn quality_encoded<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let tenths = 10 - index as i64;
            format!("{};q={:.1}", item.as_ref(), tenths as f64 / 10.0)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `{executable}/{version} ({bundle_id}; build:{build})`, with `Unknown` for
/// missing parts, or [`SDK_USER_AGENT`] without an identity.
pub fn user_agent(identity: Option<&AppIdentity>) -> String {
    let Some(identity) = identity else {
        return SDK_USER_AGENT.to_string();
    };
    let part = |value: &Option<String>| value.clone().unwrap_or_else(|| "Unknown".to_string());
    format!(
        "{}/{} ({}; build:{})",
        part(&identity.executable),
        part(&identity.version),
        part(&identity.bundle_id),
        part(&identity.build),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcsApiHeader;

    fn builder() -> RequestBuilder {
        RequestBuilder::new(
            &ClientConfig::default()
                .with_languages(["nl-NL", "en"])
                .with_identity(AppIdentity::new("Notes", "2.1.0", "org.example.notes", "77")),
        )
    }

    #[test]
    fn default_headers_in_order() {
        let req = builder().build(HttpMethod::Get, "ocs/v1.php/cloud/capabilities");
        let names: Vec<&str> = req.headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "OCS-APIRequest",
                "X-OCS-APIRequest",
                "Accept",
                "Accept-Language",
                "Accept-Encoding",
                "User-Agent"
            ]
        );
        assert_eq!(req.header("OCS-APIRequest"), Some("true"));
        assert_eq!(req.header("Accept-Language"), Some("nl-NL;q=1.0, en;q=0.9"));
        assert_eq!(req.header("Accept-Encoding"), Some("br;q=1.0, gzip;q=0.9, deflate;q=0.8"));
        assert_eq!(req.header("User-Agent"), Some("Notes/2.1.0 (org.example.notes; build:77)"));
        assert!(req.header("Content-Type").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn marker_header_is_configurable() {
        let b = RequestBuilder::new(&ClientConfig::default().with_ocs_header(OcsApiHeader::Standard));
        let req = b.build(HttpMethod::Get, "x");
        assert_eq!(req.header("OCS-APIRequest"), Some("true"));
        assert!(req.header("X-OCS-APIRequest").is_none());
    }

    #[test]
    fn json_body_adds_content_type_last() {
        #[derive(Serialize)]
        struct Note<'a> {
            title: &'a str,
        }
        let req = builder()
            .build_json(HttpMethod::Post, "apps/notes/api/v1/notes", &Note { title: "hi" })
            .unwrap();
        assert_eq!(
            req.headers.last(),
            Some(&("Content-Type".to_string(), "application/json".to_string()))
        );
        assert_eq!(req.body.as_deref(), Some(br#"{"title":"hi"}"#.as_slice()));
    }

    #[test]
    fn unserializable_body_is_an_encoding_failure() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON object keys");
        let err = builder().build_json(HttpMethod::Post, "x", &map).unwrap_err();
        assert!(matches!(err, ClientError::EncodingFailure(_)));
    }

    #[test]
    fn only_six_languages_are_sent() {
        let langs = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let b = RequestBuilder::new(&ClientConfig::default().with_languages(langs));
        let req = b.build(HttpMethod::Get, "x");
        assert_eq!(
            req.header("Accept-Language"),
            Some("a;q=1.0, b;q=0.9, c;q=0.8, d;q=0.7, e;q=0.6, f;q=0.5")
        );
    }

    #[test]
    fn quality_strictly_decreases_for_ten_items() {
        let items: Vec<String> = (0..10).map(|i| format!("t{i}")).collect();
        let encoded = quality_encoded(&items);
        let weights: Vec<f64> = encoded
            .split(", ")
            .map(|part| part.split_once(";q=").unwrap().1.parse().unwrap())
            .collect();
        assert_eq!(weights.len(), 10);
        assert_eq!(weights[0], 1.0);
        for pair in weights.windows(2) {
            assert!(((pair[0] - pair[1]) - 0.1).abs() < 1e-9);
        }
    }

    #[test]
    fn quality_goes_non_positive_past_ten() {
        let items: Vec<String> = (0..12).map(|i| format!("t{i}")).collect();
        let encoded = quality_encoded(&items);
        assert!(encoded.ends_with("t10;q=0.0, t11;q=-0.1"));
    }

    #[test]
    fn empty_language_list_gives_empty_header() {
        assert_eq!(quality_encoded(Vec::<String>::new()), "");
    }

    #[test]
    fn user_agent_falls_back() {
        assert_eq!(user_agent(None), SDK_USER_AGENT);
        let partial = AppIdentity {
            executable: Some("Notes".to_string()),
            ..AppIdentity::default()
        };
        assert_eq!(user_agent(Some(&partial)), "Notes/Unknown (Unknown; build:Unknown)");
    }
}
