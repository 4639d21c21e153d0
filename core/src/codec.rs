//! Envelope codec: status and body checks, then JSON decoding.
//!
//! # Design
//! Two entry points share one guard. [`decode`] reads a flat JSON document
//! into `T`; [`decode_envelope`] reads the OCS wrapper
//! `{"ocs":{"data":...,"meta":{...}}}`. The guard rejects any status outside
//! 200..=299 before the body is looked at, then rejects a missing body.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DecodeError;
use crate::http::HttpResponse;

/// The OCS wrapper returned by `/ocs/v1.php` and `/ocs/v2.php` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Envelope<T> {
    pub ocs: OcsBody<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct OcsBody<T> {
    /// `None` when the server sent no payload. Not an error.
    #[serde(default, deserialize_with = "ocs_data")]
    pub data: Option<T>,
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub status: String,
    pub statuscode: i64,
    pub message: String,
    #[serde(default, rename = "totalitems", skip_serializing_if = "Option::is_none")]
    pub total_items: Option<String>,
    #[serde(default, rename = "itemsperpage", skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<String>,
}

impl Meta {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl<T> Envelope<T> {
    pub fn data(&self) -> Option<&T> {
        self.ocs.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.ocs.data
    }

    pub fn meta(&self) -> &Meta {
        &self.ocs.meta
    }
}

/// `null`, or an empty array that is not itself a valid `T`, means "no data".
fn ocs_data<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    let empty_array = value.as_array().is_some_and(Vec::is_empty);
    match serde_json::from_value::<T>(value) {
        Ok(data) => Ok(Some(data)),
        Err(_) if empty_array => Ok(None),
        Err(e) => Err(serde::de::Error::custom(e)),
    }
}

/// Check status range and body presence; return the body bytes.
fn guard(response: &HttpResponse) -> Result<&[u8], DecodeError> {
    if !(200..=299).contains(&response.status) {
        return Err(DecodeError::WrongStatus(response.status));
    }
    match response.body.as_deref() {
        Some(body) if !body.is_empty() => Ok(body),
        _ => Err(DecodeError::EmptyResponse),
    }
}

/// Decode a flat JSON body into `T`.
pub fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, DecodeError> {
    let body = guard(response)?;
    serde_json::from_slice(body).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Decode an OCS-wrapped body into `Envelope<T>`.
pub fn decode_envelope<T: DeserializeOwned>(
    response: &HttpResponse,
) -> Result<Envelope<T>, DecodeError> {
    decode::<Envelope<T>>(response)
}
