//! Check request building and response decoding against the JSON vectors in
//! `test-vectors/`.
//!
//! The vectors are shared with host-language bindings, which feed the same
//! cases through the FFI build/parse functions.

use nextcloud_config::{
    decode, decode_envelope, AppIdentity, CapabilitiesResponse, ClientConfig, ClientError,
    HttpMethod, HttpResponse, LoginInitiation, OcsApiHeader, RequestBuilder, CAPABILITIES_PATH,
};
use serde_json::Value;

fn response(case: &Value) -> HttpResponse {
    let status = case["status"].as_u64().unwrap() as u16;
    let body = case["body"].as_str().map(|b| b.as_bytes().to_vec());
    HttpResponse::new(status, body)
}

fn assert_error(name: &str, expected: &str, err: ClientError) {
    match expected {
        "wrong_status" => assert!(matches!(err, ClientError::WrongStatus(_)), "{name}: got {err:?}"),
        "empty_response" => assert_eq!(err, ClientError::EmptyResponse, "{name}"),
        "decode_failure" => {
            assert!(matches!(err, ClientError::DecodeFailure(_)), "{name}: got {err:?}")
        }
        other => panic!("{name}: unknown expected outcome: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

#[test]
fn decode_test_vectors() {
    let raw = include_str!("../../test-vectors/decode.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = case["expected"].as_str().unwrap();
        let response = response(case);

        match case["kind"].as_str().unwrap() {
            "capabilities" => {
                let result = decode_envelope::<CapabilitiesResponse>(&response);
                match expected {
                    "ok" => {
                        let envelope = result.unwrap();
                        let data = envelope.data().unwrap();
                        assert_eq!(
                            data.theming().map(|t| t.name.as_str()),
                            case["theming_name"].as_str(),
                            "{name}: theming name"
                        );
                        assert_eq!(
                            data.version.as_ref().map(|v| v.string.as_str()),
                            case["version"].as_str(),
                            "{name}: version"
                        );
                    }
                    "ok_no_data" => assert!(result.unwrap().data().is_none(), "{name}"),
                    other => assert_error(name, other, result.unwrap_err().into()),
                }
            }
            "login" => {
                let result = decode::<LoginInitiation>(&response);
                match expected {
                    "ok" => {
                        let init = result.unwrap();
                        assert_eq!(init.login, case["login"].as_str().unwrap(), "{name}: login");
                        assert_eq!(init.poll.token, case["poll_token"].as_str().unwrap(), "{name}");
                        assert_eq!(
                            init.poll.endpoint,
                            case["poll_endpoint"].as_str().unwrap(),
                            "{name}"
                        );
                    }
                    other => assert_error(name, other, result.unwrap_err().into()),
                }
            }
            other => panic!("{name}: unknown kind: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Request headers
// ---------------------------------------------------------------------------

fn identity(value: &Value) -> Option<AppIdentity> {
    if value.is_null() {
        return None;
    }
    let field = |key: &str| value[key].as_str().map(str::to_string);
    Some(AppIdentity {
        executable: field("executable"),
        version: field("version"),
        bundle_id: field("bundle_id"),
        build: field("build"),
    })
}

fn ocs_header(value: &str) -> OcsApiHeader {
    match value {
        "standard" => OcsApiHeader::Standard,
        "prefixed" => OcsApiHeader::Prefixed,
        "both" => OcsApiHeader::Both,
        other => panic!("unknown ocs header: {other}"),
    }
}

#[test]
fn header_test_vectors() {
    let raw = include_str!("../../test-vectors/headers.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let languages: Vec<String> = serde_json::from_value(case["languages"].clone()).unwrap();
        let mut config = ClientConfig::default()
            .with_languages(languages)
            .with_ocs_header(ocs_header(case["ocs_header"].as_str().unwrap()));
        config.identity = identity(&case["identity"]);

        let expected: Vec<(String, String)> =
            serde_json::from_value(case["expected_headers"].clone()).unwrap();

        let request = RequestBuilder::new(&config).build(HttpMethod::Get, CAPABILITIES_PATH);
        assert_eq!(request.headers, expected, "{name}: headers");
        assert_eq!(request.path, CAPABILITIES_PATH, "{name}: path");
        assert!(request.body.is_none(), "{name}: body");
    }
}
