//! Drive the C ABI the way a native host does: build a request, execute it
//! with the host's own HTTP stack (ureq here), hand the response back.
//!
//! # Design
//! Starts the mock server on a random port in a background thread, then
//! goes through capabilities, login initiation and a login session without
//! touching the core crate directly.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::atomic::{AtomicUsize, Ordering};

use nextcloud_config_ffi::types::*;
use nextcloud_config_ffi::*;

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn str_of<'a>(p: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(p) }.to_str().unwrap()
}

/// Execute an `FfiHttpRequest` with ureq. 4xx/5xx come back as data.
/// Returns the status and the body, `None` when the body is empty.
fn execute(req: *mut FfiHttpRequest) -> (u16, Option<CString>) {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();

    let r = unsafe { &*req };
    let url = str_of(r.url);
    let headers = unsafe { std::slice::from_raw_parts(r.headers, r.headers_len as usize) };
    let body: &[u8] = if r.body.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(r.body, r.body_len as usize) }
    };

    let mut response = match r.method {
        FfiHttpMethod::Get => {
            let mut builder = agent.get(url);
            for h in headers {
                builder = builder.header(str_of(h.key), str_of(h.value));
            }
            builder.call()
        }
        FfiHttpMethod::Post => {
            let mut builder = agent.post(url);
            for h in headers {
                builder = builder.header(str_of(h.key), str_of(h.value));
            }
            if body.is_empty() {
                builder.send_empty()
            } else {
                builder.send(body)
            }
        }
        _ => panic!("unexpected method"),
    }
    .expect("HTTP transport error");
    nc_free_request(req);

    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string().unwrap_or_default();
    let body = (!text.is_empty()).then(|| CString::new(text).unwrap());
    (status, body)
}

fn parse(
    parse: extern "C" fn(*const FfiNextcloudClient, *const FfiHttpResponse) -> *mut FfiResult,
    client: *const FfiNextcloudClient,
    (status, body): (u16, Option<CString>),
) -> *mut FfiResult {
    let resp = FfiHttpResponse {
        status,
        body: body.as_ref().map_or(std::ptr::null(), |b| b.as_ptr()),
    };
    parse(client, &resp)
}

#[derive(Default)]
struct Host {
    started: AtomicUsize,
    released: AtomicUsize,
}

unsafe extern "C" fn host_start(
    user_data: *mut c_void,
    _url: *const c_char,
    _scheme: *const c_char,
    _kind: FfiSessionKind,
) -> bool {
    let host = unsafe { &*(user_data as *const Host) };
    host.started.fetch_add(1, Ordering::SeqCst);
    true
}

unsafe extern "C" fn host_release(user_data: *mut c_void) {
    let host = unsafe { &*(user_data as *const Host) };
    host.released.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn capabilities_and_login_over_host_http() {
    let base = start_server();
    let base_c = CString::new(base.as_str()).unwrap();
    let client = nc_client_new(base_c.as_ptr());
    assert!(!client.is_null());

    // Step 1: capabilities.
    let req = nc_build_capabilities(client);
    let result = parse(nc_parse_capabilities, client, execute(req));
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::Ok);
    assert_eq!(r.data_tag, FfiDataTag::Capabilities);
    let caps = unsafe { &*(r.data as *const FfiCapabilities) };
    assert_eq!(str_of(caps.version_string), "28.0.4");
    let theming = unsafe { &*caps.theming };
    assert_eq!(str_of(theming.name), "Nextcloud");
    assert_eq!(theming.display_color, FfiRgb { r: 0x00, g: 0x82, b: 0xc9 });
    nc_free_result(result);

    // Step 2: login initiation.
    let req = nc_build_login(client);
    let result = parse(nc_parse_login, client, execute(req));
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::Ok);
    let init = unsafe { &*(r.data as *const FfiLoginInitiation) };
    assert!(str_of(init.login).starts_with(&format!("{base}/index.php/login/v2/flow/")));
    assert_eq!(str_of(init.poll_endpoint), format!("{base}/index.php/login/v2/poll"));

    // Step 3: a session for that initiation, completed by the host.
    let host = Host::default();
    let scheme = CString::new("nc").unwrap();
    let mut code = FfiErrorCode::Panic;
    let session = nc_login_session_new(
        init.login,
        init.poll_token,
        init.poll_endpoint,
        scheme.as_ptr(),
        FfiBrowser {
            user_data: &host as *const Host as *mut c_void,
            capability: FfiBrowserCapability::Modern,
            start: Some(host_start),
            cancel: None,
            release: Some(host_release),
        },
        &mut code,
    );
    nc_free_result(result);
    assert_eq!(code, FfiErrorCode::Ok);

    assert_eq!(nc_login_session_start(session), FfiErrorCode::Ok);
    assert_eq!(host.started.load(Ordering::SeqCst), 1);
    let callback = CString::new("nc://login/server:x&user:alice&password:secret").unwrap();
    assert!(nc_login_session_complete(session, callback.as_ptr(), std::ptr::null()));
    assert_eq!(nc_login_session_state(session), FfiLoginState::Completed);

    nc_login_session_free(session);
    assert_eq!(host.released.load(Ordering::SeqCst), 1);
    nc_client_free(client);
}

#[test]
fn unknown_base_path_is_wrong_status() {
    let base = start_server();
    let base_c = CString::new(format!("{base}/not-nextcloud")).unwrap();
    let client = nc_client_new(base_c.as_ptr());

    let req = nc_build_capabilities(client);
    let result = parse(nc_parse_capabilities, client, execute(req));
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::WrongStatus);
    assert_eq!(r.http_status, 404);
    nc_free_result(result);
    nc_client_free(client);
}
