//! C-ABI wrapper around `nextcloud-config`.
//!
//! # Overview
//! Exposes request building, response decoding and the login flow v2
//! session through `extern "C"` functions, for a native host that runs its
//! own HTTP stack and owns the browser UI. Nothing here does I/O or needs an
//! async runtime.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `nc_build_*` / `nc_parse_*` pair up per endpoint: the host executes the
//!   built request and hands the status and body back.
//! - A single `FfiResult` envelope with `FfiDataTag` + `void* data`
//!   conveys success payloads and errors uniformly.
//! - The browser is a host vtable (`FfiBrowser`); the host reports the
//!   outcome with `nc_login_session_complete`.
//! - The C caller owns all returned pointers and must release them with the
//!   matching `nc_*_free` / `nc_free_*` function.

pub mod types;

use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use nextcloud_config::{
    codec, AppIdentity, BrowserCapability, BrowserLauncher, BrowserRequest, BrowserSession,
    CapabilitiesResponse, Endpoint, HttpMethod, HttpResponse, LoginCallback, LoginInitiation,
    LoginSession, LoginState, PollEndpoint, SessionKind, CAPABILITIES_PATH, LOGIN_V2_PATH,
};

use types::*;

/// Borrow a C string as `&str`. `None` for null or non-UTF-8 input.
fn opt_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client bound to `base_url`.
///
/// Returns null if `base_url` is null or not an absolute http(s) URL.
/// The caller must free the returned pointer with `nc_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nc_client_new(base_url: *const c_char) -> *mut FfiNextcloudClient {
    catch_unwind(|| {
        let Some(url) = opt_str(base_url) else {
            return std::ptr::null_mut();
        };
        match Endpoint::parse(url) {
            Ok(endpoint) => Box::into_raw(Box::new(FfiNextcloudClient::new(endpoint))),
            Err(e) => {
                log::debug!("nc_client_new: {e}");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Set the application identity used in `User-Agent`. Any argument may be
/// null; missing parts render as `Unknown`. Returns `false` if `client` is
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn nc_client_set_identity(
    client: *mut FfiNextcloudClient,
    executable: *const c_char,
    version: *const c_char,
    bundle_id: *const c_char,
    build: *const c_char,
) -> bool {
    catch_unwind(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &mut *client };
        let part = |s| opt_str(s).map(str::to_string);
        let identity = AppIdentity {
            executable: part(executable),
            version: part(version),
            bundle_id: part(bundle_id),
            build: part(build),
        };
        client.reconfigure(|config| config.identity = Some(identity));
        true
    })
    .unwrap_or(false)
}

/// Set the preferred languages, most preferred first. `languages` points to
/// `len` C strings; null entries are skipped. Returns `false` if `client`
/// is null, or `languages` is null while `len` is not zero.
#[unsafe(no_mangle)]
pub extern "C" fn nc_client_set_languages(
    client: *mut FfiNextcloudClient,
    languages: *const *const c_char,
    len: u32,
) -> bool {
    catch_unwind(|| {
        if client.is_null() || (languages.is_null() && len > 0) {
            return false;
        }
        let client = unsafe { &mut *client };
        let tags: Vec<String> = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(languages, len as usize) }
                .iter()
                .filter_map(|&s| opt_str(s))
                .map(str::to_string)
                .collect()
        };
        client.reconfigure(|config| config.languages = tags);
        true
    })
    .unwrap_or(false)
}

/// Choose which OCS marker header(s) requests carry.
#[unsafe(no_mangle)]
pub extern "C" fn nc_client_set_ocs_header(
    client: *mut FfiNextcloudClient,
    header: FfiOcsApiHeader,
) -> bool {
    catch_unwind(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &mut *client };
        client.reconfigure(|config| config.ocs_header = header.into());
        true
    })
    .unwrap_or(false)
}

/// Free a client created by `nc_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nc_client_free(client: *mut FfiNextcloudClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

fn build(client: *const FfiNextcloudClient, method: HttpMethod, path: &str) -> *mut FfiHttpRequest {
    if client.is_null() {
        return std::ptr::null_mut();
    }
    let client = unsafe { &*client };
    let req = client.builder.build(method, path);
    match client.endpoint.resolve(&req.path, &req.query) {
        Ok(url) => FfiHttpRequest::from_core(url.as_str(), req),
        Err(e) => {
            log::debug!("{method} {path}: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Build `GET ocs/v1.php/cloud/capabilities`.
///
/// Returns null if `client` is null.
/// The caller must free the returned pointer with `nc_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn nc_build_capabilities(client: *const FfiNextcloudClient) -> *mut FfiHttpRequest {
    catch_unwind(|| build(client, HttpMethod::Get, CAPABILITIES_PATH))
        .unwrap_or(std::ptr::null_mut())
}

/// Build `POST index.php/login/v2` (no body).
///
/// Returns null if `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn nc_build_login(client: *const FfiNextcloudClient) -> *mut FfiHttpRequest {
    catch_unwind(|| build(client, HttpMethod::Post, LOGIN_V2_PATH)).unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(resp.body) }.to_bytes().to_vec())
    };
    HttpResponse::new(resp.status, body)
}

/// Decode a capabilities response.
///
/// Returns a result with `data_tag = Capabilities` on success, or
/// `data_tag = None` when the envelope carried no data.
#[unsafe(no_mangle)]
pub extern "C" fn nc_parse_capabilities(
    client: *const FfiNextcloudClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiResult::null_arg("response");
        }
        let resp = ffi_response_to_core(unsafe { &*response });
        match codec::decode_envelope::<CapabilitiesResponse>(&resp) {
            Ok(envelope) => match envelope.data() {
                Some(caps) => FfiResult::ok_capabilities(caps),
                None => FfiResult::ok_empty(),
            },
            Err(e) => FfiResult::from_error(e.into()),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in nc_parse_capabilities"))
}

/// Decode a login flow v2 initiation response.
///
/// Returns a result with `data_tag = LoginInitiation` on success.
#[unsafe(no_mangle)]
pub extern "C" fn nc_parse_login(
    client: *const FfiNextcloudClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiResult::null_arg("response");
        }
        let resp = ffi_response_to_core(unsafe { &*response });
        match codec::decode::<LoginInitiation>(&resp) {
            Ok(init) => FfiResult::ok_login(init),
            Err(e) => FfiResult::from_error(e.into()),
        }
    })
    .unwrap_or_else(|_| FfiResult::panic("panic in nc_parse_login"))
}

// ---------------------------------------------------------------------------
// Login session
// ---------------------------------------------------------------------------

type CallbackSlot = Arc<Mutex<Option<LoginCallback>>>;

/// Browser session backed by the host vtable.
struct HostBrowser {
    vtable: FfiBrowser,
    url: CString,
    callback_scheme: CString,
    kind: FfiSessionKind,
}

// SAFETY: the FfiBrowser contract requires the host to accept calls on
// `user_data` from any thread.
unsafe impl Send for HostBrowser {}

impl BrowserSession for HostBrowser {
    fn start(&mut self) -> bool {
        match self.vtable.start {
            Some(start) => unsafe {
                start(
                    self.vtable.user_data,
                    self.url.as_ptr(),
                    self.callback_scheme.as_ptr(),
                    self.kind,
                )
            },
            None => false,
        }
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.vtable.cancel {
            unsafe { cancel(self.vtable.user_data) };
        }
    }
}

impl Drop for HostBrowser {
    fn drop(&mut self) {
        self.vtable.release();
    }
}

/// Hands the vtable to the session it launches, or releases it on drop if
/// no session was launched.
struct HostLauncher {
    vtable: FfiBrowser,
    launched: Cell<bool>,
    slot: CallbackSlot,
}

impl BrowserLauncher for HostLauncher {
    fn capability(&self) -> BrowserCapability {
        self.vtable.capability.into()
    }

    fn launch(&self, kind: SessionKind, request: BrowserRequest) -> Box<dyn BrowserSession> {
        self.launched.set(true);
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(request.callback);
        Box::new(HostBrowser {
            vtable: self.vtable,
            url: CString::new(request.url.as_str()).unwrap_or_default(),
            callback_scheme: CString::new(request.callback_scheme).unwrap_or_default(),
            kind: kind.into(),
        })
    }
}

impl Drop for HostLauncher {
    fn drop(&mut self) {
        if !self.launched.get() {
            self.vtable.release();
        }
    }
}

/// Opaque handle to a login session.
pub struct FfiLoginSession {
    session: LoginSession,
    callback: CallbackSlot,
}

fn set_error(out: *mut FfiErrorCode, code: FfiErrorCode) {
    if !out.is_null() {
        unsafe { *out = code };
    }
}

/// Open a login session for an initiation obtained with `nc_parse_login`.
///
/// Returns null on failure and stores the reason in `out_error` when it is
/// not null. `browser.user_data` is released in every case.
/// The caller must free the returned pointer with `nc_login_session_free`.
#[unsafe(no_mangle)]
pub extern "C" fn nc_login_session_new(
    login_url: *const c_char,
    poll_token: *const c_char,
    poll_endpoint: *const c_char,
    callback_scheme: *const c_char,
    browser: FfiBrowser,
    out_error: *mut FfiErrorCode,
) -> *mut FfiLoginSession {
    let launcher = HostLauncher {
        vtable: browser,
        launched: Cell::new(false),
        slot: CallbackSlot::default(),
    };
    catch_unwind(AssertUnwindSafe(|| {
        let (Some(login), Some(token), Some(endpoint), Some(scheme)) = (
            opt_str(login_url),
            opt_str(poll_token),
            opt_str(poll_endpoint),
            opt_str(callback_scheme),
        ) else {
            set_error(out_error, FfiErrorCode::NullArg);
            return std::ptr::null_mut();
        };
        let initiation = LoginInitiation {
            login: login.to_string(),
            poll: PollEndpoint {
                token: token.to_string(),
                endpoint: endpoint.to_string(),
            },
        };
        match LoginSession::open(initiation, scheme, &launcher) {
            Ok(session) => {
                set_error(out_error, FfiErrorCode::Ok);
                Box::into_raw(Box::new(FfiLoginSession {
                    session,
                    callback: Arc::clone(&launcher.slot),
                }))
            }
            Err(e) => {
                log::debug!("nc_login_session_new: {e}");
                set_error(out_error, FfiErrorCode::from(&e));
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or_else(|_| {
        set_error(out_error, FfiErrorCode::Panic);
        std::ptr::null_mut()
    })
}

/// Present the login page through `FfiBrowser::start`.
///
/// The host may call `nc_login_session_complete` from inside `start`, but
/// not `nc_login_session_cancel`.
#[unsafe(no_mangle)]
pub extern "C" fn nc_login_session_start(session: *const FfiLoginSession) -> FfiErrorCode {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return FfiErrorCode::NullArg;
        }
        let session = unsafe { &*session };
        match session.session.start() {
            Ok(()) => FfiErrorCode::Ok,
            Err(e) => e.into(),
        }
    }))
    .unwrap_or(FfiErrorCode::Panic)
}

/// Cancel the session. A no-op once it has finished. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nc_login_session_cancel(session: *const FfiLoginSession) {
    if !session.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &*session }.session.cancel();
        }));
    }
}

/// Report the browser outcome: the callback URL on success, otherwise an
/// error message (`url` null). Only a started session accepts a report, and
/// only the first one; anything else returns `false` and changes nothing.
#[unsafe(no_mangle)]
pub extern "C" fn nc_login_session_complete(
    session: *const FfiLoginSession,
    url: *const c_char,
    error: *const c_char,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return false;
        }
        let session = unsafe { &*session };
        if session.session.state() != LoginState::Started {
            return false;
        }
        let callback = session
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(callback) = callback else {
            return false;
        };
        match opt_str(url) {
            Some(url) => callback.complete(url),
            None => callback.fail(opt_str(error).unwrap_or("login failed")),
        }
        true
    }))
    .unwrap_or(false)
}

#[unsafe(no_mangle)]
pub extern "C" fn nc_login_session_state(session: *const FfiLoginSession) -> FfiLoginState {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return FfiLoginState::Invalid;
        }
        FfiLoginState::from(&unsafe { &*session }.session.state())
    }))
    .unwrap_or(FfiLoginState::Invalid)
}

/// The callback URL of a completed session, or null.
/// The caller must free the returned string with `nc_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn nc_login_session_callback_url(session: *const FfiLoginSession) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if session.is_null() {
            return std::ptr::null_mut();
        }
        match unsafe { &*session }.session.state() {
            LoginState::Completed { callback_url } => c_string(callback_url),
            _ => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a session. Releases the host browser. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nc_login_session_free(session: *mut FfiLoginSession) {
    if !session.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(session) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a request returned by any `nc_build_*` function. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn nc_free_request(req: *mut FfiHttpRequest) {
    if !req.is_null() {
        let _ = catch_unwind(|| unsafe { FfiHttpRequest::free(req) });
    }
}

/// Free a result returned by any `nc_parse_*` function. Safe to call with
/// null. Uses `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn nc_free_result(result: *mut FfiResult) {
    if !result.is_null() {
        let _ = catch_unwind(|| unsafe { FfiResult::free(result) });
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn nc_free_string(s: *mut c_char) {
    let _ = catch_unwind(|| free_c_string(s));
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
