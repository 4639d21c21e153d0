//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with C-compatible fields: `*mut c_char`
//! for strings, raw pointer plus length for lists, and enums with explicit
//! discriminants. Conversions live here so `lib.rs` stays focused on the
//! `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use nextcloud_config::{
    AuthError, BrowserCapability, CapabilitiesResponse, ClientConfig, ClientError, Endpoint,
    HttpMethod, HttpRequest, LoginInitiation, LoginState, OcsApiHeader, RequestBuilder,
    SessionError, SessionKind,
};

/// Owned C string, cut at the first NUL byte. Decoded JSON may carry
/// `\u0000`, which a C string cannot hold.
pub(crate) fn c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    let mut bytes = s.into();
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }
    CString::new(bytes).unwrap_or_default().into_raw()
}

pub(crate) fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Opaque handle to a configured client. C callers receive a pointer to
/// this and pass it back into every `nc_build_*` / `nc_parse_*` function.
pub struct FfiNextcloudClient {
    pub(crate) endpoint: Endpoint,
    pub(crate) config: ClientConfig,
    pub(crate) builder: RequestBuilder,
}

impl FfiNextcloudClient {
    pub(crate) fn new(endpoint: Endpoint) -> Self {
        let config = ClientConfig::default();
        Self {
            builder: RequestBuilder::new(&config),
            endpoint,
            config,
        }
    }

    /// Change the configuration and re-render the default headers.
    pub(crate) fn reconfigure(&mut self, apply: impl FnOnce(&mut ClientConfig)) {
        apply(&mut self.config);
        self.builder = RequestBuilder::new(&self.config);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiOcsApiHeader {
    Standard = 0,
    Prefixed = 1,
    Both = 2,
}

impl From<FfiOcsApiHeader> for OcsApiHeader {
    fn from(h: FfiOcsApiHeader) -> Self {
        match h {
            FfiOcsApiHeader::Standard => OcsApiHeader::Standard,
            FfiOcsApiHeader::Prefixed => OcsApiHeader::Prefixed,
            FfiOcsApiHeader::Both => OcsApiHeader::Both,
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Put = 1,
    Post = 2,
    Delete = 3,
    Head = 4,
    Options = 5,
    Trace = 6,
    Connect = 7,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Delete => FfiHttpMethod::Delete,
            HttpMethod::Head => FfiHttpMethod::Head,
            HttpMethod::Options => FfiHttpMethod::Options,
            HttpMethod::Trace => FfiHttpMethod::Trace,
            HttpMethod::Connect => FfiHttpMethod::Connect,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// `url` is absolute. `body` is null when the request has none; otherwise
/// it points to `body_len` bytes.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut u8,
    pub body_len: u32,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(url: &str, req: HttpRequest) -> *mut Self {
        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k),
                    value: c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        let (body, body_len) = match req.body {
            Some(bytes) => {
                let len = bytes.len() as u32;
                (Box::into_raw(bytes.into_boxed_slice()) as *mut u8, len)
            }
            None => (std::ptr::null_mut(), 0),
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: c_string(url),
            headers,
            headers_len,
            body,
            body_len,
        }))
    }

    /// Release everything `from_core` allocated.
    pub(crate) unsafe fn free(req: *mut Self) {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        if !req.headers.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(req.headers, req.headers_len as usize);
            let headers = unsafe { Box::from_raw(slice) };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
        if !req.body.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(req.body, req.body_len as usize);
            drop(unsafe { Box::from_raw(slice) });
        }
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller builds this after executing the request and passes a
/// pointer to an `nc_parse_*` function. A null `body` means the response had
/// none. The FFI layer reads but does not free these fields.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidUrl = 1,
    Network = 2,
    WrongStatus = 3,
    EmptyResponse = 4,
    DecodeFailure = 5,
    EncodingFailure = 6,
    V2NotAvailable = 7,
    InvalidLogin = 8,
    BrowserUnavailable = 9,
    Cancelled = 10,
    AlreadyStarted = 11,
    Finished = 12,
    LaunchFailed = 13,
    Panic = 14,
    NullArg = 15,
}

impl From<&ClientError> for FfiErrorCode {
    fn from(e: &ClientError) -> Self {
        match e {
            ClientError::InvalidUrl(_) => FfiErrorCode::InvalidUrl,
            ClientError::Network(_) => FfiErrorCode::Network,
            ClientError::WrongStatus(_) => FfiErrorCode::WrongStatus,
            ClientError::EmptyResponse => FfiErrorCode::EmptyResponse,
            ClientError::DecodeFailure(_) => FfiErrorCode::DecodeFailure,
            ClientError::EncodingFailure(_) => FfiErrorCode::EncodingFailure,
        }
    }
}

impl From<&AuthError> for FfiErrorCode {
    fn from(e: &AuthError) -> Self {
        match e {
            AuthError::V2NotAvailable(_) => FfiErrorCode::V2NotAvailable,
            AuthError::InvalidLogin(_) => FfiErrorCode::InvalidLogin,
            AuthError::BrowserUnavailable => FfiErrorCode::BrowserUnavailable,
            AuthError::Cancelled => FfiErrorCode::Cancelled,
        }
    }
}

impl From<SessionError> for FfiErrorCode {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::AlreadyStarted => FfiErrorCode::AlreadyStarted,
            SessionError::Cancelled => FfiErrorCode::Cancelled,
            SessionError::Finished => FfiErrorCode::Finished,
            SessionError::LaunchFailed => FfiErrorCode::LaunchFailed,
        }
    }
}

/// Tag that tells `nc_free_result` what `FfiResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    Capabilities = 1,
    LoginInitiation = 2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FfiRgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[repr(C)]
pub struct FfiTheming {
    pub name: *mut c_char,
    pub url: *mut c_char,
    pub logo: *mut c_char,
    pub background: *mut c_char,
    pub slogan: *mut c_char,
    pub color: *mut c_char,
    /// `color` parsed, black if it does not parse.
    pub display_color: FfiRgb,
}

/// Capabilities payload. `version_string` is null when the server sent no
/// version; `theming` is null when the theming app is absent.
#[repr(C)]
pub struct FfiCapabilities {
    pub version_major: u32,
    pub version_minor: u32,
    pub version_micro: u32,
    pub version_string: *mut c_char,
    pub theming: *mut FfiTheming,
}

impl FfiCapabilities {
    fn from_core(caps: &CapabilitiesResponse) -> Self {
        let (major, minor, micro, string) = match &caps.version {
            Some(v) => (v.major, v.minor, v.micro, c_string(v.string.as_str())),
            None => (0, 0, 0, std::ptr::null_mut()),
        };
        let theming = match caps.theming() {
            Some(t) => {
                let rgb = t.display_color();
                Box::into_raw(Box::new(FfiTheming {
                    name: c_string(t.name.as_str()),
                    url: c_string(t.url.as_str()),
                    logo: c_string(t.logo.as_str()),
                    background: c_string(t.background.as_str()),
                    slogan: c_string(t.slogan.as_str()),
                    color: c_string(t.color.as_str()),
                    display_color: FfiRgb {
                        r: rgb.r,
                        g: rgb.g,
                        b: rgb.b,
                    },
                }))
            }
            None => std::ptr::null_mut(),
        };
        Self {
            version_major: major,
            version_minor: minor,
            version_micro: micro,
            version_string: string,
            theming,
        }
    }

    unsafe fn free(caps: *mut Self) {
        let caps = unsafe { Box::from_raw(caps) };
        free_c_string(caps.version_string);
        if !caps.theming.is_null() {
            let t = unsafe { Box::from_raw(caps.theming) };
            for s in [t.name, t.url, t.logo, t.background, t.slogan, t.color] {
                free_c_string(s);
            }
        }
    }
}

#[repr(C)]
pub struct FfiLoginInitiation {
    pub login: *mut c_char,
    pub poll_token: *mut c_char,
    pub poll_endpoint: *mut c_char,
}

impl FfiLoginInitiation {
    unsafe fn free(init: *mut Self) {
        let init = unsafe { Box::from_raw(init) };
        free_c_string(init.login);
        free_c_string(init.poll_token);
        free_c_string(init.poll_endpoint);
    }
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null and `data`
/// points to the payload tagged by `data_tag`. On failure `error_code`
/// names the category, `error_message` is a human-readable C string,
/// `http_status` is set for `WrongStatus` and `data` is null.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiResult {
    fn ok(data_tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data_tag,
            data,
        }))
    }

    fn error(error_code: FfiErrorCode, http_status: u16, msg: String) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message: c_string(msg),
            http_status,
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }))
    }

    pub(crate) fn ok_capabilities(caps: &CapabilitiesResponse) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiCapabilities::from_core(caps)));
        Self::ok(FfiDataTag::Capabilities, data as *mut c_void)
    }

    pub(crate) fn ok_login(init: LoginInitiation) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiLoginInitiation {
            login: c_string(init.login),
            poll_token: c_string(init.poll.token),
            poll_endpoint: c_string(init.poll.endpoint),
        }));
        Self::ok(FfiDataTag::LoginInitiation, data as *mut c_void)
    }

    /// Success with no payload, e.g. an OCS envelope whose data was empty.
    pub(crate) fn ok_empty() -> *mut Self {
        Self::ok(FfiDataTag::None, std::ptr::null_mut())
    }

    pub(crate) fn from_error(err: ClientError) -> *mut Self {
        let status = match err {
            ClientError::WrongStatus(status) => status,
            _ => 0,
        };
        Self::error(FfiErrorCode::from(&err), status, err.to_string())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, 0, format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, 0, msg.to_string())
    }

    /// Release the result and its tagged payload.
    pub(crate) unsafe fn free(result: *mut Self) {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Capabilities => unsafe {
                FfiCapabilities::free(result.data as *mut FfiCapabilities)
            },
            FfiDataTag::LoginInitiation => unsafe {
                FfiLoginInitiation::free(result.data as *mut FfiLoginInitiation)
            },
            FfiDataTag::None => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Login session
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiBrowserCapability {
    Modern = 0,
    Legacy = 1,
    Unavailable = 2,
}

impl From<FfiBrowserCapability> for BrowserCapability {
    fn from(c: FfiBrowserCapability) -> Self {
        match c {
            FfiBrowserCapability::Modern => BrowserCapability::Modern,
            FfiBrowserCapability::Legacy => BrowserCapability::Legacy,
            FfiBrowserCapability::Unavailable => BrowserCapability::Unavailable,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiSessionKind {
    Modern = 0,
    Legacy = 1,
}

impl From<SessionKind> for FfiSessionKind {
    fn from(k: SessionKind) -> Self {
        match k {
            SessionKind::Modern => FfiSessionKind::Modern,
            SessionKind::Legacy => FfiSessionKind::Legacy,
        }
    }
}

/// Host browser vtable.
///
/// Ownership of `user_data` passes to the library with
/// `nc_login_session_new`; `release` is called exactly once when the library
/// is done with it, including when session creation fails. The host must
/// tolerate calls from any thread.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FfiBrowser {
    pub user_data: *mut c_void,
    pub capability: FfiBrowserCapability,
    /// Present the login page. Return `false` if it could not be shown.
    pub start: Option<
        unsafe extern "C" fn(
            user_data: *mut c_void,
            url: *const c_char,
            callback_scheme: *const c_char,
            kind: FfiSessionKind,
        ) -> bool,
    >,
    pub cancel: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub release: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
}

impl FfiBrowser {
    pub(crate) fn release(&self) {
        if let Some(release) = self.release {
            unsafe { release(self.user_data) };
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiLoginState {
    Initiated = 0,
    Started = 1,
    Completed = 2,
    Cancelled = 3,
    /// The browser reported an error.
    FailedInvalidLogin = 4,
    /// The browser refused to start.
    FailedLaunch = 5,
    /// Returned for a null session pointer.
    Invalid = 6,
}

impl From<&LoginState> for FfiLoginState {
    fn from(s: &LoginState) -> Self {
        use nextcloud_config::LoginFailure;
        match s {
            LoginState::Initiated => FfiLoginState::Initiated,
            LoginState::Started => FfiLoginState::Started,
            LoginState::Completed { .. } => FfiLoginState::Completed,
            LoginState::Cancelled => FfiLoginState::Cancelled,
            LoginState::Failed(LoginFailure::InvalidLogin(_)) => FfiLoginState::FailedInvalidLogin,
            LoginState::Failed(LoginFailure::LaunchFailed) => FfiLoginState::FailedLaunch,
        }
    }
}
