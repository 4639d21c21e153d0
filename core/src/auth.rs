//! Login flow v2: hand the one-time login URL to a browser session and track
//! the outcome.
//!
//! # Design
//! The browser itself is a collaborator supplied by the host application
//! through [`BrowserLauncher`]. The launcher is queried once when the session
//! is opened and picks a [`SessionKind`]; an unavailable browser fails the
//! handshake up front.
//!
//! The collaborator reports back through a [`LoginCallback`], which is
//! consumed on use and reports a failure if dropped unused, so the
//! completion path runs exactly once. The callback writes straight into the
//! session state, so the state is always observable synchronously;
//! [`LoginSession::wait`] only awaits the change.
//!
//! ```text
//! Initiated --start--> Started --callback ok--> Completed
//!     |                   |------callback err-> Failed(InvalidLogin)
//!     |                   |------start refused> Failed(LaunchFailed)
//!     |------callback---------------------------> Failed(InvalidLogin)
//!     +------cancel-------+------cancel-------> Cancelled
//! ```
//!
//! A callback that arrives before `start` cannot be replayed later, so it
//! fails the session instead of leaving it waiting forever.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use url::Url;

use crate::error::{AuthError, ClientError, SessionError};
use crate::types::{LoginInitiation, PollEndpoint};

/// What kind of browser session the host can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserCapability {
    /// A web-authentication session sharing state with the system browser.
    Modern,
    /// An older in-app browser session.
    Legacy,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Modern,
    Legacy,
}

/// A platform browser session showing the login page.
pub trait BrowserSession: Send {
    /// Present the page. Returns `false` if the session could not start.
    fn start(&mut self) -> bool;

    /// Dismiss the page if it is presented.
    fn cancel(&mut self);
}

/// Everything a launcher needs to create a session.
#[derive(Debug)]
pub struct BrowserRequest {
    pub url: Url,
    /// Custom URL scheme the app expects in the callback URL, e.g. `app`.
    pub callback_scheme: String,
    pub callback: LoginCallback,
}

/// Factory for platform browser sessions.
pub trait BrowserLauncher {
    fn capability(&self) -> BrowserCapability;

    fn launch(&self, kind: SessionKind, request: BrowserRequest) -> Box<dyn BrowserSession>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Initiated,
    Started,
    Completed { callback_url: String },
    Cancelled,
    Failed(LoginFailure),
}

impl LoginState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoginState::Completed { .. } | LoginState::Cancelled | LoginState::Failed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// The browser reported an error instead of a callback URL.
    InvalidLogin(String),
    /// The browser refused to start.
    LaunchFailed,
}

struct Shared {
    state: Mutex<LoginState>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LoginState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, apply: impl FnOnce(&mut LoginState)) {
        apply(&mut self.lock());
        self.changed.notify_waiters();
    }

    /// Only a started session accepts a browser outcome. Any outcome on an
    /// unstarted session fails it; terminal states are left alone.
    fn settle(&self, outcome: Result<String, String>) {
        self.transition(|state| {
            let started = match *state {
                LoginState::Started => true,
                LoginState::Initiated => false,
                _ => {
                    log::debug!("ignoring browser callback in state {state:?}");
                    return;
                }
            };
            if !started {
                log::warn!("browser reported before the login session was started");
            }
            *state = match outcome {
                Ok(callback_url) if started => LoginState::Completed { callback_url },
                Ok(_) => LoginState::Failed(LoginFailure::InvalidLogin(
                    "browser reported before the session was started".to_string(),
                )),
                Err(message) => LoginState::Failed(LoginFailure::InvalidLogin(message)),
            };
        });
    }
}

/// Single-use completion handle passed to the browser collaborator.
pub struct LoginCallback {
    shared: Option<Arc<Shared>>,
}

impl LoginCallback {
    /// The browser redirected to the app's callback URL. The URL is passed
    /// through as-is.
    pub fn complete(mut self, callback_url: impl Into<String>) {
        self.fire(Ok(callback_url.into()));
    }

    /// The browser session ended with an error.
    pub fn fail(mut self, message: impl Into<String>) {
        self.fire(Err(message.into()));
    }

    fn fire(&mut self, outcome: Result<String, String>) {
        if let Some(shared) = self.shared.take() {
            shared.settle(outcome);
        }
    }
}

impl Drop for LoginCallback {
    fn drop(&mut self) {
        self.fire(Err("browser session ended without a callback".to_string()));
    }
}

impl fmt::Debug for LoginCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCallback")
            .field("pending", &self.shared.is_some())
            .finish()
    }
}

/// One in-flight login attempt.
///
/// All methods take `&self`; share the session through an `Arc` to cancel
/// it from one task while another awaits [`wait`](Self::wait).
pub struct LoginSession {
    initiation: LoginInitiation,
    login_url: Url,
    callback_scheme: String,
    kind: SessionKind,
    browser: Mutex<Box<dyn BrowserSession>>,
    shared: Arc<Shared>,
}

impl LoginSession {
    /// Create the browser session for `initiation` without starting it.
    pub fn open<L>(
        initiation: LoginInitiation,
        callback_scheme: impl Into<String>,
        launcher: &L,
    ) -> Result<Self, AuthError>
    where
        L: BrowserLauncher + ?Sized,
    {
        let login_url = Url::parse(&initiation.login)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| {
                AuthError::V2NotAvailable(ClientError::DecodeFailure(format!(
                    "login URL {:?} is not an http(s) URL",
                    initiation.login
                )))
            })?;

        let kind = match launcher.capability() {
            BrowserCapability::Modern => SessionKind::Modern,
            BrowserCapability::Legacy => SessionKind::Legacy,
            BrowserCapability::Unavailable => return Err(AuthError::BrowserUnavailable),
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(LoginState::Initiated),
            changed: Notify::new(),
        });
        let callback_scheme = callback_scheme.into();
        let browser = launcher.launch(
            kind,
            BrowserRequest {
                url: login_url.clone(),
                callback_scheme: callback_scheme.clone(),
                callback: LoginCallback {
                    shared: Some(Arc::clone(&shared)),
                },
            },
        );
        log::debug!("opened {kind:?} login session for {login_url}");

        Ok(Self {
            initiation,
            login_url,
            callback_scheme,
            kind,
            browser: Mutex::new(browser),
            shared,
        })
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    pub fn callback_scheme(&self) -> &str {
        &self.callback_scheme
    }

    /// Poll credentials for an out-of-band completion check.
    pub fn poll(&self) -> &PollEndpoint {
        &self.initiation.poll
    }

    pub fn initiation(&self) -> &LoginInitiation {
        &self.initiation
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn state(&self) -> LoginState {
        self.shared.lock().clone()
    }

    /// Present the login page. Allowed exactly once, and never after
    /// [`cancel`](Self::cancel).
    pub fn start(&self) -> Result<(), SessionError> {
        {
            let mut state = self.shared.lock();
            match *state {
                LoginState::Initiated => *state = LoginState::Started,
                LoginState::Started => return Err(SessionError::AlreadyStarted),
                LoginState::Cancelled => return Err(SessionError::Cancelled),
                LoginState::Completed { .. } | LoginState::Failed(_) => {
                    return Err(SessionError::Finished)
                }
            }
        }
        self.shared.changed.notify_waiters();

        if self.browser().start() {
            return Ok(());
        }
        log::warn!("browser refused to start the login session");
        self.shared.transition(|state| {
            if *state == LoginState::Started {
                *state = LoginState::Failed(LoginFailure::LaunchFailed);
            }
        });
        Err(SessionError::LaunchFailed)
    }

    /// Abort the attempt. Dismisses the browser if it was started. A no-op
    /// once the session is cancelled, completed or failed.
    pub fn cancel(&self) {
        let was_started = {
            let mut state = self.shared.lock();
            let was_started = match *state {
                LoginState::Initiated => false,
                LoginState::Started => true,
                _ => return,
            };
            *state = LoginState::Cancelled;
            was_started
        };
        if was_started {
            self.browser().cancel();
        }
        self.shared.changed.notify_waiters();
    }

    /// Wait for a terminal state. Returns the callback URL on success.
    pub async fn wait(&self) -> Result<String, AuthError> {
        loop {
            let mut changed = std::pin::pin!(self.shared.changed.notified());
            changed.as_mut().enable();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            changed.await;
        }
    }

    fn outcome(&self) -> Option<Result<String, AuthError>> {
        match &*self.shared.lock() {
            LoginState::Initiated | LoginState::Started => None,
            LoginState::Completed { callback_url } => Some(Ok(callback_url.clone())),
            LoginState::Cancelled => Some(Err(AuthError::Cancelled)),
            LoginState::Failed(LoginFailure::InvalidLogin(message)) => {
                Some(Err(AuthError::InvalidLogin(message.clone())))
            }
            LoginState::Failed(LoginFailure::LaunchFailed) => Some(Err(AuthError::BrowserUnavailable)),
        }
    }

    fn browser(&self) -> MutexGuard<'_, Box<dyn BrowserSession>> {
        self.browser.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LoginSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSession")
            .field("login_url", &self.login_url.as_str())
            .field("callback_scheme", &self.callback_scheme)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
