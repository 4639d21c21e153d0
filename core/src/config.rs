//! Construction-time client configuration.
//!
//! # Design
//! Everything the request builder needs about the host application (identity
//! for `User-Agent`, preferred languages) is captured here once, so building
//! a request never reads process-global state.

use std::time::Duration;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default TCP/TLS connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding [`DEFAULT_TIMEOUT`], in whole seconds.
pub const TIMEOUT_ENV: &str = "NEXTCLOUD_CONFIG_TIMEOUT_SECS";

/// Which spelling of the OCS marker header to send.
///
/// Servers have accepted `OCS-APIRequest` and `X-OCS-APIRequest` across
/// releases; `Both` sends the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcsApiHeader {
    Standard,
    Prefixed,
    #[default]
    Both,
}

impl OcsApiHeader {
    pub fn names(self) -> &'static [&'static str] {
        match self {
            OcsApiHeader::Standard => &["OCS-APIRequest"],
            OcsApiHeader::Prefixed => &["X-OCS-APIRequest"],
            OcsApiHeader::Both => &["OCS-APIRequest", "X-OCS-APIRequest"],
        }
    }
}

/// Identity of the embedding application, rendered into `User-Agent`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppIdentity {
    pub executable: Option<String>,
    pub version: Option<String>,
    pub bundle_id: Option<String>,
    pub build: Option<String>,
}

impl AppIdentity {
    pub fn new(
        executable: impl Into<String>,
        version: impl Into<String>,
        bundle_id: impl Into<String>,
        build: impl Into<String>,
    ) -> Self {
        Self {
            executable: Some(executable.into()),
            version: Some(version.into()),
            bundle_id: Some(bundle_id.into()),
            build: Some(build.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub ocs_header: OcsApiHeader,
    /// `None` sends the fixed SDK user agent.
    pub identity: Option<AppIdentity>,
    /// Preferred language tags, most preferred first.
    pub languages: Vec<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ocs_header: OcsApiHeader::default(),
            identity: None,
            languages: vec!["en".to_string()],
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults plus languages from `LANGUAGE`/`LC_ALL`/`LANG` and the
    /// timeout from [`TIMEOUT_ENV`].
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        let mut config = Self::default();

        let languages = languages_from_posix(
            var("LANGUAGE").as_deref(),
            var("LC_ALL").as_deref(),
            var("LANG").as_deref(),
        );
        if !languages.is_empty() {
            config.languages = languages;
        }

        if let Some(raw) = var(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => log::warn!("ignoring {TIMEOUT_ENV}={raw:?}: expected a positive integer"),
            }
        }
        config
    }

    pub fn with_identity(mut self, identity: AppIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ocs_header(mut self, ocs_header: OcsApiHeader) -> Self {
        self.ocs_header = ocs_header;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Language tags from POSIX locale variables.
///
/// `LANGUAGE` is a colon-separated priority list and wins when set;
/// otherwise the first of `LC_ALL`, `LANG` that names a real locale is used.
/// `de_DE.UTF-8@euro` becomes `de-DE`; `C` and `POSIX` are skipped.
pub fn languages_from_posix(
    language: Option<&str>,
    lc_all: Option<&str>,
    lang: Option<&str>,
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |raw: &str| {
        if let Some(tag) = posix_to_tag(raw) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    };

    if let Some(list) = language.filter(|l| !l.trim().is_empty()) {
        list.split(':').for_each(&mut push);
    } else if let Some(single) = [lc_all, lang].into_iter().flatten().find(|v| posix_to_tag(v).is_some()) {
        push(single);
    }
    tags
}

fn posix_to_tag(raw: &str) -> Option<String> {
    let base = raw
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}
