//! Session configuration

use crate::transport::{NtlmSecurity, TransportOptions};
use std::fmt;
use std::path::PathBuf;

/// Endpoint used when none is configured (Office 365 webmail).
pub const DEFAULT_ENDPOINT: &str = "https://outlook.office365.com/ews/Exchange.asmx";

/// Connection settings for a [`Session`](crate::Session).
///
/// # Examples
///
/// ```
/// use ews_client::SessionConfig;
///
/// let config = SessionConfig::new("alice", "secret")
///     .with_endpoint("https://mail.example.com/EWS/Exchange.asmx")
///     .with_domain("CORP")
///     .with_strict_tls(false);
/// assert_eq!(config.domain, "CORP");
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// URL of `Exchange.asmx` on the target server.
    pub endpoint: String,
    /// Username as entered in webmail, without the domain.
    pub username: String,
    pub password: String,
    /// Windows domain, e.g. `ADMIN`.
    pub domain: String,
    /// Host name of this machine.
    pub workstation: String,
    /// Set to `false` for intranet servers with self-signed certificates.
    pub strict_tls: bool,
    pub proxy: Option<String>,
    /// Directory holding `Services.wsdl`, `messages.xsd` and `types.xsd`.
    pub description_dir: PathBuf,
}

impl SessionConfig {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            username: username.into(),
            password: password.into(),
            domain: String::new(),
            workstation: String::new(),
            strict_tls: true,
            proxy: None,
            description_dir: PathBuf::from("wsdl"),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    #[must_use]
    pub fn with_workstation(mut self, workstation: impl Into<String>) -> Self {
        self.workstation = workstation.into();
        self
    }

    #[must_use]
    pub const fn with_strict_tls(mut self, strict_tls: bool) -> Self {
        self.strict_tls = strict_tls;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    #[must_use]
    pub fn with_description_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.description_dir = dir.into();
        self
    }

    pub(crate) fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            strict_tls: self.strict_tls,
            proxy: self.proxy.clone(),
        }
    }

    pub(crate) fn ntlm_security(&self) -> NtlmSecurity {
        NtlmSecurity {
            username: self.username.clone(),
            password: self.password.clone(),
            domain: self.domain.clone(),
            workstation: self.workstation.clone(),
            strict_tls: self.strict_tls,
            proxy: self.proxy.clone(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("workstation", &self.workstation)
            .field("strict_tls", &self.strict_tls)
            .field("proxy", &self.proxy)
            .field("description_dir", &self.description_dir)
            .finish()
    }
}
