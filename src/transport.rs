//! Collaborator interfaces consumed by the session
//!
//! The SOAP transport (HTTP plus the NTLM handshake) and the file
//! system live outside this crate. A [`Session`](crate::Session) only
//! talks to them through the traits below. [`LocalFiles`] is the stock
//! file capability backed by `tokio::fs` and `tempfile`.

use crate::soap::{Operation, XmlFragment};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use thiserror::Error;

/// An error reported by the transport collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Options handed to [`Transport::create`] when the client is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Reject self-signed or otherwise unverifiable certificates.
    pub strict_tls: bool,
    /// HTTP proxy URL, if any.
    pub proxy: Option<String>,
}

/// NTLM credentials bound to an open client.
#[derive(Clone, PartialEq, Eq)]
pub struct NtlmSecurity {
    pub username: String,
    pub password: String,
    pub domain: String,
    pub workstation: String,
    pub strict_tls: bool,
    pub proxy: Option<String>,
}

impl fmt::Debug for NtlmSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtlmSecurity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("workstation", &self.workstation)
            .field("strict_tls", &self.strict_tls)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Opens SOAP clients against a service description on disk.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create a client for the WSDL at `service_description`.
    async fn create(
        &self,
        service_description: &Path,
        options: &TransportOptions,
    ) -> Result<Box<dyn SoapClient>, TransportError>;
}

/// A client able to issue named remote calls.
///
/// Responses are structured values: element local names as keys,
/// repeated siblings as arrays, attributes under `"attributes"` and the
/// text of attributed elements under `"$value"`. See
/// [`soap::parse_response`](crate::soap::parse_response).
#[async_trait]
pub trait SoapClient: Send + Sync {
    /// Bind credentials to every subsequent call.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the client rejects the credentials.
    fn set_security(&mut self, security: NtlmSecurity) -> Result<(), TransportError>;

    /// Issue `operation` with `request` as the SOAP body content.
    async fn call(&self, operation: Operation, request: XmlFragment)
    -> Result<Value, TransportError>;
}

/// File capability used while materialising the service description.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// A fresh directory, removed when the returned guard drops.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    fn temp_dir(&self) -> io::Result<TempDir>;
}

/// [`FileStore`] on the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

#[async_trait]
impl FileStore for LocalFiles {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    fn temp_dir(&self) -> io::Result<TempDir> {
        tempfile::Builder::new().prefix("ews-client-").tempdir()
    }
}
