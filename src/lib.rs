//! Exchange Web Services client library
//!
//! Talks to a Microsoft Exchange server over the EWS SOAP protocol:
//! list folders and messages, fetch full messages and send mail.
//!
//! A [`Session`] provisions the service description, opens an
//! NTLM-authenticated transport through the [`Transport`] collaborator
//! and signals readiness once. [`FolderRef`], [`EmailMessage`] and
//! [`MailboxRef`] translate between domain values and the wire XML.
//!
//! ```no_run
//! # async fn demo(transport: std::sync::Arc<dyn ews_client::Transport>) -> ews_client::Result<()> {
//! use ews_client::{FolderRef, ListOptions, LocalFiles, Session, SessionConfig};
//! use std::sync::Arc;
//!
//! let config = SessionConfig::new("alice", "secret").with_domain("CORP");
//! let session = Session::connect(config, Arc::new(LocalFiles), transport).await?;
//!
//! let page = FolderRef::inbox().list(&session, ListOptions::default()).await?;
//! for message in &page.messages {
//!     println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

mod address;
mod config;
mod error;
mod folder;
mod message;
mod session;
pub mod soap;
mod transport;

pub use address::MailboxRef;
pub use config::{DEFAULT_ENDPOINT, SessionConfig};
pub use error::{Error, Result};
pub use folder::{
    FolderCounts, FolderId, FolderLocator, FolderPage, FolderRef, ListOptions, WellKnownFolder,
};
pub use message::{BodyFormat, EmailMessage, ItemId, ItemKind};
pub use session::{
    ENDPOINT_PLACEHOLDER, MESSAGES_FILE, SERVICES_FILE, Session, SessionState, TYPES_FILE,
};
pub use soap::{BasePoint, BaseShape, ORDER_KEY, Operation, XmlFragment};
pub use transport::{
    FileStore, LocalFiles, NtlmSecurity, SoapClient, Transport, TransportError, TransportOptions,
};
