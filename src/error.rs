//! Error types for ews-client

use crate::message::EmailMessage;
use crate::soap::Operation;
use crate::transport::TransportError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to provision service description at {}: {source}", .path.display())]
    Provisioning {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Connection error: {0}")]
    Connection(TransportError),

    #[error("Session failed to start: {0}")]
    SessionFailed(Arc<Self>),

    #[error("Session is not ready yet")]
    NotReady,

    #[error("Session readiness was already signalled")]
    AlreadySignalled,

    #[error("Network error in {operation} for '{target}': {source}")]
    Operation {
        operation: Operation,
        target: String,
        source: TransportError,
    },

    #[error("Network error sending message: {source}")]
    SendFailed {
        draft: Box<EmailMessage>,
        source: TransportError,
    },

    #[error("Message has no server id")]
    MissingItemId,

    #[error("Network error fetching message {id}: {source}")]
    FetchFailed { id: String, source: TransportError },

    #[error("{operation} failed with {code}: {message}")]
    Response {
        operation: Operation,
        code: String,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Address parsing error: {0}")]
    Parse(String),

    #[error("Invalid folder reference: {0}")]
    InvalidFolderReference(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
