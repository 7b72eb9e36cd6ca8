//! Mailbox addresses
//!
//! A [`MailboxRef`] is the `t:Mailbox` element of the wire protocol:
//! an optional display name, an optional SMTP address and, for decoded
//! mailboxes, the routing type reported by the server.

use crate::error::{Error, Result};
use crate::soap::{self, XmlWriter};
use lettre::message::Mailbox;
use serde::Deserialize;
use std::fmt;

/// A single mailbox reference.
///
/// # Examples
///
/// ```
/// use ews_client::MailboxRef;
///
/// let bob = MailboxRef::parse("Bob Smith <bob@example.com>").unwrap();
/// assert_eq!(bob.name(), Some("Bob Smith"));
/// assert_eq!(bob.email(), Some("bob@example.com"));
///
/// let alice = MailboxRef::parse("alice@example.com").unwrap();
/// assert_eq!(alice.name(), Some("alice"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MailboxRef {
    name: Option<String>,
    email: Option<String>,
    routing_type: Option<String>,
}

impl MailboxRef {
    #[must_use]
    pub const fn new(name: Option<String>, email: Option<String>) -> Self {
        Self {
            name,
            email,
            routing_type: None,
        }
    }

    /// Parse one RFC 5322 address.
    ///
    /// When the text carries no display name, the local part of the
    /// address is used instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if `text` is not a single valid address.
    pub fn parse(text: &str) -> Result<Self> {
        let mailbox: Mailbox = text
            .trim()
            .parse()
            .map_err(|e| Error::Parse(format!("'{text}': {e}")))?;
        let name = mailbox
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| mailbox.email.user().to_string());
        Ok(Self::new(Some(name), Some(mailbox.email.to_string())))
    }

    /// Parse every address in `texts`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::Parse`] encountered.
    pub fn parse_all<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Self>> {
        texts.iter().map(|text| Self::parse(text.as_ref())).collect()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Routing type as reported by the server (usually `SMTP`).
    #[must_use]
    pub fn routing_type(&self) -> Option<&str> {
        self.routing_type.as_deref()
    }

    /// Render as a `t:Mailbox` element. Absent or empty fields are
    /// left out rather than written empty.
    pub(crate) fn write_xml(&self, writer: &mut XmlWriter) -> Result<()> {
        soap::open(writer, "t:Mailbox", &[])?;
        if let Some(name) = self.name().filter(|v| !v.is_empty()) {
            soap::text(writer, "t:Name", &[], name)?;
        }
        if let Some(email) = self.email().filter(|v| !v.is_empty()) {
            soap::text(writer, "t:EmailAddress", &[], email)?;
        }
        soap::close(writer, "t:Mailbox")
    }

    /// The `t:Mailbox` fragment for this address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] if the writer fails.
    pub fn to_xml(&self) -> Result<soap::XmlFragment> {
        soap::fragment(|w| self.write_xml(w))
    }
}

impl fmt::Display for MailboxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.email()) {
            (Some(name), Some(email)) => write!(f, "{name} <{email}>"),
            (None, Some(email)) => f.write_str(email),
            (Some(name), None) => f.write_str(name),
            (None, None) => Ok(()),
        }
    }
}

/// The server's `Mailbox` node, taken verbatim.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MailboxNode {
    name: Option<String>,
    email_address: Option<String>,
    routing_type: Option<String>,
}

impl From<MailboxNode> for MailboxRef {
    fn from(node: MailboxNode) -> Self {
        Self {
            name: node.name,
            email: node.email_address,
            routing_type: node.routing_type,
        }
    }
}
