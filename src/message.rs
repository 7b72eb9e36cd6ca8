//! Email messages
//!
//! [`EmailMessage`] is both the outgoing draft rendered into a
//! `CreateItem` call and the decoded form of items returned by
//! `FindItem` and `GetItem`. Decoding fills two tiers of fields: the
//! brief tier is present on every decoded item, the detail tier only
//! on items that carried a body or MIME payload, i.e. ones obtained
//! through [`EmailMessage::fetch`].

use crate::address::{MailboxNode, MailboxRef};
use crate::error::{Error, Result};
use crate::folder::{FolderRef, IdAttributes};
use crate::session::Session;
use crate::soap::{self, OneOrMany, Operation, XmlFragment, XmlWriter};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

const DEFAULT_SUBJECT: &str = "<no subject>";

/// Format of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodyFormat {
    #[default]
    Html,
    Text,
}

impl BodyFormat {
    /// The `BodyType` attribute value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Text => "Text",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case("html") {
            Ok(Self::Html)
        } else if value.eq_ignore_ascii_case("text") {
            Ok(Self::Text)
        } else {
            Err(Error::Decode(format!("unknown BodyType '{value}'")))
        }
    }
}

impl fmt::Display for BodyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The element kind an item was returned as.
///
/// Listings mix kinds freely; every kind decodes through the same
/// brief and detail fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemKind {
    #[default]
    Message,
    MeetingRequest,
    MeetingResponse,
    MeetingCancellation,
    CalendarItem,
    Contact,
    DistributionList,
    Task,
    PostItem,
    /// A generic item, or a kind this crate does not name.
    Item,
}

impl ItemKind {
    pub const ALL: [Self; 10] = [
        Self::Message,
        Self::MeetingRequest,
        Self::MeetingResponse,
        Self::MeetingCancellation,
        Self::CalendarItem,
        Self::Contact,
        Self::DistributionList,
        Self::Task,
        Self::PostItem,
        Self::Item,
    ];

    /// The element name the server uses for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "Message",
            Self::MeetingRequest => "MeetingRequest",
            Self::MeetingResponse => "MeetingResponse",
            Self::MeetingCancellation => "MeetingCancellation",
            Self::CalendarItem => "CalendarItem",
            Self::Contact => "Contact",
            Self::DistributionList => "DistributionList",
            Self::Task => "Task",
            Self::PostItem => "PostItem",
            Self::Item => "Item",
        }
    }

    #[must_use]
    pub fn from_element(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server id of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId {
    id: String,
    change_key: Option<String>,
}

impl ItemId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            change_key: None,
        }
    }

    #[must_use]
    pub fn with_change_key(mut self, change_key: impl Into<String>) -> Self {
        self.change_key = Some(change_key.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn change_key(&self) -> Option<&str> {
        self.change_key.as_deref()
    }
}

/// Fields returned by any listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Summary {
    id: ItemId,
    kind: ItemKind,
    is_read: bool,
    size: Option<u64>,
    sensitivity: Option<String>,
    sender: Option<MailboxRef>,
    sent_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    has_attachments: bool,
}

/// Fields only a full fetch returns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Detail {
    body: Option<String>,
    body_format: Option<BodyFormat>,
    importance: Option<String>,
    mime_content: Option<String>,
}

/// An email message.
///
/// # Examples
///
/// ```
/// use ews_client::{BodyFormat, EmailMessage, MailboxRef};
///
/// let draft = EmailMessage::new()
///     .with_to(vec![MailboxRef::parse("bob@example.com").unwrap()])
///     .with_subject("Lunch")
///     .with_body("Fish <b>&</b> chips", BodyFormat::Html);
///
/// let xml = draft.to_xml().unwrap();
/// assert!(xml.as_str().contains("Fish &lt;b&gt;&amp;&lt;/b&gt; chips"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    to: Vec<MailboxRef>,
    cc: Vec<MailboxRef>,
    bcc: Vec<MailboxRef>,
    subject: String,
    body: String,
    body_format: BodyFormat,
    summary: Option<Summary>,
    detail: Option<Detail>,
}

impl Default for EmailMessage {
    fn default() -> Self {
        Self {
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: DEFAULT_SUBJECT.to_string(),
            body: String::new(),
            body_format: BodyFormat::default(),
            summary: None,
            detail: None,
        }
    }
}

impl EmailMessage {
    /// An empty HTML draft with the default subject.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_to(mut self, to: Vec<MailboxRef>) -> Self {
        self.to = to;
        self
    }

    #[must_use]
    pub fn with_cc(mut self, cc: Vec<MailboxRef>) -> Self {
        self.cc = cc;
        self
    }

    #[must_use]
    pub fn with_bcc(mut self, bcc: Vec<MailboxRef>) -> Self {
        self.bcc = bcc;
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>, format: BodyFormat) -> Self {
        self.body = body.into();
        self.body_format = format;
        self
    }

    #[must_use]
    pub fn to(&self) -> &[MailboxRef] {
        &self.to
    }

    #[must_use]
    pub fn cc(&self) -> &[MailboxRef] {
        &self.cc
    }

    #[must_use]
    pub fn bcc(&self) -> &[MailboxRef] {
        &self.bcc
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub const fn body_format(&self) -> BodyFormat {
        self.body_format
    }

    #[must_use]
    pub fn id(&self) -> Option<&ItemId> {
        self.summary.as_ref().map(|s| &s.id)
    }

    /// Element kind of a decoded item; `None` for a local draft.
    #[must_use]
    pub fn kind(&self) -> Option<ItemKind> {
        self.summary.as_ref().map(|s| s.kind)
    }

    #[must_use]
    pub fn is_read(&self) -> Option<bool> {
        self.summary.as_ref().map(|s| s.is_read)
    }

    /// Size in bytes as reported by the server.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.summary.as_ref().and_then(|s| s.size)
    }

    #[must_use]
    pub fn sensitivity(&self) -> Option<&str> {
        self.summary.as_ref().and_then(|s| s.sensitivity.as_deref())
    }

    #[must_use]
    pub fn sender(&self) -> Option<&MailboxRef> {
        self.summary.as_ref().and_then(|s| s.sender.as_ref())
    }

    #[must_use]
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.summary.as_ref().and_then(|s| s.sent_at)
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.summary.as_ref().and_then(|s| s.created_at)
    }

    #[must_use]
    pub fn has_attachments(&self) -> Option<bool> {
        self.summary.as_ref().map(|s| s.has_attachments)
    }

    /// Whether the detail fields were populated by a full fetch.
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        self.detail.is_some()
    }

    #[must_use]
    pub fn resolved_body(&self) -> Option<&str> {
        self.detail.as_ref().and_then(|d| d.body.as_deref())
    }

    #[must_use]
    pub fn resolved_body_format(&self) -> Option<BodyFormat> {
        self.detail.as_ref().and_then(|d| d.body_format)
    }

    #[must_use]
    pub fn importance(&self) -> Option<&str> {
        self.detail.as_ref().and_then(|d| d.importance.as_deref())
    }

    /// Base64 MIME content of a fetched message.
    #[must_use]
    pub fn mime_content(&self) -> Option<&str> {
        self.detail.as_ref().and_then(|d| d.mime_content.as_deref())
    }

    pub(crate) fn write_xml(&self, writer: &mut XmlWriter) -> Result<()> {
        soap::open(writer, "t:Message", &[])?;
        soap::text(writer, "t:Subject", &[], &self.subject)?;
        soap::text(
            writer,
            "t:Body",
            &[("BodyType", self.body_format.as_str())],
            &self.body,
        )?;
        write_recipients(writer, "t:ToRecipients", &self.to)?;
        if !self.cc.is_empty() {
            write_recipients(writer, "t:CcRecipients", &self.cc)?;
        }
        if !self.bcc.is_empty() {
            write_recipients(writer, "t:BccRecipients", &self.bcc)?;
        }
        soap::close(writer, "t:Message")
    }

    /// Render the draft as a `t:Message` element. The body is always
    /// escaped, whatever its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] if the writer fails.
    pub fn to_xml(&self) -> Result<XmlFragment> {
        soap::fragment(|w| self.write_xml(w))
    }

    /// Send this draft and save a copy in the Sent folder.
    ///
    /// Returns the structured server response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SendFailed`] carrying this draft if the
    /// transport fails, [`Error::NotReady`] before the session is
    /// ready, and [`Error::Response`] if the server rejects the item.
    pub async fn send(&self, session: &Session) -> Result<Value> {
        let request = soap::create_item(&FolderRef::sent().to_xml()?, &self.to_xml()?)?;
        debug!("Sending message '{}' to {} recipients", self.subject, self.to.len());

        let raw = session
            .client()?
            .call(Operation::CreateItem, request)
            .await
            .map_err(|source| Error::SendFailed {
                draft: Box::new(self.clone()),
                source,
            })?;

        soap::response_message(Operation::CreateItem, &raw)?;
        info!("Sent message '{}'", self.subject);
        Ok(raw)
    }

    /// Fetch the full version of this (listed) message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingItemId`] for a message that was never
    /// decoded from the server, otherwise as [`EmailMessage::fetch_by_id`].
    pub async fn fetch(&self, session: &Session) -> Result<Self> {
        let id = self.id().ok_or(Error::MissingItemId)?;
        Self::fetch_by_id(session, id).await
    }

    /// Fetch one item, MIME content included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FetchFailed`] if the transport fails,
    /// [`Error::Response`] if the server rejects the request, and
    /// [`Error::Decode`] if no item comes back.
    pub async fn fetch_by_id(session: &Session, id: &ItemId) -> Result<Self> {
        let request = soap::get_item(id.id(), id.change_key())?;
        debug!("Fetching message {}", id.id());

        let raw = session
            .client()?
            .call(Operation::GetItem, request)
            .await
            .map_err(|source| Error::FetchFailed {
                id: id.id().to_string(),
                source,
            })?;

        let message = soap::response_message(Operation::GetItem, &raw)?;
        let items = message
            .get("Items")
            .ok_or_else(|| Error::Decode("GetItem response has no Items".into()))?;
        Self::decode_items(items)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Decode(format!("GetItem returned no item for {}", id.id())))
    }

    /// Decode every child of an `Items` node, whatever its kind, in
    /// the order the server sent them.
    pub(crate) fn decode_items(items: &Value) -> Result<Vec<Self>> {
        soap::ordered_children(items)
            .into_iter()
            .map(|(element, node)| {
                let kind = ItemKind::from_element(element).unwrap_or_else(|| {
                    warn!("Decoding unknown item kind '{}' as a generic item", element);
                    ItemKind::Item
                });
                Self::decode(kind, soap::decode_node(node, element)?)
            })
            .collect()
    }

    fn decode(kind: ItemKind, node: ItemNode) -> Result<Self> {
        let id = node
            .item_id
            .ok_or_else(|| Error::Decode("item has no ItemId".into()))?
            .attributes;

        let summary = Summary {
            id: ItemId {
                id: id.id,
                change_key: id.change_key,
            },
            kind,
            is_read: parse_flag(node.is_read.as_deref(), "IsRead")?,
            size: node
                .size
                .as_deref()
                .map(|v| {
                    v.trim()
                        .parse()
                        .map_err(|e| Error::Decode(format!("Size '{v}': {e}")))
                })
                .transpose()?,
            sensitivity: node.sensitivity,
            sender: node
                .from
                .and_then(|from| from.mailbox)
                .and_then(OneOrMany::into_first)
                .map(MailboxRef::from),
            sent_at: parse_timestamp(node.date_time_sent.as_deref(), "DateTimeSent")?,
            created_at: parse_timestamp(node.date_time_created.as_deref(), "DateTimeCreated")?,
            has_attachments: parse_flag(node.has_attachments.as_deref(), "HasAttachments")?,
        };

        let detail = if node.body.is_some() || node.mime_content.is_some() {
            let body_format = node
                .body
                .as_ref()
                .map(|body| {
                    body.attribute("BodyType")
                        .map_or(Ok(BodyFormat::Text), BodyFormat::parse)
                })
                .transpose()?;
            Some(Detail {
                body: node.body.map(TextNode::into_text),
                body_format,
                importance: match node.importance {
                    Presence::Absent => None,
                    Presence::Empty => Some("Normal".to_string()),
                    Presence::Text(value) => Some(value),
                },
                mime_content: node.mime_content.map(TextNode::into_text),
            })
        } else {
            None
        };

        let (body, body_format) = detail
            .as_ref()
            .map(|d| {
                (
                    d.body.clone().unwrap_or_default(),
                    d.body_format.unwrap_or_default(),
                )
            })
            .unwrap_or_default();

        Ok(Self {
            to: decode_recipients(node.to_recipients),
            cc: decode_recipients(node.cc_recipients),
            bcc: decode_recipients(node.bcc_recipients),
            subject: node.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            body,
            body_format,
            summary: Some(summary),
            detail,
        })
    }
}

impl fmt::Display for EmailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.is_read() == Some(false) { "[*]" } else { "   " };
        write!(f, "{marker} {}", self.subject)
    }
}

fn write_recipients(writer: &mut XmlWriter, name: &str, recipients: &[MailboxRef]) -> Result<()> {
    soap::open(writer, name, &[])?;
    for recipient in recipients {
        recipient.write_xml(writer)?;
    }
    soap::close(writer, name)
}

fn decode_recipients(node: Option<RecipientsNode>) -> Vec<MailboxRef> {
    node.and_then(|r| r.mailbox)
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(MailboxRef::from)
        .collect()
}

fn parse_flag(value: Option<&str>, field: &str) -> Result<bool> {
    match value.map(str::trim) {
        None => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(Error::Decode(format!("{field} '{v}' is not a boolean"))),
    }
}

/// RFC 3339, or a zone-less ISO date-time taken as UTC.
fn parse_timestamp(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>> {
    let Some(v) = value.map(str::trim) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(v) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|e| Error::Decode(format!("{field} '{v}': {e}")))
}

/// An item node as found in `FindItem` and `GetItem` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemNode {
    item_id: Option<ItemIdNode>,
    subject: Option<String>,
    sensitivity: Option<String>,
    size: Option<String>,
    date_time_sent: Option<String>,
    date_time_created: Option<String>,
    has_attachments: Option<String>,
    is_read: Option<String>,
    from: Option<RecipientsNode>,
    to_recipients: Option<RecipientsNode>,
    cc_recipients: Option<RecipientsNode>,
    bcc_recipients: Option<RecipientsNode>,
    body: Option<TextNode>,
    #[serde(default)]
    importance: Presence,
    mime_content: Option<TextNode>,
}

/// A text field that may be missing, present but empty, or set.
#[derive(Debug, Default)]
enum Presence {
    #[default]
    Absent,
    Empty,
    Text(String),
}

impl<'de> Deserialize<'de> for Presence {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(text) if !text.is_empty() => Self::Text(text),
            _ => Self::Empty,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ItemIdNode {
    attributes: IdAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecipientsNode {
    #[serde(default)]
    mailbox: Option<OneOrMany<MailboxNode>>,
}

/// Text content, bare or with attributes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextNode {
    Plain(String),
    Attributed {
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        #[serde(default, rename = "$value")]
        value: Option<String>,
    },
}

impl TextNode {
    fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::Attributed { attributes, .. } => attributes.get(name).map(String::as_str),
        }
    }

    fn into_text(self) -> String {
        match self {
            Self::Plain(text) => text,
            Self::Attributed { value, .. } => value.unwrap_or_default(),
        }
    }
}
