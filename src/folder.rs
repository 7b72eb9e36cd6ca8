//! Folder references
//!
//! Provides a strongly-typed enum for the well-known (distinguished)
//! mailbox folders instead of raw strings, and [`FolderRef`], which
//! locates a folder either by one of those roles or by the opaque id
//! the server hands out in folder listings.

use crate::error::{Error, Result};
use crate::message::EmailMessage;
use crate::session::Session;
use crate::soap::{self, BasePoint, BaseShape, Operation, XmlFragment, XmlWriter};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A well-known mailbox folder.
///
/// Each role maps to the fixed `DistinguishedFolderId` the server
/// reserves for it.
///
/// # Examples
///
/// ```
/// use ews_client::WellKnownFolder;
///
/// assert_eq!(WellKnownFolder::Sent.as_str(), "sentitems");
/// assert_eq!("junkemail".parse::<WellKnownFolder>().unwrap(), WellKnownFolder::Junk);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownFolder {
    Inbox,
    Sent,
    Calendar,
    Outbox,
    /// Root of the message folder hierarchy.
    Root,
    InstantMessageContacts,
    Favorites,
    Junk,
    Contacts,
    Drafts,
    Tasks,
    /// Root of the recoverable items (dumpster) tree.
    Trash,
    /// Root of the archive mailbox.
    Archive,
    ArchiveInbox,
}

impl WellKnownFolder {
    /// Every role, in table order.
    pub const ALL: [Self; 14] = [
        Self::Inbox,
        Self::Sent,
        Self::Calendar,
        Self::Outbox,
        Self::Root,
        Self::InstantMessageContacts,
        Self::Favorites,
        Self::Junk,
        Self::Contacts,
        Self::Drafts,
        Self::Tasks,
        Self::Trash,
        Self::Archive,
        Self::ArchiveInbox,
    ];

    /// The server's distinguished folder id.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sentitems",
            Self::Calendar => "calendar",
            Self::Outbox => "outbox",
            Self::Root => "root",
            Self::InstantMessageContacts => "imcontactlist",
            Self::Favorites => "favorites",
            Self::Junk => "junkemail",
            Self::Contacts => "contacts",
            Self::Drafts => "drafts",
            Self::Tasks => "tasks",
            Self::Trash => "recoverableitemsroot",
            Self::Archive => "archiveroot",
            Self::ArchiveInbox => "archiveinbox",
        }
    }
}

impl fmt::Display for WellKnownFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellKnownFolder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidFolderReference(format!("unknown distinguished id '{s}'")))
    }
}

/// Opaque server id of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId {
    id: String,
    change_key: Option<String>,
}

impl FolderId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            change_key: None,
        }
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

/// How a [`FolderRef`] addresses its folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FolderLocator {
    Distinguished(WellKnownFolder),
    ById(FolderId),
}

/// Item counts cached from a folder listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FolderCounts {
    pub total: Option<u32>,
    pub unread: Option<u32>,
    pub child_folders: Option<u32>,
}

/// A reference to a mailbox folder.
///
/// # Examples
///
/// ```
/// use ews_client::{FolderRef, WellKnownFolder};
///
/// let inbox = FolderRef::well_known(WellKnownFolder::Inbox);
/// assert_eq!(
///     inbox.to_xml().unwrap().as_str(),
///     r#"<t:DistinguishedFolderId Id="inbox"/>"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    locator: FolderLocator,
    display_name: Option<String>,
    counts: FolderCounts,
}

impl FolderRef {
    #[must_use]
    pub fn well_known(role: WellKnownFolder) -> Self {
        Self {
            locator: FolderLocator::Distinguished(role),
            display_name: None,
            counts: FolderCounts::default(),
        }
    }

    #[must_use]
    pub fn inbox() -> Self {
        Self::well_known(WellKnownFolder::Inbox)
    }

    #[must_use]
    pub fn sent() -> Self {
        Self::well_known(WellKnownFolder::Sent)
    }

    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            locator: FolderLocator::ById(FolderId::new(id)),
            display_name: None,
            counts: FolderCounts::default(),
        }
    }

    #[must_use]
    pub const fn locator(&self) -> &FolderLocator {
        &self.locator
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub const fn counts(&self) -> FolderCounts {
        self.counts
    }

    /// Distinguished name or opaque id, for logs and error context.
    #[must_use]
    pub fn target(&self) -> &str {
        match &self.locator {
            FolderLocator::Distinguished(role) => role.as_str(),
            FolderLocator::ById(id) => id.id(),
        }
    }

    pub(crate) fn write_xml(&self, writer: &mut XmlWriter) -> Result<()> {
        match &self.locator {
            FolderLocator::Distinguished(role) => {
                soap::empty(writer, "t:DistinguishedFolderId", &[("Id", role.as_str())])
            }
            FolderLocator::ById(id) if id.id.is_empty() => Err(Error::InvalidFolderReference(
                "folder id is empty".into(),
            )),
            FolderLocator::ById(FolderId {
                id,
                change_key: Some(key),
            }) => soap::empty(
                writer,
                "t:FolderId",
                &[("Id", id.as_str()), ("ChangeKey", key.as_str())],
            ),
            FolderLocator::ById(FolderId { id, .. }) => {
                soap::empty(writer, "t:FolderId", &[("Id", id.as_str())])
            }
        }
    }

    /// Render the folder locator element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFolderReference`] for a reference with an
    /// empty id.
    pub fn to_xml(&self) -> Result<XmlFragment> {
        soap::fragment(|w| self.write_xml(w))
    }

    /// List one page of the items in this folder.
    ///
    /// Items of every kind (messages, meeting requests, ...) come back
    /// in the order the server returned them. A page with no items is an
    /// empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Operation`] if the transport fails,
    /// [`Error::Response`] if the server rejects the request, and
    /// [`Error::Decode`] if the response has an unexpected shape.
    pub async fn list(&self, session: &Session, options: ListOptions) -> Result<FolderPage> {
        let request = soap::find_item(&self.to_xml()?, &options)?;
        debug!(
            "Listing folder '{}' (offset {}, max {})",
            self.target(),
            options.offset,
            options.max_entries
        );

        let raw = session
            .client()?
            .call(Operation::FindItem, request)
            .await
            .map_err(|source| Error::Operation {
                operation: Operation::FindItem,
                target: self.target().to_string(),
                source,
            })?;

        let page = FolderPage::decode(raw)?;
        info!(
            "Listed {} messages from '{}'",
            page.messages.len(),
            self.target()
        );
        Ok(page)
    }

    /// List the direct child folders of this folder, of any folder kind.
    ///
    /// # Errors
    ///
    /// Same as [`FolderRef::list`].
    pub async fn subfolders(&self, session: &Session) -> Result<Vec<Self>> {
        let request = soap::find_folder(&self.to_xml()?)?;
        let raw = session
            .client()?
            .call(Operation::FindFolder, request)
            .await
            .map_err(|source| Error::Operation {
                operation: Operation::FindFolder,
                target: self.target().to_string(),
                source,
            })?;

        let message = soap::response_message(Operation::FindFolder, &raw)?;
        let Some(folders) = message.pointer("/RootFolder/Folders") else {
            return Ok(Vec::new());
        };
        soap::ordered_children(folders)
            .into_iter()
            .map(|(kind, node)| {
                if !FOLDER_KINDS.contains(&kind) {
                    warn!("Decoding unknown folder kind '{}' as a folder", kind);
                }
                Self::decode(soap::decode_node(node, kind)?)
            })
            .collect()
    }

    fn decode(node: FolderNode) -> Result<Self> {
        let id = node
            .folder_id
            .ok_or_else(|| Error::Decode("folder summary has no FolderId".into()))?
            .attributes;
        Ok(Self {
            locator: FolderLocator::ById(FolderId {
                id: id.id,
                change_key: id.change_key,
            }),
            display_name: node.display_name,
            counts: FolderCounts {
                total: parse_count(node.total_count.as_deref(), "TotalCount")?,
                unread: parse_count(node.unread_count.as_deref(), "UnreadCount")?,
                child_folders: parse_count(
                    node.child_folder_count.as_deref(),
                    "ChildFolderCount",
                )?,
            },
        })
    }
}

/// Element names of the folder kinds a listing can return.
const FOLDER_KINDS: [&str; 5] = [
    "Folder",
    "CalendarFolder",
    "ContactsFolder",
    "SearchFolder",
    "TasksFolder",
];

fn parse_count(value: Option<&str>, field: &str) -> Result<Option<u32>> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| Error::Decode(format!("{field} '{v}': {e}")))
        })
        .transpose()
}

impl From<WellKnownFolder> for FolderRef {
    fn from(role: WellKnownFolder) -> Self {
        Self::well_known(role)
    }
}

/// Paging and shape parameters for [`FolderRef::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub max_entries: u32,
    pub offset: u32,
    pub base_point: BasePoint,
    /// Ask for every property instead of the default set.
    pub all_details: bool,
}

impl ListOptions {
    #[must_use]
    pub const fn shape(&self) -> BaseShape {
        if self.all_details {
            BaseShape::AllProperties
        } else {
            BaseShape::Default
        }
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            max_entries: 30,
            offset: 0,
            base_point: BasePoint::Beginning,
            all_details: false,
        }
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone)]
pub struct FolderPage {
    pub messages: Vec<EmailMessage>,
    /// The structured server response the page was decoded from.
    pub raw: Value,
    pub total_items_in_view: Option<u32>,
    pub includes_last_item: Option<bool>,
    /// Offset to pass for the next page.
    pub next_offset: Option<u32>,
}

impl FolderPage {
    fn decode(raw: Value) -> Result<Self> {
        let message = soap::response_message(Operation::FindItem, &raw)?;
        let root = message.get("RootFolder").unwrap_or(&Value::Null);
        let messages = match root.get("Items") {
            Some(items) => EmailMessage::decode_items(items)?,
            None => Vec::new(),
        };

        let attributes: RootFolderAttributes = match root.get("attributes") {
            Some(node) => soap::decode_node(node, "RootFolder attributes")?,
            None => RootFolderAttributes::default(),
        };
        let includes_last_item = attributes
            .includes_last_item_in_range
            .as_deref()
            .map(|v| v.eq_ignore_ascii_case("true"));
        Ok(Self {
            messages,
            total_items_in_view: parse_count(
                attributes.total_items_in_view.as_deref(),
                "TotalItemsInView",
            )?,
            includes_last_item,
            next_offset: parse_count(
                attributes.indexed_paging_offset.as_deref(),
                "IndexedPagingOffset",
            )?,
            raw,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RootFolderAttributes {
    total_items_in_view: Option<String>,
    includes_last_item_in_range: Option<String>,
    indexed_paging_offset: Option<String>,
}

/// A folder summary from a folder listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FolderNode {
    folder_id: Option<FolderIdNode>,
    display_name: Option<String>,
    total_count: Option<String>,
    child_folder_count: Option<String>,
    unread_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FolderIdNode {
    attributes: IdAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdAttributes {
    pub id: String,
    pub change_key: Option<String>,
}
