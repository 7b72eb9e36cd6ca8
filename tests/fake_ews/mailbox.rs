//! Test data model for the fake Exchange server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("inbox", "Inbox")
//!         .email(TestEmail::new("AAA1", "Hello"))
//!         .email(TestEmail::new("AAA2", "Again").unread())
//!     .folder("FOLDER-projects", "Projects")
//!         .child_of("inbox")
//!     .build();
//! ```
//!
//! Folders are keyed by the id a request names them with: the
//! distinguished id (`inbox`, `sentitems`, ...) for well-known
//! folders, an opaque string for everything else.

#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
}

impl Mailbox {
    pub fn get_folder(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Folder> + 'a {
        self.folders
            .iter()
            .filter(move |f| f.parent.as_deref() == Some(parent))
    }

    pub fn find_email(&self, id: &str) -> Option<&TestEmail> {
        self.folders
            .iter()
            .flat_map(|f| f.emails.iter())
            .find(|e| e.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    pub emails: Vec<TestEmail>,
}

/// A message stored in a folder.
///
/// The brief fields are what a `FindItem` listing returns; `body` and
/// `to` only show up in a `GetItem` response.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub id: String,
    /// Element name the item is returned as (`Message`, `MeetingRequest`, ...).
    pub kind: &'static str,
    pub subject: String,
    pub read: bool,
    pub from_name: String,
    pub from_address: String,
    pub to: Vec<String>,
    pub body: String,
    pub sent: String,
}

impl TestEmail {
    pub fn new(id: &str, subject: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: "Message",
            subject: subject.to_string(),
            read: true,
            from_name: "Alice Example".to_string(),
            from_address: "alice@example.com".to_string(),
            to: vec!["bob@example.com".to_string()],
            body: format!("<p>{subject}</p>"),
            sent: "2024-01-01T12:00:00Z".to_string(),
        }
    }

    pub const fn kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    pub fn unread(mut self) -> Self {
        self.read = false;
        self
    }

    pub fn from(mut self, name: &str, address: &str) -> Self {
        self.from_name = name.to_string();
        self.from_address = address.to_string();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn size(&self) -> usize {
        self.subject.len() + self.body.len()
    }
}

pub struct MailboxBuilder {
    folders: Vec<Folder>,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
        }
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, id: &str, name: &str) -> Self {
        self.folders.push(Folder {
            id: id.to_string(),
            name: name.to_string(),
            parent: None,
            emails: Vec::new(),
        });
        self
    }

    /// Make the most recently added folder a child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn child_of(mut self, parent: &str) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .child_of()")
            .parent = Some(parent.to_string());
        self
    }

    /// Add an email to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(mut self, email: TestEmail) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .emails
            .push(email);
        self
    }

    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
        }
    }
}
