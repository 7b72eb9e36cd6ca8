//! Fake Exchange server for integration testing
//!
//! This module provides an in-process stand-in for the SOAP transport
//! that answers enough of EWS to test the client end-to-end:
//!
//! request XML -> handler -> SOAP envelope -> parsed response -> client
//!
//! ## Module layout
//!
//! - `server` -- the `Transport`/`SoapClient` pair and request log
//! - `handlers` -- one function per EWS operation (FindItem, GetItem, etc.)
//! - `mailbox` -- test data model (folders, emails, builder)

mod handlers;
pub mod mailbox;
mod server;

pub use handlers::attribute;
pub use mailbox::{MailboxBuilder, TestEmail};
pub use server::FakeExchange;
